use tracing::{debug, warn};

use crate::{
    domain::{ChatId, MemberId},
    errors::Error,
    ports::TransportPort,
    roster::RosterSnapshot,
    Result,
};

/// Result of a `/kick_all` sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KickReport {
    pub removed: Vec<MemberId>,
    pub failed: Vec<(MemberId, String)>,
}

/// Remove every non-admin member in the snapshot.
///
/// Administrators are skipped, never attempted. Individual removal failures
/// are captured in the report and do not abort the sweep.
pub async fn kick_all(
    transport: &dyn TransportPort,
    chat_id: ChatId,
    snapshot: &RosterSnapshot,
) -> KickReport {
    let mut report = KickReport::default();

    for member in &snapshot.members {
        if member.is_admin {
            debug!(chat = chat_id.0, member = member.member_id.0, "skipping admin");
            continue;
        }

        match transport.remove_member(chat_id, member.member_id).await {
            Ok(()) => report.removed.push(member.member_id),
            Err(e) => {
                warn!(
                    chat = chat_id.0,
                    member = member.member_id.0,
                    "removal failed: {e}"
                );
                report.failed.push((member.member_id, e.to_string()));
            }
        }
    }

    report
}

/// Remove a single member, resolved against the cached snapshot.
///
/// The admin check uses the snapshot as of the last `/get_chat`; platform-side
/// promotions since then are not seen until the next collection.
pub async fn kick(
    transport: &dyn TransportPort,
    chat_id: ChatId,
    snapshot: &RosterSnapshot,
    target: MemberId,
) -> Result<()> {
    if snapshot.is_admin(target) {
        return Err(Error::ProtectedTarget);
    }

    transport.remove_member(chat_id, target).await
}
