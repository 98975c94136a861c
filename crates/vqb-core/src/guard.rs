use crate::{
    command::Command,
    domain::{ChatId, MemberId, Provenance},
    errors::Error,
    roster::RosterCache,
    Result,
};

/// Authorize a classified command against the policy table.
///
/// Console-origin commands are never resolved against a roster; chat commands
/// are checked against the current snapshot, fail-closed. `NotReady` means no
/// roster has been collected yet; `PermissionDenied` means a roster exists and
/// the caller is not an administrator in it.
pub fn authorize(
    command: &Command,
    provenance: Provenance,
    roster: &RosterCache,
    chat_id: ChatId,
    caller: MemberId,
) -> Result<()> {
    match command {
        Command::RemoveArchives | Command::Exit => match provenance {
            Provenance::Console => Ok(()),
            Provenance::Chat => Err(Error::PermissionDenied),
        },

        // Bootstrap exception: anyone may trigger the first collection.
        Command::GetChat => match roster.get(chat_id) {
            None => Ok(()),
            Some(snapshot) if snapshot.is_admin(caller) => Ok(()),
            Some(_) => Err(Error::PermissionDenied),
        },

        Command::Start | Command::KickAll | Command::Kick(_) => match roster.get(chat_id) {
            None => Err(Error::NotReady),
            Some(snapshot) if snapshot.is_admin(caller) => Ok(()),
            Some(_) => Err(Error::PermissionDenied),
        },

        // Handled by the dispatcher before authorization.
        Command::MalformedKick | Command::Unknown => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemberRecord;
    use crate::roster::RosterSnapshot;

    fn cache_with(members: Vec<(i64, bool)>) -> RosterCache {
        let mut cache = RosterCache::new();
        let snapshot = RosterSnapshot {
            members: members
                .into_iter()
                .map(|(id, is_admin)| MemberRecord {
                    member_id: MemberId(id),
                    is_admin,
                    display_name: String::new(),
                })
                .collect(),
        };
        // Seed through the test-only path below.
        cache.seed_for_tests(ChatId(10), snapshot);
        cache
    }

    #[test]
    fn console_commands_are_console_only() {
        let cache = RosterCache::new();
        for cmd in [Command::RemoveArchives, Command::Exit] {
            assert!(authorize(&cmd, Provenance::Console, &cache, ChatId(10), MemberId(1)).is_ok());
            assert!(matches!(
                authorize(&cmd, Provenance::Chat, &cache, ChatId(10), MemberId(1)),
                Err(Error::PermissionDenied)
            ));
        }
    }

    #[test]
    fn get_chat_is_open_until_a_roster_exists() {
        let empty = RosterCache::new();
        assert!(authorize(
            &Command::GetChat,
            Provenance::Chat,
            &empty,
            ChatId(10),
            MemberId(2)
        )
        .is_ok());

        let cache = cache_with(vec![(1, true), (2, false)]);
        assert!(authorize(
            &Command::GetChat,
            Provenance::Chat,
            &cache,
            ChatId(10),
            MemberId(1)
        )
        .is_ok());
        assert!(matches!(
            authorize(
                &Command::GetChat,
                Provenance::Chat,
                &cache,
                ChatId(10),
                MemberId(2)
            ),
            Err(Error::PermissionDenied)
        ));
    }

    #[test]
    fn admin_commands_fail_not_ready_without_a_roster() {
        let empty = RosterCache::new();
        for cmd in [Command::Start, Command::KickAll, Command::Kick(MemberId(3))] {
            assert!(matches!(
                authorize(&cmd, Provenance::Chat, &empty, ChatId(10), MemberId(1)),
                Err(Error::NotReady)
            ));
        }
    }

    #[test]
    fn admin_commands_require_admin_once_a_roster_exists() {
        let cache = cache_with(vec![(1, true), (2, false)]);
        for cmd in [Command::Start, Command::KickAll, Command::Kick(MemberId(3))] {
            assert!(authorize(&cmd, Provenance::Chat, &cache, ChatId(10), MemberId(1)).is_ok());
            assert!(matches!(
                authorize(&cmd, Provenance::Chat, &cache, ChatId(10), MemberId(2)),
                Err(Error::PermissionDenied)
            ));
        }
    }
}
