use std::collections::HashMap;

use tracing::debug;

use crate::{
    domain::{ChatId, MemberId, MemberRecord},
    errors::Error,
    ports::TransportPort,
    Result,
};

/// One chat's membership as of the last collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub members: Vec<MemberRecord>,
}

impl RosterSnapshot {
    pub fn is_admin(&self, member_id: MemberId) -> bool {
        self.members
            .iter()
            .any(|m| m.member_id == member_id && m.is_admin)
    }

    pub fn admin_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_admin).count()
    }
}

/// Per-chat roster snapshots, owned by the dispatcher.
///
/// Absent until the first successful `/get_chat`. Recollection fully replaces
/// the stored snapshot; a member promoted or demoted on the platform after the
/// last collection is not reflected until the next one.
#[derive(Default)]
pub struct RosterCache {
    snapshots: HashMap<ChatId, RosterSnapshot>,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `member_id` is an administrator per the current snapshot.
    /// Fail-closed: `false` when no snapshot exists for the chat.
    pub fn is_admin(&self, chat_id: ChatId, member_id: MemberId) -> bool {
        self.snapshots
            .get(&chat_id)
            .map(|s| s.is_admin(member_id))
            .unwrap_or(false)
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&RosterSnapshot> {
        self.snapshots.get(&chat_id)
    }

    /// Collect the live member list and swap it in as one snapshot.
    ///
    /// First-time collection is open to anyone (bootstrap exception); once a
    /// snapshot exists, only a current administrator may recollect. The swap
    /// happens after the fetch completes, so readers never see a partial roster.
    pub async fn collect(
        &mut self,
        transport: &dyn TransportPort,
        chat_id: ChatId,
        requested_by: MemberId,
    ) -> Result<&RosterSnapshot> {
        if let Some(existing) = self.snapshots.get(&chat_id) {
            if !existing.is_admin(requested_by) {
                return Err(Error::PermissionDenied);
            }
        }

        let members = transport.fetch_members(chat_id).await?;
        debug!(
            chat = chat_id.0,
            members = members.len(),
            "roster snapshot replaced"
        );

        let slot = self.snapshots.entry(chat_id).or_default();
        *slot = RosterSnapshot { members };
        Ok(slot)
    }
}

#[cfg(test)]
impl RosterCache {
    /// Seed a snapshot directly, bypassing the transport.
    pub(crate) fn seed_for_tests(&mut self, chat_id: ChatId, snapshot: RosterSnapshot) {
        self.snapshots.insert(chat_id, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::ports::Question;

    #[derive(Default)]
    struct FakeTransport {
        members: Mutex<Vec<MemberRecord>>,
        fetches: Mutex<usize>,
    }

    #[async_trait]
    impl TransportPort for FakeTransport {
        async fn send_reply(&self, _chat_id: ChatId, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_question(
            &self,
            _chat_id: ChatId,
            _text: &str,
            _question: &Question,
            _question_index: usize,
        ) -> Result<()> {
            Ok(())
        }

        async fn remove_member(&self, _chat_id: ChatId, _member_id: MemberId) -> Result<()> {
            Ok(())
        }

        async fn fetch_members(&self, _chat_id: ChatId) -> Result<Vec<MemberRecord>> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.members.lock().unwrap().clone())
        }
    }

    fn member(id: i64, is_admin: bool) -> MemberRecord {
        MemberRecord {
            member_id: MemberId(id),
            is_admin,
            display_name: format!("member {id}"),
        }
    }

    #[tokio::test]
    async fn first_collection_is_open_to_anyone() {
        let transport = FakeTransport::default();
        *transport.members.lock().unwrap() = vec![member(1, true), member(2, false)];

        let mut cache = RosterCache::new();
        let snapshot = cache
            .collect(&transport, ChatId(10), MemberId(2))
            .await
            .unwrap();
        assert_eq!(snapshot.members.len(), 2);
        assert!(cache.is_admin(ChatId(10), MemberId(1)));
        assert!(!cache.is_admin(ChatId(10), MemberId(2)));
    }

    #[tokio::test]
    async fn recollection_requires_an_admin_and_skips_the_fetch_otherwise() {
        let transport = FakeTransport::default();
        *transport.members.lock().unwrap() = vec![member(1, true), member(2, false)];

        let mut cache = RosterCache::new();
        cache
            .collect(&transport, ChatId(10), MemberId(2))
            .await
            .unwrap();

        let err = cache
            .collect(&transport, ChatId(10), MemberId(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
        assert_eq!(*transport.fetches.lock().unwrap(), 1);

        cache
            .collect(&transport, ChatId(10), MemberId(1))
            .await
            .unwrap();
        assert_eq!(*transport.fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn recollection_fully_replaces_the_snapshot() {
        let transport = FakeTransport::default();
        *transport.members.lock().unwrap() = vec![member(1, true), member(2, false)];

        let mut cache = RosterCache::new();
        cache
            .collect(&transport, ChatId(10), MemberId(1))
            .await
            .unwrap();

        // Member 2 left, member 3 joined, member 1 stays admin.
        *transport.members.lock().unwrap() = vec![member(1, true), member(3, false)];
        let snapshot = cache
            .collect(&transport, ChatId(10), MemberId(1))
            .await
            .unwrap();

        assert_eq!(snapshot.members.len(), 2);
        assert!(snapshot.members.iter().all(|m| m.member_id != MemberId(2)));
    }

    #[test]
    fn is_admin_is_fail_closed_without_a_snapshot() {
        let cache = RosterCache::new();
        assert!(!cache.is_admin(ChatId(10), MemberId(1)));
    }
}
