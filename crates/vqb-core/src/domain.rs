/// VK chat id (numeric, local to the bot's community).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// VK member/page id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberId(pub i64);

/// One chat member as of the last roster collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRecord {
    pub member_id: MemberId,
    pub is_admin: bool,
    pub display_name: String,
}

/// Where an inbound event originated. Stamped at the transport/console boundary;
/// console callers are never resolved against a roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    Console,
    Chat,
}
