use crate::domain::MemberId;

/// A classified inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Console: delete archived log bundles.
    RemoveArchives,
    /// Console: graceful shutdown.
    Exit,
    /// Collect the chat roster and admin flags.
    GetChat,
    /// Start the quiz for this chat.
    Start,
    /// Remove every non-admin member.
    KickAll,
    /// Remove the member whose message was replied to.
    Kick(MemberId),
    /// `/kick` without a reply-reference to resolve the target.
    MalformedKick,
    Unknown,
}

/// Classify raw message text into a command.
///
/// The lexicon is fixed and case-sensitive; surrounding whitespace is ignored.
/// Anything else is `Unknown` and is dropped without a reply.
pub fn classify(text: &str, reply_to: Option<MemberId>) -> Command {
    let token = text.trim().split_whitespace().next().unwrap_or("");

    match token {
        "/rem_arcs" => Command::RemoveArchives,
        "/exit" => Command::Exit,
        "/get_chat" => Command::GetChat,
        "/start" => Command::Start,
        "/kick_all" => Command::KickAll,
        "/kick" => match reply_to {
            Some(target) => Command::Kick(target),
            None => Command::MalformedKick,
        },
        _ => Command::Unknown,
    }
}
