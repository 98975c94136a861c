use crate::domain::{ChatId, MemberId, Provenance};

/// Inbound events consumed by the dispatcher, in delivery order.
///
/// Everything that can mutate per-chat state arrives through this type and a
/// single queue, including the synthetic round timer.
#[derive(Clone, Debug)]
pub enum Event {
    /// A text message from the chat surface or the operator console.
    Message(MessageEvent),
    /// A quiz answer submission (callback button press).
    Answer(AnswerEvent),
    /// Round timer expiry, injected back into the queue by the dispatcher.
    RoundTimeout {
        chat_id: ChatId,
        question_index: usize,
    },
}

#[derive(Clone, Debug)]
pub struct MessageEvent {
    pub provenance: Provenance,
    pub chat_id: ChatId,
    pub sender: MemberId,
    pub text: String,
    /// Sender of the message this one replies to, when present. Used to resolve
    /// the `/kick` target.
    pub reply_to: Option<MemberId>,
}

#[derive(Clone, Debug)]
pub struct AnswerEvent {
    pub chat_id: ChatId,
    pub sender: MemberId,
    /// The pressed button's label.
    pub text: String,
    /// Which question the member answered, as stamped into the button payload.
    pub question_index: usize,
}
