use async_trait::async_trait;

use crate::{
    domain::{ChatId, MemberId, MemberRecord},
    Result,
};

/// One answer button of a quiz question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionOption {
    pub label: String,
    pub correct: bool,
}

/// A single quiz round: the question text and its answer options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub options: Vec<QuestionOption>,
}

/// Hexagonal port for the chat platform.
///
/// VK is the first implementation; the shape is platform-neutral so tests can
/// substitute a recording fake.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Send a plain text message to the chat.
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Publish a quiz question with its answer keyboard.
    ///
    /// `question_index` round-trips through the platform (button payloads) and
    /// comes back on answer events, so stale answers can be discarded.
    async fn send_question(
        &self,
        chat_id: ChatId,
        text: &str,
        question: &Question,
        question_index: usize,
    ) -> Result<()>;

    /// Remove one member from the chat.
    async fn remove_member(&self, chat_id: ChatId, member_id: MemberId) -> Result<()>;

    /// Fetch the live member list with admin flags.
    async fn fetch_members(&self, chat_id: ChatId) -> Result<Vec<MemberRecord>>;
}

/// Port for the question/answer supply.
///
/// Exhaustion is signaled by `None`; the state machine treats that as the end
/// of the quiz.
pub trait QuestionBank: Send {
    fn next_question(&mut self, chat_id: ChatId) -> Option<Question>;
    fn check_answer(&self, question: &Question, submitted: &str) -> bool;
}
