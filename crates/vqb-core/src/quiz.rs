use std::collections::HashSet;

use crate::{
    domain::{ChatId, MemberId},
    errors::Error,
    ports::Question,
    Result,
};

/// Lifecycle phase of one chat's quiz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizPhase {
    /// No roster collected yet.
    Idle,
    /// Roster collected; `/start` becomes eligible.
    Collected,
    /// Questions in flight.
    Running,
    /// Bank exhausted. Terminal.
    Finished,
}

/// What a processed answer or timeout did to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Advanced to the next question.
    Next { question: Question, index: usize },
    /// Advanced past the last question; the quiz is over.
    Finished,
    /// The event was stale or not applicable; nothing changed.
    Ignored,
}

/// Per-chat quiz session state machine.
///
/// The `Collected -> Running` transition fires at most once per session
/// lifetime; a repeated `/start` is a no-op rejection, never a restart. Only
/// one question is active at a time, and the index advances exactly once per
/// round no matter how many events arrive for it.
#[derive(Clone, Debug)]
pub struct QuizSession {
    pub chat_id: ChatId,
    phase: QuizPhase,
    started_by: Option<MemberId>,
    current_question_index: usize,
    current_question: Option<Question>,
    answered_this_round: HashSet<MemberId>,
}

impl QuizSession {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            phase: QuizPhase::Idle,
            started_by: None,
            current_question_index: 0,
            current_question: None,
            answered_this_round: HashSet::new(),
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn started_by(&self) -> Option<MemberId> {
        self.started_by
    }

    /// Mark the roster as collected. Only meaningful from `Idle`; a
    /// recollection while running does not disturb the session.
    pub fn roster_collected(&mut self) {
        if self.phase == QuizPhase::Idle {
            self.phase = QuizPhase::Collected;
        }
    }

    /// `/start`: `Collected -> Running`, handing out the first question.
    ///
    /// `first_question == None` means the bank is already exhausted; the
    /// session goes straight to `Finished`, still consuming the once-only
    /// transition.
    pub fn start(
        &mut self,
        by: MemberId,
        first_question: Option<Question>,
    ) -> Result<RoundOutcome> {
        match self.phase {
            QuizPhase::Idle => Err(Error::NotReady),
            QuizPhase::Running => Err(Error::AlreadyRunning),
            QuizPhase::Finished => Err(Error::AlreadyFinished),
            QuizPhase::Collected => {
                self.started_by = Some(by);
                match first_question {
                    Some(q) => {
                        self.phase = QuizPhase::Running;
                        self.current_question = Some(q.clone());
                        self.answered_this_round.clear();
                        Ok(RoundOutcome::Next { question: q, index: 0 })
                    }
                    None => {
                        self.phase = QuizPhase::Finished;
                        Ok(RoundOutcome::Finished)
                    }
                }
            }
        }
    }

    /// Whether `index` is the question currently in flight.
    pub fn is_current_round(&self, index: usize) -> bool {
        self.phase == QuizPhase::Running && self.current_question_index == index
    }

    /// Whether the member still has their answer for the current round.
    pub fn may_answer(&self, member: MemberId) -> bool {
        self.phase == QuizPhase::Running && !self.answered_this_round.contains(&member)
    }

    /// Record that a member used their answer for this round.
    pub fn record_answer(&mut self, member: MemberId) {
        self.answered_this_round.insert(member);
    }

    /// Advance past the current question (correct answer accepted or round
    /// timed out). Ignored unless the session is `Running`.
    pub fn advance(&mut self, next_question: Option<Question>) -> RoundOutcome {
        if self.phase != QuizPhase::Running {
            return RoundOutcome::Ignored;
        }

        self.current_question_index += 1;
        self.answered_this_round.clear();

        match next_question {
            Some(q) => {
                self.current_question = Some(q.clone());
                RoundOutcome::Next {
                    question: q,
                    index: self.current_question_index,
                }
            }
            None => {
                self.phase = QuizPhase::Finished;
                self.current_question = None;
                RoundOutcome::Finished
            }
        }
    }
}
