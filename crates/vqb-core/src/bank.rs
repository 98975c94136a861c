use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::{
    domain::ChatId,
    ports::{Question, QuestionBank, QuestionOption},
    Result,
};

/// On-disk shape of one question, matching the original question-list files:
/// a message plus keyboard buttons whose payload marks the correct answers.
#[derive(Clone, Debug, Deserialize)]
struct QuestionEntry {
    message: String,
    buttons: Vec<ButtonEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct ButtonEntry {
    name: String,
    payload: bool,
}

/// File-backed, ordered question bank.
///
/// Questions are served sequentially with an independent cursor per chat;
/// `None` signals exhaustion.
pub struct JsonQuestionBank {
    questions: Vec<Question>,
    cursors: HashMap<ChatId, usize>,
}

impl JsonQuestionBank {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let entries: Vec<QuestionEntry> = serde_json::from_str(&raw)?;

        let questions = entries
            .into_iter()
            .map(|e| Question {
                text: e.message,
                options: e
                    .buttons
                    .into_iter()
                    .map(|b| QuestionOption {
                        label: b.name,
                        correct: b.payload,
                    })
                    .collect(),
            })
            .collect();

        Ok(Self::from_questions(questions))
    }

    pub fn from_questions(questions: Vec<Question>) -> Self {
        Self {
            questions,
            cursors: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionBank for JsonQuestionBank {
    fn next_question(&mut self, chat_id: ChatId) -> Option<Question> {
        let cursor = self.cursors.entry(chat_id).or_insert(0);
        let q = self.questions.get(*cursor).cloned()?;
        *cursor += 1;
        Some(q)
    }

    fn check_answer(&self, question: &Question, submitted: &str) -> bool {
        let submitted = submitted.trim();
        question
            .options
            .iter()
            .any(|o| o.correct && o.label.trim().eq_ignore_ascii_case(submitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_question_bank() -> JsonQuestionBank {
        let raw = r#"[
            {
              "message": "Capital of France?",
              "buttons": [
                { "name": "Paris", "payload": true },
                { "name": "Lyon", "payload": false }
              ]
            },
            {
              "message": "2 + 2?",
              "buttons": [
                { "name": "4", "payload": true },
                { "name": "5", "payload": false }
              ]
            }
        ]"#;
        let entries: Vec<QuestionEntry> = serde_json::from_str(raw).unwrap();
        JsonQuestionBank::from_questions(
            entries
                .into_iter()
                .map(|e| Question {
                    text: e.message,
                    options: e
                        .buttons
                        .into_iter()
                        .map(|b| QuestionOption {
                            label: b.name,
                            correct: b.payload,
                        })
                        .collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn serves_questions_in_order_until_exhausted() {
        let mut bank = two_question_bank();
        let chat = ChatId(1);

        let q0 = bank.next_question(chat).unwrap();
        assert_eq!(q0.text, "Capital of France?");
        let q1 = bank.next_question(chat).unwrap();
        assert_eq!(q1.text, "2 + 2?");
        assert!(bank.next_question(chat).is_none());
    }

    #[test]
    fn cursors_are_independent_per_chat() {
        let mut bank = two_question_bank();

        let a0 = bank.next_question(ChatId(1)).unwrap();
        let b0 = bank.next_question(ChatId(2)).unwrap();
        assert_eq!(a0.text, b0.text);
    }

    #[test]
    fn check_answer_matches_correct_labels_case_insensitively() {
        let bank = two_question_bank();
        let q = Question {
            text: "Capital of France?".to_string(),
            options: vec![
                QuestionOption {
                    label: "Paris".to_string(),
                    correct: true,
                },
                QuestionOption {
                    label: "Lyon".to_string(),
                    correct: false,
                },
            ],
        };

        assert!(bank.check_answer(&q, "Paris"));
        assert!(bank.check_answer(&q, "  paris "));
        assert!(!bank.check_answer(&q, "Lyon"));
        assert!(!bank.check_answer(&q, "Berlin"));
    }
}
