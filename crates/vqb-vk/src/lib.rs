//! VK adapter.
//!
//! This crate implements the `vqb-core` TransportPort over the VK Bot API and
//! hosts the Bots Long Poll listener that feeds the dispatcher queue.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::debug;

pub mod longpoll;

use vqb_core::{
    domain::{ChatId, MemberId, MemberRecord},
    errors::Error,
    ports::{Question, TransportPort},
    Result,
};

const API_BASE: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.131";

/// Community chats are addressed as `2_000_000_000 + local chat id`.
pub const PEER_ID_ADDITION: i64 = 2_000_000_000;

pub fn peer_id(chat_id: ChatId) -> i64 {
    PEER_ID_ADDITION + chat_id.0
}

/// Thin VK API client: one `call` per method, form-encoded, enveloped JSON.
#[derive(Clone)]
pub struct VkApi {
    http: reqwest::Client,
    token: String,
}

impl VkApi {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    fn map_err(e: reqwest::Error) -> Error {
        Error::Platform(format!("vk transport error: {e}"))
    }

    /// Invoke one API method. Transport failures are retried once; an API-level
    /// error envelope is never retried.
    pub async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        const MAX_RETRIES: usize = 1;

        let url = format!("{API_BASE}/{method}");
        let mut form: Vec<(&str, String)> = vec![
            ("access_token", self.token.clone()),
            ("v", API_VERSION.to_string()),
        ];
        form.extend(params.iter().cloned());

        let mut attempts = 0usize;
        let envelope: Value = loop {
            let sent = self.http.post(&url).form(&form).send().await;
            match sent {
                Ok(resp) => match resp.json::<Value>().await {
                    Ok(v) => break v,
                    Err(e) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(std::time::Duration::from_millis(500)).await;
                        debug!(method, "retrying after decode failure: {e}");
                    }
                    Err(e) => return Err(Self::map_err(e)),
                },
                Err(e) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(std::time::Duration::from_millis(500)).await;
                    debug!(method, "retrying after transport failure: {e}");
                }
                Err(e) => return Err(Self::map_err(e)),
            }
        };

        if let Some(err) = envelope.get("error") {
            let code = err.get("error_code").and_then(Value::as_i64).unwrap_or(0);
            let msg = err
                .get("error_msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(Error::Platform(format!("{method} failed ({code}): {msg}")));
        }

        envelope
            .get("response")
            .cloned()
            .ok_or_else(|| Error::Platform(format!("{method}: malformed envelope")))
    }
}

/// TransportPort implementation backed by [`VkApi`].
#[derive(Clone)]
pub struct VkTransport {
    api: VkApi,
}

impl VkTransport {
    pub fn new(api: VkApi) -> Self {
        Self { api }
    }

    fn random_id() -> i64 {
        // messages.send deduplicates on this; a microsecond clock is unique
        // enough for a single sequential sender.
        chrono::Utc::now().timestamp_micros()
    }

    fn answer_keyboard(question: &Question, question_index: usize) -> Value {
        let rows: Vec<Value> = question
            .options
            .iter()
            .map(|opt| {
                let payload = json!({
                    "question_index": question_index,
                    "answer": opt.label,
                });
                json!([{
                    "action": {
                        "type": "callback",
                        "label": opt.label,
                        "payload": payload.to_string(),
                    },
                    "color": "primary",
                }])
            })
            .collect();

        json!({ "inline": true, "buttons": rows })
    }
}

#[async_trait]
impl TransportPort for VkTransport {
    async fn send_reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.api
            .call(
                "messages.send",
                &[
                    ("peer_id", peer_id(chat_id).to_string()),
                    ("random_id", Self::random_id().to_string()),
                    ("message", text.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn send_question(
        &self,
        chat_id: ChatId,
        text: &str,
        question: &Question,
        question_index: usize,
    ) -> Result<()> {
        let keyboard = Self::answer_keyboard(question, question_index);
        self.api
            .call(
                "messages.send",
                &[
                    ("peer_id", peer_id(chat_id).to_string()),
                    ("random_id", Self::random_id().to_string()),
                    ("message", text.to_string()),
                    ("keyboard", keyboard.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove_member(&self, chat_id: ChatId, member_id: MemberId) -> Result<()> {
        self.api
            .call(
                "messages.removeChatUser",
                &[
                    ("chat_id", chat_id.0.to_string()),
                    ("member_id", member_id.0.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_members(&self, chat_id: ChatId) -> Result<Vec<MemberRecord>> {
        let response = self
            .api
            .call(
                "messages.getConversationMembers",
                &[("peer_id", peer_id(chat_id).to_string())],
            )
            .await?;

        Ok(parse_members(&response))
    }
}

/// Parse `messages.getConversationMembers`: admin flags come from `items`,
/// display names from the parallel `profiles` array. Community members
/// (negative ids, the bot itself included) are skipped.
fn parse_members(response: &Value) -> Vec<MemberRecord> {
    let empty = Vec::new();
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let profiles = response
        .get("profiles")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let display_name = |id: i64| -> String {
        profiles
            .iter()
            .find(|p| p.get("id").and_then(Value::as_i64) == Some(id))
            .map(|p| {
                let first = p.get("first_name").and_then(Value::as_str).unwrap_or("");
                let last = p.get("last_name").and_then(Value::as_str).unwrap_or("");
                format!("{first} {last}").trim().to_string()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Member {id}"))
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("member_id").and_then(Value::as_i64)?;
            if id <= 0 {
                return None;
            }
            Some(MemberRecord {
                member_id: MemberId(id),
                is_admin: item
                    .get("is_admin")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                display_name: display_name(id),
            })
        })
        .collect()
}
