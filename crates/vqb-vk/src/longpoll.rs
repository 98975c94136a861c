//! Bots Long Poll listener.
//!
//! Acquires a long poll server via `groups.getLongPollServer`, polls it in a
//! loop, and converts raw updates into dispatcher events. `failed: 1` resyncs
//! the cursor, `failed: 2`/`failed: 3` re-acquire the server, per the VK
//! protocol.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vqb_core::{
    domain::{ChatId, MemberId, Provenance},
    errors::Error,
    events::{AnswerEvent, Event, MessageEvent},
    Result,
};

use crate::{VkApi, PEER_ID_ADDITION};

#[derive(Clone, Debug)]
struct LongPollServer {
    server: String,
    key: String,
    ts: String,
}

#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Updates { ts: String, updates: Vec<Value> },
    /// `failed: 1` — history is partially lost; resume from the supplied ts.
    Resync { ts: String },
    /// `failed: 2` or `3` — the key or server expired; re-acquire.
    Reacquire,
}

pub struct LongPollListener {
    api: VkApi,
    http: reqwest::Client,
    group_id: i64,
    wait: Duration,
    server: Option<LongPollServer>,
    events_tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
}

impl LongPollListener {
    pub fn new(
        api: VkApi,
        group_id: i64,
        wait: Duration,
        events_tx: mpsc::Sender<Event>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            api,
            http: reqwest::Client::new(),
            group_id,
            wait,
            server: None,
            events_tx,
            shutdown,
        }
    }

    /// Poll until the shutdown token fires. Transient failures back off and
    /// retry; the loop never gives up on its own.
    pub async fn run(mut self) {
        info!(group = self.group_id, "long poll listener started");

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.cycle() => {
                    if let Err(e) = result {
                        warn!("long poll cycle failed: {e}");
                        self.server = None;
                        tokio::time::sleep(Duration::from_secs(3)).await;
                    }
                }
            }
        }

        info!("long poll listener stopped");
    }

    async fn cycle(&mut self) -> Result<()> {
        let srv = match self.server.clone() {
            Some(s) => s,
            None => {
                let s = self.acquire_server().await?;
                self.server = Some(s.clone());
                s
            }
        };

        match self.poll(&srv).await? {
            PollOutcome::Updates { ts, updates } => {
                if let Some(s) = self.server.as_mut() {
                    s.ts = ts;
                }
                for update in updates {
                    self.dispatch_update(&update).await;
                }
            }
            PollOutcome::Resync { ts } => {
                warn!("long poll history lost, resyncing");
                if let Some(s) = self.server.as_mut() {
                    s.ts = ts;
                }
            }
            PollOutcome::Reacquire => {
                warn!("long poll server expired, re-acquiring");
                self.server = None;
            }
        }
        Ok(())
    }

    async fn acquire_server(&self) -> Result<LongPollServer> {
        let response = self
            .api
            .call(
                "groups.getLongPollServer",
                &[("group_id", self.group_id.to_string())],
            )
            .await?;

        let field = |name: &str| -> Result<String> {
            response
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::Platform(format!("getLongPollServer: missing `{name}`"))
                })
        };

        Ok(LongPollServer {
            server: field("server")?,
            key: field("key")?,
            ts: field("ts")?,
        })
    }

    async fn poll(&self, srv: &LongPollServer) -> Result<PollOutcome> {
        let url = format!(
            "{}?act=a_check&key={}&ts={}&wait={}",
            srv.server,
            srv.key,
            srv.ts,
            self.wait.as_secs()
        );

        let body: Value = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Platform(format!("long poll request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::Platform(format!("long poll decode failed: {e}")))?;

        Ok(parse_poll(&body))
    }

    async fn dispatch_update(&self, update: &Value) {
        // Callback presses must be acknowledged or the client keeps a spinner.
        if update.get("type").and_then(Value::as_str) == Some("message_event") {
            self.ack_callback(update).await;
        }

        let Some(event) = convert_update(update) else {
            debug!("update skipped");
            return;
        };

        // A closed queue means the dispatcher is gone; shutdown follows.
        if self.events_tx.send(event).await.is_err() {
            debug!("event queue closed, dropping update");
        }
    }

    async fn ack_callback(&self, update: &Value) {
        let object = &update["object"];
        let Some(event_id) = object.get("event_id").and_then(Value::as_str) else {
            return;
        };
        let (Some(user_id), Some(peer)) = (
            object.get("user_id").and_then(Value::as_i64),
            object.get("peer_id").and_then(Value::as_i64),
        ) else {
            return;
        };

        let result = self
            .api
            .call(
                "messages.sendMessageEventAnswer",
                &[
                    ("event_id", event_id.to_string()),
                    ("user_id", user_id.to_string()),
                    ("peer_id", peer.to_string()),
                ],
            )
            .await;
        if let Err(e) = result {
            warn!("callback ack failed: {e}");
        }
    }
}

fn parse_poll(body: &Value) -> PollOutcome {
    if let Some(failed) = body.get("failed").and_then(Value::as_i64) {
        if failed == 1 {
            if let Some(ts) = poll_ts(body) {
                return PollOutcome::Resync { ts };
            }
        }
        return PollOutcome::Reacquire;
    }

    let ts = match poll_ts(body) {
        Some(ts) => ts,
        None => return PollOutcome::Reacquire,
    };
    let updates = body
        .get("updates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    PollOutcome::Updates { ts, updates }
}

// ts arrives as a string normally, but as a number on `failed: 1`.
fn poll_ts(body: &Value) -> Option<String> {
    match body.get("ts") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Map one raw long poll update onto a dispatcher event.
///
/// Only community-chat traffic passes: direct messages (peer id below the chat
/// offset) and community senders (non-positive from ids) are dropped here.
fn convert_update(update: &Value) -> Option<Event> {
    match update.get("type").and_then(Value::as_str)? {
        "message_new" => {
            let message = update.get("object")?.get("message")?;
            let peer = message.get("peer_id").and_then(Value::as_i64)?;
            if peer <= PEER_ID_ADDITION {
                return None;
            }
            let sender = message.get("from_id").and_then(Value::as_i64)?;
            if sender <= 0 {
                return None;
            }
            let text = message.get("text").and_then(Value::as_str)?.to_string();
            let reply_to = message
                .get("reply_message")
                .and_then(|r| r.get("from_id"))
                .and_then(Value::as_i64)
                .filter(|id| *id > 0)
                .map(MemberId);

            Some(Event::Message(MessageEvent {
                provenance: Provenance::Chat,
                chat_id: ChatId(peer - PEER_ID_ADDITION),
                sender: MemberId(sender),
                text,
                reply_to,
            }))
        }

        "message_event" => {
            let object = update.get("object")?;
            let peer = object.get("peer_id").and_then(Value::as_i64)?;
            if peer <= PEER_ID_ADDITION {
                return None;
            }
            let sender = object.get("user_id").and_then(Value::as_i64)?;

            // The payload round-trips exactly what the keyboard builder stamped
            // into the button; presses of foreign buttons fail to parse here.
            let payload = object.get("payload")?;
            let question_index = payload
                .get("question_index")
                .and_then(Value::as_u64)? as usize;
            let answer = payload.get("answer").and_then(Value::as_str)?.to_string();

            Some(Event::Answer(AnswerEvent {
                chat_id: ChatId(peer - PEER_ID_ADDITION),
                sender: MemberId(sender),
                text: answer,
                question_index,
            }))
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_chat_messages_with_reply_targets() {
        let update = json!({
            "type": "message_new",
            "object": {
                "message": {
                    "peer_id": 2_000_000_010i64,
                    "from_id": 5,
                    "text": "/kick",
                    "reply_message": { "from_id": 7 }
                }
            }
        });

        let Some(Event::Message(ev)) = convert_update(&update) else {
            panic!("expected a message event");
        };
        assert_eq!(ev.provenance, Provenance::Chat);
        assert_eq!(ev.chat_id, ChatId(10));
        assert_eq!(ev.sender, MemberId(5));
        assert_eq!(ev.text, "/kick");
        assert_eq!(ev.reply_to, Some(MemberId(7)));
    }

    #[test]
    fn drops_direct_messages_and_community_senders() {
        let dm = json!({
            "type": "message_new",
            "object": {
                "message": { "peer_id": 12345, "from_id": 5, "text": "hi" }
            }
        });
        assert!(convert_update(&dm).is_none());

        let from_group = json!({
            "type": "message_new",
            "object": {
                "message": {
                    "peer_id": 2_000_000_010i64,
                    "from_id": -190000001,
                    "text": "hi"
                }
            }
        });
        assert!(convert_update(&from_group).is_none());
    }

    #[test]
    fn converts_callback_presses_into_answers() {
        let update = json!({
            "type": "message_event",
            "object": {
                "event_id": "abc",
                "user_id": 5,
                "peer_id": 2_000_000_010i64,
                "payload": { "question_index": 2, "answer": "Paris" }
            }
        });

        let Some(Event::Answer(ev)) = convert_update(&update) else {
            panic!("expected an answer event");
        };
        assert_eq!(ev.chat_id, ChatId(10));
        assert_eq!(ev.sender, MemberId(5));
        assert_eq!(ev.text, "Paris");
        assert_eq!(ev.question_index, 2);
    }

    #[test]
    fn foreign_callback_payloads_are_dropped() {
        let update = json!({
            "type": "message_event",
            "object": {
                "event_id": "abc",
                "user_id": 5,
                "peer_id": 2_000_000_010i64,
                "payload": { "command": "something_else" }
            }
        });
        assert!(convert_update(&update).is_none());
    }

    #[test]
    fn unknown_update_types_are_dropped() {
        let update = json!({ "type": "wall_post_new", "object": {} });
        assert!(convert_update(&update).is_none());
    }

    #[test]
    fn parse_poll_handles_the_failure_codes() {
        let ok = json!({ "ts": "15", "updates": [{ "type": "message_new" }] });
        match parse_poll(&ok) {
            PollOutcome::Updates { ts, updates } => {
                assert_eq!(ts, "15");
                assert_eq!(updates.len(), 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert_eq!(
            parse_poll(&json!({ "failed": 1, "ts": 30 })),
            PollOutcome::Resync {
                ts: "30".to_string()
            }
        );
        assert_eq!(parse_poll(&json!({ "failed": 2 })), PollOutcome::Reacquire);
        assert_eq!(parse_poll(&json!({ "failed": 3 })), PollOutcome::Reacquire);
    }
}
