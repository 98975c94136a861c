//! Operator console.
//!
//! Reads lines from stdin and feeds them into the dispatcher queue as
//! console-provenance messages. The console has no roster identity; it exists
//! for `/rem_arcs` and `/exit`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vqb_core::{
    domain::{ChatId, MemberId, Provenance},
    events::{Event, MessageEvent},
};

/// Synthetic sender id for console input; never a real VK member.
pub const CONSOLE_SENDER: MemberId = MemberId(0);

pub async fn run(chat_id: ChatId, events_tx: mpsc::Sender<Event>, shutdown: CancellationToken) {
    info!("console ready, commands: /rem_arcs /exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            // Stdin closed: stop reading, leave shutdown to /exit.
            Ok(None) => break,
            Err(e) => {
                debug!("console read failed: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let event = Event::Message(MessageEvent {
            provenance: Provenance::Console,
            chat_id,
            sender: CONSOLE_SENDER,
            text: line,
            reply_to: None,
        });
        if events_tx.send(event).await.is_err() {
            break;
        }
    }

    info!("console stopped");
}
