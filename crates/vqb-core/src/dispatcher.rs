use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    archive::LogArchiver,
    command::{self, Command},
    domain::{ChatId, MemberId, Provenance},
    errors::Error,
    events::{AnswerEvent, Event, MessageEvent},
    kicker,
    ports::{QuestionBank, TransportPort},
    quiz::{QuizPhase, QuizSession, RoundOutcome},
    roster::RosterCache,
    texts, Result,
};

/// Sequential event-loop orchestrator.
///
/// Owns every piece of mutable state (roster snapshots, per-chat sessions,
/// question cursors) and consumes one event at a time from a single queue, so
/// no handler ever observes another handler's partial effects. Round timers
/// run as spawned tasks but feed their expiry back through the same queue.
pub struct Dispatcher {
    transport: Arc<dyn TransportPort>,
    bank: Box<dyn QuestionBank>,
    archiver: LogArchiver,
    roster: RosterCache,
    sessions: HashMap<ChatId, QuizSession>,
    round_time: Duration,
    events_tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn TransportPort>,
        bank: Box<dyn QuestionBank>,
        archiver: LogArchiver,
        round_time: Duration,
        events_tx: mpsc::Sender<Event>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            bank,
            archiver,
            roster: RosterCache::new(),
            sessions: HashMap::new(),
            round_time,
            events_tx,
            shutdown,
        }
    }

    /// Drain the event queue until `/exit` or the queue closes.
    pub async fn run(&mut self, mut events: mpsc::Receiver<Event>) {
        info!("dispatcher started");

        while let Some(event) = events.recv().await {
            if self.process(event).await {
                break;
            }
        }

        self.shutdown.cancel();
        info!("dispatcher stopped");
    }

    /// Handle one event. Returns `true` when the loop should stop.
    async fn process(&mut self, event: Event) -> bool {
        match event {
            Event::Message(ev) => self.handle_message(ev).await,
            Event::Answer(ev) => {
                self.handle_answer(ev).await;
                false
            }
            Event::RoundTimeout {
                chat_id,
                question_index,
            } => {
                self.handle_round_timeout(chat_id, question_index).await;
                false
            }
        }
    }

    async fn handle_message(&mut self, ev: MessageEvent) -> bool {
        let cmd = command::classify(&ev.text, ev.reply_to);

        match cmd {
            // Non-command chatter is dropped without a reply.
            Command::Unknown => {
                if ev.provenance == Provenance::Console {
                    warn!(input = %ev.text.trim(), "unknown console command");
                }
                return false;
            }
            Command::MalformedKick => {
                self.reject(&ev, &Error::MalformedKick).await;
                return false;
            }
            _ => {}
        }

        if let Err(e) = crate::guard::authorize(&cmd, ev.provenance, &self.roster, ev.chat_id, ev.sender)
        {
            self.reject(&ev, &e).await;
            return false;
        }

        let result = match cmd {
            Command::RemoveArchives => self.handle_remove_archives(),
            Command::Exit => {
                info!("shutdown requested");
                self.shutdown.cancel();
                return true;
            }
            Command::GetChat => self.handle_get_chat(&ev).await,
            Command::Start => self.handle_start(&ev).await,
            Command::KickAll => self.handle_kick_all(ev.chat_id).await,
            Command::Kick(target) => self.handle_kick(ev.chat_id, target).await,
            Command::MalformedKick | Command::Unknown => Ok(()),
        };

        if let Err(e) = result {
            self.reject(&ev, &e).await;
        }
        false
    }

    fn handle_remove_archives(&self) -> Result<()> {
        let removed = self.archiver.remove_archives()?;
        info!(removed, "log archives removed");
        Ok(())
    }

    async fn handle_get_chat(&mut self, ev: &MessageEvent) -> Result<()> {
        let transport = Arc::clone(&self.transport);
        let (members, admins) = {
            let snapshot = self
                .roster
                .collect(transport.as_ref(), ev.chat_id, ev.sender)
                .await?;
            (snapshot.members.len(), snapshot.admin_count())
        };

        self.session(ev.chat_id).roster_collected();
        info!(chat = ev.chat_id.0, members, admins, "roster collected");
        self.reply(ev.chat_id, texts::GET_CHAT_COMPLETE).await;
        Ok(())
    }

    async fn handle_start(&mut self, ev: &MessageEvent) -> Result<()> {
        // Peek the phase first so a rejected start never consumes a question.
        let phase = self
            .sessions
            .get(&ev.chat_id)
            .map(|s| s.phase())
            .unwrap_or(QuizPhase::Idle);
        match phase {
            QuizPhase::Idle => return Err(Error::NotReady),
            QuizPhase::Running => return Err(Error::AlreadyRunning),
            QuizPhase::Finished => return Err(Error::AlreadyFinished),
            QuizPhase::Collected => {}
        }

        let first = self.bank.next_question(ev.chat_id);
        let outcome = self.session(ev.chat_id).start(ev.sender, first)?;

        info!(chat = ev.chat_id.0, by = ev.sender.0, "quiz started");
        self.reply(ev.chat_id, texts::QUIZ_STARTED).await;
        self.publish_round(ev.chat_id, outcome).await;
        Ok(())
    }

    async fn handle_answer(&mut self, ev: AnswerEvent) {
        // Administrators run the quiz, they do not play it.
        if self.roster.is_admin(ev.chat_id, ev.sender) {
            return;
        }

        let question = {
            let Some(session) = self.sessions.get_mut(&ev.chat_id) else {
                return;
            };
            if !session.is_current_round(ev.question_index) {
                debug!(
                    chat = ev.chat_id.0,
                    index = ev.question_index,
                    "stale answer discarded"
                );
                return;
            }
            if !session.may_answer(ev.sender) {
                debug!(
                    chat = ev.chat_id.0,
                    member = ev.sender.0,
                    "repeat answer discarded"
                );
                return;
            }
            session.record_answer(ev.sender);
            match session.current_question() {
                Some(q) => q.clone(),
                None => return,
            }
        };

        if !self.bank.check_answer(&question, &ev.text) {
            debug!(chat = ev.chat_id.0, member = ev.sender.0, "wrong answer");
            return;
        }

        info!(
            chat = ev.chat_id.0,
            member = ev.sender.0,
            index = ev.question_index,
            "correct answer"
        );
        self.advance_round(ev.chat_id).await;
    }

    async fn handle_round_timeout(&mut self, chat_id: ChatId, question_index: usize) {
        let current = self
            .sessions
            .get(&chat_id)
            .map(|s| s.is_current_round(question_index))
            .unwrap_or(false);
        if !current {
            debug!(chat = chat_id.0, index = question_index, "stale timer discarded");
            return;
        }

        info!(chat = chat_id.0, index = question_index, "round timed out");
        self.reply(chat_id, texts::ROUND_TIME_OVER).await;
        self.advance_round(chat_id).await;
    }

    async fn handle_kick_all(&mut self, chat_id: ChatId) -> Result<()> {
        let snapshot = self.roster.get(chat_id).cloned().ok_or(Error::NotReady)?;

        self.reply(chat_id, texts::KICK_ALL_STARTED).await;
        let report = kicker::kick_all(self.transport.as_ref(), chat_id, &snapshot).await;
        info!(
            chat = chat_id.0,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "kick_all finished"
        );
        self.reply(chat_id, &texts::kick_all_summary(&report)).await;
        Ok(())
    }

    async fn handle_kick(&mut self, chat_id: ChatId, target: MemberId) -> Result<()> {
        let snapshot = self.roster.get(chat_id).cloned().ok_or(Error::NotReady)?;

        kicker::kick(self.transport.as_ref(), chat_id, &snapshot, target).await?;

        let display = snapshot
            .members
            .iter()
            .find(|m| m.member_id == target)
            .map(|m| m.display_name.clone())
            .unwrap_or_else(|| format!("Member {}", target.0));
        info!(chat = chat_id.0, member = target.0, "member kicked");
        self.reply(chat_id, &texts::member_kicked(&display)).await;
        Ok(())
    }

    /// Pull the next question and move the chat's session past the current one.
    async fn advance_round(&mut self, chat_id: ChatId) {
        let next = self.bank.next_question(chat_id);
        let outcome = match self.sessions.get_mut(&chat_id) {
            Some(session) => session.advance(next),
            None => return,
        };
        self.publish_round(chat_id, outcome).await;
    }

    async fn publish_round(&mut self, chat_id: ChatId, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Next { question, index } => {
                let text = texts::question_announcement(index + 1, &question.text);
                if let Err(e) = self
                    .transport
                    .send_question(chat_id, &text, &question, index)
                    .await
                {
                    warn!(chat = chat_id.0, index, "question send failed: {e}");
                }
                self.arm_round_timer(chat_id, index);
            }
            RoundOutcome::Finished => {
                info!(chat = chat_id.0, "quiz finished");
                self.reply(chat_id, texts::QUIZ_FINISHED).await;
            }
            RoundOutcome::Ignored => {}
        }
    }

    /// Arm the timer for the round just published. Expiry re-enters the queue
    /// as a `RoundTimeout` event so the loop stays single-threaded.
    fn arm_round_timer(&self, chat_id: ChatId, question_index: usize) {
        let tx = self.events_tx.clone();
        let shutdown = self.shutdown.clone();
        let round_time = self.round_time;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(round_time) => {
                    let _ = tx
                        .send(Event::RoundTimeout { chat_id, question_index })
                        .await;
                }
            }
        });
    }

    fn session(&mut self, chat_id: ChatId) -> &mut QuizSession {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| QuizSession::new(chat_id))
    }

    async fn reject(&self, ev: &MessageEvent, err: &Error) {
        match ev.provenance {
            Provenance::Chat => self.reply(ev.chat_id, &texts::rejection(err)).await,
            Provenance::Console => warn!(input = %ev.text.trim(), "console command rejected: {err}"),
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.transport.send_reply(chat_id, text).await {
            warn!(chat = chat_id.0, "reply send failed: {e}");
        }
    }
}
