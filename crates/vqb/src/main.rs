use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vqb_core::{
    archive::LogArchiver,
    bank::JsonQuestionBank,
    config::Config,
    dispatcher::Dispatcher,
    domain::ChatId,
    ports::TransportPort,
};
use vqb_vk::{longpoll::LongPollListener, VkApi, VkTransport};

mod console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vqb_core::logging::init("vqb")?;

    let cfg = Config::load().context("configuration")?;

    let archiver = LogArchiver::new(&cfg.logs_dir);
    let archived = archiver
        .archive_previous()
        .context("archiving previous logs")?;
    if archived > 0 {
        info!(archived, "previous run's logs archived");
    }

    let bank = JsonQuestionBank::load(&cfg.questions_file)
        .with_context(|| format!("loading questions from {}", cfg.questions_file.display()))?;
    info!(questions = bank.len(), "question bank loaded");

    let api = VkApi::new(cfg.vk_token.clone());
    let transport: Arc<dyn TransportPort> = Arc::new(VkTransport::new(api.clone()));

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(256);

    let listener = LongPollListener::new(
        api,
        cfg.vk_group_id,
        cfg.longpoll_wait,
        events_tx.clone(),
        shutdown.clone(),
    );
    let listener_task = tokio::spawn(listener.run());

    let console_task = tokio::spawn(console::run(
        ChatId(cfg.chat_for_work_id),
        events_tx.clone(),
        shutdown.clone(),
    ));

    let mut dispatcher = Dispatcher::new(
        transport,
        Box::new(bank),
        archiver,
        cfg.round_time,
        events_tx,
        shutdown.clone(),
    );
    dispatcher.run(events_rx).await;

    // run() cancels the token on exit; the auxiliary tasks follow it down.
    let _ = listener_task.await;
    console_task.abort();

    info!("bye");
    Ok(())
}
