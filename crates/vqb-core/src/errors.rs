/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can turn failures into user-facing replies consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("caller lacks the required authority")]
    PermissionDenied,

    #[error("roster has not been collected for this chat yet")]
    NotReady,

    #[error("quiz is already running")]
    AlreadyRunning,

    #[error("quiz has already finished")]
    AlreadyFinished,

    #[error("target is a chat administrator")]
    ProtectedTarget,

    #[error("kick requires a reply to the target's message")]
    MalformedKick,

    #[error("platform error: {0}")]
    Platform(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
