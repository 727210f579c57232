/// Core error type for the clip bot.
///
/// Adapter crates should map their specific errors into this type so the bot
/// core can handle failures consistently. The store's domain failures
/// (`NotFound`/`Expired`/`AccessDenied`) are deliberately separate variants:
/// the chat layer renders a different message for each.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no clip with that code")]
    NotFound,

    #[error("clip has expired")]
    Expired,

    #[error("clip is private")]
    AccessDenied,

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
