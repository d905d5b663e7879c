/// Core error type for the bot.
///
/// Adapter crates map their specific failures into this type so the
/// dispatcher can handle them consistently (user-facing message vs
/// retryable). Upstream variants are terminal for the request that hit
/// them; `Config` is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("budget exhausted")]
    BudgetExhausted,

    #[error("upstream rate limited")]
    RateLimited,

    #[error("upstream auth rejected")]
    AuthRejected,

    #[error("upstream timeout")]
    Timeout,

    #[error("upstream error: {0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, Error>;
