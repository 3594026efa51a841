use thiserror::Error;

/// The single error currency for the whole crate.
///
/// Engine-internal failures (`Transport`, `NotFound`) are logged and degraded
/// to an empty result so a crawl keeps making progress; `ParseStop`/`InitStop`
/// are catastrophic and propagate to whoever is holding the Engine.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("url not found: {url}")]
    NotFound { url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse callback requested stop: {0}")]
    ParseStop(String),

    #[error("module init requested stop: {0}")]
    InitStop(String),

    #[error("module init declined to start")]
    InitIgnore,

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("engine channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
