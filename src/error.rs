use thiserror::Error;

pub type Result<T> = std::result::Result<T, RadarError>;

/// Everything that can abort a monitoring run.
#[derive(Error, Debug)]
pub enum RadarError {
    /// Every fetch attempt failed; carries the last underlying error.
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The page parsed but contained no item names (layout change or blocking).
    #[error("no item names found in the page; the layout may have changed or the request was blocked")]
    NoRecordsFound,

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// A credential needed for sending is not configured.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("notification failed: {0}")]
    NotificationSendFailed(String),

    #[error("ledger error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("ledger at {path} is unreadable: {message}")]
    StoreCorruptOrUnreadable { path: String, message: String },

    /// A write was attempted on a ledger opened for preview.
    #[error("ledger is open read-only; refusing to write")]
    ReadOnlyStore,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RadarError {
    pub fn selector(selector: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
