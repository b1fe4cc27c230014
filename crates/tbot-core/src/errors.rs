/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the poll
/// loop can classify failures consistently (transient vs re-register vs bug).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network-level failure. Always transient.
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform answered with a non-success envelope.
    #[error("{operation}: {message}")]
    Api {
        operation: String,
        message: String,
        code: Option<String>,
    },

    /// A payload that cannot be mapped onto a known shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Inconsistent outbound message built by the caller.
    #[error("invalid message: {0}")]
    Validation(String),

    #[error("external error: {0}")]
    External(String),
}

/// Message prefix the platform uses when a queue id expired or is unknown.
pub const BAD_QUEUE_PREFIX: &str = "Bad event queue id:";
const BAD_QUEUE_CODE: &str = "BAD_EVENT_QUEUE_ID";

impl Error {
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            operation: operation.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Whether the error means the event queue must be registered again.
    pub fn is_bad_queue(&self) -> bool {
        match self {
            Error::Api { message, code, .. } => {
                message.starts_with(BAD_QUEUE_PREFIX) || code.as_deref() == Some(BAD_QUEUE_CODE)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
