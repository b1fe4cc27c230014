use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request parameters, encoded as a query string for `GET` and as a form body
/// for `POST`.
pub type Params = [(&'static str, String)];

/// Hexagonal port for the chat platform's REST API.
///
/// Implementations perform exactly one round trip per call and never retry;
/// retry policy belongs to the poll loop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `method {endpoint}/api/v1/{action}` and return the raw body,
    /// whatever the HTTP status.
    async fn round_trip(&self, method: Method, action: &str, params: &Params) -> Result<Vec<u8>>;

    /// Round trip plus envelope check: a body whose `result` is not
    /// `"success"` becomes [`Error::Api`].
    async fn request(&self, method: Method, action: &str, params: &Params) -> Result<Vec<u8>> {
        let body = self.round_trip(method, action, params).await?;
        check_envelope(action, &body)?;
        Ok(body)
    }
}

#[derive(Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    code: Option<String>,
}

/// Validate the `{result, msg}` envelope every platform response carries.
pub fn check_envelope(operation: &str, body: &[u8]) -> Result<()> {
    let env: Envelope = serde_json::from_slice(body).map_err(|e| {
        Error::Decode(format!(
            "{operation}: response is not a json envelope: {e}: {}",
            String::from_utf8_lossy(body).chars().take(200).collect::<String>()
        ))
    })?;

    if env.result == "success" {
        return Ok(());
    }

    Err(Error::Api {
        operation: operation.to_string(),
        message: if env.msg.is_empty() { env.result } else { env.msg },
        code: env.code,
    })
}
