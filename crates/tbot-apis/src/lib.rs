//! Third-party HTTP APIs used by chat commands.
//!
//! - Giphy: random gif lookup (`!gif`)
//! - GitLab: pipeline trigger (`!ci`)

pub mod giphy;
pub mod gitlab;

use std::time::Duration;

use tbot_core::{errors::Error, Result};

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::Config(format!("http client build failed: {e}")))
}

pub(crate) fn request_error(api: &str, e: reqwest::Error) -> Error {
    Error::Transport(format!("{api} request error: {e}"))
}
