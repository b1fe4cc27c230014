//! Zulip adapter (reqwest).
//!
//! This crate implements the `tbot-core` Transport port over the Zulip REST
//! API, and wires the poll loop to the chat command handlers.

use std::{fmt, fs, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::AUTHORIZATION;
use tracing::debug;

pub mod handlers;
pub mod router;

use tbot_core::{
    config::Config,
    errors::Error,
    transport::{Method, Params, Transport},
    Result,
};

/// Pre-computed `Authorization: Basic ...` value.
#[derive(Clone)]
pub struct Credentials {
    header: String,
}

impl Credentials {
    pub fn new(username: &str, secret: &str) -> Self {
        let token = STANDARD.encode(format!("{username}:{secret}"));
        Self {
            header: format!("Basic {token}"),
        }
    }

    /// Read the API key from `path` (surrounding whitespace ignored).
    pub fn from_key_file(username: &str, path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading api key {}: {e}", path.display())))?;
        let key = raw.trim();
        if key.is_empty() {
            return Err(Error::Config(format!(
                "api key file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(username, key))
    }

    pub fn header_value(&self) -> &str {
        &self.header
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

#[derive(Clone, Debug)]
pub struct ZulipTransport {
    api_base: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl ZulipTransport {
    pub fn new(
        api_base: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    /// Build the transport from config, reading the bot's API key file once.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let credentials = Credentials::from_key_file(&cfg.bot_email, &cfg.api_key_file)?;
        Self::new(cfg.api_base(), credentials, cfg.request_timeout)
    }

    fn map_err(action: &str, e: reqwest::Error) -> Error {
        Error::Transport(format!("{action}: {e}"))
    }
}

#[async_trait]
impl Transport for ZulipTransport {
    async fn round_trip(&self, method: Method, action: &str, params: &Params) -> Result<Vec<u8>> {
        let url = format!("{}/{action}", self.api_base);
        let req = match method {
            Method::Get => self.http.get(&url).query(params),
            Method::Post => self.http.post(&url).form(params),
        };

        let resp = req
            .header(AUTHORIZATION, self.credentials.header_value())
            .send()
            .await
            .map_err(|e| Self::map_err(action, e))?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| Self::map_err(action, e))?;
        debug!(action, %status, bytes = body.len(), "api round trip");

        Ok(body.to_vec())
    }
}

/// Shared transport built from config.
pub fn connect(cfg: &Config) -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(ZulipTransport::from_config(cfg)?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    const AUTH: &str = "Basic dGJvdEBleGFtcGxlLm9yZzpzM2NyZXQ=";

    fn transport(server: &MockServer) -> ZulipTransport {
        ZulipTransport::new(
            format!("{}/api/v1/", server.uri()),
            Credentials::new("tbot@example.org", "s3cret"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn credentials_are_basic_auth() {
        let c = Credentials::new("tbot@example.org", "s3cret");
        assert_eq!(c.header_value(), AUTH);
        assert_eq!(format!("{c:?}"), "Credentials(<redacted>)");
    }

    #[test]
    fn key_file_is_trimmed_and_must_not_be_empty() {
        let dir = std::env::temp_dir();
        let key = dir.join(format!("tbot-key-{}.txt", std::process::id()));
        std::fs::write(&key, "s3cret\n").unwrap();
        let c = Credentials::from_key_file("tbot@example.org", &key).unwrap();
        assert_eq!(c.header_value(), AUTH);

        std::fs::write(&key, "  \n").unwrap();
        assert!(Credentials::from_key_file("tbot@example.org", &key).is_err());

        let _ = std::fs::remove_file(&key);
        assert!(Credentials::from_key_file("tbot@example.org", &key).is_err());
    }

    #[tokio::test]
    async fn post_is_form_encoded_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/register"))
            .and(header("authorization", AUTH))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("event_types=%5B%22message%22%5D"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"result": "success", "msg": "", "queue_id": "q1", "last_event_id": -1}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let t = transport(&server);
        let body = t
            .request(
                Method::Post,
                "register",
                &[("event_types", r#"["message"]"#.to_string())],
            )
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["queue_id"], "q1");
    }

    #[tokio::test]
    async fn get_is_query_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/events"))
            .and(header("authorization", AUTH))
            .and(query_param("queue_id", "q1"))
            .and(query_param("last_event_id", "-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": "success", "msg": "", "events": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let t = transport(&server);
        t.request(
            Method::Get,
            "events",
            &[
                ("queue_id", "q1".to_string()),
                ("last_event_id", "-1".to_string()),
            ],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn bad_queue_reply_on_http_400_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/events"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "result": "error",
                "msg": "Bad event queue id: q1",
                "code": "BAD_EVENT_QUEUE_ID",
                "queue_id": "q1"
            })))
            .mount(&server)
            .await;

        let t = transport(&server);
        let err = t
            .request(
                Method::Get,
                "events",
                &[
                    ("queue_id", "q1".to_string()),
                    ("last_event_id", "3".to_string()),
                ],
            )
            .await
            .unwrap_err();
        assert!(err.is_bad_queue());
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let t = ZulipTransport::new(
            "http://127.0.0.1:1/api/v1",
            Credentials::new("a", "b"),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = t.request(Method::Get, "events", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
