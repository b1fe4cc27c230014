use serde_json::Value;
use tracing::debug;

use tbot_core::{errors::Error, Result};

use crate::{http_client, request_error};

const GIPHY_BASE_URL: &str = "https://api.giphy.com";

#[derive(Clone, Debug)]
pub struct GiphyClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GiphyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, GIPHY_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    /// Url of a random gif tagged `tag`, always served over https.
    pub async fn random(&self, tag: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/v1/gifs/random", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("tag", tag)])
            .send()
            .await
            .map_err(|e| request_error("giphy", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "giphy random failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Decode(format!("giphy json error: {e}")))?;

        let url = v
            .pointer("/data/image_url")
            .or_else(|| v.pointer("/data/images/original/url"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Decode("giphy response without an image url".to_string()))?;

        debug!(tag, url, "giphy random");
        Ok(force_https(url))
    }
}

fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}
