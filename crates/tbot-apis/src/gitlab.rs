use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use tbot_core::{errors::Error, Result};

use crate::{http_client, request_error};

/// A freshly created pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GitLabClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl GitLabClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }

    /// Link to a pipeline in the web UI, preferring the one GitLab returned.
    pub fn pipeline_url(&self, project: &str, pipeline: &Pipeline) -> String {
        if let Some(url) = pipeline.web_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        let id = pipeline.id;
        format!("{}/{project}/pipelines/{id}", self.base_url)
    }

    fn pipeline_endpoint(&self, project: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid gitlab url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("gitlab url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", project, "pipeline"]);
        Ok(url)
    }

    /// Start a pipeline for `project` (a numeric id or `group/name` path) at `git_ref`.
    ///
    /// A rejection by GitLab comes back as [`Error::Api`] carrying GitLab's message.
    pub async fn create_pipeline(&self, project: &str, git_ref: &str) -> Result<Pipeline> {
        let url = self.pipeline_endpoint(project)?;
        let resp = self
            .http
            .post(url)
            .query(&[("ref", git_ref)])
            .header("Private-Token", &self.token)
            .send()
            .await
            .map_err(|e| request_error("gitlab", e))?;

        let status = resp.status();
        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::Decode(format!("gitlab json error ({status}): {e}")))?;

        if status.is_client_error() || status.is_server_error() {
            let message = match v.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => status.to_string(),
            };
            return Err(Error::Api {
                operation: "gitlab pipeline".to_string(),
                message,
                code: Some(status.as_u16().to_string()),
            });
        }

        let pipeline = Pipeline::deserialize(&v)
            .map_err(|e| Error::Decode(format!("gitlab pipeline response: {e}")))?;
        debug!(project, git_ref, id = pipeline.id, "gitlab pipeline created");
        Ok(pipeline)
    }
}
