use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{errors::Error, poll::Dispatch, Result};

/// Typed configuration, built once at startup and passed down explicitly.
///
/// Values come from command-line flags; a YAML file given with `--config`
/// is overlaid on top (keys present in the file win).
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    // Platform
    pub endpoint: String,
    pub bot_email: String,
    pub api_key_file: PathBuf,
    pub event_types: Vec<String>,

    // Third-party APIs used by commands
    pub giphy_api_key: Option<String>,
    pub gitlab_api_key: Option<String>,
    pub gitlab_base_url: String,

    // Webhook
    pub webhook_addr: String,
    pub pipeline_stream: String,

    // Commands
    pub projects_dir: PathBuf,

    // Runtime
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub dispatch: Dispatch,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "https://chat.zulip.org".to_string(),
            bot_email: "tiny-bot@chat.zulip.org".to_string(),
            api_key_file: PathBuf::from("api_key.txt"),
            event_types: vec!["message".to_string()],
            giphy_api_key: None,
            gitlab_api_key: None,
            gitlab_base_url: "https://gitlab.com".to_string(),
            webhook_addr: "0.0.0.0:12001".to_string(),
            pipeline_stream: "platform".to_string(),
            projects_dir: PathBuf::from("projects"),
            poll_interval: Duration::from_millis(500),
            // Longer than the platform's long-poll hold (~90s worst case).
            request_timeout: Duration::from_secs(90),
            dispatch: Dispatch::Inline,
        }
    }
}

/// On-disk YAML layout. Every key is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub bot_email: Option<String>,
    pub api_key_file: Option<PathBuf>,
    pub event_types: Option<Vec<String>>,
    pub giphy: Option<String>,
    pub gitlab: Option<String>,
    pub gitlab_url: Option<String>,
    pub webhook_addr: Option<String>,
    pub pipeline_stream: Option<String>,
    pub projects_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub dispatch: Option<Dispatch>,
}

impl FileConfig {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid config file: {e}")))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::parse(&raw)
    }
}

impl Config {
    /// Overlay the keys present in `file`.
    pub fn apply(&mut self, file: FileConfig) {
        let FileConfig {
            endpoint,
            bot_email,
            api_key_file,
            event_types,
            giphy,
            gitlab,
            gitlab_url,
            webhook_addr,
            pipeline_stream,
            projects_dir,
            poll_interval_ms,
            request_timeout_secs,
            dispatch,
        } = file;

        if let Some(v) = endpoint {
            self.endpoint = v;
        }
        if let Some(v) = bot_email {
            self.bot_email = v;
        }
        if let Some(v) = api_key_file {
            self.api_key_file = v;
        }
        if let Some(v) = event_types {
            self.event_types = v;
        }
        if let Some(v) = giphy.and_then(non_empty) {
            self.giphy_api_key = Some(v);
        }
        if let Some(v) = gitlab.and_then(non_empty) {
            self.gitlab_api_key = Some(v);
        }
        if let Some(v) = gitlab_url {
            self.gitlab_base_url = v;
        }
        if let Some(v) = webhook_addr {
            self.webhook_addr = v;
        }
        if let Some(v) = pipeline_stream {
            self.pipeline_stream = v;
        }
        if let Some(v) = projects_dir {
            self.projects_dir = v;
        }
        if let Some(v) = poll_interval_ms {
            self.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = dispatch {
            self.dispatch = v;
        }
    }

    /// Read and overlay a YAML config file.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        self.apply(FileConfig::read(path)?);
        Ok(())
    }

    /// Fill unset API keys from `GIPHY_API_KEY` / `GITLAB_API_KEY`.
    pub fn apply_env(&mut self) {
        if self.giphy_api_key.is_none() {
            self.giphy_api_key = env_str("GIPHY_API_KEY").and_then(non_empty);
        }
        if self.gitlab_api_key.is_none() {
            self.gitlab_api_key = env_str("GITLAB_API_KEY").and_then(non_empty);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) url: {}",
                self.endpoint
            )));
        }
        if self.bot_email.trim().is_empty() {
            return Err(Error::Config("bot identity must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be positive".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Platform base url without a trailing slash.
    pub fn api_base(&self) -> String {
        format!("{}/api/v1", self.endpoint.trim_end_matches('/'))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
