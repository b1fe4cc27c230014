use std::{path::PathBuf, time::Duration};

use clap::Parser;

use tbot_core::{config::Config, poll::Dispatch, Result};

#[derive(Debug, Parser)]
#[command(name = "tbot", about = "Chat bot for a Zulip organization")]
pub struct Cli {
    /// Zulip server url.
    #[arg(long, default_value = "https://chat.zulip.org")]
    pub endpoint: String,

    /// Bot account email.
    #[arg(long, default_value = "tiny-bot@chat.zulip.org")]
    pub bot: String,

    /// File holding the bot's API key.
    #[arg(long, default_value = "api_key.txt")]
    pub api_key_file: PathBuf,

    /// Giphy API key (falls back to GIPHY_API_KEY).
    #[arg(long)]
    pub giphy: Option<String>,

    /// GitLab API token (falls back to GITLAB_API_KEY).
    #[arg(long)]
    pub gitlab: Option<String>,

    #[arg(long, default_value = "https://gitlab.com")]
    pub gitlab_url: String,

    /// Listen address for the pipeline webhook.
    #[arg(long, default_value = "0.0.0.0:12001")]
    pub webhook_addr: String,

    /// Stream that receives pipeline notifications.
    #[arg(long, default_value = "platform")]
    pub pipeline_stream: String,

    /// Directory holding the checkouts used by `!test`.
    #[arg(long, default_value = "projects")]
    pub projects_dir: PathBuf,

    #[arg(long, default_value_t = 500)]
    pub poll_interval_ms: u64,

    #[arg(long, default_value_t = 90)]
    pub request_timeout_secs: u64,

    /// inline | spawned
    #[arg(long, default_value = "inline")]
    pub dispatch: Dispatch,

    /// YAML file overlaid on top of the flags.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Flags, then the config file, then environment fallbacks.
    pub fn into_config(self) -> Result<Config> {
        let mut cfg = Config {
            endpoint: self.endpoint,
            bot_email: self.bot,
            api_key_file: self.api_key_file,
            giphy_api_key: self.giphy,
            gitlab_api_key: self.gitlab,
            gitlab_base_url: self.gitlab_url,
            webhook_addr: self.webhook_addr,
            pipeline_stream: self.pipeline_stream,
            projects_dir: self.projects_dir,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            dispatch: self.dispatch,
            ..Config::default()
        };
        if let Some(path) = &self.config {
            cfg.apply_file(path)?;
        }
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }
}
