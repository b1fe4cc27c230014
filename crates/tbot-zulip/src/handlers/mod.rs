//! Chat event handlers.
//!
//! Messages are matched against the `!command` prefixes in [`commands`];
//! heartbeats only show up in debug logs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use tbot_apis::{giphy::GiphyClient, gitlab::GitLabClient};
use tbot_core::{
    config::Config, events::Event, poll::EventHandler, sender::OutboundSender, Result,
};

pub mod commands;

/// Everything a command needs, shared across events.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub sender: OutboundSender,
    pub giphy: Option<GiphyClient>,
    pub gitlab: Option<GitLabClient>,
}

impl AppState {
    /// Build the state, creating API clients for the keys that are configured.
    pub fn new(cfg: Arc<Config>, sender: OutboundSender) -> Result<Self> {
        let giphy = match &cfg.giphy_api_key {
            Some(key) => Some(GiphyClient::new(key.clone())?),
            None => {
                warn!("no giphy api key configured, !gif is disabled");
                None
            }
        };
        let gitlab = match &cfg.gitlab_api_key {
            Some(key) => Some(GitLabClient::new(key.clone(), cfg.gitlab_base_url.clone())?),
            None => {
                warn!("no gitlab api key configured, !ci is disabled");
                None
            }
        };
        Ok(Self {
            cfg,
            sender,
            giphy,
            gitlab,
        })
    }
}

pub struct CommandHandler {
    state: Arc<AppState>,
}

impl CommandHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    async fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::Message(msg) => {
                if msg.sender.email == self.state.cfg.bot_email {
                    return Ok(());
                }
                commands::handle_message(&self.state, &msg).await
            }
            Event::Heartbeat(hb) => {
                debug!(id = %hb.id, "heartbeat");
                Ok(())
            }
        }
    }
}
