use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tbot_core::sender::OutboundSender;

mod cli;
mod webhook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(cli::Cli::parse().into_config()?);
    tbot_core::logging::init("tbot")?;

    let transport = tbot_zulip::connect(&cfg).context("setting up zulip client")?;
    let sender = OutboundSender::new(transport.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "installing ctrl-c handler failed");
                return;
            }
            info!("shutting down");
            cancel.cancel();
        });
    }

    let hook = {
        let addr = cfg.webhook_addr.clone();
        let state = webhook::WebhookState {
            sender: sender.clone(),
            stream: cfg.pipeline_stream.clone(),
        };
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = webhook::serve(&addr, state, cancel).await {
                warn!(error = %format!("{e:#}"), "webhook failed");
            }
        })
    };

    let polled =
        tbot_zulip::router::run_polling(cfg.clone(), transport, sender, cancel.clone()).await;
    cancel.cancel();

    if let Err(e) = hook.await {
        warn!(error = %e, "webhook task ended abnormally");
    }
    polled
}
