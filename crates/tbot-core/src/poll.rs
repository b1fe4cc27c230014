//! The resilient event-stream client.
//!
//! `Poller` owns the queue session and drives fetch cycles: deliver events in
//! order, re-register when the platform forgets the queue, log and retry on
//! everything else.
//!
//! The cursor is advanced *before* an event is handed to the handler, so a
//! failing handler never gets the same event again (at-most-once from the
//! poll loop's point of view).

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    events::{Event, Polled},
    queue::{EventQueue, QueueSession},
    Result,
};

/// Consumer of the event stream.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<()>;
}

/// How events are handed to the [`EventHandler`].
///
/// `Inline` awaits the handler inside the loop, so a slow handler delays the
/// next poll. `Spawned` runs each event on its own task; handlers may then
/// overlap and finish out of order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    #[default]
    Inline,
    Spawned,
}

impl FromStr for Dispatch {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(Dispatch::Inline),
            "spawned" => Ok(Dispatch::Spawned),
            other => Err(format!("unknown dispatch mode: {other} (expected inline|spawned)")),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    /// Pause between two fetches. The only rate limit on the platform API.
    pub interval: Duration,
    pub dispatch: Dispatch,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            dispatch: Dispatch::Inline,
        }
    }
}

/// Result of a single fetch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered { delivered: usize, skipped: usize },
    Reregistered,
    ReregisterFailed,
    Failed,
}

pub struct Poller {
    queue: EventQueue,
    opts: PollOptions,
    session: QueueSession,
}

impl Poller {
    /// Register the queue. A failure here is fatal for the caller: there is
    /// nothing to poll without a queue.
    pub async fn connect(queue: EventQueue, opts: PollOptions) -> Result<Self> {
        let session = queue.register().await?;
        info!(
            queue_id = %session.queue_id,
            cursor = %session.cursor,
            "event queue registered"
        );
        Ok(Self {
            queue,
            opts,
            session,
        })
    }

    pub fn session(&self) -> &QueueSession {
        &self.session
    }

    /// One fetch cycle, without the inter-cycle pause.
    pub async fn poll_once(&mut self, handler: &Arc<dyn EventHandler>) -> CycleOutcome {
        match self.queue.fetch(&self.session).await {
            Ok(batch) => {
                let mut delivered = 0usize;
                let mut skipped = 0usize;
                for polled in batch {
                    if self.deliver(polled, handler).await {
                        delivered += 1;
                    } else {
                        skipped += 1;
                    }
                }
                CycleOutcome::Delivered { delivered, skipped }
            }
            Err(e) if e.is_bad_queue() => {
                warn!(
                    queue_id = %self.session.queue_id,
                    error = %e,
                    "event queue expired, registering again"
                );
                match self.queue.register().await {
                    Ok(session) => {
                        info!(
                            queue_id = %session.queue_id,
                            cursor = %session.cursor,
                            "event queue registered"
                        );
                        self.session = session;
                        CycleOutcome::Reregistered
                    }
                    Err(e) => {
                        warn!(error = %e, "registering queue failed, keeping stale queue");
                        CycleOutcome::ReregisterFailed
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getting events failed");
                CycleOutcome::Failed
            }
        }
    }

    async fn deliver(&mut self, polled: Polled, handler: &Arc<dyn EventHandler>) -> bool {
        self.session.cursor = polled.id;

        let event = match polled.event {
            Ok(event) => event,
            Err(e) => {
                warn!(id = %self.session.cursor, error = %e, "skipping undecodable event");
                return false;
            }
        };

        match self.opts.dispatch {
            Dispatch::Inline => {
                if let Err(e) = handler.handle(event).await {
                    warn!(id = %self.session.cursor, error = %e, "event handler failed");
                }
            }
            Dispatch::Spawned => {
                let handler = handler.clone();
                let id = self.session.cursor.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(event).await {
                        warn!(id = %id, error = %e, "event handler failed");
                    }
                });
            }
        }
        true
    }

    /// Poll until `cancel` fires. There is no pause before the first fetch.
    pub async fn run(mut self, handler: Arc<dyn EventHandler>, cancel: CancellationToken) {
        let mut first = true;
        loop {
            if !first {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.opts.interval) => {}
                }
            }
            first = false;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.poll_once(&handler) => {
                    debug!(?outcome, "poll cycle done");
                }
            }
        }
        info!(queue_id = %self.session.queue_id, "poll loop stopped");
    }

    /// Run the loop on its own task.
    pub fn spawn(self, handler: Arc<dyn EventHandler>) -> PollHandle {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(handler, cancel.clone()));
        PollHandle { cancel, join }
    }
}

pub struct PollHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "poll loop task ended abnormally");
        }
    }
}
