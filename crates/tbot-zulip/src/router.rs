use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tbot_core::{
    config::Config,
    poll::{EventHandler, PollOptions, Poller},
    queue::EventQueue,
    sender::OutboundSender,
    transport::Transport,
};

use crate::handlers::{AppState, CommandHandler};

/// Register an event queue and poll it until `cancel` fires.
///
/// Only the initial registration is fatal; every later failure is logged by
/// the poll loop and retried.
pub async fn run_polling(
    cfg: Arc<Config>,
    transport: Arc<dyn Transport>,
    sender: OutboundSender,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let queue = EventQueue::new(transport, cfg.event_types.clone());
    let opts = PollOptions {
        interval: cfg.poll_interval,
        dispatch: cfg.dispatch,
    };
    let poller = Poller::connect(queue, opts)
        .await
        .with_context(|| format!("registering event queue at {}", cfg.endpoint))?;

    let state = Arc::new(AppState::new(cfg.clone(), sender)?);
    let handler: Arc<dyn EventHandler> = Arc::new(CommandHandler::new(state));

    info!(
        bot = %cfg.bot_email,
        endpoint = %cfg.endpoint,
        dispatch = ?cfg.dispatch,
        "listening for events"
    );
    poller.run(handler, cancel).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use tbot_core::{
        transport::{Method, Params},
        Result,
    };

    use super::*;

    /// Answers each action from its own script; the last entry repeats.
    #[derive(Default)]
    struct Script {
        responses: Mutex<Vec<(String, VecDeque<Value>)>>,
        posted: Mutex<Vec<String>>,
    }

    impl Script {
        fn on(&self, action: &str, values: Vec<Value>) {
            self.responses
                .lock()
                .unwrap()
                .push((action.to_string(), values.into()));
        }
    }

    #[async_trait]
    impl Transport for Script {
        async fn round_trip(
            &self,
            _method: Method,
            action: &str,
            params: &Params,
        ) -> Result<Vec<u8>> {
            if action == "messages" {
                if let Some((_, c)) = params.iter().find(|(k, _)| *k == "content") {
                    self.posted.lock().unwrap().push(c.clone());
                }
            }
            let mut all = self.responses.lock().unwrap();
            let value = all
                .iter_mut()
                .find(|(a, _)| a == action)
                .and_then(|(_, q)| if q.len() > 1 { q.pop_front() } else { q.front().cloned() })
                .unwrap_or_else(|| json!({"result": "success", "msg": "", "events": []}));
            Ok(serde_json::to_vec(&value)?)
        }
    }

    fn cfg() -> Arc<Config> {
        Arc::new(Config {
            poll_interval: Duration::from_millis(5),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn registration_failure_is_fatal() {
        let t = Arc::new(Script::default());
        t.on("register", vec![json!({"result": "error", "msg": "Invalid API key"})]);

        let err = run_polling(
            cfg(),
            t.clone(),
            OutboundSender::new(t.clone()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid API key"));
    }

    #[tokio::test]
    async fn answers_commands_until_cancelled() {
        let t = Arc::new(Script::default());
        t.on(
            "register",
            vec![json!({"result": "success", "msg": "", "queue_id": "q1", "last_event_id": -1})],
        );
        t.on(
            "events",
            vec![
                json!({"result": "success", "msg": "", "events": [
                    {"type": "message", "id": 0, "message": {
                        "id": 42,
                        "display_recipient": "general",
                        "subject": "bots",
                        "content": "!hi",
                        "sender_email": "alice@example.org",
                        "sender_full_name": "Alice"
                    }}
                ]}),
                json!({"result": "success", "msg": "", "events": []}),
            ],
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_polling(
            cfg(),
            t.clone(),
            OutboundSender::new(t.clone()),
            cancel.clone(),
        ));

        for _ in 0..200 {
            if !t.posted.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(
            t.posted.lock().unwrap().as_slice(),
            ["alice@example.org said hi!".to_string()]
        );
    }
}
