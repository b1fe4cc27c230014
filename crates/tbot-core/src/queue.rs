use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    domain::{EventId, QueueId},
    events::{decode_record, Polled},
    transport::{Method, Transport},
    Error, Result,
};

/// Registered queue id plus the last consumed event id.
///
/// Always replaced as a whole on re-registration, never patched field by field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSession {
    pub queue_id: QueueId,
    pub cursor: EventId,
}

#[derive(Deserialize)]
struct RegisterResponse {
    queue_id: QueueId,
    last_event_id: EventId,
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<Value>,
}

/// Registration handshake and batch fetching for one event queue.
#[derive(Clone)]
pub struct EventQueue {
    transport: Arc<dyn Transport>,
    event_types: Vec<String>,
}

impl EventQueue {
    pub fn new(transport: Arc<dyn Transport>, event_types: Vec<String>) -> Self {
        Self {
            transport,
            event_types,
        }
    }

    /// Register a new queue. An empty event type set registers for everything.
    pub async fn register(&self) -> Result<QueueSession> {
        let mut params = Vec::new();
        if !self.event_types.is_empty() {
            params.push(("event_types", serde_json::to_string(&self.event_types)?));
        }

        let body = self
            .transport
            .request(Method::Post, "register", &params)
            .await?;
        let resp: RegisterResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("register response: {e}")))?;

        Ok(QueueSession {
            queue_id: resp.queue_id,
            cursor: resp.last_event_id,
        })
    }

    /// Fetch the events after `session.cursor`, in platform order.
    pub async fn fetch(&self, session: &QueueSession) -> Result<Vec<Polled>> {
        let params = [
            ("queue_id", session.queue_id.0.clone()),
            ("last_event_id", session.cursor.0.clone()),
        ];
        let body = self
            .transport
            .request(Method::Get, "events", &params)
            .await?;
        let resp: EventsResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("events response: {e}")))?;

        let mut out = Vec::with_capacity(resp.events.len());
        for record in &resp.events {
            match decode_record(record) {
                Some(polled) => out.push(polled),
                None => warn!(%record, "dropping event without a usable id"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::fake::ScriptedTransport;
    use serde_json::json;

    fn queue(t: &Arc<ScriptedTransport>) -> EventQueue {
        EventQueue::new(t.clone(), vec!["message".to_string()])
    }

    #[tokio::test]
    async fn register_posts_event_types_and_reads_cursor() {
        let t = Arc::new(ScriptedTransport::default());
        t.push(
            "register",
            json!({"result": "success", "msg": "", "queue_id": "q1", "last_event_id": -1}),
        );

        let s = queue(&t).register().await.unwrap();
        assert_eq!(s.queue_id, QueueId("q1".to_string()));
        assert_eq!(s.cursor, EventId::from(-1));

        let calls = t.calls();
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[0].param("event_types"), Some(r#"["message"]"#));
    }

    #[tokio::test]
    async fn register_accepts_string_cursor_and_omits_empty_types() {
        let t = Arc::new(ScriptedTransport::default());
        t.push(
            "register",
            json!({"result": "success", "msg": "", "queue_id": "q1", "last_event_id": "12"}),
        );

        let s = EventQueue::new(t.clone(), vec![]).register().await.unwrap();
        assert_eq!(s.cursor, EventId::from(12));
        assert!(t.calls()[0].params.is_empty());
    }

    #[tokio::test]
    async fn register_surfaces_api_error() {
        let t = Arc::new(ScriptedTransport::default());
        t.push("register", json!({"result": "error", "msg": "unauthorized"}));

        let err = queue(&t).register().await.unwrap_err();
        assert!(matches!(err, Error::Api { ref operation, .. } if operation == "register"));
    }

    #[tokio::test]
    async fn fetch_sends_cursor_and_keeps_order() {
        let t = Arc::new(ScriptedTransport::default());
        t.push(
            "events",
            json!({"result": "success", "msg": "", "events": [
                {"type": "heartbeat", "id": 3},
                {"type": "bogus", "id": 4},
                {"type": "heartbeat", "id": "5"}
            ]}),
        );

        let session = QueueSession {
            queue_id: QueueId("q1".to_string()),
            cursor: EventId::from(2),
        };
        let batch = queue(&t).fetch(&session).await.unwrap();

        let ids: Vec<_> = batch.iter().map(|p| p.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["3", "4", "5"]);
        assert!(matches!(batch[0].event, Ok(Event::Heartbeat(_))));
        assert!(batch[1].event.is_err());

        let call = &t.calls()[0];
        assert_eq!(call.method, Method::Get);
        assert_eq!(call.param("queue_id"), Some("q1"));
        assert_eq!(call.param("last_event_id"), Some("2"));
    }

    #[tokio::test]
    async fn fetch_fails_whole_batch_on_error_envelope() {
        let t = Arc::new(ScriptedTransport::default());
        t.push(
            "events",
            json!({"result": "error", "msg": "Bad event queue id: q1", "events": []}),
        );
        let session = QueueSession {
            queue_id: QueueId("q1".to_string()),
            cursor: EventId::from(2),
        };

        let err = queue(&t).fetch(&session).await.unwrap_err();
        assert!(err.is_bad_queue());
    }
}
