//! Typed event model and the decoder that collapses the platform's loosely
//! typed event records into it.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    domain::{EventId, MessageId},
    Error, Result,
};

/// Events delivered by the queue, in platform order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Message(Message),
    Heartbeat(Heartbeat),
}

impl Event {
    /// The cursor value for this event.
    pub fn id(&self) -> &EventId {
        match self {
            Event::Message(m) => &m.event_id,
            Event::Heartbeat(h) => &h.id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    pub id: EventId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    Stream,
    Private,
}

impl DeliveryMode {
    /// Wire name used in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Stream => "stream",
            DeliveryMode::Private => "private",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a message was delivered. Exactly one addressing form exists per message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Stream(String),
    Private(Vec<String>),
}

impl Destination {
    pub fn mode(&self) -> DeliveryMode {
        match self {
            Destination::Stream(_) => DeliveryMode::Stream,
            Destination::Private(_) => DeliveryMode::Private,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub full_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Id of the queue event that carried this message.
    pub event_id: EventId,
    pub id: MessageId,
    pub destination: Destination,
    pub subject: Option<String>,
    pub content: String,
    pub sender: Sender,
}

impl Message {
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.destination.mode()
    }

    /// Stream name, for stream messages.
    pub fn stream(&self) -> Option<&str> {
        match &self.destination {
            Destination::Stream(s) => Some(s),
            Destination::Private(_) => None,
        }
    }

    /// Recipient emails, for private messages. Empty for stream messages.
    pub fn recipients(&self) -> &[String] {
        match &self.destination {
            Destination::Stream(_) => &[],
            Destination::Private(r) => r,
        }
    }
}

/// One entry of a fetched batch.
///
/// Undecodable events still carry their id so the cursor can move past them.
#[derive(Debug)]
pub struct Polled {
    pub id: EventId,
    pub event: Result<Event>,
}

#[derive(Deserialize)]
struct WireMessage {
    id: MessageId,
    display_recipient: Value,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    sender_email: String,
    #[serde(default)]
    sender_full_name: String,
}

/// Decode one event of the given type.
///
/// `payload` is the whole raw event record (`{type, id, message?}`).
pub fn decode(event_type: &str, id: EventId, payload: &Value) -> Result<Event> {
    match event_type {
        "heartbeat" => Ok(Event::Heartbeat(Heartbeat { id })),
        "message" => {
            let raw = payload
                .get("message")
                .ok_or_else(|| Error::Decode("message event without message".to_string()))?;
            let wire = WireMessage::deserialize(raw)
                .map_err(|e| Error::Decode(format!("parsing message event {id}: {e}")))?;
            let destination = resolve_recipient(&wire.display_recipient)?;
            let subject = match destination {
                Destination::Stream(_) => wire.subject,
                Destination::Private(_) => wire.subject.filter(|s| !s.is_empty()),
            };
            Ok(Event::Message(Message {
                event_id: id,
                id: wire.id,
                destination,
                subject,
                content: wire.content,
                sender: Sender {
                    email: wire.sender_email,
                    full_name: wire.sender_full_name,
                },
            }))
        }
        other => Err(Error::Decode(format!("unknown event type: {other}"))),
    }
}

/// Decode a raw record as found in the `events` array.
///
/// Returns `None` when the record has no usable id; such a record cannot be
/// positioned in the stream at all.
pub fn decode_record(record: &Value) -> Option<Polled> {
    let id = record
        .get("id")
        .and_then(|v| EventId::deserialize(v).ok())?;
    let event = match record.get("type").and_then(Value::as_str) {
        Some(t) => decode(t, id.clone(), record),
        None => Err(Error::Decode(format!("event {id} has no type"))),
    };
    Some(Polled { id, event })
}

fn resolve_recipient(raw: &Value) -> Result<Destination> {
    let unknown = || Error::Decode("unknown recipient shape".to_string());
    match raw {
        Value::String(stream) => Ok(Destination::Stream(stream.clone())),
        Value::Array(records) if records.is_empty() => Err(unknown()),
        Value::Array(records) => records
            .iter()
            .map(|r| {
                r.get("email")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(unknown)
            })
            .collect::<Result<Vec<_>>>()
            .map(Destination::Private),
        _ => Err(unknown()),
    }
}
