use std::fmt;

use serde::{Deserialize, Deserializer};

/// Platform event id, kept in its string form since it is only ever echoed
/// back as the `last_event_id` cursor.
///
/// The platform sends these either as a JSON number or a numeric string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub String);

impl EventId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for EventId {
    fn from(v: i64) -> Self {
        EventId(v.to_string())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(EventId::from(n)),
            Raw::Str(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .map(EventId::from)
                    .map_err(|_| serde::de::Error::custom(format!("non-numeric event id: {s:?}")))
            }
        }
    }
}

/// Opaque event queue token issued at registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub String);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);
