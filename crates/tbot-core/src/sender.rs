use std::sync::Arc;

use tracing::warn;

use crate::{
    events::{DeliveryMode, Destination, Message},
    transport::{Method, Transport},
    Error, Result,
};

/// A message to be posted, either fresh or built as a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub mode: DeliveryMode,
    pub stream: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn to_stream(
        stream: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            mode: DeliveryMode::Stream,
            stream: Some(stream.into()),
            recipients: Vec::new(),
            subject: subject.into(),
            content: content.into(),
        }
    }

    pub fn to_private(recipients: Vec<String>, content: impl Into<String>) -> Self {
        Self {
            mode: DeliveryMode::Private,
            stream: None,
            recipients,
            subject: String::new(),
            content: content.into(),
        }
    }

    /// Check that the populated addressing field matches the delivery mode.
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            DeliveryMode::Stream => {
                if self.stream.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    return Err(Error::Validation(
                        "stream message without a stream name".to_string(),
                    ));
                }
                if !self.recipients.is_empty() {
                    return Err(Error::Validation(
                        "stream message must not carry recipients".to_string(),
                    ));
                }
            }
            DeliveryMode::Private => {
                if self.recipients.is_empty() {
                    return Err(Error::Validation(
                        "private message without recipients".to_string(),
                    ));
                }
                if self.stream.is_some() {
                    return Err(Error::Validation(
                        "private message must not carry a stream name".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn to_field(&self) -> Result<String> {
        Ok(match self.mode {
            DeliveryMode::Private => serde_json::to_string(&self.recipients)?,
            DeliveryMode::Stream => self.stream.clone().unwrap_or_default(),
        })
    }
}

impl Message {
    /// Build a reply addressed the same way as this message.
    pub fn reply(&self, content: impl Into<String>) -> OutboundMessage {
        let (stream, recipients) = match &self.destination {
            Destination::Stream(s) => (Some(s.clone()), Vec::new()),
            Destination::Private(r) => (None, r.clone()),
        };
        OutboundMessage {
            mode: self.delivery_mode(),
            stream,
            recipients,
            subject: self.subject.clone().unwrap_or_default(),
            content: content.into(),
        }
    }
}

/// Posts messages back to the platform.
///
/// Stateless apart from the transport; safe to share between the poll loop's
/// handler and the webhook server.
#[derive(Clone)]
pub struct OutboundSender {
    transport: Arc<dyn Transport>,
}

impl OutboundSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        msg.validate()?;

        let params = [
            ("type", msg.mode.as_str().to_string()),
            ("content", msg.content.clone()),
            ("subject", msg.subject.clone()),
            ("to", msg.to_field()?),
        ];
        self.transport
            .request(Method::Post, "messages", &params)
            .await?;
        Ok(())
    }

    /// Reply to `msg`, logging a failure before returning it.
    pub async fn reply(&self, msg: &Message, content: impl Into<String>) -> Result<()> {
        let res = self.send(&msg.reply(content)).await;
        if let Err(e) = &res {
            warn!(message_id = msg.id.0, error = %e, "sending reply failed");
        }
        res
    }
}
