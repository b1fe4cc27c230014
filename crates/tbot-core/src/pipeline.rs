//! CI pipeline status notifications (GitLab pipeline webhook payloads).

use serde_json::Value;

use crate::{sender::OutboundMessage, Error, Result};

/// Statuses that describe an unfinished pipeline and are not announced.
const QUIET_STATUSES: [&str; 2] = ["pending", "running"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineStatus {
    pub status: String,
    pub project: String,
    pub git_ref: String,
    pub duration: String,
    pub commit_title: String,
}

impl PipelineStatus {
    pub fn from_payload(v: &Value) -> Result<Self> {
        let status = str_at(v, "/object_attributes/status").ok_or_else(|| {
            Error::Decode("pipeline payload without object_attributes.status".to_string())
        })?;
        let project = str_at(v, "/project/name")
            .ok_or_else(|| Error::Decode("pipeline payload without project.name".to_string()))?;

        let duration = match v.pointer("/object_attributes/duration") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "?".to_string(),
        };
        let commit_title = str_at(v, "/commit/message")
            .and_then(|m| m.lines().next().map(str::to_string))
            .unwrap_or_default();

        Ok(Self {
            status,
            project,
            git_ref: str_at(v, "/object_attributes/ref").unwrap_or_default(),
            duration,
            commit_title,
        })
    }

    pub fn is_quiet(&self) -> bool {
        QUIET_STATUSES.contains(&self.status.as_str())
    }

    pub fn summary(&self) -> String {
        let emoji = if self.status == "success" { "🎉" } else { "⛈" };
        format!(
            "{emoji} Build for {} (\"{}\", {}) ran with status {} (took {}s)",
            self.project, self.commit_title, self.git_ref, self.status, self.duration
        )
    }

    /// The chat notification for this status, or `None` while it is still in progress.
    pub fn notification(&self, stream: &str) -> Option<OutboundMessage> {
        if self.is_quiet() {
            return None;
        }
        Some(OutboundMessage::to_stream(
            stream,
            self.project.clone(),
            self.summary(),
        ))
    }
}

fn str_at(v: &Value, pointer: &str) -> Option<String> {
    v.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::DeliveryMode;

    fn payload(status: &str) -> Value {
        json!({
            "object_kind": "pipeline",
            "object_attributes": {"status": status, "ref": "main", "duration": 42},
            "project": {"name": "tiny-robots"},
            "commit": {"message": "Fix the thing\n\nLonger body"}
        })
    }

    #[test]
    fn success_renders_party_summary() {
        let st = PipelineStatus::from_payload(&payload("success")).unwrap();
        assert_eq!(
            st.summary(),
            "🎉 Build for tiny-robots (\"Fix the thing\", main) ran with status success (took 42s)"
        );

        let msg = st.notification("platform").unwrap();
        assert_eq!(msg.mode, DeliveryMode::Stream);
        assert_eq!(msg.stream.as_deref(), Some("platform"));
        assert_eq!(msg.subject, "tiny-robots");
        msg.validate().unwrap();
    }

    #[test]
    fn failure_renders_storm_summary() {
        let st = PipelineStatus::from_payload(&payload("failed")).unwrap();
        assert!(st.summary().starts_with("⛈ Build for tiny-robots"));
        assert!(st.summary().contains("status failed"));
    }

    #[test]
    fn in_progress_statuses_are_quiet() {
        for s in ["pending", "running"] {
            let st = PipelineStatus::from_payload(&payload(s)).unwrap();
            assert!(st.notification("platform").is_none());
        }
    }

    #[test]
    fn missing_fields() {
        assert!(PipelineStatus::from_payload(&json!({"project": {"name": "x"}})).is_err());
        assert!(
            PipelineStatus::from_payload(&json!({"object_attributes": {"status": "success"}}))
                .is_err()
        );

        let st = PipelineStatus::from_payload(&json!({
            "object_attributes": {"status": "canceled", "duration": null},
            "project": {"name": "x"}
        }))
        .unwrap();
        assert_eq!(st.duration, "?");
        assert_eq!(st.commit_title, "");
    }
}
