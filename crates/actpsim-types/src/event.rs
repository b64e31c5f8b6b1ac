use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a runtime event, used by consumers for styling.
///
/// Consumers must not parse message strings; structured data rides in
/// `payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One line of the capped runtime event feed.
///
/// `timestamp` is virtual time; ids are minted from the global counter at
/// append time so replay reproduces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub level: EventLevel,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

/// A runtime event before the reducer assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[serde(rename = "type")]
    pub level: EventLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl EventDraft {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            agent_id: None,
            connection_id: None,
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, message)
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn for_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_field_serializes_as_type() {
        let draft = EventDraft::error("Insufficient funds").for_agent("agent-1");
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["agentId"], "agent-1");
        assert!(value.get("connectionId").is_none());
        assert!(value.get("payload").is_none());
    }
}
