use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a service job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// A queued service job.
///
/// Jobs are owned by the submitting agent; completed and failed results
/// are copied into that agent's persistent state under `jobs.<id>` at the
/// end of the tick, then purged from the global queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceJob {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub agent_id: String,
    pub params: Value,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl ServiceJob {
    pub fn pending(
        id: impl Into<String>,
        kind: impl Into<String>,
        agent_id: impl Into<String>,
        params: Value,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            agent_id: agent_id.into(),
            params,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at,
            completed_at: None,
        }
    }

    /// Agent-visible projection written into `ctx.state.jobs[id]`.
    pub fn state_entry(&self) -> Value {
        let mut entry = serde_json::Map::new();
        entry.insert(
            "status".to_string(),
            serde_json::to_value(self.status).unwrap_or(Value::Null),
        );
        if let Some(result) = &self.result {
            entry.insert("result".to_string(), Value::String(result.clone()));
        }
        if let Some(error) = &self.error {
            entry.insert("error".to_string(), Value::String(error.clone()));
        }
        Value::Object(entry)
    }
}
