//! Worker protocol: the plain-data messages crossing the main/worker
//! boundary, the op DSL a sandboxed run emits, and the resource caps the
//! worker is initialized with.
//!
//! The protocol is versioned by shape: both sides deserialize strictly and
//! unknown variants are errors, never silently dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Agent;
use crate::connection::{Connection, TxState};
use crate::limits;
use crate::money::Micro;

/// Resource caps published to the worker in the INIT handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub max_execution_time_ms: u64,
    pub max_memory_bytes: u64,
    pub max_stack_bytes: u64,
    pub max_call_levels: usize,
    pub max_vm_operations: u64,
    pub max_console_lines: usize,
    pub max_log_message_chars: usize,
    pub max_ops: usize,
    pub max_state_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_execution_time_ms: limits::MAX_EXECUTION_TIME_MS,
            max_memory_bytes: limits::MAX_MEMORY_BYTES,
            max_stack_bytes: limits::MAX_STACK_BYTES,
            max_call_levels: limits::MAX_CALL_LEVELS,
            max_vm_operations: limits::MAX_VM_OPERATIONS,
            max_console_lines: limits::MAX_CONSOLE_LINES,
            max_log_message_chars: limits::MAX_LOG_MESSAGE_CHARS,
            max_ops: limits::MAX_OPS,
            max_state_bytes: limits::MAX_STATE_BYTES,
        }
    }
}

/// One agent execution request, composed by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub request_id: u64,
    pub agent: Agent,
    pub virtual_time_ms: u64,
    /// Starting value for worker-side id allocation; the worker returns
    /// the advanced counter and the orchestrator persists it.
    pub id_counter: u64,
    pub incoming_transactions: Vec<Connection>,
    pub transactions: Vec<Connection>,
    pub persistent_state: Value,
    pub code: String,
}

/// Messages from main to worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    Init { limits: ResourceLimits },
    Reset,
    Execute(ExecuteRequest),
}

/// Messages from worker to main
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    Ready,
    Fatal { message: String },
    Result(ExecuteResult),
}

/// Classified failure of one sandboxed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerErrorKind {
    Validation,
    Syntax,
    Runtime,
    Timeout,
    Resource,
}

/// Structured error surfaced on a failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerError {
    #[serde(rename = "type")]
    pub kind: WorkerErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl WorkerError {
    pub fn new(kind: WorkerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }
}

/// Log level inside the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLogLevel {
    Info,
    Warn,
    Error,
}

/// One console line emitted by agent code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLog {
    pub level: WorkerLogLevel,
    pub message: String,
    pub timestamp: u64,
}

/// Immutable payload of a CREATE_TX op
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSpec {
    pub id: String,
    pub provider: String,
    pub amount_micro: Micro,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Payload of a SUBMIT_JOB op; the id is worker-minted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    pub service: String,
    pub params: Value,
}

/// Declarative state-change requests queued by `ctx` calls and applied
/// host-side, in order, after the run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum WorkerOp {
    CreateTx {
        tx: TxSpec,
    },
    TransitionState {
        tx_id: String,
        state: TxState,
    },
    ReleaseEscrow {
        tx_id: String,
    },
    Cancel {
        tx_id: String,
    },
    Dispute {
        tx_id: String,
        reason: String,
    },
    SubmitJob {
        job: JobSpec,
    },
}

/// Result of one sandboxed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub request_id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WorkerError>,
    pub id_counter: u64,
    pub logs: Vec<WorkerLog>,
    pub ops: Vec<WorkerOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<Value>,
}

impl ExecuteResult {
    /// A failed run: no ops, whatever logs were collected, counter as the
    /// worker last saw it.
    pub fn failure(
        request_id: u64,
        error: WorkerError,
        id_counter: u64,
        logs: Vec<WorkerLog>,
    ) -> Self {
        Self {
            request_id,
            success: false,
            error: Some(error),
            id_counter,
            logs,
            ops: Vec::new(),
            final_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_wire_tags() {
        let op = WorkerOp::TransitionState {
            tx_id: "tx-3".to_string(),
            state: TxState::Committed,
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "TRANSITION_STATE");
        assert_eq!(value["txId"], "tx-3");
        assert_eq!(value["state"], "COMMITTED");

        let op = WorkerOp::SubmitJob {
            job: JobSpec {
                id: "job-9".to_string(),
                service: "translate".to_string(),
                params: json!({"text": "hi", "to": "es"}),
            },
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "SUBMIT_JOB");
    }

    #[test]
    fn test_request_round_trip() {
        let request = WorkerRequest::Init {
            limits: ResourceLimits::default(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"INIT\""));
        let back: WorkerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let result: std::result::Result<WorkerResponse, _> =
            serde_json::from_str(r#"{"type":"BOGUS"}"#);
        assert!(result.is_err());
    }
}
