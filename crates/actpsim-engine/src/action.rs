use serde::{Deserialize, Serialize};
use serde_json::Value;

use actpsim_types::{
    Agent, AgentStatus, Connection, EventDraft, Micro, Position, RuntimeMode, TxState,
};

use crate::snapshot::SessionSnapshot;

/// The closed action set the reducer folds over.
///
/// Every state mutation in the system is one of these; the event log
/// records the semantic subset verbatim, which is what makes replay a
/// left-inverse of recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    // Topology
    AddAgent {
        agent: Agent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
    RemoveAgent {
        id: String,
    },
    AddConnection {
        connection: Connection,
    },
    RemoveConnection {
        id: String,
    },

    // Targeted field updates
    UpdateAgentCode {
        id: String,
        code: String,
    },
    UpdateAgentBalance {
        id: String,
        balance_micro: Micro,
    },
    UpdateAgentStatus {
        id: String,
        status: AgentStatus,
    },
    UpdateAgentPosition {
        id: String,
        position: Position,
    },
    SetAgentState {
        id: String,
        state: Value,
    },
    UpdateConnectionState {
        id: String,
        state: TxState,
    },
    UpdateConnectionAmount {
        id: String,
        amount_micro: Micro,
    },
    UpdateConnectionHash {
        id: String,
        hash: String,
    },

    // Selection / view
    SelectAgent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    ToggleInspector,

    // Log append
    AppendEvent {
        event: EventDraft,
    },

    // Runtime control
    StartRuntime,
    StopRuntime,
    TickRuntime,
    ResetRuntime,
    ResetState,
    LoadState {
        snapshot: SessionSnapshot,
    },
    SessionInit {
        snapshot: SessionSnapshot,
    },

    // Determinism control
    SetIdCounter {
        value: u64,
    },
    SetTickInterval {
        ms: u64,
    },
    SetRuntimeMode {
        mode: RuntimeMode,
    },
    SetExecutionMode {
        enabled: bool,
    },
}

impl Action {
    /// Whether the event log records this action.
    ///
    /// Selection and inspector toggles are view concerns with no semantic
    /// weight; everything else replays.
    pub fn is_logged(&self) -> bool {
        !matches!(self, Action::SelectAgent { .. } | Action::ToggleInspector)
    }
}
