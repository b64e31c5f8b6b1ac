use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Agent;
use crate::connection::Connection;
use crate::event::RuntimeEvent;
use crate::limits::DEFAULT_TICK_INTERVAL_MS;
use crate::max_numeric_suffix;

/// Scheduler mode: free-running ticks or user-driven stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Auto,
    Step,
}

/// Geometric layout of one agent, kept for export and replay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The aggregate simulator state: single source of truth, mutated only by
/// the reducer.
///
/// Agents and connections are keyed maps; `BTreeMap` gives the ascending
/// lexicographic iteration order the orchestrator relies on. `positions`
/// and `agent_states` are sibling maps of the same aggregate, cleared and
/// loaded together with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasState {
    pub agents: BTreeMap<String, Agent>,
    pub connections: BTreeMap<String, Connection>,
    pub events: Vec<RuntimeEvent>,
    pub positions: BTreeMap<String, Position>,
    pub agent_states: BTreeMap<String, Value>,
    pub is_running: bool,
    pub virtual_time_ms: u64,
    pub id_counter: u64,
    pub rng_seed: u64,
    pub tick_interval_ms: u64,
    pub runtime_mode: RuntimeMode,
    pub execution_mode: bool,
    pub inspector_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_agent_id: Option<String>,
    pub tick: u64,
    /// Bumped on LOAD_STATE so view layers re-read externally kept
    /// geometry. Not semantic state; excluded from serialization.
    #[serde(skip)]
    pub position_version: u64,
}

impl CanvasState {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            connections: BTreeMap::new(),
            events: Vec::new(),
            positions: BTreeMap::new(),
            agent_states: BTreeMap::new(),
            is_running: false,
            virtual_time_ms: 0,
            id_counter: 1,
            rng_seed: 1,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            runtime_mode: RuntimeMode::Step,
            execution_mode: true,
            inspector_expanded: false,
            selected_agent_id: None,
            tick: 0,
            position_version: 0,
        }
    }

    /// The id counter a fresh allocation must start from.
    ///
    /// Never lower than one past the largest numeric suffix across existing
    /// ids, so imports that already contain numbered ids stay collision-free.
    pub fn next_id_counter(&self) -> u64 {
        let max_suffix = max_numeric_suffix(
            self.agents
                .keys()
                .chain(self.connections.keys())
                .map(String::as_str)
                .chain(self.events.iter().map(|e| e.id.as_str())),
        );
        self.id_counter.max(max_suffix + 1)
    }
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentKind;

    #[test]
    fn test_next_id_counter_survives_imports() {
        let mut state = CanvasState::new();
        state.agents.insert(
            "agent-7".to_string(),
            Agent::new("agent-7", "A", AgentKind::Requester),
        );
        state.connections.insert(
            "tx-12".to_string(),
            Connection::new("tx-12", "agent-7", "agent-7", 1, "x", 0),
        );
        assert_eq!(state.next_id_counter(), 13);

        state.id_counter = 40;
        assert_eq!(state.next_id_counter(), 40);
    }

    #[test]
    fn test_new_state_defaults() {
        let state = CanvasState::new();
        assert_eq!(state.id_counter, 1);
        assert_eq!(state.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert!(state.execution_mode);
        assert!(!state.is_running);
    }
}
