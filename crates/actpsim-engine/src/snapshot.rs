use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use actpsim_types::{Agent, CanvasState, Connection, Position, RuntimeMode};

/// A full in-band snapshot of the canvas, carried by SESSION_INIT and
/// LOAD_STATE.
///
/// Recording may start mid-session, so the snapshot must be sufficient to
/// rebuild the aggregate exactly: topology, geometry, persistent agent
/// state, and every determinism primitive. Agents and connections are
/// sorted by id so serialized snapshots are canonical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub agents: Vec<Agent>,
    pub connections: Vec<Connection>,
    pub positions: BTreeMap<String, Position>,
    pub agent_states: BTreeMap<String, Value>,
    pub virtual_time_ms: u64,
    pub id_counter: u64,
    pub rng_seed: u64,
    pub tick_interval_ms: u64,
    pub tick: u64,
    pub execution_mode: bool,
    pub runtime_mode: RuntimeMode,
}

impl SessionSnapshot {
    pub fn capture(state: &CanvasState) -> Self {
        Self {
            agents: state.agents.values().cloned().collect(),
            connections: state.connections.values().cloned().collect(),
            positions: state.positions.clone(),
            agent_states: state.agent_states.clone(),
            virtual_time_ms: state.virtual_time_ms,
            id_counter: state.id_counter,
            rng_seed: state.rng_seed,
            tick_interval_ms: state.tick_interval_ms,
            tick: state.tick,
            execution_mode: state.execution_mode,
            runtime_mode: state.runtime_mode,
        }
    }

    /// Rebuild a canvas from the snapshot. The id counter is re-synced
    /// against the numeric suffixes of the loaded ids, so snapshots
    /// produced by older sessions cannot introduce collisions.
    pub fn restore(&self) -> CanvasState {
        let mut state = CanvasState::new();
        state.agents = self
            .agents
            .iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect();
        state.connections = self
            .connections
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        state.positions = self.positions.clone();
        state.agent_states = self.agent_states.clone();
        state.virtual_time_ms = self.virtual_time_ms;
        state.id_counter = self.id_counter;
        state.rng_seed = self.rng_seed;
        state.tick_interval_ms = self.tick_interval_ms;
        state.tick = self.tick;
        state.execution_mode = self.execution_mode;
        state.runtime_mode = self.runtime_mode;
        state.id_counter = state.next_id_counter();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actpsim_types::AgentKind;

    #[test]
    fn test_capture_restore_round_trip() {
        let mut state = CanvasState::new();
        state.agents.insert(
            "agent-2".to_string(),
            Agent::new("agent-2", "B", AgentKind::Provider),
        );
        state.agents.insert(
            "agent-1".to_string(),
            Agent::new("agent-1", "A", AgentKind::Requester),
        );
        state.virtual_time_ms = 6_000;
        state.tick = 3;
        state.id_counter = 5;

        let restored = SessionSnapshot::capture(&state).restore();
        assert_eq!(restored.agents, state.agents);
        assert_eq!(restored.virtual_time_ms, 6_000);
        assert_eq!(restored.tick, 3);
        assert_eq!(restored.id_counter, 5);
    }

    #[test]
    fn test_restore_resyncs_counter_from_ids() {
        let mut state = CanvasState::new();
        state.agents.insert(
            "agent-7".to_string(),
            Agent::new("agent-7", "A", AgentKind::Requester),
        );
        state.id_counter = 2;

        let restored = SessionSnapshot::capture(&state).restore();
        assert_eq!(restored.id_counter, 8);
    }
}
