use actpsim_types::limits::MAX_EVENTS;
use actpsim_types::{is_sha256_hex, mint_id, numeric_suffix, AgentStatus, CanvasState, RuntimeEvent};

use crate::action::Action;

/// Fold one action into the state.
///
/// Pure: the input state is never mutated. Unknown ids are ignored rather
/// than rejected; validation happens before dispatch, and replayed logs
/// must never diverge on a stale reference.
pub fn reduce(state: &CanvasState, action: &Action) -> CanvasState {
    let mut next = state.clone();

    match action {
        Action::AddAgent { agent, position } => {
            bump_counter_past(&mut next, &agent.id);
            if let Some(position) = position {
                next.positions.insert(agent.id.clone(), *position);
            }
            next.agents.insert(agent.id.clone(), agent.clone());
        }
        Action::RemoveAgent { id } => {
            next.agents.remove(id);
            next.connections
                .retain(|_, c| c.source_id != *id && c.target_id != *id);
            next.positions.remove(id);
            next.agent_states.remove(id);
            if next.selected_agent_id.as_deref() == Some(id.as_str()) {
                next.selected_agent_id = None;
            }
        }
        Action::AddConnection { connection } => {
            bump_counter_past(&mut next, &connection.id);
            next.connections
                .insert(connection.id.clone(), connection.clone());
        }
        Action::RemoveConnection { id } => {
            next.connections.remove(id);
        }

        Action::UpdateAgentCode { id, code } => {
            if let Some(agent) = next.agents.get_mut(id) {
                agent.code = code.clone();
                // The user is fixing the code; give it a clean slate.
                if agent.status == AgentStatus::Error {
                    agent.status = AgentStatus::Idle;
                }
            }
        }
        Action::UpdateAgentBalance { id, balance_micro } => {
            if let Some(agent) = next.agents.get_mut(id) {
                agent.balance_micro = *balance_micro;
            }
        }
        Action::UpdateAgentStatus { id, status } => {
            if let Some(agent) = next.agents.get_mut(id) {
                agent.status = *status;
            }
        }
        Action::UpdateAgentPosition { id, position } => {
            next.positions.insert(id.clone(), *position);
        }
        Action::SetAgentState { id, state } => {
            if state.is_null() {
                next.agent_states.remove(id);
            } else {
                next.agent_states.insert(id.clone(), state.clone());
            }
        }
        Action::UpdateConnectionState { id, state } => {
            if let Some(connection) = next.connections.get_mut(id) {
                connection.state = *state;
                connection.updated_at = next.virtual_time_ms;
            }
        }
        Action::UpdateConnectionAmount { id, amount_micro } => {
            if let Some(connection) = next.connections.get_mut(id) {
                connection.amount_micro = *amount_micro;
            }
        }
        Action::UpdateConnectionHash { id, hash } => {
            if let Some(connection) = next.connections.get_mut(id) {
                // Set at most once, on first DELIVERED; a content hash
                // must be SHA-256 hex or it is dropped.
                if connection.deliverable_hash.is_none() && is_sha256_hex(hash) {
                    connection.deliverable_hash = Some(hash.clone());
                }
            }
        }

        Action::SelectAgent { id } => {
            next.selected_agent_id = id.clone();
        }
        Action::ToggleInspector => {
            next.inspector_expanded = !next.inspector_expanded;
        }

        Action::AppendEvent { event } => {
            let id = mint_id("event", &mut next.id_counter);
            next.events.push(RuntimeEvent {
                id,
                level: event.level,
                timestamp: next.virtual_time_ms,
                agent_id: event.agent_id.clone(),
                connection_id: event.connection_id.clone(),
                message: event.message.clone(),
                payload: event.payload.clone(),
            });
            let overflow = next.events.len().saturating_sub(MAX_EVENTS);
            if overflow > 0 {
                next.events.drain(..overflow);
            }
        }

        Action::StartRuntime => {
            next.is_running = true;
        }
        Action::StopRuntime => {
            next.is_running = false;
        }
        Action::TickRuntime => {
            next.tick += 1;
            next.virtual_time_ms += next.tick_interval_ms;
        }
        Action::ResetRuntime => {
            next.events.clear();
            next.tick = 0;
            next.virtual_time_ms = 0;
            next.id_counter = 1;
            next.is_running = false;
            next.agent_states.clear();
            for agent in next.agents.values_mut() {
                agent.status = AgentStatus::Idle;
            }
        }
        Action::ResetState => {
            let position_version = next.position_version;
            next = CanvasState::new();
            next.position_version = position_version + 1;
        }
        Action::LoadState { snapshot } | Action::SessionInit { snapshot } => {
            let position_version = next.position_version;
            next = snapshot.restore();
            next.position_version = position_version + 1;
        }

        Action::SetIdCounter { value } => {
            next.id_counter = *value;
        }
        Action::SetTickInterval { ms } => {
            next.tick_interval_ms = *ms;
        }
        Action::SetRuntimeMode { mode } => {
            next.runtime_mode = *mode;
        }
        Action::SetExecutionMode { enabled } => {
            next.execution_mode = *enabled;
        }
    }

    next
}

/// Keep the shared counter strictly ahead of any id entering the state.
fn bump_counter_past(state: &mut CanvasState, id: &str) {
    if let Some(suffix) = numeric_suffix(id) {
        state.id_counter = state.id_counter.max(suffix + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actpsim_types::{Agent, AgentKind, Connection, EventDraft, Position, TxState};

    fn with_agent(id: &str) -> CanvasState {
        reduce(
            &CanvasState::new(),
            &Action::AddAgent {
                agent: Agent::new(id, "A", AgentKind::Requester),
                position: Some(Position { x: 0.0, y: 0.0 }),
            },
        )
    }

    #[test]
    fn test_add_agent_bumps_counter() {
        let state = with_agent("agent-7");
        assert_eq!(state.id_counter, 8);
        assert!(state.agents.contains_key("agent-7"));
        assert!(state.positions.contains_key("agent-7"));
    }

    #[test]
    fn test_remove_agent_cascades() {
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::AddAgent {
                agent: Agent::new("agent-2", "B", AgentKind::Provider),
                position: None,
            },
        );
        state = reduce(
            &state,
            &Action::AddConnection {
                connection: Connection::new("tx-3", "agent-1", "agent-2", 100, "svc", 0),
            },
        );
        state = reduce(
            &state,
            &Action::SelectAgent {
                id: Some("agent-1".to_string()),
            },
        );
        state.agent_states.insert(
            "agent-1".to_string(),
            serde_json::json!({"notes": "scratch"}),
        );

        let state = reduce(
            &state,
            &Action::RemoveAgent {
                id: "agent-1".to_string(),
            },
        );
        assert!(!state.agents.contains_key("agent-1"));
        assert!(state.connections.is_empty());
        assert!(state.selected_agent_id.is_none());
        assert!(!state.agent_states.contains_key("agent-1"));
    }

    #[test]
    fn test_code_edit_clears_error_status() {
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::UpdateAgentStatus {
                id: "agent-1".to_string(),
                status: AgentStatus::Error,
            },
        );
        let state = reduce(
            &state,
            &Action::UpdateAgentCode {
                id: "agent-1".to_string(),
                code: "ctx.log(\"fixed\")".to_string(),
            },
        );
        assert_eq!(state.agents["agent-1"].status, AgentStatus::Idle);
    }

    #[test]
    fn test_hash_set_at_most_once() {
        let first = "a".repeat(64);
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::AddConnection {
                connection: Connection::new("tx-2", "agent-1", "agent-1", 1, "svc", 0),
            },
        );
        state = reduce(
            &state,
            &Action::UpdateConnectionHash {
                id: "tx-2".to_string(),
                hash: first.clone(),
            },
        );
        let state = reduce(
            &state,
            &Action::UpdateConnectionHash {
                id: "tx-2".to_string(),
                hash: "b".repeat(64),
            },
        );
        assert_eq!(
            state.connections["tx-2"].deliverable_hash.as_deref(),
            Some(first.as_str())
        );
    }

    #[test]
    fn test_malformed_hash_dropped() {
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::AddConnection {
                connection: Connection::new("tx-2", "agent-1", "agent-1", 1, "svc", 0),
            },
        );
        let state = reduce(
            &state,
            &Action::UpdateConnectionHash {
                id: "tx-2".to_string(),
                hash: "not-a-hash".to_string(),
            },
        );
        assert!(state.connections["tx-2"].deliverable_hash.is_none());
    }

    #[test]
    fn test_append_event_mints_from_counter_and_caps() {
        let mut state = CanvasState::new();
        state.id_counter = 5;
        let state = reduce(
            &state,
            &Action::AppendEvent {
                event: EventDraft::info("hello"),
            },
        );
        assert_eq!(state.events[0].id, "event-5");
        assert_eq!(state.id_counter, 6);
    }

    #[test]
    fn test_event_overflow_drops_front() {
        let mut state = CanvasState::new();
        for i in 0..(MAX_EVENTS + 10) {
            state = reduce(
                &state,
                &Action::AppendEvent {
                    event: EventDraft::info(format!("msg {}", i)),
                },
            );
        }
        assert_eq!(state.events.len(), MAX_EVENTS);
        assert_eq!(state.events[0].message, "msg 10");
    }

    #[test]
    fn test_tick_advances_virtual_clock() {
        let state = reduce(&CanvasState::new(), &Action::TickRuntime);
        assert_eq!(state.tick, 1);
        assert_eq!(state.virtual_time_ms, state.tick_interval_ms);
    }

    #[test]
    fn test_reset_runtime_keeps_topology() {
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::UpdateAgentStatus {
                id: "agent-1".to_string(),
                status: AgentStatus::Completed,
            },
        );
        state = reduce(&state, &Action::TickRuntime);
        state = reduce(
            &state,
            &Action::AppendEvent {
                event: EventDraft::info("x"),
            },
        );

        let state = reduce(&state, &Action::ResetRuntime);
        assert!(state.agents.contains_key("agent-1"));
        assert_eq!(state.tick, 0);
        assert_eq!(state.virtual_time_ms, 0);
        assert_eq!(state.id_counter, 1);
        assert!(state.events.is_empty());
        assert_eq!(state.agents["agent-1"].status, AgentStatus::Idle);
    }

    #[test]
    fn test_load_state_bumps_position_version() {
        let source = with_agent("agent-1");
        let snapshot = crate::snapshot::SessionSnapshot::capture(&source);
        let state = reduce(&CanvasState::new(), &Action::LoadState { snapshot });
        assert_eq!(state.position_version, 1);
        assert!(state.agents.contains_key("agent-1"));
    }

    #[test]
    fn test_updates_on_unknown_ids_are_ignored() {
        let state = reduce(
            &CanvasState::new(),
            &Action::UpdateAgentBalance {
                id: "agent-404".to_string(),
                balance_micro: 1,
            },
        );
        assert!(state.agents.is_empty());
    }

    #[test]
    fn test_connection_state_update_touches_updated_at() {
        let mut state = with_agent("agent-1");
        state = reduce(
            &state,
            &Action::AddConnection {
                connection: Connection::new("tx-2", "agent-1", "agent-1", 1, "svc", 0),
            },
        );
        state.virtual_time_ms = 4_000;
        let state = reduce(
            &state,
            &Action::UpdateConnectionState {
                id: "tx-2".to_string(),
                state: TxState::Committed,
            },
        );
        assert_eq!(state.connections["tx-2"].state, TxState::Committed);
        assert_eq!(state.connections["tx-2"].updated_at, 4_000);
    }
}
