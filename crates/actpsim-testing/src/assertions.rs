//! High-level assertions over canvas state.

use anyhow::{Context, Result};

use actpsim_types::{CanvasState, EventLevel, Micro, TxState};

pub fn assert_balance(state: &CanvasState, agent_id: &str, expected_micro: Micro) -> Result<()> {
    let agent = state
        .agents
        .get(agent_id)
        .with_context(|| format!("agent '{}' not found", agent_id))?;
    if agent.balance_micro != expected_micro {
        anyhow::bail!(
            "{}: expected balance {} micro, got {}",
            agent_id,
            expected_micro,
            agent.balance_micro
        );
    }
    Ok(())
}

pub fn assert_connection_state(
    state: &CanvasState,
    conn_id: &str,
    expected: TxState,
) -> Result<()> {
    let conn = state
        .connections
        .get(conn_id)
        .with_context(|| format!("connection '{}' not found", conn_id))?;
    if conn.state != expected {
        anyhow::bail!(
            "{}: expected state {}, got {}",
            conn_id,
            expected,
            conn.state
        );
    }
    Ok(())
}

/// Count error events whose message contains `needle`.
pub fn count_error_events(state: &CanvasState, needle: &str) -> usize {
    state
        .events
        .iter()
        .filter(|e| e.level == EventLevel::Error && e.message.contains(needle))
        .count()
}

/// The sequence of lifecycle states a connection has been through,
/// reconstructed from the event feed payloads plus the current state.
pub fn state_trail(state: &CanvasState, conn_id: &str) -> Vec<String> {
    let mut trail = Vec::new();
    for event in &state.events {
        if event.connection_id.as_deref() != Some(conn_id) {
            continue;
        }
        if let Some(from) = event.payload.get("from").and_then(|v| v.as_str()) {
            if trail.last().map(String::as_str) != Some(from) {
                trail.push(from.to_string());
            }
        }
        if let Some(to) = event.payload.get("to").and_then(|v| v.as_str()) {
            trail.push(to.to_string());
        }
    }
    if trail.is_empty() {
        if let Some(conn) = state.connections.get(conn_id) {
            trail.push(conn.state.as_str().to_string());
        }
    }
    trail
}
