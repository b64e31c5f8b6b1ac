//! Canonical serializations of the canvas.
//!
//! Two shapes: the topology share (no code; rehydrated from templates on
//! import) and the full export (code included). Both are deterministic:
//! arrays sorted by id, stable key order, no per-connection timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use actpsim_types::{
    is_sha256_hex, Agent, AgentKind, AgentStatus, CanvasState, Micro, Position, TxState,
};

use crate::error::Result;

pub const TOPOLOGY_VERSION: u32 = 1;
pub const EXPORT_VERSION: u32 = 2;

/// Agent entry of a topology share: everything but the code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyAgent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub balance_micro: Micro,
    pub status: AgentStatus,
}

impl TopologyAgent {
    fn of(agent: &Agent) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            kind: agent.kind,
            icon: agent.icon.clone(),
            template_id: agent.template_id.clone(),
            balance_micro: agent.balance_micro,
            status: agent.status,
        }
    }

    fn rehydrate(&self, code: String) -> Agent {
        Agent {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            icon: self.icon.clone(),
            template_id: self.template_id.clone(),
            balance_micro: self.balance_micro,
            status: self.status,
            code,
        }
    }
}

/// Connection entry shared by both shapes; timestamps are skipped to keep
/// payloads small and replay-safe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConnection {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub state: TxState,
    pub amount_micro: Micro,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_hash: Option<String>,
}

impl ExportConnection {
    fn of(conn: &actpsim_types::Connection) -> Self {
        Self {
            id: conn.id.clone(),
            source_id: conn.source_id.clone(),
            target_id: conn.target_id.clone(),
            state: conn.state,
            amount_micro: conn.amount_micro,
            service: conn.service.clone(),
            deliverable_hash: conn.deliverable_hash.clone(),
        }
    }

    fn rehydrate(&self, seeded_at: u64) -> actpsim_types::Connection {
        actpsim_types::Connection {
            id: self.id.clone(),
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            amount_micro: self.amount_micro,
            service: self.service.clone(),
            created_at: seeded_at,
            state: self.state,
            updated_at: seeded_at,
            // Imported documents are untrusted; anything that is not a
            // SHA-256 hex digest is dropped rather than carried.
            deliverable_hash: self
                .deliverable_hash
                .clone()
                .filter(|hash| is_sha256_hex(hash)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Topology share: the external sharing format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyExport {
    pub version: u32,
    pub virtual_time_ms: u64,
    pub agents: Vec<TopologyAgent>,
    pub connections: Vec<ExportConnection>,
    pub positions: Vec<PositionEntry>,
}

/// Full export: topology plus agent code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub agents: Vec<Agent>,
    pub connections: Vec<ExportConnection>,
    pub positions: Vec<PositionEntry>,
}

fn position_entries(state: &CanvasState) -> Vec<PositionEntry> {
    state
        .positions
        .iter()
        .map(|(id, Position { x, y })| PositionEntry {
            id: id.clone(),
            x: *x,
            y: *y,
        })
        .collect()
}

/// Build the topology share. BTreeMap iteration already sorts by id.
pub fn topology(state: &CanvasState) -> TopologyExport {
    TopologyExport {
        version: TOPOLOGY_VERSION,
        virtual_time_ms: state.virtual_time_ms,
        agents: state.agents.values().map(TopologyAgent::of).collect(),
        connections: state
            .connections
            .values()
            .map(ExportConnection::of)
            .collect(),
        positions: position_entries(state),
    }
}

pub fn topology_json(state: &CanvasState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&topology(state))?)
}

/// Rebuild a canvas from a topology share, rehydrating agent code from
/// templates keyed by `template_id`.
pub fn import_topology(
    export: &TopologyExport,
    resolve_code: &dyn Fn(&str) -> Option<String>,
) -> CanvasState {
    let mut state = CanvasState::new();
    state.virtual_time_ms = export.virtual_time_ms;
    for agent in &export.agents {
        let code = agent
            .template_id
            .as_deref()
            .and_then(resolve_code)
            .unwrap_or_default();
        state.agents.insert(agent.id.clone(), agent.rehydrate(code));
    }
    for conn in &export.connections {
        state
            .connections
            .insert(conn.id.clone(), conn.rehydrate(export.virtual_time_ms));
    }
    for entry in &export.positions {
        state
            .positions
            .insert(entry.id.clone(), Position { x: entry.x, y: entry.y });
    }
    state.id_counter = state.next_id_counter();
    state
}

pub fn full_export(state: &CanvasState) -> FullExport {
    FullExport {
        version: EXPORT_VERSION,
        exported_at: Utc::now(),
        agents: state.agents.values().cloned().collect(),
        connections: state
            .connections
            .values()
            .map(ExportConnection::of)
            .collect(),
        positions: position_entries(state),
    }
}

pub fn full_export_json(state: &CanvasState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&full_export(state))?)
}

/// Rebuild a canvas from a full export; counters for every id prefix are
/// re-synced from the union of imported ids.
pub fn import_full(export: &FullExport) -> CanvasState {
    let mut state = CanvasState::new();
    for agent in &export.agents {
        state.agents.insert(agent.id.clone(), agent.clone());
    }
    for conn in &export.connections {
        state.connections.insert(conn.id.clone(), conn.rehydrate(0));
    }
    for entry in &export.positions {
        state
            .positions
            .insert(entry.id.clone(), Position { x: entry.x, y: entry.y });
    }
    state.id_counter = state.next_id_counter();
    state
}
