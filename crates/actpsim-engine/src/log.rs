//! Append-only event log.
//!
//! The log is the unit of replay: a minimal initial state, a SESSION_INIT
//! snapshot as the first event, then every semantic reducer action in
//! apply order. Event ids are `event-N` with N assigned at insertion, so
//! an event's id and its index agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use actpsim_types::CanvasState;

use crate::action::Action;
use crate::snapshot::SessionSnapshot;

pub const LOG_VERSION: u32 = 1;

/// Determinism primitives needed before the first event applies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub virtual_time_ms: u64,
    pub id_counter: u64,
    pub rng_seed: u64,
    pub tick_interval_ms: u64,
}

impl InitialState {
    pub fn capture(state: &CanvasState) -> Self {
        Self {
            virtual_time_ms: state.virtual_time_ms,
            id_counter: state.id_counter,
            rng_seed: state.rng_seed,
            tick_interval_ms: state.tick_interval_ms,
        }
    }
}

/// One recorded mutation: `{id, type, timestamp, tick, payload}` on the
/// wire, with the action flattened into `type`/`payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub timestamp: u64,
    pub tick: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// Bookkeeping about the recording session. Wall-clock fields live here
/// and only here; nothing below the metadata reads system time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    pub recorded_at: DateTime<Utc>,
    /// Virtual milliseconds covered by the recording
    pub duration: u64,
    pub total_ticks: u64,
    pub total_events: usize,
    pub canvas_version: String,
}

/// A complete recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLog {
    pub version: u32,
    pub seed: u64,
    pub initial_state: InitialState,
    pub events: Vec<LogEvent>,
    pub metadata: LogMetadata,
}

/// Observes dispatched actions and accumulates the log.
///
/// Recording may begin mid-session: the first event is always a
/// SESSION_INIT carrying a full snapshot, so replay bootstraps exactly the
/// state recording saw.
#[derive(Debug)]
pub struct Recorder {
    seed: u64,
    initial_state: InitialState,
    events: Vec<LogEvent>,
    next_seq: u64,
    start_virtual_ms: u64,
    start_tick: u64,
}

impl Recorder {
    pub fn start(state: &CanvasState) -> Self {
        let mut recorder = Self {
            seed: state.rng_seed,
            initial_state: InitialState::capture(state),
            events: Vec::new(),
            next_seq: 1,
            start_virtual_ms: state.virtual_time_ms,
            start_tick: state.tick,
        };
        recorder.push(
            state,
            Action::SessionInit {
                snapshot: SessionSnapshot::capture(state),
            },
        );
        recorder
    }

    /// Record one action about to be applied to `state`.
    ///
    /// Call before the reduce so timestamp and tick reflect the state at
    /// the instant of mutation. Non-semantic actions are skipped.
    pub fn observe(&mut self, state: &CanvasState, action: &Action) {
        if !action.is_logged() {
            return;
        }
        self.push(state, action.clone());
    }

    fn push(&mut self, state: &CanvasState, action: Action) {
        let id = format!("event-{}", self.next_seq);
        self.next_seq += 1;
        self.events.push(LogEvent {
            id,
            timestamp: state.virtual_time_ms,
            tick: state.tick,
            action,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Seal the recording into a log.
    pub fn finish(self, state: &CanvasState) -> EventLog {
        let metadata = LogMetadata {
            recorded_at: Utc::now(),
            duration: state.virtual_time_ms.saturating_sub(self.start_virtual_ms),
            total_ticks: state.tick.saturating_sub(self.start_tick),
            total_events: self.events.len(),
            canvas_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        EventLog {
            version: LOG_VERSION,
            seed: self.seed,
            initial_state: self.initial_state,
            events: self.events,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actpsim_types::{Agent, AgentKind, EventDraft};

    #[test]
    fn test_first_event_is_session_init() {
        let mut state = CanvasState::new();
        state.agents.insert(
            "agent-1".to_string(),
            Agent::new("agent-1", "A", AgentKind::Requester),
        );
        state.virtual_time_ms = 2_000;
        state.tick = 1;

        let recorder = Recorder::start(&state);
        assert_eq!(recorder.len(), 1);
        let log = recorder.finish(&state);
        assert_eq!(log.events[0].id, "event-1");
        assert_eq!(log.events[0].tick, 1);
        match &log.events[0].action {
            Action::SessionInit { snapshot } => {
                assert_eq!(snapshot.agents.len(), 1);
                assert_eq!(snapshot.virtual_time_ms, 2_000);
            }
            other => panic!("expected SESSION_INIT, got {:?}", other),
        }
    }

    #[test]
    fn test_view_actions_not_recorded() {
        let state = CanvasState::new();
        let mut recorder = Recorder::start(&state);
        recorder.observe(&state, &Action::ToggleInspector);
        recorder.observe(
            &state,
            &Action::AppendEvent {
                event: EventDraft::info("x"),
            },
        );
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_event_ids_strictly_increase() {
        let state = CanvasState::new();
        let mut recorder = Recorder::start(&state);
        for _ in 0..3 {
            recorder.observe(&state, &Action::TickRuntime);
        }
        let log = recorder.finish(&state);
        let ids: Vec<_> = log.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["event-1", "event-2", "event-3", "event-4"]);
    }

    #[test]
    fn test_log_event_wire_shape() {
        let state = CanvasState::new();
        let mut recorder = Recorder::start(&state);
        recorder.observe(&state, &Action::TickRuntime);
        let log = recorder.finish(&state);

        let value = serde_json::to_value(&log.events[1]).unwrap();
        assert_eq!(value["id"], "event-2");
        assert_eq!(value["type"], "TICK_RUNTIME");
        assert!(value["tick"].is_number());
    }
}
