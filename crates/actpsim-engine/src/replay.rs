//! Replay engine: rebuild state deterministically from a recorded log.
//!
//! Replay applies the same actions through the same reducer recording
//! observed, so the result is bit-identical in every semantic field,
//! including generated ids and `virtual_time_ms`.

use actpsim_types::CanvasState;

use crate::action::Action;
use crate::error::{Error, Result};
use crate::log::{EventLog, LogEvent, LOG_VERSION};
use crate::reducer::reduce;

/// Base pace of playback: one event per this many wall milliseconds at 1x
const PLAYBACK_EVENT_INTERVAL_MS: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Complete,
}

pub struct ReplayEngine {
    log: EventLog,
    state: CanvasState,
    cursor: usize,
    playback: PlaybackState,
    speed: f64,
    carry: f64,
}

impl ReplayEngine {
    pub fn new(log: EventLog) -> Result<Self> {
        if log.version != LOG_VERSION {
            return Err(Error::InvalidLog(format!(
                "unsupported version {} (expected {})",
                log.version, LOG_VERSION
            )));
        }
        match log.events.first() {
            Some(LogEvent {
                action: Action::SessionInit { .. },
                ..
            }) => {}
            Some(other) => {
                return Err(Error::InvalidLog(format!(
                    "first event must be SESSION_INIT, found {:?}",
                    other.id
                )))
            }
            None => return Err(Error::InvalidLog("log has no events".to_string())),
        }

        let state = bootstrap(&log);
        Ok(Self {
            log,
            state,
            cursor: 0,
            playback: PlaybackState::Idle,
            speed: 1.0,
            carry: 0.0,
        })
    }

    /// Rewind to the pre-SESSION_INIT bootstrap state.
    pub fn reset(&mut self) {
        self.state = bootstrap(&self.log);
        self.cursor = 0;
        self.playback = PlaybackState::Idle;
        self.carry = 0.0;
    }

    /// Apply one event; `None` once the log is exhausted.
    pub fn step(&mut self) -> Option<&LogEvent> {
        if self.cursor >= self.log.events.len() {
            self.playback = PlaybackState::Complete;
            return None;
        }
        let event = &self.log.events[self.cursor];
        self.state = reduce(&self.state, &event.action);
        self.cursor += 1;
        if self.cursor == self.log.events.len() {
            self.playback = PlaybackState::Complete;
        }
        Some(&self.log.events[self.cursor - 1])
    }

    pub fn play(&mut self, speed: f64) {
        if self.cursor < self.log.events.len() {
            self.playback = PlaybackState::Playing;
            self.speed = if speed > 0.0 { speed } else { 1.0 };
        }
    }

    pub fn pause(&mut self) {
        if self.playback == PlaybackState::Playing {
            self.playback = PlaybackState::Paused;
        }
    }

    /// Advance the periodic schedule by `elapsed_ms` of wall time,
    /// applying however many events fall due at the current speed.
    /// Returns the number applied.
    pub fn advance(&mut self, elapsed_ms: u64) -> usize {
        if self.playback != PlaybackState::Playing {
            return 0;
        }
        let due = self.carry + elapsed_ms as f64 * self.speed / PLAYBACK_EVENT_INTERVAL_MS;
        let count = due.floor() as usize;
        self.carry = due - count as f64;

        let mut applied = 0;
        for _ in 0..count {
            if self.step().is_none() {
                break;
            }
            applied += 1;
        }
        applied
    }

    /// Reset and replay until the recorded tick exceeds `tick`.
    pub fn jump_to_tick(&mut self, tick: u64) {
        self.reset();
        while self.cursor < self.log.events.len() && self.log.events[self.cursor].tick <= tick {
            self.step();
        }
        if self.cursor < self.log.events.len() {
            self.playback = PlaybackState::Paused;
        }
    }

    /// Reset and replay through event index `index` (inclusive).
    pub fn jump_to_event(&mut self, index: usize) {
        self.reset();
        while self.cursor <= index && self.step().is_some() {}
        if self.cursor < self.log.events.len() {
            self.playback = PlaybackState::Paused;
        }
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn current_tick(&self) -> u64 {
        self.state.tick
    }

    pub fn total_ticks(&self) -> u64 {
        self.log.metadata.total_ticks
    }

    pub fn current_event_index(&self) -> usize {
        self.cursor
    }

    pub fn total_events(&self) -> usize {
        self.log.events.len()
    }

    pub fn progress(&self) -> f64 {
        if self.log.events.is_empty() {
            1.0
        } else {
            self.cursor as f64 / self.log.events.len() as f64
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn into_state(self) -> CanvasState {
        self.state
    }
}

/// The minimal state that exists before SESSION_INIT applies.
fn bootstrap(log: &EventLog) -> CanvasState {
    let mut state = CanvasState::new();
    state.virtual_time_ms = log.initial_state.virtual_time_ms;
    state.id_counter = log.initial_state.id_counter;
    state.rng_seed = log.initial_state.rng_seed;
    state.tick_interval_ms = log.initial_state.tick_interval_ms;
    state
}

/// Replay a whole log and return the final state.
pub fn replay_to_end(log: EventLog) -> Result<CanvasState> {
    let mut engine = ReplayEngine::new(log)?;
    while engine.step().is_some() {}
    Ok(engine.into_state())
}

/// Canonical JSON of the semantic state, for determinism comparisons.
pub fn canonical_state(state: &CanvasState) -> Result<serde_json::Value> {
    serde_json::to_value(state).map_err(Error::from)
}

/// Whether replaying `log` reproduces `expected` field-for-field.
pub fn verify(log: EventLog, expected: &CanvasState) -> Result<bool> {
    let replayed = replay_to_end(log)?;
    Ok(canonical_state(&replayed)? == canonical_state(expected)?)
}
