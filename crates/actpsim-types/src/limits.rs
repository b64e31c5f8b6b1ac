//! Numeric limits for the whole simulator, one home.
//!
//! Values mirror the production contract; tests may override them through
//! `ResourceLimits` but never through ad-hoc constants elsewhere.

/// Wall-clock budget for one agent script execution
pub const MAX_EXECUTION_TIME_MS: u64 = 5_000;

/// Extra margin the worker client waits before the hard kill-switch fires
pub const KILL_SWITCH_MARGIN_MS: u64 = 250;

/// Memory cap for one script run (advisory; mapped onto VM size caps)
pub const MAX_MEMORY_BYTES: u64 = 10 * 1024 * 1024;

/// Stack cap for one script run (mapped onto VM call depth)
pub const MAX_STACK_BYTES: u64 = 1024 * 1024;

/// VM call-depth cap derived from `MAX_STACK_BYTES`
pub const MAX_CALL_LEVELS: usize = 64;

/// Cooperative-interrupt operation budget for one script run
pub const MAX_VM_OPERATIONS: u64 = 5_000_000;

/// Maximum log entries one script run may emit
pub const MAX_CONSOLE_LINES: usize = 200;

/// Maximum characters per log entry
pub const MAX_LOG_MESSAGE_CHARS: usize = 2_000;

/// Maximum ops one script run may queue
pub const MAX_OPS: usize = 200;

/// Maximum size of the persistent state a run may return
pub const MAX_STATE_BYTES: usize = 200 * 1024;

/// Maximum service jobs processed per tick
pub const MAX_JOBS_PER_TICK: usize = 10;

/// Maximum characters of service job output (truncated with marker)
pub const MAX_OUTPUT_CHARS: usize = 10_000;

/// Maximum jobs queued at once
pub const MAX_QUEUE_SIZE: usize = 100;

/// Maximum runtime events retained; overflow drops from the front
pub const MAX_EVENTS: usize = 1_000;

/// User-selectable tick intervals in ms (0.5x, 1x, 2x, 4x)
pub const TICK_INTERVALS_MS: [u64; 4] = [4_000, 2_000, 1_000, 500];

/// Default tick interval (1x)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 2_000;

/// Whether `ms` is one of the selectable tick intervals.
pub fn is_valid_tick_interval(ms: u64) -> bool {
    TICK_INTERVALS_MS.contains(&ms)
}
