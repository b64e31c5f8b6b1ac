//! Collapse repeated agent log lines on no-op ticks.
//!
//! An agent that logs the same `info` line every tick while doing nothing
//! would flood the event feed. Consecutive duplicates are suppressed and
//! summarized as one `"↻ (repeated Kx) <msg>"` line when the message
//! changes or a non-info log interrupts the streak.

use std::collections::HashMap;

use actpsim_types::{WorkerLog, WorkerLogLevel};

#[derive(Default)]
struct Streak {
    message: String,
    suppressed: usize,
}

#[derive(Default)]
pub struct LogDeduper {
    streaks: HashMap<String, Streak>,
}

/// What the caller should emit for one incoming log line.
pub enum Emit {
    /// Pass the line through unchanged
    Line,
    /// Drop the line silently (suppressed duplicate)
    Suppress,
    /// Emit the summary line first, then the incoming line
    SummaryThen(String),
}

impl LogDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how to emit `log` for `agent_id`. `no_op_tick` is true when
    /// the agent's run produced zero ops this tick; only those ticks are
    /// eligible for suppression.
    pub fn observe(&mut self, agent_id: &str, log: &WorkerLog, no_op_tick: bool) -> Emit {
        let streak = self.streaks.entry(agent_id.to_string()).or_default();

        if log.level == WorkerLogLevel::Info && no_op_tick {
            if streak.message == log.message {
                streak.suppressed += 1;
                return Emit::Suppress;
            }
            let summary = Self::flush_streak(streak);
            streak.message = log.message.clone();
            return match summary {
                Some(summary) => Emit::SummaryThen(summary),
                None => Emit::Line,
            };
        }

        // Non-info or active tick: the streak breaks.
        let summary = Self::flush_streak(streak);
        streak.message.clear();
        match summary {
            Some(summary) => Emit::SummaryThen(summary),
            None => Emit::Line,
        }
    }

    /// Forget an agent's streak (agent removed or runtime reset).
    pub fn reset(&mut self) {
        self.streaks.clear();
    }

    fn flush_streak(streak: &mut Streak) -> Option<String> {
        if streak.suppressed == 0 {
            return None;
        }
        let summary = format!("↻ (repeated {}x) {}", streak.suppressed, streak.message);
        streak.suppressed = 0;
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(message: &str) -> WorkerLog {
        WorkerLog {
            level: WorkerLogLevel::Info,
            message: message.to_string(),
            timestamp: 0,
        }
    }

    fn error(message: &str) -> WorkerLog {
        WorkerLog {
            level: WorkerLogLevel::Error,
            message: message.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_duplicates_on_no_op_ticks_suppressed() {
        let mut dedup = LogDeduper::new();
        assert!(matches!(dedup.observe("a", &info("waiting"), true), Emit::Line));
        assert!(matches!(
            dedup.observe("a", &info("waiting"), true),
            Emit::Suppress
        ));
        assert!(matches!(
            dedup.observe("a", &info("waiting"), true),
            Emit::Suppress
        ));
    }

    #[test]
    fn test_message_change_emits_summary() {
        let mut dedup = LogDeduper::new();
        dedup.observe("a", &info("waiting"), true);
        dedup.observe("a", &info("waiting"), true);
        dedup.observe("a", &info("waiting"), true);
        match dedup.observe("a", &info("working"), true) {
            Emit::SummaryThen(summary) => {
                assert_eq!(summary, "↻ (repeated 2x) waiting");
            }
            _ => panic!("expected summary"),
        }
    }

    #[test]
    fn test_non_info_interrupts_streak() {
        let mut dedup = LogDeduper::new();
        dedup.observe("a", &info("waiting"), true);
        dedup.observe("a", &info("waiting"), true);
        match dedup.observe("a", &error("boom"), true) {
            Emit::SummaryThen(summary) => assert!(summary.contains("repeated 1x")),
            _ => panic!("expected summary"),
        }
    }

    #[test]
    fn test_active_ticks_never_suppress() {
        let mut dedup = LogDeduper::new();
        assert!(matches!(dedup.observe("a", &info("msg"), false), Emit::Line));
        assert!(matches!(dedup.observe("a", &info("msg"), false), Emit::Line));
    }

    #[test]
    fn test_agents_tracked_independently() {
        let mut dedup = LogDeduper::new();
        dedup.observe("a", &info("waiting"), true);
        assert!(matches!(dedup.observe("b", &info("waiting"), true), Emit::Line));
    }
}
