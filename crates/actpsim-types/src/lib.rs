mod util;

pub mod agent;
pub mod connection;
pub mod error;
pub mod event;
pub mod job;
pub mod limits;
pub mod money;
pub mod state;
pub mod worker;

pub use agent::{Agent, AgentKind, AgentStatus};
pub use connection::{Connection, TxState};
pub use error::{Error, Result};
pub use event::{EventDraft, EventLevel, RuntimeEvent};
pub use job::{JobStatus, ServiceJob};
pub use money::Micro;
pub use state::{CanvasState, Position, RuntimeMode};
pub use worker::{
    ExecuteRequest, ExecuteResult, JobSpec, ResourceLimits, TxSpec, WorkerError, WorkerErrorKind,
    WorkerLog, WorkerLogLevel, WorkerOp, WorkerRequest, WorkerResponse,
};

pub use util::*;

/// Allocate the next id for a prefix and advance the counter.
///
/// All prefixes (`agent-`, `tx-`, `job-`, `event-`) share one counter, so
/// per-prefix monotonicity follows from global monotonicity.
pub fn mint_id(prefix: &str, counter: &mut u64) -> String {
    let id = format!("{}-{}", prefix, counter);
    *counter += 1;
    id
}

/// Numeric suffix of a `prefix-N` id, if it has one.
pub fn numeric_suffix(id: &str) -> Option<u64> {
    id.rsplit_once('-')?.1.parse().ok()
}

/// Largest numeric suffix across a set of ids (0 when none parse).
pub fn max_numeric_suffix<'a>(ids: impl Iterator<Item = &'a str>) -> u64 {
    ids.filter_map(numeric_suffix).max().unwrap_or(0)
}

/// Next id for `prefix` considering only existing ids of that prefix.
///
/// Used for main-side agent creation, where ids stay dense per prefix;
/// worker-side minting draws from the shared counter instead.
pub fn next_prefixed_id<'a>(prefix: &str, ids: impl Iterator<Item = &'a str>) -> String {
    let lead = format!("{}-", prefix);
    let max = ids
        .filter(|id| id.starts_with(&lead))
        .filter_map(numeric_suffix)
        .max()
        .unwrap_or(0);
    format!("{}-{}", prefix, max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_advances_counter() {
        let mut counter = 7;
        assert_eq!(mint_id("tx", &mut counter), "tx-7");
        assert_eq!(mint_id("job", &mut counter), "job-8");
        assert_eq!(counter, 9);
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("agent-12"), Some(12));
        assert_eq!(numeric_suffix("tx-0"), Some(0));
        assert_eq!(numeric_suffix("no-suffix-x"), None);
        assert_eq!(numeric_suffix("bare"), None);
    }

    #[test]
    fn test_max_numeric_suffix() {
        let ids = ["agent-7", "tx-12", "garbage"];
        assert_eq!(max_numeric_suffix(ids.iter().copied()), 12);
        assert_eq!(max_numeric_suffix([].iter().copied()), 0);
    }

    #[test]
    fn test_next_prefixed_id_ignores_other_prefixes() {
        let ids = ["agent-7", "tx-12"];
        assert_eq!(next_prefixed_id("agent", ids.iter().copied()), "agent-8");
        assert_eq!(next_prefixed_id("job", ids.iter().copied()), "job-1");
    }
}
