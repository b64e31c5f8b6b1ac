//! Bounded service job queue.
//!
//! Agents submit jobs synchronously during their tick and poll results
//! through `ctx.state.jobs`. Between ticks the orchestrator drains the
//! queue against a backend, then completed and failed jobs are written
//! back into the owning agent's persistent state and purged.

use serde_json::Value;

use actpsim_types::limits::{MAX_JOBS_PER_TICK, MAX_OUTPUT_CHARS, MAX_QUEUE_SIZE};
use actpsim_types::{mint_id, numeric_suffix, truncate, JobStatus, ServiceJob};

use crate::error::{Error, Result};

/// A service handler. The shipped backend is the deterministic mock;
/// external backends plug in through this seam.
pub trait ServiceBackend: Send {
    fn name(&self) -> &str;

    /// Handle one job; `Err` marks the job failed with the message.
    fn handle(&self, kind: &str, params: &Value) -> std::result::Result<String, String>;
}

/// Deterministic stand-in for the translation service:
/// `"[LANG] original text"`.
pub struct MockBackend;

impl ServiceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn handle(&self, kind: &str, params: &Value) -> std::result::Result<String, String> {
        match kind {
            "translate" => {
                let text = params
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing 'text' parameter".to_string())?;
                let to = params
                    .get("to")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing 'to' parameter".to_string())?;
                Ok(format!("[{}] {}", to.to_uppercase(), text))
            }
            other => Err(format!("unknown service kind '{}'", other)),
        }
    }
}

#[derive(Default)]
pub struct JobQueue {
    jobs: Vec<ServiceJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .count()
    }

    /// Main-side submission: the queue mints the job id.
    pub fn submit(
        &mut self,
        agent_id: &str,
        kind: &str,
        params: Value,
        id_counter: &mut u64,
        now: u64,
    ) -> Result<String> {
        let id = mint_id("job", id_counter);
        self.insert(ServiceJob::pending(id.clone(), kind, agent_id, params, now))?;
        Ok(id)
    }

    /// Worker-side submission with a caller-supplied deterministic id.
    /// A collision on the supplied id is fatal for the submitting run.
    pub fn submit_with_id(
        &mut self,
        id: &str,
        agent_id: &str,
        kind: &str,
        params: Value,
        now: u64,
    ) -> Result<()> {
        if self.jobs.iter().any(|job| job.id == id) {
            return Err(Error::Queue(format!("duplicate job id '{}'", id)));
        }
        self.insert(ServiceJob::pending(id, kind, agent_id, params, now))
    }

    fn insert(&mut self, job: ServiceJob) -> Result<()> {
        if self.jobs.len() >= MAX_QUEUE_SIZE {
            return Err(Error::Queue(format!(
                "job queue is full ({} jobs)",
                MAX_QUEUE_SIZE
            )));
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Process pending jobs against the backend, oldest first, capped per
    /// tick. Returns how many were processed.
    pub fn drain(&mut self, backend: &dyn ServiceBackend, now: u64) -> usize {
        let mut processed = 0;
        for job in &mut self.jobs {
            if processed >= MAX_JOBS_PER_TICK {
                break;
            }
            if job.status != JobStatus::Pending {
                continue;
            }
            match backend.handle(&job.kind, &job.params) {
                Ok(output) => {
                    job.status = JobStatus::Completed;
                    job.result = Some(truncate(&output, MAX_OUTPUT_CHARS));
                }
                Err(message) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(message);
                }
            }
            job.completed_at = Some(now);
            processed += 1;
        }
        processed
    }

    /// Remove completed and failed jobs from the queue and hand them to
    /// the caller for write-back into agent state.
    pub fn take_finished(&mut self) -> Vec<ServiceJob> {
        let mut finished = Vec::new();
        self.jobs.retain(|job| {
            if job.status == JobStatus::Pending {
                true
            } else {
                finished.push(job.clone());
                false
            }
        });
        finished
    }

    /// Largest numeric suffix among queued job ids, for counter resync.
    pub fn max_id_suffix(&self) -> u64 {
        self.jobs
            .iter()
            .filter_map(|job| numeric_suffix(&job.id))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_backend_is_deterministic() {
        let backend = MockBackend;
        let params = json!({"text": "hello world", "to": "es"});
        assert_eq!(
            backend.handle("translate", &params).unwrap(),
            "[ES] hello world"
        );
        assert_eq!(
            backend.handle("translate", &params).unwrap(),
            "[ES] hello world"
        );
    }

    #[test]
    fn test_unknown_kind_fails_job() {
        let mut queue = JobQueue::new();
        queue
            .submit_with_id("job-1", "agent-1", "summarize", json!({}), 0)
            .unwrap();
        queue.drain(&MockBackend, 2_000);
        let finished = queue.take_finished();
        assert_eq!(finished[0].status, JobStatus::Failed);
        assert!(finished[0].error.as_ref().unwrap().contains("summarize"));
    }

    #[test]
    fn test_duplicate_supplied_id_is_fatal() {
        let mut queue = JobQueue::new();
        queue
            .submit_with_id("job-1", "agent-1", "translate", json!({}), 0)
            .unwrap();
        let err = queue
            .submit_with_id("job-1", "agent-2", "translate", json!({}), 0)
            .unwrap_err();
        assert!(matches!(err, Error::Queue(_)));
    }

    #[test]
    fn test_queue_bound_enforced() {
        let mut queue = JobQueue::new();
        let mut counter = 1;
        for _ in 0..MAX_QUEUE_SIZE {
            queue
                .submit("agent-1", "translate", json!({}), &mut counter, 0)
                .unwrap();
        }
        assert!(queue
            .submit("agent-1", "translate", json!({}), &mut counter, 0)
            .is_err());
    }

    #[test]
    fn test_drain_caps_per_tick() {
        let mut queue = JobQueue::new();
        let mut counter = 1;
        for _ in 0..(MAX_JOBS_PER_TICK + 5) {
            queue
                .submit(
                    "agent-1",
                    "translate",
                    json!({"text": "x", "to": "fr"}),
                    &mut counter,
                    0,
                )
                .unwrap();
        }
        assert_eq!(queue.drain(&MockBackend, 2_000), MAX_JOBS_PER_TICK);
        assert_eq!(queue.pending_count(), 5);
    }

    #[test]
    fn test_output_truncated_with_marker() {
        struct Verbose;
        impl ServiceBackend for Verbose {
            fn name(&self) -> &str {
                "verbose"
            }
            fn handle(&self, _: &str, _: &Value) -> std::result::Result<String, String> {
                Ok("x".repeat(MAX_OUTPUT_CHARS + 100))
            }
        }

        let mut queue = JobQueue::new();
        queue
            .submit_with_id("job-1", "agent-1", "translate", json!({}), 0)
            .unwrap();
        queue.drain(&Verbose, 0);
        let finished = queue.take_finished();
        let result = finished[0].result.as_ref().unwrap();
        assert!(result.ends_with("...(truncated)"));
        assert!(result.len() < MAX_OUTPUT_CHARS + 100);
    }

    #[test]
    fn test_take_finished_purges_queue() {
        let mut queue = JobQueue::new();
        queue
            .submit_with_id(
                "job-1",
                "agent-1",
                "translate",
                json!({"text": "a", "to": "de"}),
                0,
            )
            .unwrap();
        queue
            .submit_with_id("job-2", "agent-1", "translate", json!({}), 0)
            .unwrap();
        queue.drain(&MockBackend, 4_000);

        let finished = queue.take_finished();
        assert_eq!(finished.len(), 2);
        assert!(queue.is_empty());
        assert_eq!(finished[0].status, JobStatus::Completed);
        assert_eq!(finished[0].completed_at, Some(4_000));
        assert_eq!(finished[1].status, JobStatus::Failed);
    }
}
