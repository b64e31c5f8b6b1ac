//! Per-tick driver.
//!
//! Execution mode runs every agent's script in ascending id order,
//! applies the returned ops through the state machine, drains the service
//! queue, then advances the clock. Happy-path mode advances every
//! non-terminal connection one lifecycle step instead of executing code.
//! Either way the balance snapshot taken at tick start bounds escrow
//! commits for the whole tick.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use actpsim_engine::{plan_happy_step, plan_transition, Action, BalanceSnapshot};
use actpsim_types::{
    numeric_suffix, Agent, AgentStatus, Connection, EventDraft, EventLevel, ExecuteRequest,
    ExecuteResult, TxState, WorkerError, WorkerErrorKind, WorkerLog, WorkerLogLevel, WorkerOp,
};

use crate::canvas::Canvas;
use crate::dedup::Emit;
use crate::error::{Error, Result};

impl Canvas {
    /// Advance the simulation one tick in the current mode.
    pub fn tick(&mut self) {
        if self.should_abort() {
            return;
        }
        if self.state.execution_mode {
            self.tick_execution();
        } else {
            self.tick_happy();
        }
    }

    /// Run `n` ticks back to back (the headless auto-mode driver).
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            if self.should_abort() {
                return;
            }
            self.tick();
        }
    }

    /// Happy-path mode: no scripts, every live connection advances one
    /// step.
    fn tick_happy(&mut self) {
        let mut balances = BalanceSnapshot::capture(&self.state);
        let ids: Vec<String> = self.state.connections.keys().cloned().collect();
        for id in ids {
            match plan_happy_step(&self.state, &id, &mut balances) {
                Ok(Some(actions)) => {
                    for action in actions {
                        self.dispatch(action);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    self.dispatch(Action::AppendEvent {
                        event: EventDraft::error(err.to_string()).for_connection(id),
                    });
                }
            }
        }
        self.dispatch(Action::TickRuntime);
    }

    fn tick_execution(&mut self) {
        let agent_ids: Vec<String> = self.state.agents.keys().cloned().collect();
        let mut balances = BalanceSnapshot::capture(&self.state);
        let mut id_counter = self
            .state
            .next_id_counter()
            .max(self.queue.max_id_suffix() + 1);

        for agent_id in agent_ids {
            if self.should_abort() {
                return;
            }
            let agent = match self.state.agents.get(&agent_id) {
                Some(agent) => agent.clone(),
                None => continue,
            };
            if agent.code.trim().is_empty() {
                continue;
            }

            self.dispatch(Action::UpdateAgentStatus {
                id: agent_id.clone(),
                status: AgentStatus::Running,
            });

            let request = self.build_request(&agent, id_counter);
            let result = self.worker.execute(request);
            if self.should_abort() {
                // Stale result: the canvas moved on underneath us.
                return;
            }

            id_counter = id_counter.max(result.id_counter);
            self.emit_worker_logs(&agent_id, &result.logs, result.ops.is_empty());

            if !result.success {
                self.fail_agent(&agent_id, &result);
                continue;
            }

            // Persist the returned state first so deliverable hashing can
            // read what this run produced.
            if let Some(final_state) = result.final_state.clone() {
                self.dispatch(Action::SetAgentState {
                    id: agent_id.clone(),
                    state: final_state,
                });
            }

            let mut delivered = Vec::new();
            let mut op_failed = false;
            for op in &result.ops {
                match self.apply_op(&agent_id, op, &mut balances, &mut id_counter) {
                    Ok(newly_delivered) => delivered.extend(newly_delivered),
                    Err(err) => {
                        // All-or-nothing per agent: remaining ops are
                        // discarded, other agents continue untouched.
                        self.dispatch(Action::UpdateAgentStatus {
                            id: agent_id.clone(),
                            status: AgentStatus::Error,
                        });
                        self.dispatch(Action::AppendEvent {
                            event: EventDraft::error(format!(
                                "op application failed: {}",
                                err
                            ))
                            .for_agent(agent_id.clone()),
                        });
                        op_failed = true;
                        break;
                    }
                }
            }
            if op_failed {
                continue;
            }

            for conn_id in delivered {
                self.attach_deliverable_hash(&agent_id, &conn_id);
            }

            self.dispatch(Action::UpdateAgentStatus {
                id: agent_id.clone(),
                status: AgentStatus::Completed,
            });
        }

        self.drain_services();
        // Events minted during the tick may have advanced the shared
        // counter past the worker-side view; never rewind it.
        self.dispatch(Action::SetIdCounter {
            value: id_counter.max(self.state.id_counter),
        });
        self.dispatch(Action::TickRuntime);
    }

    fn build_request(&self, agent: &Agent, id_counter: u64) -> ExecuteRequest {
        let incoming: Vec<Connection> = self
            .state
            .connections
            .values()
            .filter(|c| c.target_id == agent.id)
            .cloned()
            .collect();
        let outgoing: Vec<Connection> = self
            .state
            .connections
            .values()
            .filter(|c| c.source_id == agent.id)
            .cloned()
            .collect();

        ExecuteRequest {
            request_id: 0,
            agent: agent.clone(),
            virtual_time_ms: self.state.virtual_time_ms,
            id_counter,
            incoming_transactions: incoming,
            transactions: outgoing,
            persistent_state: self
                .state
                .agent_states
                .get(&agent.id)
                .cloned()
                .unwrap_or(Value::Null),
            code: agent.code.clone(),
        }
    }

    fn fail_agent(&mut self, agent_id: &str, result: &ExecuteResult) {
        let error = result.error.clone().unwrap_or_else(|| {
            WorkerError::new(WorkerErrorKind::Runtime, "worker returned no error detail")
        });
        self.dispatch(Action::UpdateAgentStatus {
            id: agent_id.to_string(),
            status: AgentStatus::Error,
        });
        self.dispatch(Action::AppendEvent {
            event: EventDraft::error(format!("{} failed: {}", agent_id, error.message))
                .for_agent(agent_id.to_string())
                .with_payload(json!({
                    "kind": error.kind,
                    "line": error.line,
                })),
        });
    }

    /// Apply one worker op; returns connection ids that newly entered
    /// DELIVERED so the caller can hash deliverables afterwards.
    fn apply_op(
        &mut self,
        agent_id: &str,
        op: &WorkerOp,
        balances: &mut BalanceSnapshot,
        id_counter: &mut u64,
    ) -> Result<Vec<String>> {
        match op {
            WorkerOp::CreateTx { tx } => {
                if self.state.connections.contains_key(&tx.id) {
                    return Err(Error::InvalidOperation(format!(
                        "duplicate transaction id '{}'",
                        tx.id
                    )));
                }
                if !self.state.agents.contains_key(&tx.provider) {
                    return Err(Error::InvalidOperation(format!(
                        "unknown provider '{}'",
                        tx.provider
                    )));
                }
                if let Some(suffix) = numeric_suffix(&tx.id) {
                    *id_counter = (*id_counter).max(suffix + 1);
                }
                let connection = Connection::new(
                    tx.id.clone(),
                    agent_id,
                    tx.provider.clone(),
                    tx.amount_micro,
                    tx.service.clone(),
                    self.state.virtual_time_ms,
                );
                self.dispatch(Action::AddConnection { connection });
                self.dispatch(Action::AppendEvent {
                    event: EventDraft::info(format!(
                        "{} created {} -> {} for '{}'",
                        agent_id, tx.id, tx.provider, tx.service
                    ))
                    .for_agent(agent_id.to_string())
                    .for_connection(tx.id.clone())
                    .with_payload(json!({"amountMicro": tx.amount_micro})),
                });
                Ok(Vec::new())
            }

            WorkerOp::TransitionState { tx_id, state } => {
                self.transition_connection(tx_id, *state, balances)
            }
            WorkerOp::ReleaseEscrow { tx_id } => {
                self.transition_connection(tx_id, TxState::Settled, balances)
            }
            WorkerOp::Cancel { tx_id } => {
                self.transition_connection(tx_id, TxState::Cancelled, balances)
            }
            WorkerOp::Dispute { tx_id, reason } => {
                let delivered =
                    self.transition_connection(tx_id, TxState::Disputed, balances)?;
                self.dispatch(Action::AppendEvent {
                    event: EventDraft::warning(format!("{} disputed: {}", tx_id, reason))
                        .for_agent(agent_id.to_string())
                        .for_connection(tx_id.clone())
                        .with_payload(json!({"reason": reason})),
                });
                Ok(delivered)
            }

            WorkerOp::SubmitJob { job } => {
                self.queue.submit_with_id(
                    &job.id,
                    agent_id,
                    &job.service,
                    job.params.clone(),
                    self.state.virtual_time_ms,
                )?;
                if let Some(suffix) = numeric_suffix(&job.id) {
                    *id_counter = (*id_counter).max(suffix + 1);
                }
                Ok(Vec::new())
            }
        }
    }

    fn transition_connection(
        &mut self,
        conn_id: &str,
        to: TxState,
        balances: &mut BalanceSnapshot,
    ) -> Result<Vec<String>> {
        let hash_unset = self
            .state
            .connections
            .get(conn_id)
            .map(|c| c.deliverable_hash.is_none())
            .unwrap_or(false);

        let actions = plan_transition(&self.state, conn_id, to, balances)?;
        let newly_delivered = actions.iter().any(|action| {
            matches!(
                action,
                Action::UpdateConnectionState {
                    state: TxState::Delivered,
                    ..
                }
            )
        });
        for action in actions {
            self.dispatch(action);
        }

        if newly_delivered && hash_unset {
            Ok(vec![conn_id.to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    /// After a run whose ops delivered a connection, hash the provider's
    /// deliverable out of its persisted state. A missing deliverable is
    /// normal; a malformed one warns and never fails the agent.
    fn attach_deliverable_hash(&mut self, agent_id: &str, conn_id: &str) {
        let state = match self.state.agent_states.get(agent_id) {
            Some(state) => state,
            None => return,
        };

        let keyed = state.get("deliverables").and_then(|d| d.get(conn_id));
        let fallback = state.get("deliverable");
        let candidate = keyed.or(fallback);

        let deliverable = match candidate {
            Some(Value::String(text)) => text.clone(),
            Some(_) => {
                self.dispatch(Action::AppendEvent {
                    event: EventDraft::warning(format!(
                        "deliverable for {} is not a string; skipping hash",
                        conn_id
                    ))
                    .for_agent(agent_id.to_string())
                    .for_connection(conn_id.to_string()),
                });
                return;
            }
            None => return,
        };

        let mut hasher = Sha256::new();
        hasher.update(deliverable.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.dispatch(Action::UpdateConnectionHash {
            id: conn_id.to_string(),
            hash,
        });
    }

    fn emit_worker_logs(&mut self, agent_id: &str, logs: &[WorkerLog], no_op_tick: bool) {
        for log in logs {
            match self.dedup.observe(agent_id, log, no_op_tick) {
                Emit::Suppress => continue,
                Emit::SummaryThen(summary) => {
                    self.dispatch(Action::AppendEvent {
                        event: EventDraft::info(summary).for_agent(agent_id.to_string()),
                    });
                    self.emit_log_line(agent_id, log);
                }
                Emit::Line => self.emit_log_line(agent_id, log),
            }
        }
    }

    fn emit_log_line(&mut self, agent_id: &str, log: &WorkerLog) {
        let level = match log.level {
            WorkerLogLevel::Info => EventLevel::Info,
            WorkerLogLevel::Warn => EventLevel::Warning,
            WorkerLogLevel::Error => EventLevel::Error,
        };
        self.dispatch(Action::AppendEvent {
            event: EventDraft::new(level, log.message.clone()).for_agent(agent_id.to_string()),
        });
    }

    /// Between-ticks service drain: process pending jobs, copy results
    /// into owning agents' persistent state, purge the queue.
    fn drain_services(&mut self) {
        self.queue
            .drain(self.backend.as_ref(), self.state.virtual_time_ms);
        let finished = self.queue.take_finished();

        for job in finished {
            if !self.state.agents.contains_key(&job.agent_id) {
                continue;
            }
            let mut agent_state = match self.state.agent_states.get(&job.agent_id) {
                Some(Value::Object(map)) => map.clone(),
                _ => serde_json::Map::new(),
            };
            let jobs = agent_state
                .entry("jobs".to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(jobs) = jobs {
                jobs.insert(job.id.clone(), job.state_entry());
            }
            self.dispatch(Action::SetAgentState {
                id: job.agent_id.clone(),
                state: Value::Object(agent_state),
            });
        }
    }
}
