//! The `ctx` capability object exposed to agent code.
//!
//! Every callable queues a `WorkerOp` into the run's op list instead of
//! touching host state; identity and transaction snapshots are read-only
//! copies. Ids minted here come from the request's counter, which the
//! orchestrator reconciles and persists after the run.

use std::sync::{Arc, Mutex};

use rhai::{Array, Dynamic, Engine, Map};
use serde_json::Value;

use actpsim_types::{
    mint_id, truncate, ExecuteRequest, JobSpec, ResourceLimits, TxSpec, WorkerLog, WorkerLogLevel,
    WorkerOp,
};

use crate::validate::{
    optional_duration, optional_string, require_amount, require_state, require_string,
    require_tx_id, stringify, validation_error, ValidateResult,
};

/// Output of one run, read back after the script completes.
pub struct CtxOutput {
    pub ops: Vec<WorkerOp>,
    pub logs: Vec<WorkerLog>,
    pub state: Dynamic,
    pub id_counter: u64,
}

struct CtxInner {
    agent_id: String,
    agent_name: String,
    agent_type: &'static str,
    balance: i64,
    virtual_time_ms: u64,
    incoming: Array,
    outgoing: Array,
    state: Dynamic,
    ops: Vec<WorkerOp>,
    logs: Vec<WorkerLog>,
    logs_truncated: bool,
    id_counter: u64,
    limits: ResourceLimits,
}

impl CtxInner {
    fn push_log(&mut self, level: WorkerLogLevel, message: String) {
        if self.logs.len() >= self.limits.max_console_lines {
            if !self.logs_truncated {
                self.logs_truncated = true;
                self.logs.push(WorkerLog {
                    level: WorkerLogLevel::Warn,
                    message: format!(
                        "log limit reached ({}); further logs dropped",
                        self.limits.max_console_lines
                    ),
                    timestamp: self.virtual_time_ms,
                });
            }
            return;
        }
        self.logs.push(WorkerLog {
            level,
            message: truncate(&message, self.limits.max_log_message_chars),
            timestamp: self.virtual_time_ms,
        });
    }

    fn push_op(&mut self, op: WorkerOp) -> ValidateResult<()> {
        if self.ops.len() >= self.limits.max_ops {
            return validation_error(format!(
                "ResourceError: op limit exceeded (at most {} ops per run)",
                self.limits.max_ops
            ));
        }
        self.ops.push(op);
        Ok(())
    }

    fn mint(&mut self, prefix: &str) -> String {
        mint_id(prefix, &mut self.id_counter)
    }
}

/// Handle stored in the script scope as the global `ctx`.
#[derive(Clone)]
pub struct Ctx {
    inner: Arc<Mutex<CtxInner>>,
}

/// `ctx.services`, the job-submission sub-surface.
#[derive(Clone)]
pub struct Services {
    inner: Arc<Mutex<CtxInner>>,
}

impl Ctx {
    /// Build the per-run context from an execute request.
    ///
    /// Persistent state that is not a plain object (including absent
    /// state) starts as an empty map; the main side never stores anything
    /// else.
    pub fn build(request: &ExecuteRequest, limits: &ResourceLimits) -> Self {
        let state = crate::state::to_vm(&request.persistent_state);

        let to_array = |connections: &[actpsim_types::Connection]| -> Array {
            connections
                .iter()
                .filter_map(|conn| rhai::serde::to_dynamic(conn).ok())
                .collect()
        };

        let agent_type = match request.agent.kind {
            actpsim_types::AgentKind::Requester => "requester",
            actpsim_types::AgentKind::Provider => "provider",
            actpsim_types::AgentKind::Validator => "validator",
        };

        Self {
            inner: Arc::new(Mutex::new(CtxInner {
                agent_id: request.agent.id.clone(),
                agent_name: request.agent.name.clone(),
                agent_type,
                balance: request.agent.balance_micro,
                virtual_time_ms: request.virtual_time_ms,
                incoming: to_array(&request.incoming_transactions),
                outgoing: to_array(&request.transactions),
                state,
                ops: Vec::new(),
                logs: Vec::new(),
                logs_truncated: false,
                id_counter: request.id_counter,
                limits: *limits,
            })),
        }
    }

    pub fn push_info(&self, message: String) {
        self.lock().push_log(WorkerLogLevel::Info, message);
    }

    pub fn push_warn(&self, message: String) {
        self.lock().push_log(WorkerLogLevel::Warn, message);
    }

    /// Snapshot the run output. Called once, after execution.
    pub fn output(&self) -> CtxOutput {
        let inner = self.lock();
        CtxOutput {
            ops: inner.ops.clone(),
            logs: inner.logs.clone(),
            state: inner.state.clone(),
            id_counter: inner.id_counter,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CtxInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Register the `ctx` surface on a fresh engine.
pub fn register(engine: &mut Engine) {
    engine.register_type_with_name::<Ctx>("Ctx");
    engine.register_type_with_name::<Services>("Services");

    // Identity (read-only copies)
    engine.register_get("agentId", |ctx: &mut Ctx| ctx.lock().agent_id.clone());
    engine.register_get("agentName", |ctx: &mut Ctx| ctx.lock().agent_name.clone());
    engine.register_get("agentType", |ctx: &mut Ctx| {
        ctx.lock().agent_type.to_string()
    });
    engine.register_get("balance", |ctx: &mut Ctx| ctx.lock().balance);

    // Introspection (read-only snapshots, terminal states included)
    engine.register_get("incomingTransactions", |ctx: &mut Ctx| {
        ctx.lock().incoming.clone()
    });
    engine.register_get("transactions", |ctx: &mut Ctx| ctx.lock().outgoing.clone());

    // Persistent state, replaced wholesale on return
    engine.register_get("state", |ctx: &mut Ctx| ctx.lock().state.clone());
    engine.register_set("state", |ctx: &mut Ctx, value: Dynamic| {
        ctx.lock().state = value;
    });

    // Logging
    engine.register_fn("log", |ctx: &mut Ctx, message: Dynamic| {
        let message = stringify(&message);
        ctx.lock().push_log(WorkerLogLevel::Info, message);
    });
    engine.register_fn("warn", |ctx: &mut Ctx, message: Dynamic| {
        let message = stringify(&message);
        ctx.lock().push_log(WorkerLogLevel::Warn, message);
    });
    engine.register_fn("error", |ctx: &mut Ctx, message: Dynamic| {
        let message = stringify(&message);
        ctx.lock().push_log(WorkerLogLevel::Error, message);
    });

    // State transitions
    engine.register_fn(
        "createTransaction",
        |ctx: &mut Ctx, params: Map| -> ValidateResult<String> {
            let provider = require_string(&params, "provider")?;
            let amount_micro = require_amount(&params, "amountMicro")?;
            let service = require_string(&params, "service")?;
            let deadline_ms = optional_duration(&params, "deadlineMs")?;

            let mut inner = ctx.lock();
            if provider == inner.agent_id {
                return validation_error(
                    "ValidationError for provider: cannot create a transaction with yourself"
                        .to_string(),
                );
            }
            let id = inner.mint("tx");
            inner.push_op(WorkerOp::CreateTx {
                tx: TxSpec {
                    id: id.clone(),
                    provider,
                    amount_micro,
                    service,
                    deadline_ms,
                },
            })?;
            Ok(id)
        },
    );

    engine.register_fn(
        "transitionState",
        |ctx: &mut Ctx, tx_id: &str, new_state: &str| -> ValidateResult<()> {
            let tx_id = require_tx_id(tx_id, "txId")?;
            let state = require_state(new_state)?;
            ctx.lock()
                .push_op(WorkerOp::TransitionState { tx_id, state })
        },
    );

    engine.register_fn(
        "releaseEscrow",
        |ctx: &mut Ctx, tx_id: &str| -> ValidateResult<()> {
            let tx_id = require_tx_id(tx_id, "txId")?;
            ctx.lock().push_op(WorkerOp::ReleaseEscrow { tx_id })
        },
    );

    engine.register_fn(
        "initiateDispute",
        |ctx: &mut Ctx, tx_id: &str, reason: &str| -> ValidateResult<()> {
            let tx_id = require_tx_id(tx_id, "txId")?;
            if reason.is_empty() {
                return validation_error(
                    "ValidationError for reason: must be a non-empty string".to_string(),
                );
            }
            ctx.lock().push_op(WorkerOp::Dispute {
                tx_id,
                reason: reason.to_string(),
            })
        },
    );

    engine.register_fn(
        "cancelTransaction",
        |ctx: &mut Ctx, tx_id: &str| -> ValidateResult<()> {
            let tx_id = require_tx_id(tx_id, "txId")?;
            ctx.lock().push_op(WorkerOp::Cancel { tx_id })
        },
    );

    // Services
    engine.register_get("services", |ctx: &mut Ctx| Services {
        inner: ctx.inner.clone(),
    });
    engine.register_fn(
        "translate",
        |services: &mut Services, params: Map| -> ValidateResult<String> {
            let text = require_string(&params, "text")?;
            let to = require_string(&params, "to")?;
            let from = optional_string(&params, "from")?;

            let mut json = serde_json::Map::new();
            json.insert("text".to_string(), Value::String(text));
            json.insert("to".to_string(), Value::String(to));
            if let Some(from) = from {
                json.insert("from".to_string(), Value::String(from));
            }

            let mut inner = services
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let id = inner.mint("job");
            inner.push_op(WorkerOp::SubmitJob {
                job: JobSpec {
                    id: id.clone(),
                    service: "translate".to_string(),
                    params: Value::Object(json),
                },
            })?;
            Ok(id)
        },
    );
}
