//! One fresh, short-lived VM per execute request.
//!
//! The engine is rebuilt for every call so no state leaks between runs.
//! Three caps guard execution: a cooperative interrupt (wall-clock
//! deadline plus the host kill flag, checked on the VM's progress hook),
//! a call-depth cap standing in for the stack budget, and size caps on
//! strings, arrays and maps standing in for the memory budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rhai::{Engine, EvalAltResult, Scope};

use actpsim_types::{
    ExecuteRequest, ExecuteResult, ResourceLimits, WorkerError, WorkerErrorKind, WorkerLog,
    WorkerLogLevel,
};

use crate::ctx::{self, Ctx};
use crate::state::{self, StateCheck};
use crate::validate::{validation_error, ValidateResult};
use crate::{analysis, scan};

pub struct Executor {
    limits: ResourceLimits,
    kill: Arc<AtomicBool>,
}

impl Executor {
    pub fn new(limits: ResourceLimits) -> Self {
        Self::with_kill_flag(limits, Arc::new(AtomicBool::new(false)))
    }

    /// Build with an externally owned kill flag, so the worker client can
    /// interrupt a stuck VM after abandoning the thread.
    pub fn with_kill_flag(limits: ResourceLimits, kill: Arc<AtomicBool>) -> Self {
        Self { limits, kill }
    }

    /// The flag the worker client flips when the hard kill-switch fires.
    pub fn kill_flag(&self) -> Arc<AtomicBool> {
        self.kill.clone()
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Execute one agent script to completion.
    ///
    /// Never returns Err: every failure mode is classified into the
    /// result so it poisons exactly this run.
    pub fn execute(&self, request: &ExecuteRequest) -> ExecuteResult {
        if let Some(construct) = scan::find_forbidden(&request.code) {
            return ExecuteResult::failure(
                request.request_id,
                WorkerError::new(
                    WorkerErrorKind::Validation,
                    scan::forbidden_message(construct),
                ),
                request.id_counter,
                Vec::new(),
            );
        }

        let ctx = Ctx::build(request, &self.limits);
        for warning in analysis::analyze(&request.code) {
            ctx.push_warn(warning);
        }

        let engine = self.build_engine(&ctx);

        let ast = match engine.compile(&request.code) {
            Ok(ast) => ast,
            Err(parse_error) => {
                let line = parse_error.1.line();
                return ExecuteResult::failure(
                    request.request_id,
                    WorkerError::new(WorkerErrorKind::Syntax, parse_error.to_string())
                        .at_line(line),
                    request.id_counter,
                    ctx.output().logs,
                );
            }
        };

        let mut scope = Scope::new();
        scope.push("ctx", ctx.clone());
        let run = engine.run_ast_with_scope(&mut scope, &ast);
        drop(scope);

        let output = ctx.output();
        match run {
            Err(err) => {
                let error = classify(&err);
                ExecuteResult::failure(request.request_id, error, output.id_counter, output.logs)
            }
            Ok(()) => self.finish(request, output),
        }
    }

    fn build_engine(&self, ctx: &Ctx) -> Engine {
        let mut engine = Engine::new();
        ctx::register(&mut engine);

        engine.set_max_call_levels(self.limits.max_call_levels);
        engine.set_max_operations(self.limits.max_vm_operations);
        // Memory budget mapped onto the VM's per-value size caps: any
        // single string may use a tenth of the budget, collections are
        // bounded by element count.
        engine.set_max_string_size((self.limits.max_memory_bytes / 10) as usize);
        engine.set_max_array_size(65_536);
        engine.set_max_map_size(65_536);

        // System time is unavailable below the UI; virtual time reaches
        // agents through deadlines and log timestamps only.
        engine.register_fn("timestamp", || -> ValidateResult<()> {
            validation_error(
                "ValidationError: timestamp() is not available in agent code".to_string(),
            )
        });

        let sink = ctx.clone();
        engine.on_print(move |message| sink.push_info(message.to_string()));
        let sink = ctx.clone();
        engine.on_debug(move |message, _, _| sink.push_info(message.to_string()));

        let kill = self.kill.clone();
        let deadline = Instant::now() + Duration::from_millis(self.limits.max_execution_time_ms);
        engine.on_progress(move |_| {
            if kill.load(Ordering::Relaxed) || Instant::now() >= deadline {
                Some("timeout".into())
            } else {
                None
            }
        });

        engine
    }

    /// Read back `ctx.state`, bounds-check it, and assemble the success
    /// result. The depth walk runs before conversion so a self-nested
    /// state can never recurse the serde machinery off the host stack.
    fn finish(&self, request: &ExecuteRequest, output: ctx::CtxOutput) -> ExecuteResult {
        let mut logs = output.logs;
        let mut warn = |logs: &mut Vec<WorkerLog>, message: String| {
            logs.push(WorkerLog {
                level: WorkerLogLevel::Warn,
                message,
                timestamp: request.virtual_time_ms,
            });
        };

        let final_state = if output.state.is_map() {
            match state::inspect(&output.state, state::MAX_STATE_DEPTH) {
                StateCheck::TooDeep => {
                    return ExecuteResult::failure(
                        request.request_id,
                        WorkerError::new(
                            WorkerErrorKind::Resource,
                            format!(
                                "persistent state nesting exceeds {} levels",
                                state::MAX_STATE_DEPTH
                            ),
                        ),
                        output.id_counter,
                        logs,
                    );
                }
                StateCheck::NonFinite => {
                    warn(
                        &mut logs,
                        "ctx.state contains a non-finite number; keeping previous state"
                            .to_string(),
                    );
                    None
                }
                StateCheck::Pass => match state::from_vm(&output.state) {
                    Ok(value) => {
                        let size = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
                        if size > self.limits.max_state_bytes {
                            return ExecuteResult::failure(
                                request.request_id,
                                WorkerError::new(
                                    WorkerErrorKind::Resource,
                                    format!(
                                        "persistent state is {} bytes, exceeding the {} byte cap",
                                        size, self.limits.max_state_bytes
                                    ),
                                ),
                                output.id_counter,
                                logs,
                            );
                        }
                        Some(value)
                    }
                    Err(message) => {
                        warn(&mut logs, message);
                        None
                    }
                },
            }
        } else {
            warn(
                &mut logs,
                "ctx.state must be a plain object; keeping previous state".to_string(),
            );
            None
        };

        ExecuteResult {
            request_id: request.request_id,
            success: true,
            error: None,
            id_counter: output.id_counter,
            logs,
            ops: output.ops,
            final_state,
        }
    }
}

/// Map a VM error onto the worker error taxonomy.
fn classify(err: &EvalAltResult) -> WorkerError {
    let line = err.position().line();
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => {
            let error = classify(inner);
            // The inner position is usually the precise one; fall back to
            // the call site when it is absent.
            if error.line.is_some() {
                error
            } else {
                error.at_line(line)
            }
        }
        EvalAltResult::ErrorTerminated(..) | EvalAltResult::ErrorTooManyOperations(..) => {
            WorkerError::new(
                WorkerErrorKind::Timeout,
                "Execution exceeded the time budget and was interrupted",
            )
            .at_line(line)
        }
        EvalAltResult::ErrorStackOverflow(..) => WorkerError::new(
            WorkerErrorKind::Resource,
            "Call stack depth limit exceeded",
        )
        .at_line(line),
        EvalAltResult::ErrorDataTooLarge(..) => {
            WorkerError::new(WorkerErrorKind::Resource, err.to_string()).at_line(line)
        }
        EvalAltResult::ErrorRuntime(value, _) => {
            let message = value.to_string();
            let kind = if message.starts_with("ValidationError") {
                WorkerErrorKind::Validation
            } else if message.starts_with("ResourceError") {
                WorkerErrorKind::Resource
            } else {
                WorkerErrorKind::Runtime
            };
            WorkerError::new(kind, message).at_line(line)
        }
        other => WorkerError::new(WorkerErrorKind::Runtime, other.to_string()).at_line(line),
    }
}
