//! Worker client: the request/response bridge to the sandboxed executor.
//!
//! One worker thread is pre-spawned on first use and handshaken with
//! INIT/READY. Every EXECUTE carries a request id; a hard kill-switch
//! timer sits above the worker-internal interrupt, and firing it abandons
//! the thread (its kill flag is set so the VM interrupts soon after) and
//! respawns a fresh worker. No heap is shared with the worker beyond the
//! kill flag; payloads cross the channel as plain data.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use actpsim_sandbox::Executor;
use actpsim_types::limits::KILL_SWITCH_MARGIN_MS;
use actpsim_types::{
    ExecuteRequest, ExecuteResult, ResourceLimits, WorkerError, WorkerErrorKind, WorkerRequest,
    WorkerResponse,
};

use crate::error::{Error, Result};

const INIT_TIMEOUT: Duration = Duration::from_secs(2);

struct WorkerThread {
    tx: Sender<WorkerRequest>,
    rx: Receiver<WorkerResponse>,
    kill: Arc<AtomicBool>,
    _handle: JoinHandle<()>,
}

pub struct WorkerClient {
    limits: ResourceLimits,
    slot: Option<WorkerThread>,
    next_request_id: u64,
}

impl WorkerClient {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            slot: None,
            next_request_id: 1,
        }
    }

    /// Execute one agent script, enforcing the hard kill-switch.
    ///
    /// Protocol failures degrade into classified failure results rather
    /// than errors: a poisoned run must never poison the tick.
    pub fn execute(&mut self, mut request: ExecuteRequest) -> ExecuteResult {
        request.request_id = self.next_request_id;
        self.next_request_id += 1;

        let request_id = request.request_id;
        let fallback_counter = request.id_counter;
        let budget =
            Duration::from_millis(self.limits.max_execution_time_ms + KILL_SWITCH_MARGIN_MS);

        let worker = match self.take_or_spawn() {
            Ok(worker) => worker,
            Err(err) => {
                return ExecuteResult::failure(
                    request_id,
                    WorkerError::new(WorkerErrorKind::Runtime, err.to_string()),
                    fallback_counter,
                    Vec::new(),
                )
            }
        };

        if worker.tx.send(WorkerRequest::Execute(request)).is_err() {
            return ExecuteResult::failure(
                request_id,
                WorkerError::new(WorkerErrorKind::Runtime, "worker channel closed"),
                fallback_counter,
                Vec::new(),
            );
        }

        loop {
            match worker.rx.recv_timeout(budget) {
                Ok(WorkerResponse::Result(result)) if result.request_id == request_id => {
                    self.slot = Some(worker);
                    return result;
                }
                // Stale result from an abandoned request; drain and keep
                // waiting for ours.
                Ok(WorkerResponse::Result(_)) | Ok(WorkerResponse::Ready) => continue,
                Ok(WorkerResponse::Fatal { message }) => {
                    return ExecuteResult::failure(
                        request_id,
                        WorkerError::new(
                            WorkerErrorKind::Runtime,
                            format!("worker fatal: {}", message),
                        ),
                        fallback_counter,
                        Vec::new(),
                    );
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Hard kill-switch: interrupt the stuck VM and abandon
                    // the thread; the next execute respawns.
                    worker.kill.store(true, Ordering::Relaxed);
                    return ExecuteResult::failure(
                        request_id,
                        WorkerError::new(
                            WorkerErrorKind::Timeout,
                            "Execution exceeded the hard time budget; worker terminated",
                        ),
                        fallback_counter,
                        Vec::new(),
                    );
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return ExecuteResult::failure(
                        request_id,
                        WorkerError::new(WorkerErrorKind::Runtime, "worker disconnected"),
                        fallback_counter,
                        Vec::new(),
                    );
                }
            }
        }
    }

    /// Hand the worker a fresh VM without respawning the thread.
    pub fn reset(&mut self) {
        if let Some(worker) = &self.slot {
            let _ = worker.tx.send(WorkerRequest::Reset);
        }
    }

    pub fn shutdown(&mut self) {
        self.slot = None;
    }

    fn take_or_spawn(&mut self) -> Result<WorkerThread> {
        match self.slot.take() {
            Some(worker) => Ok(worker),
            None => spawn_worker(self.limits),
        }
    }
}

/// Spawn the worker loop and complete the INIT/READY handshake.
fn spawn_worker(limits: ResourceLimits) -> Result<WorkerThread> {
    let (tx_req, rx_req) = channel::<WorkerRequest>();
    let (tx_res, rx_res) = channel::<WorkerResponse>();
    let kill = Arc::new(AtomicBool::new(false));
    let worker_kill = kill.clone();

    let handle = std::thread::Builder::new()
        .name("actpsim-worker".to_string())
        .spawn(move || worker_loop(rx_req, tx_res, worker_kill))
        .map_err(|err| Error::Worker(format!("failed to spawn worker thread: {}", err)))?;

    tx_req
        .send(WorkerRequest::Init { limits })
        .map_err(|_| Error::Worker("worker rejected INIT".to_string()))?;

    match rx_res.recv_timeout(INIT_TIMEOUT) {
        Ok(WorkerResponse::Ready) => Ok(WorkerThread {
            tx: tx_req,
            rx: rx_res,
            kill,
            _handle: handle,
        }),
        Ok(other) => Err(Error::Worker(format!(
            "unexpected handshake response: {:?}",
            other
        ))),
        Err(_) => Err(Error::Worker(
            "worker did not acknowledge INIT in time".to_string(),
        )),
    }
}

fn worker_loop(
    rx: Receiver<WorkerRequest>,
    tx: Sender<WorkerResponse>,
    kill: Arc<AtomicBool>,
) {
    let mut executor: Option<Executor> = None;

    while let Ok(request) = rx.recv() {
        match request {
            WorkerRequest::Init { limits } => {
                executor = Some(Executor::with_kill_flag(limits, kill.clone()));
                if tx.send(WorkerResponse::Ready).is_err() {
                    return;
                }
            }
            WorkerRequest::Reset => {
                if let Some(limits) = executor.as_ref().map(|e| *e.limits()) {
                    executor = Some(Executor::with_kill_flag(limits, kill.clone()));
                }
            }
            WorkerRequest::Execute(request) => {
                let Some(current) = &executor else {
                    let _ = tx.send(WorkerResponse::Fatal {
                        message: "EXECUTE before INIT".to_string(),
                    });
                    return;
                };
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| current.execute(&request)));
                let response = match outcome {
                    Ok(result) => WorkerResponse::Result(result),
                    Err(panic) => WorkerResponse::Fatal {
                        message: panic_message(panic),
                    },
                };
                let fatal = matches!(response, WorkerResponse::Fatal { .. });
                if tx.send(response).is_err() || fatal {
                    return;
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
