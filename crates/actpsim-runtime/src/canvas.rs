//! The `Canvas` facade: single owner of state, dispatch and the event
//! log, and the command surface consumed by view layers.
//!
//! Every mutation funnels through `dispatch`, which records the action
//! (when a recording is active) and folds it into the state. The facade
//! is the system's one writer; workers and backends only ever see copies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use actpsim_engine::{
    export, reduce, Action, EventLog, Recorder, SessionSnapshot,
};
use actpsim_types::limits::is_valid_tick_interval;
use actpsim_types::{
    mint_id, next_prefixed_id, Agent, AgentKind, AgentStatus, CanvasState, Connection, EventDraft,
    Micro, Position, RuntimeMode, TxState,
};

use crate::config::RuntimeConfig;
use crate::dedup::LogDeduper;
use crate::error::{Error, Result};
use crate::jobs::{JobQueue, MockBackend, ServiceBackend};
use crate::worker::WorkerClient;

/// Everything needed to create an agent; the canvas mints the id.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub kind: AgentKind,
    pub icon: String,
    pub template_id: Option<String>,
    pub balance_micro: Micro,
    pub code: String,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            icon: String::new(),
            template_id: None,
            balance_micro: 0,
            code: String::new(),
        }
    }

    pub fn with_balance(mut self, balance_micro: Micro) -> Self {
        self.balance_micro = balance_micro;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

/// Everything needed to wire a transaction; the canvas mints the id.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub source_id: String,
    pub target_id: String,
    pub amount_micro: Micro,
    pub service: String,
}

pub struct Canvas {
    pub(crate) state: CanvasState,
    pub(crate) recorder: Option<Recorder>,
    pub(crate) queue: JobQueue,
    pub(crate) backend: Box<dyn ServiceBackend>,
    pub(crate) worker: WorkerClient,
    pub(crate) dedup: LogDeduper,
    abort: Arc<AtomicBool>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut state = CanvasState::new();
        state.tick_interval_ms = config.tick_interval_ms;
        Self {
            state,
            recorder: None,
            queue: JobQueue::new(),
            backend: Box::new(MockBackend),
            worker: WorkerClient::new(config.limits),
            dedup: LogDeduper::new(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn ServiceBackend>) -> Self {
        self.backend = backend;
        self
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub(crate) fn dispatch(&mut self, action: Action) {
        if let Some(recorder) = &mut self.recorder {
            recorder.observe(&self.state, &action);
        }
        self.state = reduce(&self.state, &action);
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.state.agents.get(id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.state.connections.get(id)
    }

    pub fn agent_connections(&self, id: &str) -> Vec<&Connection> {
        self.state
            .connections
            .values()
            .filter(|c| c.source_id == id || c.target_id == id)
            .collect()
    }

    pub fn agent_position(&self, id: &str) -> Option<Position> {
        self.state.positions.get(id).copied()
    }

    pub fn agent_state(&self, id: &str) -> Option<&Value> {
        self.state.agent_states.get(id)
    }

    // ------------------------------------------------------------------
    // Topology commands
    // ------------------------------------------------------------------

    pub fn add_agent(&mut self, spec: AgentSpec, position: Option<Position>) -> String {
        // Agent ids stay dense per prefix so imports with high tx suffixes
        // do not skip agent numbers.
        let id = next_prefixed_id("agent", self.state.agents.keys().map(String::as_str));
        let agent = Agent {
            id: id.clone(),
            name: spec.name,
            kind: spec.kind,
            icon: spec.icon,
            template_id: spec.template_id,
            balance_micro: spec.balance_micro,
            status: AgentStatus::Idle,
            code: spec.code,
        };
        self.dispatch(Action::AddAgent { agent, position });
        id
    }

    pub fn remove_agent(&mut self, id: &str) {
        self.dispatch(Action::RemoveAgent { id: id.to_string() });
    }

    pub fn update_agent_code(&mut self, id: &str, code: impl Into<String>) {
        self.dispatch(Action::UpdateAgentCode {
            id: id.to_string(),
            code: code.into(),
        });
    }

    pub fn update_agent_balance(&mut self, id: &str, balance_micro: Micro) {
        self.dispatch(Action::UpdateAgentBalance {
            id: id.to_string(),
            balance_micro,
        });
    }

    pub fn update_agent_status(&mut self, id: &str, status: AgentStatus) {
        self.dispatch(Action::UpdateAgentStatus {
            id: id.to_string(),
            status,
        });
    }

    pub fn update_agent_position(&mut self, id: &str, position: Position) {
        self.dispatch(Action::UpdateAgentPosition {
            id: id.to_string(),
            position,
        });
    }

    pub fn add_connection(&mut self, spec: ConnectionSpec) -> Result<String> {
        if spec.source_id == spec.target_id {
            return Err(Error::InvalidOperation(
                "a transaction cannot connect an agent to itself".to_string(),
            ));
        }
        if spec.amount_micro <= 0 {
            return Err(Error::InvalidOperation(
                "transaction amount must be a positive integer (micro-USDC)".to_string(),
            ));
        }
        for endpoint in [&spec.source_id, &spec.target_id] {
            if !self.state.agents.contains_key(endpoint) {
                return Err(Error::InvalidOperation(format!(
                    "unknown agent '{}'",
                    endpoint
                )));
            }
        }

        let mut counter = self.state.next_id_counter();
        let id = mint_id("tx", &mut counter);
        let connection = Connection::new(
            id.clone(),
            spec.source_id,
            spec.target_id,
            spec.amount_micro,
            spec.service,
            self.state.virtual_time_ms,
        );
        self.dispatch(Action::AddConnection { connection });
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: &str) {
        self.dispatch(Action::RemoveConnection { id: id.to_string() });
    }

    pub fn update_connection_amount(&mut self, id: &str, amount_micro: Micro) {
        self.dispatch(Action::UpdateConnectionAmount {
            id: id.to_string(),
            amount_micro,
        });
    }

    // ------------------------------------------------------------------
    // Selection / view commands
    // ------------------------------------------------------------------

    pub fn select_agent(&mut self, id: Option<&str>) {
        self.dispatch(Action::SelectAgent {
            id: id.map(String::from),
        });
    }

    pub fn toggle_inspector(&mut self) {
        self.dispatch(Action::ToggleInspector);
    }

    // ------------------------------------------------------------------
    // Runtime commands
    // ------------------------------------------------------------------

    pub fn start_runtime(&mut self) {
        self.dispatch(Action::StartRuntime);
    }

    pub fn stop_runtime(&mut self) {
        self.dispatch(Action::StopRuntime);
    }

    pub fn reset_runtime(&mut self) {
        self.request_abort();
        self.dispatch(Action::ResetRuntime);
        self.dedup.reset();
        self.queue = JobQueue::new();
        self.worker.reset();
        self.clear_abort();
    }

    pub fn reset_state(&mut self) {
        self.request_abort();
        self.dispatch(Action::ResetState);
        self.dedup.reset();
        self.queue = JobQueue::new();
        self.worker.reset();
        self.clear_abort();
    }

    pub fn set_runtime_mode(&mut self, mode: RuntimeMode) {
        self.dispatch(Action::SetRuntimeMode { mode });
    }

    pub fn set_execution_mode(&mut self, enabled: bool) {
        self.dispatch(Action::SetExecutionMode { enabled });
    }

    pub fn set_tick_interval(&mut self, ms: u64) -> Result<()> {
        if !is_valid_tick_interval(ms) {
            return Err(Error::InvalidOperation(format!(
                "tick interval {} ms is not one of the selectable speeds",
                ms
            )));
        }
        self.dispatch(Action::SetTickInterval { ms });
        Ok(())
    }

    /// One user-driven step, regardless of `is_running`.
    pub fn step_once(&mut self) {
        self.tick();
    }

    pub fn append_event(&mut self, event: EventDraft) {
        self.dispatch(Action::AppendEvent { event });
    }

    // ------------------------------------------------------------------
    // Single-transition commands (UI inspector surface)
    // ------------------------------------------------------------------

    /// Apply one explicit transition with escrow accounting against a
    /// fresh balance snapshot.
    pub fn update_connection_state(&mut self, id: &str, to: TxState) -> Result<()> {
        let mut balances = actpsim_engine::BalanceSnapshot::capture(&self.state);
        let actions = actpsim_engine::plan_transition(&self.state, id, to, &mut balances)
            .map_err(|err| {
                self.dispatch(Action::AppendEvent {
                    event: EventDraft::error(err.to_string()).for_connection(id.to_string()),
                });
                Error::Engine(err)
            })?;
        for action in actions {
            self.dispatch(action);
        }
        Ok(())
    }

    /// The UI "Advance" control: one happy-path step.
    pub fn advance_connection(&mut self, id: &str) -> Result<()> {
        let mut balances = actpsim_engine::BalanceSnapshot::capture(&self.state);
        match actpsim_engine::plan_happy_step(&self.state, id, &mut balances) {
            Ok(Some(actions)) => {
                for action in actions {
                    self.dispatch(action);
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(Error::Engine(err)),
        }
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    /// Main-side job submission (agents submit through `ctx.services`
    /// with worker-minted ids instead).
    pub fn submit_job(&mut self, agent_id: &str, kind: &str, params: Value) -> Result<String> {
        if !self.state.agents.contains_key(agent_id) {
            return Err(Error::InvalidOperation(format!(
                "unknown agent '{}'",
                agent_id
            )));
        }
        let mut counter = self.state.next_id_counter().max(self.queue.max_id_suffix() + 1);
        let id = self.queue.submit(
            agent_id,
            kind,
            params,
            &mut counter,
            self.state.virtual_time_ms,
        )?;
        self.dispatch(Action::SetIdCounter { value: counter });
        Ok(id)
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.pending_count()
    }

    // ------------------------------------------------------------------
    // Abort hook
    // ------------------------------------------------------------------

    /// Shared flag checked by the orchestrator before applying worker
    /// results; flip it to discard in-flight work.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub(crate) fn should_abort(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    fn clear_abort(&self) {
        self.abort.store(false, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    pub fn start_recording(&mut self) {
        self.recorder = Some(Recorder::start(&self.state));
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn stop_recording(&mut self) -> Option<EventLog> {
        self.recorder.take().map(|r| r.finish(&self.state))
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Canonical topology JSON (sorted, no code).
    pub fn serialize_state(&self) -> Result<String> {
        export::topology_json(&self.state).map_err(Error::from)
    }

    /// Load a topology share, rehydrating code from templates.
    pub fn deserialize_state(
        &mut self,
        json: &str,
        resolve_code: &dyn Fn(&str) -> Option<String>,
    ) -> Result<()> {
        let topology: export::TopologyExport = serde_json::from_str(json)?;
        let loaded = export::import_topology(&topology, resolve_code);
        self.load_state(SessionSnapshot::capture(&loaded));
        Ok(())
    }

    pub fn export_full_json(&self) -> Result<String> {
        export::full_export_json(&self.state).map_err(Error::from)
    }

    pub fn import_full_json(&mut self, json: &str) -> Result<()> {
        let full: export::FullExport = serde_json::from_str(json)?;
        let loaded = export::import_full(&full);
        self.load_state(SessionSnapshot::capture(&loaded));
        Ok(())
    }

    pub fn load_state(&mut self, snapshot: SessionSnapshot) {
        self.request_abort();
        self.dispatch(Action::LoadState { snapshot });
        self.dedup.reset();
        self.queue = JobQueue::new();
        self.clear_abort();
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}
