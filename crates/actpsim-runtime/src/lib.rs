// Internal modules (not exposed to external crates)
pub(crate) mod dedup;
pub(crate) mod orchestrator;

// Public runtime interface
pub mod canvas;
pub mod config;
pub mod error;
pub mod jobs;
pub mod storage;
pub mod worker;

// Main facade and the types used as inputs/outputs in its API
pub use canvas::{AgentSpec, Canvas, ConnectionSpec};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use jobs::{JobQueue, MockBackend, ServiceBackend};
pub use worker::WorkerClient;
