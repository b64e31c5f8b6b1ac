pub mod action;
pub mod error;
pub mod export;
pub mod log;
pub mod machine;
pub mod reducer;
pub mod replay;
pub mod snapshot;

pub use action::Action;
pub use error::{Error, Result};
pub use export::{FullExport, TopologyExport};
pub use log::{EventLog, InitialState, LogEvent, LogMetadata, Recorder};
pub use machine::{plan_happy_step, plan_transition, BalanceSnapshot};
pub use reducer::reduce;
pub use replay::{PlaybackState, ReplayEngine};
pub use snapshot::SessionSnapshot;
