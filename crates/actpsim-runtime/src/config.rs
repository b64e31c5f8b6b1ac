use actpsim_types::limits::{is_valid_tick_interval, DEFAULT_TICK_INTERVAL_MS};
use actpsim_types::ResourceLimits;

use crate::error::{Error, Result};

/// Runtime configuration: resource caps handed to the worker and the
/// initial tick interval.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub limits: ResourceLimits,
    pub tick_interval_ms: u64,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_tick_interval(self.tick_interval_ms) {
            return Err(Error::InvalidOperation(format!(
                "tick interval {} ms is not one of the selectable speeds",
                self.tick_interval_ms
            )));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}
