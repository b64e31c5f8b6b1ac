//! Versioned JSON documents on disk: event logs and full exports.

use std::fs;
use std::path::Path;

use actpsim_engine::export::{FullExport, EXPORT_VERSION};
use actpsim_engine::log::LOG_VERSION;
use actpsim_engine::EventLog;

use crate::error::{Error, Result};

pub fn save_event_log(path: &Path, log: &EventLog) -> Result<()> {
    let json = serde_json::to_string_pretty(log)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_event_log(path: &Path) -> Result<EventLog> {
    let json = fs::read_to_string(path)?;
    let log: EventLog = serde_json::from_str(&json)?;
    if log.version != LOG_VERSION {
        return Err(Error::Storage(format!(
            "{}: unsupported log version {} (expected {})",
            path.display(),
            log.version,
            LOG_VERSION
        )));
    }
    Ok(log)
}

pub fn save_export(path: &Path, export: &FullExport) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_export(path: &Path) -> Result<FullExport> {
    let json = fs::read_to_string(path)?;
    let export: FullExport = serde_json::from_str(&json)?;
    if export.version != EXPORT_VERSION {
        return Err(Error::Storage(format!(
            "{}: unsupported export version {} (expected {})",
            path.display(),
            export.version,
            EXPORT_VERSION
        )));
    }
    Ok(export)
}
