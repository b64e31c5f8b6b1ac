use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use actpsim_runtime::{storage, Canvas};

use crate::output;

pub fn handle_run(
    scenario: &Path,
    ticks: u64,
    record: Option<PathBuf>,
    happy: bool,
    quiet: bool,
) -> Result<()> {
    let json = std::fs::read_to_string(scenario)
        .with_context(|| format!("failed to read scenario {}", scenario.display()))?;

    let mut canvas = Canvas::new();
    canvas
        .import_full_json(&json)
        .with_context(|| format!("failed to load scenario {}", scenario.display()))?;
    if happy {
        canvas.set_execution_mode(false);
    }

    if record.is_some() {
        canvas.start_recording();
    }

    canvas.start_runtime();
    let mut seen_events = canvas.state().events.len();
    for _ in 0..ticks {
        canvas.tick();
        if !quiet {
            // The feed drops from the front on overflow; clamp the cursor.
            let start = seen_events.min(canvas.state().events.len());
            for event in &canvas.state().events[start..] {
                output::print_event(event);
            }
        }
        seen_events = canvas.state().events.len();
    }
    canvas.stop_runtime();

    if let Some(path) = record {
        let log = canvas
            .stop_recording()
            .context("recording was not active")?;
        storage::save_event_log(&path, &log)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!(
            "recorded {} events over {} ticks to {}",
            log.metadata.total_events,
            log.metadata.total_ticks,
            path.display()
        );
    }

    output::print_summary(canvas.state());
    Ok(())
}
