use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use actpsim_engine::replay::{canonical_state, replay_to_end};
use actpsim_engine::ReplayEngine;
use actpsim_runtime::storage;

use crate::output;

pub fn handle_replay(log_path: &Path, verify: bool, quiet: bool) -> Result<()> {
    let log = storage::load_event_log(log_path)
        .with_context(|| format!("failed to load {}", log_path.display()))?;

    println!(
        "replaying {} events ({} ticks, canvas {})",
        log.metadata.total_events, log.metadata.total_ticks, log.metadata.canvas_version
    );

    let mut engine = ReplayEngine::new(log.clone()).context("log failed validation")?;
    while let Some(event) = engine.step() {
        if !quiet {
            println!(
                "{:>6} {:>8}ms tick {:>3} {}",
                event.id,
                event.timestamp,
                event.tick,
                serde_json::to_value(&event.action)
                    .ok()
                    .and_then(|v| v.get("type").cloned())
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default()
            );
        }
    }
    let first = engine.into_state();

    if verify {
        let second = replay_to_end(log).context("second replay failed")?;
        if canonical_state(&first)? == canonical_state(&second)? {
            println!("{} two independent replays are bit-identical", "ok:".green());
        } else {
            anyhow::bail!("replay divergence: two replays of the same log differ");
        }
    }

    output::print_summary(&first);
    Ok(())
}
