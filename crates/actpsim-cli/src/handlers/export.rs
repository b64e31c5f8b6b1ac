use std::path::Path;

use anyhow::{Context, Result};

use actpsim_runtime::Canvas;

pub fn handle_export(scenario: &Path, output: Option<&Path>) -> Result<()> {
    let json = std::fs::read_to_string(scenario)
        .with_context(|| format!("failed to read scenario {}", scenario.display()))?;

    let mut canvas = Canvas::new();
    canvas
        .import_full_json(&json)
        .with_context(|| format!("failed to load scenario {}", scenario.display()))?;

    let topology = canvas.serialize_state().context("serialization failed")?;
    match output {
        Some(path) => {
            std::fs::write(path, &topology)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote topology share to {}", path.display());
        }
        None => println!("{}", topology),
    }
    Ok(())
}
