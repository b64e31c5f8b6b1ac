//! Event feed and summary rendering.

use owo_colors::OwoColorize;

use actpsim_types::money::format_usd;
use actpsim_types::{CanvasState, EventLevel, RuntimeEvent};

pub fn print_event(event: &RuntimeEvent) {
    let tag = match event.level {
        EventLevel::Info => "info".dimmed().to_string(),
        EventLevel::Success => "ok".green().to_string(),
        EventLevel::Warning => "warn".yellow().to_string(),
        EventLevel::Error => "error".red().to_string(),
    };
    let source = event
        .agent_id
        .as_deref()
        .or(event.connection_id.as_deref())
        .unwrap_or("-");
    println!(
        "{:>10}ms {:>5} {:<10} {}",
        event.timestamp, tag, source, event.message
    );
}

pub fn print_summary(state: &CanvasState) {
    println!();
    println!(
        "{} tick {} at {} ms, {} agents, {} connections",
        "final:".bold(),
        state.tick,
        state.virtual_time_ms,
        state.agents.len(),
        state.connections.len()
    );
    for agent in state.agents.values() {
        println!(
            "  {:<10} {:<12} {:>12}",
            agent.id,
            agent.name,
            format_usd(agent.balance_micro)
        );
    }
    for conn in state.connections.values() {
        let hash = conn
            .deliverable_hash
            .as_deref()
            .map(|h| format!("  #{}", &h[..12.min(h.len())]))
            .unwrap_or_default();
        println!(
            "  {:<10} {} -> {} {} {}{}",
            conn.id,
            conn.source_id,
            conn.target_id,
            conn.state,
            format_usd(conn.amount_micro),
            hash
        );
    }
}
