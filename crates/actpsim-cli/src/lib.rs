mod args;
mod handlers;
mod output;

use anyhow::Result;

pub use args::{Cli, Commands};

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            record,
            happy,
        } => handlers::handle_run(&scenario, ticks, record, happy, cli.quiet),
        Commands::Replay { log, verify } => handlers::handle_replay(&log, verify, cli.quiet),
        Commands::Export { scenario, output } => {
            handlers::handle_export(&scenario, output.as_deref())
        }
    }
}
