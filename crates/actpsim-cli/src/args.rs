use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "actpsim")]
#[command(about = "Deterministic ACTP canvas simulator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Suppress the per-event feed and print only the summary
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario for a number of ticks
    Run {
        /// Scenario file (full export JSON, code included)
        scenario: PathBuf,

        /// How many ticks to simulate
        #[arg(long, default_value_t = 10)]
        ticks: u64,

        /// Record the session and write the event log here
        #[arg(long)]
        record: Option<PathBuf>,

        /// Advance connections along the happy path instead of executing
        /// agent code
        #[arg(long)]
        happy: bool,
    },

    /// Replay a recorded event log and check determinism
    Replay {
        /// Event log produced by `run --record`
        log: PathBuf,

        /// Replay twice and compare final states
        #[arg(long)]
        verify: bool,
    },

    /// Print the canonical topology share for a scenario
    Export {
        /// Scenario file (full export JSON)
        scenario: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
