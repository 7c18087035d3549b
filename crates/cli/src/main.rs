//! nbfleet operator CLI
//!
//! A command-line tool for rendering course statistics served by the
//! monitor and for generating synthetic telemetry to exercise them.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{fake, stats};
use std::path::PathBuf;

/// nbfleet operator CLI
#[derive(Parser)]
#[command(name = "nbf")]
#[command(author, version, about = "CLI for the nbfleet container monitor", long_about = None)]
pub struct Cli {
    /// Monitor API endpoint (can also be set via NBF_API_URL env var)
    #[arg(long, env = "NBF_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Telemetry data root used by the fake generators
    #[arg(long, env = "NBFLEET_DATA_ROOT", default_value = "/var/lib/nbfleet")]
    pub data_root: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Course statistics replayed from the recorded telemetry
    #[command(subcommand)]
    Stats(StatsCommands),

    /// Synthetic telemetry for exercising the stats pages
    #[command(subcommand)]
    Fake(FakeCommands),
}

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Daily unique and new students/notebooks
    Daily {
        /// Course name
        course: String,
    },

    /// Monitor counters over time
    Counts {
        /// Course name
        course: String,
    },

    /// Notebook and student cross-usage
    Usage {
        /// Course name
        course: String,
    },
}

#[derive(Subcommand)]
pub enum FakeCommands {
    /// Write a synthetic events file
    Events {
        /// Course name
        course: String,

        /// Number of notebooks
        #[arg(long, short = 'n', default_value_t = 100)]
        notebooks: usize,

        /// Number of students
        #[arg(long, short = 's', default_value_t = 4000)]
        students: usize,

        /// Total number of events
        #[arg(long, short = 'e', default_value_t = 5000)]
        events: usize,

        /// Number of days of simulated data
        #[arg(long, short = 'd', default_value_t = 28)]
        days: u32,
    },

    /// Write a synthetic counts file
    Counts {
        /// Course name
        course: String,

        /// Sampling period in minutes
        #[arg(long, short = 'p', default_value_t = 10)]
        period: u32,

        /// Number of students
        #[arg(long, short = 's', default_value_t = 4000)]
        students: u64,

        /// Largest jump between two samples
        #[arg(long, short = 'D', default_value_t = 8)]
        delta: u32,

        /// Number of days of simulated data
        #[arg(long, short = 'd', default_value_t = 28)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats(stats_cmd) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            match stats_cmd {
                StatsCommands::Daily { course } => {
                    stats::daily(&client, &course, cli.format).await?;
                }
                StatsCommands::Counts { course } => {
                    stats::counts(&client, &course, cli.format).await?;
                }
                StatsCommands::Usage { course } => {
                    stats::usage(&client, &course, cli.format).await?;
                }
            }
        }
        Commands::Fake(fake_cmd) => match fake_cmd {
            FakeCommands::Events {
                course,
                notebooks,
                students,
                events,
                days,
            } => {
                fake::events(&cli.data_root, &course, notebooks, students, events, days)?;
            }
            FakeCommands::Counts {
                course,
                period,
                students,
                delta,
                days,
            } => {
                fake::counts(&cli.data_root, &course, period, students, delta, days)?;
            }
        },
    }

    Ok(())
}
