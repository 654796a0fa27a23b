//! Agora scenario runner
//!
//! ```bash
//! agora-sim sync --failures 3 --events 20
//! agora-sim rank --candidates 100 --top 5 --seed 42
//! agora-sim tiers --referrals 10 --months 6 --json
//! RUST_LOG=debug agora-sim --pretty rank
//! ```

use std::process::ExitCode;
use std::time::Duration;

use agora_logging::{AgoraSubscriberBuilder, LogConfig};
use agora_referral::RepeatPolicy;
use agora_simulation::scenarios::{
    RankScenario, SyncScenario, TierScenario, is_success, run_rank, run_sync, run_tiers,
};
use agora_sync::ReconnectPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "agora-sim",
    about = "Run Agora sync, ranking, and referral scenarios in process",
    version
)]
struct Cli {
    /// Use pretty console logs instead of JSONL
    #[arg(short, long, global = true)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    level: String,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flaky feed with offline events replayed on reconnect
    Sync {
        /// Subscribe calls that fail before the feed recovers
        #[arg(short, long, default_value = "3")]
        failures: u32,

        /// Events emitted while disconnected
        #[arg(short, long, default_value = "10")]
        events: usize,

        /// Changes pushed once connected
        #[arg(long, default_value = "3")]
        live: usize,

        /// Offline queue capacity
        #[arg(long, default_value = "100")]
        capacity: usize,

        /// First retry delay in milliseconds
        #[arg(long, default_value = "100")]
        base_delay_ms: u64,

        /// Retries before giving up
        #[arg(long, default_value = "5")]
        max_attempts: u32,
    },

    /// Rank synthetic candidates with a debug breakdown
    Rank {
        #[arg(short, long, default_value = "50")]
        candidates: usize,

        #[arg(short, long, default_value = "8")]
        sellers: usize,

        /// Results to keep and break down
        #[arg(short, long, default_value = "10")]
        top: usize,

        #[arg(long, default_value = "7")]
        seed: u64,

        /// Simulate a referral store outage during ranking
        #[arg(long)]
        outage: bool,
    },

    /// Award sequence showing tier progression
    Tiers {
        #[arg(short, long, default_value = "6")]
        referrals: usize,

        #[arg(short, long, default_value = "3")]
        months: u32,

        #[arg(long, value_enum, default_value_t = Policy::Monthly)]
        policy: Policy,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Monthly activity at most once per calendar month
    Monthly,
    /// Every monthly activity claim is credited
    Unconstrained,
}

impl From<Policy> for RepeatPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Monthly => RepeatPolicy::OncePerCalendarMonth,
            Policy::Unconstrained => RepeatPolicy::Unconstrained,
        }
    }
}

fn emit<R: Serialize + std::fmt::Display>(report: &R, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Sync {
            failures,
            events,
            live,
            capacity,
            base_delay_ms,
            max_attempts,
        } => {
            let scenario = SyncScenario {
                initial_failures: failures,
                offline_events: events,
                live_changes: live,
                queue_capacity: capacity,
                reconnect: ReconnectPolicy::new(Duration::from_millis(base_delay_ms), max_attempts),
            };
            let report = run_sync(&scenario).await?;
            emit(&report, cli.json)?;
            Ok(is_success(&report))
        }
        Commands::Rank {
            candidates,
            sellers,
            top,
            seed,
            outage,
        } => {
            let scenario = RankScenario {
                candidates,
                sellers,
                top,
                seed,
                lookup_outage: outage,
            };
            let report = run_rank(&scenario).await?;
            emit(&report, cli.json)?;
            Ok(true)
        }
        Commands::Tiers {
            referrals,
            months,
            policy,
        } => {
            let scenario = TierScenario {
                referrals,
                months,
                policy: policy.into(),
            };
            let report = run_tiers(&scenario).await?;
            emit(&report, cli.json)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = if cli.pretty {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    let _guard = AgoraSubscriberBuilder::new()
        .with_config(config)
        .with_level(cli.level.clone())
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!(error = %e, "Scenario failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
