//! Loopwright CLI: the main entry point.
//!
//! `loopwright [MODE] [TASK]`
//!
//! Modes:
//! - `chat`      Plain prompting, no actions
//! - `weather`   Single-tool invocation
//! - `tools`     Multi-step tool loop (filesystem + shell)
//! - `react`     Reason-act-observe over every tool
//! - `plan`      Plan once, then execute
//! - `adaptive`  Plan, execute, replan on request (default)
//! - `wizard`    Interview the user, write a markdown report

use clap::Parser;
use loopwright_config::AppConfig;
use std::path::PathBuf;

mod progress;
mod runner;
mod scenario;

use scenario::Mode;

#[derive(Parser)]
#[command(
    name = "loopwright",
    about = "Loopwright — adaptive agent loop over tool-calling chat APIs",
    version,
    author
)]
struct Cli {
    /// Scenario to run
    #[arg(value_enum, default_value_t = Mode::Adaptive)]
    mode: Mode,

    /// Task for the agent (each mode has a default)
    task: Option<String>,

    /// Config file to use instead of ~/.loopwright/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ask before every action runs
    #[arg(long)]
    approve: bool,

    /// Enable verbose logging and progress output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    let scenario = cli.mode.scenario();
    let task = cli
        .task
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| scenario.default_task.to_string());

    runner::run(
        config,
        runner::RunRequest {
            mode: cli.mode,
            task,
            approve: cli.approve,
            verbose: cli.verbose,
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_adaptive() {
        let cli = Cli::try_parse_from(["loopwright"]).unwrap();
        assert_eq!(cli.mode, Mode::Adaptive);
        assert!(cli.task.is_none());
    }

    #[test]
    fn mode_and_task_are_positional() {
        let cli = Cli::try_parse_from(["loopwright", "weather", "weather in Sydney", "-v"]).unwrap();
        assert_eq!(cli.mode, Mode::Weather);
        assert_eq!(cli.task.as_deref(), Some("weather in Sydney"));
        assert!(cli.verbose);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["loopwright", "teleport"]).is_err());
    }
}
