//! Headless sandbox runner.
//!
//! Plays the decision engine against the sandbox world without a game
//! client. Metrics go to stdout or a results directory; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # One session with the default agent
//! cargo run -p agent_headless -- run
//!
//! # A batch of sessions, saved to results/batch_results.json
//! cargo run -p agent_headless -- run --games 100 --parallel 8 --output results
//!
//! # Check that a seed replays identically
//! cargo run -p agent_headless -- verify --seed 12345 --runs 3
//!
//! # Label counts of a flushed sample log, optionally rebalanced
//! cargo run -p agent_headless -- inspect --file train_data/session-7-20160.bin --balanced out.bin
//!
//! # Check configuration files without playing
//! cargo run -p agent_headless -- validate --config agent.ron --sandbox sandbox.ron
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agent_core::config::AgentConfig;
use agent_core::tactics::ActionChoice;
use agent_core::training::TrainingLog;
use agent_headless::{
    run_batch, verify_determinism, BatchConfig, HeadlessError, Result, SandboxConfig,
    SessionRunner,
};

#[derive(Parser)]
#[command(name = "agent_headless")]
#[command(about = "Headless sandbox runner for the strategy decision engine")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one session, or a batch with --games
    Run {
        /// Agent configuration (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sandbox configuration (RON)
        #[arg(short, long)]
        sandbox: Option<PathBuf>,

        /// Agent seed (first seed of a batch)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of sessions
        #[arg(short, long, default_value = "1")]
        games: u32,

        /// Maximum parallel sessions (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for batch results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Session length limit in game minutes
        #[arg(long)]
        max_minutes: Option<u32>,

        /// Game loops between agent ticks
        #[arg(long, default_value = "8")]
        step_loops: u64,
    },

    /// Verify determinism by playing the same seed several times
    Verify {
        /// Agent configuration (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sandbox configuration (RON)
        #[arg(short, long)]
        sandbox: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },

    /// Show label counts of a training sample log
    Inspect {
        /// Sample log written by a won session
        #[arg(short, long)]
        file: PathBuf,

        /// Write a copy balanced to the rarest label here
        #[arg(long)]
        balanced: Option<PathBuf>,
    },

    /// Check configuration files without playing
    Validate {
        /// Agent configuration (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sandbox configuration (RON)
        #[arg(short, long)]
        sandbox: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            sandbox,
            seed,
            games,
            parallel,
            output,
            max_minutes,
            step_loops,
        } => cmd_run(
            config.as_deref(),
            sandbox.as_deref(),
            seed,
            games,
            parallel,
            &output,
            max_minutes,
            step_loops,
        ),
        Commands::Verify {
            config,
            sandbox,
            seed,
            runs,
        } => cmd_verify(config.as_deref(), sandbox.as_deref(), seed, runs),
        Commands::Inspect { file, balanced } => cmd_inspect(&file, balanced.as_deref()),
        Commands::Validate { config, sandbox } => {
            cmd_validate(config.as_deref(), sandbox.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_configs(
    config: Option<&Path>,
    sandbox: Option<&Path>,
) -> Result<(AgentConfig, SandboxConfig)> {
    let agent = match config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    let sandbox = match sandbox {
        Some(path) => SandboxConfig::load(path)?,
        None => SandboxConfig::default(),
    };
    Ok((agent, sandbox))
}

/// Play one session or a batch
#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: Option<&Path>,
    sandbox: Option<&Path>,
    seed: Option<u64>,
    games: u32,
    parallel: u32,
    output: &Path,
    max_minutes: Option<u32>,
    step_loops: u64,
) -> Result<()> {
    let (mut agent, mut sandbox) = load_configs(config, sandbox)?;
    if let Some(seed) = seed {
        agent.seed = seed;
    }
    if let Some(minutes) = max_minutes {
        sandbox.max_minutes = minutes;
    }

    if games <= 1 {
        let metrics = SessionRunner::new(agent, sandbox)?
            .with_step_loops(step_loops)
            .run()?;
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    std::fs::create_dir_all(output)?;
    let batch = BatchConfig {
        games,
        parallel,
        seed_start: agent.seed,
        agent,
        sandbox,
        step_loops,
    };
    let results = run_batch(batch);
    let results_path = output.join("batch_results.json");
    results.save(&results_path)?;

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Sessions played: {}", summary.total_sessions);
    if !results.errors.is_empty() {
        eprintln!("Sessions failed: {}", results.errors.len());
    }
    eprintln!(
        "Victories: {}  Defeats: {}  Ties: {}  (win rate {:.1}%)",
        summary.victories,
        summary.defeats,
        summary.ties,
        summary.win_rate * 100.0
    );
    eprintln!("Average length: {:.0} loops", summary.avg_duration_loops);
    if let Some(first) = summary.avg_first_attack_loop {
        eprintln!("Average first attack: loop {first:.0}");
    }
    eprintln!("Results saved to: {}", results_path.display());
    Ok(())
}

/// Play one seed several times and compare hashes
fn cmd_verify(
    config: Option<&Path>,
    sandbox: Option<&Path>,
    seed: u64,
    runs: u32,
) -> Result<()> {
    let (mut agent, sandbox) = load_configs(config, sandbox)?;
    agent.seed = seed;
    tracing::info!(seed, runs, "Verifying determinism");

    let report = verify_determinism(&agent, &sandbox, runs)?;
    for (run, (commands, state)) in report
        .command_hashes
        .iter()
        .zip(&report.state_hashes)
        .enumerate()
    {
        println!("run {run}: commands {commands:016x} state {state:016x}");
    }
    if report.is_deterministic() {
        println!("PASS: {runs} runs of seed {seed} matched");
        Ok(())
    } else {
        Err(HeadlessError::Nondeterministic { seed, runs })
    }
}

/// Print label counts of a sample log
fn cmd_inspect(file: &Path, balanced: Option<&Path>) -> Result<()> {
    let log = TrainingLog::load(file)?;
    println!("{}: {} samples", file.display(), log.len());
    for (choice, count) in ActionChoice::ALL.iter().zip(log.label_counts()) {
        println!("  {choice:?}: {count}");
    }

    if let Some(path) = balanced {
        let balanced = log.balanced();
        balanced.save(path)?;
        println!("balanced: {} samples -> {}", balanced.len(), path.display());
    }
    Ok(())
}

/// Parse and validate configuration files
fn cmd_validate(config: Option<&Path>, sandbox: Option<&Path>) -> Result<()> {
    let (agent, sandbox) = load_configs(config, sandbox)?;
    println!(
        "agent: OK (mode {:?}, seed {})",
        agent.tactics.mode, agent.seed
    );
    println!(
        "sandbox: OK ({}x{} map, {} expansions, {} min limit)",
        sandbox.map_size.0,
        sandbox.map_size.1,
        sandbox.expansions.len(),
        sandbox.max_minutes
    );
    Ok(())
}
