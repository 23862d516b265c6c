//! rubric - score agent session transcripts against a behavioral rule set
//!
//! Three operating modes plus a direct-scoring entry point:
//! - `watch` (default): long-running; scans once, then scores new
//!   transcripts as they are written
//! - `scan`: one full pass over the session directory, then exit
//! - `report`: summarize the current store without scanning
//! - `score`: rule-check a single transcript supplied by the caller
//!
//! Uses XDG Base Directory specification for file locations:
//! - Store: $XDG_DATA_HOME/rubric/scores.json
//! - Logs: $XDG_STATE_HOME/rubric/rubric.log
//! - Config: $XDG_CONFIG_HOME/rubric/config.toml

mod process_lock;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use process_lock::acquire_ingest_guard;
use rubric_core::ingest::{scan_directory_with_progress, ScanOutcome};
use rubric_core::{
    Config, RuleEvaluator, ScoreDetail, ScoreStore, SessionScore, SessionWatcher, WatchNotice,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rubric")]
#[command(about = "Score agent session transcripts against a behavioral rule set")]
#[command(version)]
struct Cli {
    /// Session directory to scan and watch (overrides config)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Score report path (overrides config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the session directory and score new transcripts (default)
    Watch,
    /// Scan the session directory once and exit
    Scan,
    /// Summarize the current score store without scanning
    Report {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: String,
    },
    /// Score a single transcript against the rule catalog
    Score {
        /// Session ID
        #[arg(short, long)]
        session: String,
        /// Path to transcript file
        #[arg(short, long)]
        transcript: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Append the result to the score store
        #[arg(long)]
        save: bool,
    },
    /// List the active rule catalog
    Rules,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        rubric_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Configuration is resolved once here and threaded through; nothing
    // downstream reads the environment.
    let root = cli.root.clone().unwrap_or_else(|| config.sessions_dir());
    let store_path = cli.store.clone().unwrap_or_else(|| config.store_path());
    let evaluator = match config.rules {
        Some(rules) => RuleEvaluator::new(rules),
        None => RuleEvaluator::builtin(),
    };

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(root, store_path, config.watch.debounce()),
        Commands::Scan => run_scan(root, store_path),
        Commands::Report { format } => run_report(store_path, &format),
        Commands::Score {
            session,
            transcript,
            format,
            save,
        } => run_score(&evaluator, store_path, &session, &transcript, &format, save),
        Commands::Rules => {
            print_rules(&evaluator);
            Ok(())
        }
    }
}

fn run_watch(root: PathBuf, store_path: PathBuf, debounce: std::time::Duration) -> Result<()> {
    let _guard = acquire_ingest_guard(&store_path).context("failed to acquire ingest lock")?;

    let store = Arc::new(ScoreStore::new(store_path));
    let watcher = Arc::new(
        SessionWatcher::new(Arc::clone(&store), root.clone(), debounce).with_listener(
            |notice| match notice {
                WatchNotice::ScanComplete {
                    newly_scored,
                    skipped,
                } => {
                    println!(
                        "Initial scan: {} new, {} already scored",
                        newly_scored, skipped
                    );
                }
                WatchNotice::Scored(score) => {
                    let timestamp = chrono::Local::now().format("%H:%M:%S");
                    println!(
                        "[{}] {} scored {:.1} ({})",
                        timestamp, score.session_id, score.score, score.grade
                    );
                }
            },
        ),
    );

    // Finish the in-flight file, then release the watch handle.
    let stopper = Arc::clone(&watcher);
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        stopper.stop();
    })
    .context("failed to set Ctrl+C handler")?;

    println!("Watching {} (Ctrl+C to stop)", root.display());
    watcher.run().context("watch mode failed")?;
    println!("Watch mode stopped.");

    Ok(())
}

fn run_scan(root: PathBuf, store_path: PathBuf) -> Result<()> {
    let _guard = acquire_ingest_guard(&store_path).context("failed to acquire ingest lock")?;

    let store = ScoreStore::new(store_path);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let outcome = scan_directory_with_progress(&store, &root, |current, total, path| {
        if current == 0 {
            pb.set_length(total as u64);
        }
        pb.set_position(current as u64);
        pb.set_message(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );
    })
    .context("scan failed")?;

    pb.finish_and_clear();
    print_scan_outcome(&outcome);

    Ok(())
}

fn print_scan_outcome(outcome: &ScanOutcome) {
    println!("Scan complete:");
    println!("  Files seen:      {}", outcome.files_seen);
    println!("  Newly scored:    {}", outcome.newly_scored);
    println!("  Already scored:  {}", outcome.skipped_existing);

    if !outcome.errors.is_empty() {
        println!("\nErrors ({}):", outcome.errors.len());
        for (path, err) in &outcome.errors {
            println!("  {}: {}", path.display(), err);
        }
    }
}

fn run_report(store_path: PathBuf, format: &str) -> Result<()> {
    let store = ScoreStore::new(store_path);
    let report = store.load().context("failed to load score report")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "summary" => {
            if report.scores.is_empty() {
                println!("No sessions scored yet.");
                println!("Run 'rubric scan' or 'rubric watch' first.");
                return Ok(());
            }

            println!("Sessions scored: {}", report.total_sessions);
            if let Some(avg) = report.average_score() {
                println!("Average score:   {:.1}", avg);
            }
            println!("Last scan:       {}", report.last_scan.to_rfc3339());
            println!("\nGrade distribution:");
            for (grade, count) in report.grade_distribution() {
                println!("  {}: {}", grade, count);
            }
        }
        _ => anyhow::bail!("unknown format: {}", format),
    }

    Ok(())
}

fn run_score(
    evaluator: &RuleEvaluator,
    store_path: PathBuf,
    session: &str,
    transcript_path: &PathBuf,
    format: &str,
    save: bool,
) -> Result<()> {
    let transcript = std::fs::read_to_string(transcript_path)
        .with_context(|| format!("failed to read transcript {}", transcript_path.display()))?;

    let score = evaluator
        .score_transcript(session, &transcript)
        .context("failed to score session")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&score)?),
        "summary" => print_score_summary(&score),
        _ => anyhow::bail!("unknown format: {}", format),
    }

    if save {
        let _guard = acquire_ingest_guard(&store_path).context("failed to acquire ingest lock")?;
        let store = ScoreStore::new(store_path);
        store.append(score).context("failed to save score")?;
        println!("\nSaved to store.");
    }

    Ok(())
}

fn print_score_summary(score: &SessionScore) {
    println!("Session: {}", score.session_id);
    println!("Score: {:.1} ({})", score.score, score.grade);
    println!("\n{}", score.summary);

    if let ScoreDetail::Rules(checks) = &score.detail {
        let passed = checks.iter().filter(|c| c.passed).count();
        println!("Passed: {}/{}", passed, checks.len());
        println!("\nRule Details:");
        for check in checks {
            let status = if check.passed { "✅" } else { "❌" };
            println!("  {} {}", status, check.rule_name);
        }
    }
}

fn print_rules(evaluator: &RuleEvaluator) {
    println!("Behavioral rules ({}):", evaluator.rules().len());
    for rule in evaluator.rules() {
        println!(
            "  {} [{}] (weight {:.1})",
            rule.id,
            rule.category.as_str(),
            rule.weight
        );
        println!("      {}", rule.description);
    }
}
