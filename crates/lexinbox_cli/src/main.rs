//! lexinbox command-line entry point.
//!
//! # Responsibility
//! - Resolve config, start logging, wire core collaborators, map outcomes to
//!   exit codes.
//!
//! # Invariants
//! - Exit 0 for every clean run, including lock-held, precheck abort and
//!   per-item failures. Exit 1 only for setup failures.

mod http;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use http::{DisabledEnricher, HttpEnricher, HttpPrecheck};
use lexinbox_core::db::open_db;
use lexinbox_core::{
    default_log_level, init_logging, init_stderr_logging, Enricher, FileQueueStore,
    FragmentMerger, LemmaNormalizer, Normalization, PipelineConfig, RotationOutcome,
    RunCoordinator, RunLock, RunOptions, RunStatus, SqliteLedger,
};
use log::{error, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lexinbox", version)]
#[command(about = "Vocabulary inbox ingestion pipeline", long_about = None)]
struct Cli {
    /// Base directory holding inbox, archive, state and ledger.
    #[arg(long, env = "LEXINBOX_BASE", global = true)]
    base_dir: Option<PathBuf>,
    /// Optional TOML config file.
    #[arg(long, env = "LEXINBOX_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// trace|debug|info|warn|error|off
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Write rolling log files here instead of stderr (absolute path).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge, normalize, dedupe, enrich and commit the inbox queue
    Run {
        /// Report what would be enriched without calling anything
        #[arg(long)]
        dry_run: bool,
        /// Enrich at most this many items
        #[arg(long)]
        limit: Option<usize>,
        /// Skip merging drop-folder fragments
        #[arg(long)]
        no_merge: bool,
    },
    /// Merge drop-folder fragments into the queue
    Merge,
    /// Show the lemma and rule chosen for each text
    Preview {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// List ledger rows with their card counts
    Ledger {
        /// Rows processed on this day (YYYY-MM-DD)
        #[arg(long, conflicts_with = "today")]
        date: Option<NaiveDate>,
        /// Rows processed today
        #[arg(long)]
        today: bool,
        /// Most recent rows to show when no day is given
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref(), cli.base_dir.clone())
        .context("failed to load configuration")?;

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let log_dir = match cli.log_dir {
        Some(dir) => Some(dir),
        None if config.file_logging => Some(absolute(config.log_dir())?),
        None => None,
    };
    match &log_dir {
        Some(dir) => init_logging(level, &dir.to_string_lossy()),
        None => init_stderr_logging(level),
    }
    .map_err(anyhow::Error::msg)
    .context("failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            dry_run,
            limit,
            no_merge,
        } => cmd_run(
            &config,
            RunOptions {
                dry_run,
                limit,
                merge_fragments: !no_merge,
            },
        ),
        Commands::Merge => cmd_merge(&config),
        Commands::Preview { texts } => {
            cmd_preview(&config, &texts);
            Ok(())
        }
        Commands::Ledger { date, today, limit } => {
            let day = if today {
                Some(Local::now().date_naive())
            } else {
                date
            };
            cmd_ledger(&config, day, limit)
        }
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}

fn queue_store(config: &PipelineConfig) -> Result<FileQueueStore> {
    std::fs::create_dir_all(config.inbox_dir()).with_context(|| {
        format!(
            "failed to create inbox directory `{}`",
            config.inbox_dir().display()
        )
    })?;
    Ok(FileQueueStore::new(
        config.queue_path(),
        config.archive_dir(),
        config.file_retry,
    ))
}

fn cmd_run(config: &PipelineConfig, mut options: RunOptions) -> Result<()> {
    let queue = queue_store(config)?;
    let conn = open_db(config.ledger_path()).with_context(|| {
        format!("failed to open ledger `{}`", config.ledger_path().display())
    })?;
    let ledger = SqliteLedger::new(&conn);

    let enricher: Box<dyn Enricher> = match &config.enrich_url {
        Some(url) => Box::new(
            HttpEnricher::new(url, Duration::from_millis(config.enrich_timeout_ms))
                .context("failed to build enrichment client")?,
        ),
        None => {
            if !options.dry_run {
                warn!("event=cli_run module=cli status=skip reason=no_enrich_url forcing=dry_run");
                options.dry_run = true;
            }
            Box::new(DisabledEnricher)
        }
    };

    let mut coordinator = RunCoordinator::new(config, &queue, &ledger, enricher.as_ref(), &ledger);
    let timeout = Duration::from_millis(config.precheck.timeout_ms);
    for url in &config.precheck.urls {
        let check = HttpPrecheck::new(url, timeout).context("failed to build precheck client")?;
        coordinator = coordinator.with_precheck(Box::new(check));
    }

    let status = coordinator.run(options).context("run aborted during setup")?;
    print_status(&status);
    Ok(())
}

fn print_status(status: &RunStatus) {
    match status {
        RunStatus::LockHeld => println!("another run is active; skipping this cycle"),
        RunStatus::PrecheckFailed(failure) => println!(
            "precheck `{}` failed: {}; queue untouched",
            failure.check, failure.reason
        ),
        RunStatus::Empty => println!("queue is empty; nothing to do"),
        RunStatus::Processed(report) | RunStatus::Failed(report) => {
            if let Some(merge) = &report.merge {
                if !merge.is_noop() {
                    println!(
                        "merged {} fragment(s), {} new line(s), {} failed",
                        merge.archived.len(),
                        merge.lines_appended,
                        merge.failed.len()
                    );
                }
            }
            println!(
                "parsed={} skipped={} duplicates={} accepted={} deferred={} persisted={} failed={}",
                report.parsed_entries,
                report.skipped.len(),
                report.duplicates.len(),
                report.accepted.len(),
                report.deferred,
                report.persisted.len(),
                report.failures.len()
            );
            if report.rotation == RotationOutcome::DryRun {
                for item in &report.accepted {
                    println!("  would enrich: {}\t{}", item.lemma, item.rule_applied);
                }
            }
            for failure in &report.failures {
                println!(
                    "  failed [{}] {}: {}",
                    failure.stage.as_str(),
                    failure.lemma,
                    failure.message
                );
            }
            match &report.rotation {
                RotationOutcome::Archived(path) => println!("queue archived to {}", path.display()),
                RotationOutcome::AlreadyRotatedToday => {
                    println!("queue already rotated today; left in place")
                }
                RotationOutcome::NotCommitted => println!("queue kept for the next run"),
                RotationOutcome::CommitFailed(reason) => {
                    println!("commit failed, queue kept: {reason}")
                }
                RotationOutcome::NothingToArchive | RotationOutcome::DryRun => {}
            }
        }
    }
}

fn cmd_merge(config: &PipelineConfig) -> Result<()> {
    let queue = queue_store(config)?;
    let now = Local::now();
    let Some(_lock) = RunLock::try_acquire(&config.lock_path(), now)
        .context("failed to acquire run lock")?
    else {
        println!("another run is active; skipping merge");
        return Ok(());
    };

    let merger = FragmentMerger::new(
        config.inbox_dir(),
        config.fragment_prefix.as_str(),
        config.queue_file_name.as_str(),
        config.file_retry,
    );
    let report = merger.merge(&queue, now).context("merge failed")?;
    if report.is_noop() {
        println!("nothing to merge");
    } else {
        println!(
            "merged {} fragment(s) into {}, {} new line(s), {} failed",
            report.archived.len(),
            config.queue_file_name,
            report.lines_appended,
            report.failed.len()
        );
    }
    Ok(())
}

fn cmd_preview(config: &PipelineConfig, texts: &[String]) {
    let normalizer = LemmaNormalizer::new(&config.normalizer);
    for text in texts {
        match normalizer.normalize(text) {
            Normalization::Item(item) => {
                println!("{}\t{}\t{}", item.lemma, item.rule_applied, item.display_text)
            }
            Normalization::Skip(reason) => println!("-\tskip:{reason}\t{}", text.trim()),
        }
    }
}

fn cmd_ledger(config: &PipelineConfig, day: Option<NaiveDate>, limit: u32) -> Result<()> {
    let conn = open_db(config.ledger_path()).with_context(|| {
        format!("failed to open ledger `{}`", config.ledger_path().display())
    })?;
    let ledger = SqliteLedger::new(&conn);
    let records = match day {
        Some(day) => ledger.records_on(day),
        None => ledger.recent(limit),
    }
    .context("failed to read ledger")?;

    if records.is_empty() {
        println!("no ledger rows");
    }
    for record in records {
        let cards = ledger
            .card_count(&record.lemma_key)
            .context("failed to count cards")?;
        println!("{}\t{}\tcards={}", record.date_processed, record.lemma, cards);
    }
    let total = ledger.snapshot().context("failed to read ledger")?.len();
    println!("{total} lemma(s) recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from(["lexinbox", "run", "--dry-run", "--limit", "5"]);
        match cli.command {
            Commands::Run {
                dry_run,
                limit,
                no_merge,
            } => {
                assert!(dry_run);
                assert_eq!(limit, Some(5));
                assert!(!no_merge);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn ledger_date_and_today_conflict() {
        assert!(
            Cli::try_parse_from(["lexinbox", "ledger", "--today", "--date", "2025-10-16"]).is_err()
        );
    }
}
