use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing::Span;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::LoggingConfig;

const RUN_LOG_PREFIX: &str = "eda-run-";
const RUN_LOG_SUFFIX: &str = ".jsonl";

/// One run, one log file. Dropping the guard flushes it.
pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
    log_file: PathBuf,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Root span for the batch; every event of the run carries its `run_id`.
    pub fn run_span(&self) -> Span {
        tracing::info_span!(target: "batch", "reconcile_run", run_id = %self.run_id)
    }
}

/// Writes JSON lines to `<dir>/eda-run-<run_id>.jsonl` and mirrors WARN and above
/// to stderr. stdout stays reserved for the run report.
pub fn init_tracing(logging: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = parse_filter(&logging.filter)?;
    let log_dir = absolute_log_dir(&logging.dir)?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;

    // Runs before this run's file is created.
    let purge = purge_expired_runs(&log_dir, logging.retention_days, SystemTime::now());

    let run_id = Uuid::now_v7().to_string();
    let file_name = run_log_name(&run_id);
    let (writer, worker_guard) = tracing_appender::non_blocking(rolling::never(&log_dir, &file_name));

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);

    let stderr_layer = logging.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let log_file = log_dir.join(&file_name);
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        file = %log_file.display(),
        filter = %logging.filter,
        expired_runs_removed = purge.removed,
        "logging_initialized"
    );
    for warning in purge.warnings {
        tracing::warn!(target: "logging", warning = %warning, "log_retention_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
        log_file,
    })
}

fn run_log_name(run_id: &str) -> String {
    format!("{RUN_LOG_PREFIX}{run_id}{RUN_LOG_SUFFIX}")
}

fn is_run_log(file_name: &str) -> bool {
    file_name.starts_with(RUN_LOG_PREFIX) && file_name.ends_with(RUN_LOG_SUFFIX)
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    if filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }
    EnvFilter::try_new(filter).with_context(|| format!("failed to parse logging.filter '{filter}'"))
}

fn absolute_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir cannot be empty"));
    }
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to read current working directory for logging.dir")?
        .join(dir))
}

#[derive(Debug, Default)]
struct RetentionPurge {
    removed: usize,
    warnings: Vec<String>,
}

/// Deletes run logs last written before the retention window. Never fails the run.
fn purge_expired_runs(log_dir: &Path, retention_days: usize, now: SystemTime) -> RetentionPurge {
    let retention = Duration::from_secs((retention_days as u64).saturating_mul(24 * 60 * 60));
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut purge = RetentionPurge::default();

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            purge
                .warnings
                .push(format!("failed to scan {}: {err}", log_dir.display()));
            return purge;
        }
    };

    for entry in entries.flatten() {
        if !is_run_log(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            purge.warnings.push(format!("failed to stat {}", path.display()));
            continue;
        };
        let expired = metadata.is_file()
            && metadata
                .modified()
                .map(|modified| modified <= cutoff)
                .unwrap_or(false);
        if !expired {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => purge.removed += 1,
            Err(err) => purge
                .warnings
                .push(format!("failed to remove {}: {err}", path.display())),
        }
    }

    purge
}
