use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{IngestionError, PipelineError};
use crate::ingestion::IngestionFormat;

use super::discover::StagedFile;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// The run aborted because of the file's content or the target table.
    Error,
    /// The run aborted because of infrastructure (I/O, registry, warehouse connection).
    Critical,
}

/// The staged file an event refers to.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// Registry key.
    pub filename: String,
    /// Path inside the staging directory.
    pub path: PathBuf,
    /// Declared format.
    pub format: IngestionFormat,
}

impl From<&StagedFile> for FileContext {
    fn from(file: &StagedFile) -> Self {
        Self {
            filename: file.filename(),
            path: file.path.clone(),
            format: file.format,
        }
    }
}

/// Stats reported once a file is loaded and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows appended to the warehouse.
    pub rows: usize,
}

/// Observer interface for run outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait RunObserver: Send + Sync {
    /// Called after a file is loaded and recorded.
    fn on_processed(&self, _ctx: &FileContext, _stats: LoadStats) {}

    /// Called for a file skipped because the registry already holds it.
    fn on_skipped(&self, _ctx: &FileContext) {}

    /// Called once when a run aborts. `ctx` is `None` for failures outside any file.
    fn on_failure(&self, _ctx: Option<&FileContext>, _severity: Severity, _error: &PipelineError) {}

    /// Called when a failure meets the pipeline's alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RunObserver for CompositeObserver {
    fn on_processed(&self, ctx: &FileContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_processed(ctx, stats);
        }
    }

    fn on_skipped(&self, ctx: &FileContext) {
        for o in &self.observers {
            o.on_skipped(ctx);
        }
    }

    fn on_failure(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits run events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_processed(&self, ctx: &FileContext, stats: LoadStats) {
        info!(
            file = %ctx.filename,
            format = %ctx.format,
            rows = stats.rows,
            "file processed and saved"
        );
    }

    fn on_skipped(&self, ctx: &FileContext) {
        info!(file = %ctx.filename, "file already processed, skipped");
    }

    fn on_failure(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        error!(
            file = ctx.map(|c| c.filename.as_str()).unwrap_or("-"),
            ?severity,
            %error,
            "pipeline run aborted"
        );
    }

    fn on_alert(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        warn!(
            file = ctx.map(|c| c.filename.as_str()).unwrap_or("-"),
            ?severity,
            %error,
            "ALERT: pipeline run aborted"
        );
    }
}

/// Appends run events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl RunObserver for FileObserver {
    fn on_processed(&self, ctx: &FileContext, stats: LoadStats) {
        self.append_line(&format!(
            "ok format={} file={} rows={}",
            ctx.format, ctx.filename, stats.rows
        ));
    }

    fn on_skipped(&self, ctx: &FileContext) {
        self.append_line(&format!("skip format={} file={}", ctx.format, ctx.filename));
    }

    fn on_failure(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "fail severity={:?} file={} err={}",
            severity,
            ctx.map(|c| c.filename.as_str()).unwrap_or("-"),
            error
        ));
    }

    fn on_alert(&self, ctx: Option<&FileContext>, severity: Severity, error: &PipelineError) {
        self.append_line(&format!(
            "ALERT severity={:?} file={} err={}",
            severity,
            ctx.map(|c| c.filename.as_str()).unwrap_or("-"),
            error
        ));
    }
}

/// Classify an abort for alerting.
pub fn severity_for_error(e: &PipelineError) -> Severity {
    match e {
        PipelineError::Config(_)
        | PipelineError::Fetch(_)
        | PipelineError::Discovery { .. }
        | PipelineError::Registry(_)
        | PipelineError::WarehouseConnection { .. } => Severity::Critical,
        PipelineError::SourceRead { source, .. } => match source {
            // Undecodable text is a problem with the file, not the disk.
            IngestionError::Io(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                Severity::Error
            }
            IngestionError::Io(_) => Severity::Critical,
            IngestionError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Severity::Critical,
                _ => Severity::Error,
            },
            // Parquet errors often wrap I/O, but not always in a structured way.
            IngestionError::Parquet(err) if error_chain_contains_io(err) => Severity::Critical,
            _ => Severity::Error,
        },
        PipelineError::UnsupportedFormat { .. }
        | PipelineError::MissingColumn { .. }
        | PipelineError::Transform { .. }
        | PipelineError::SchemaMismatch { .. }
        | PipelineError::WarehouseWrite { .. } => Severity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}
