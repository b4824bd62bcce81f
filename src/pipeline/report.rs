//! Per-file outcomes returned to the caller.

use std::fmt;

/// What happened to one staged file during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Read, transformed, loaded and recorded during this run.
    Processed {
        /// Rows appended to the warehouse.
        rows: usize,
    },
    /// Already in the registry; not touched.
    AlreadyProcessed,
}

/// One log line of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionLogEntry {
    /// Staged file name.
    pub filename: String,
    /// Outcome for that file.
    pub outcome: FileOutcome,
}

impl IngestionLogEntry {
    pub(crate) fn processed(filename: impl Into<String>, rows: usize) -> Self {
        Self {
            filename: filename.into(),
            outcome: FileOutcome::Processed { rows },
        }
    }

    pub(crate) fn already_processed(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: FileOutcome::AlreadyProcessed,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IngestionLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            FileOutcome::Processed { rows } => {
                write!(f, "file {} processed and saved ({rows} rows)", self.filename)
            }
            FileOutcome::AlreadyProcessed => {
                write!(f, "file {} already processed, skipped", self.filename)
            }
        }
    }
}

/// Ordered outcomes of a run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per staged file reached by the run.
    pub entries: Vec<IngestionLogEntry>,
}

impl RunReport {
    /// Rendered messages, one per entry.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(IngestionLogEntry::message).collect()
    }

    /// Number of files loaded and recorded by this run.
    pub fn processed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, FileOutcome::Processed { .. }))
            .count()
    }

    /// Number of files skipped because they were already recorded.
    pub fn skipped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == FileOutcome::AlreadyProcessed)
            .count()
    }

    /// Total rows appended by this run.
    pub fn rows_loaded(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                FileOutcome::Processed { rows } => rows,
                FileOutcome::AlreadyProcessed => 0,
            })
            .sum()
    }
}
