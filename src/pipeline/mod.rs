//! Idempotent batch runs: fetch, discover, filter against the registry, then
//! read/transform/load/record each new file in order.
//!
//! A file is recorded only after its rows reached the warehouse, and the first failure aborts
//! the run, so files after it are left for the next run. The report of everything completed
//! before the failure is carried by [`RunAborted`].
//!
//! ```no_run
//! use sales_ingest::config::PipelineConfig;
//! use sales_ingest::pipeline::Pipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig {
//!     warehouse_url: Some("sqlite://dw.db".to_string()),
//!     ..Default::default()
//! };
//! let report = Pipeline::from_config(config)?.run()?;
//! for line in report.lines() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

mod discover;
mod observer;
mod report;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{PipelineConfig, env};
use crate::error::{ConfigError, PipelineError};
use crate::fetch::{DirectoryFetcher, NoopFetcher, SourceFetcher};
use crate::ingestion;
use crate::processing::DerivedColumn;
use crate::registry::{Registry, SqliteRegistry};
use crate::warehouse::{Warehouse, open_warehouse, redact_url};

pub use discover::{StagedFile, discover_staged_files};
pub use observer::{
    CompositeObserver, FileContext, FileObserver, LoadStats, RunObserver, Severity,
    TracingObserver, severity_for_error,
};
pub use report::{FileOutcome, IngestionLogEntry, RunReport};

/// A run stopped at its first error.
///
/// `report` lists the files completed (or skipped) before the failure; those outcomes are final.
#[derive(Debug, Error)]
#[error("pipeline aborted after {} file(s): {error}", .report.entries.len())]
pub struct RunAborted {
    /// Outcomes recorded before the failure.
    pub report: RunReport,
    /// Staged file being handled when the run failed, if any.
    pub file: Option<String>,
    /// The failure.
    #[source]
    pub error: PipelineError,
}

impl From<PipelineError> for RunAborted {
    fn from(error: PipelineError) -> Self {
        Self {
            report: RunReport::default(),
            file: error.file().map(str::to_string),
            error,
        }
    }
}

/// The ingestion orchestrator.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Box<dyn SourceFetcher>,
    registry: Box<dyn Registry>,
    warehouse: Box<dyn Warehouse>,
    transform: DerivedColumn,
    observer: Option<Arc<dyn RunObserver>>,
    alert_at_or_above: Severity,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("transform", &self.transform)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline from explicit components.
    ///
    /// The fetcher copies from `config.source_dir` when set and is a no-op otherwise.
    pub fn new(
        config: PipelineConfig,
        registry: Box<dyn Registry>,
        warehouse: Box<dyn Warehouse>,
    ) -> Self {
        let fetcher: Box<dyn SourceFetcher> = match &config.source_dir {
            Some(dir) => Box::new(DirectoryFetcher::new(dir)),
            None => Box::new(NoopFetcher),
        };
        Self {
            config,
            fetcher,
            registry,
            warehouse,
            transform: DerivedColumn::default(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }

    /// Open the SQLite registry and the warehouse named by `config`.
    ///
    /// `postgres://` warehouse URLs need the `postgres` feature; other URLs name a SQLite file.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let url = config
            .warehouse_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing {
                key: env::DATABASE_URL.to_string(),
            })?;

        let warehouse = open_warehouse(url, config.create_table_if_missing).map_err(|e| {
            ConfigError::InvalidWarehouseUrl {
                url: redact_url(url),
                message: e.to_string(),
            }
        })?;
        let registry = SqliteRegistry::open(&config.registry_path)?;

        Ok(Self::new(config, Box::new(registry), warehouse))
    }

    /// Replace the fetch stage.
    pub fn with_fetcher(mut self, fetcher: Box<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Report outcomes and failures to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Failures at or above `severity` also trigger [`RunObserver::on_alert`].
    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    /// Use a different derived column.
    pub fn with_transform(mut self, transform: DerivedColumn) -> Self {
        self.transform = transform;
        self
    }

    /// Settings the pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run.
    pub fn run(&self) -> Result<RunReport, RunAborted> {
        let mut report = RunReport::default();
        let mut current: Option<FileContext> = None;

        match self.run_stages(&mut report, &mut current) {
            Ok(()) => {
                info!(
                    processed = report.processed_count(),
                    skipped = report.skipped_count(),
                    rows = report.rows_loaded(),
                    "pipeline run finished"
                );
                Ok(report)
            }
            Err(error) => {
                if let Some(obs) = &self.observer {
                    let severity = severity_for_error(&error);
                    obs.on_failure(current.as_ref(), severity, &error);
                    if severity >= self.alert_at_or_above {
                        obs.on_alert(current.as_ref(), severity, &error);
                    }
                }
                Err(RunAborted {
                    report,
                    file: current.map(|c| c.filename),
                    error,
                })
            }
        }
    }

    fn run_stages(
        &self,
        report: &mut RunReport,
        current: &mut Option<FileContext>,
    ) -> Result<(), PipelineError> {
        let staging_dir = &self.config.staging_dir;
        let fetched = self.fetcher.fetch(staging_dir)?;
        debug!(files = fetched, "fetch stage done");

        self.registry.ensure_schema()?;
        let mut processed = self.registry.list_processed()?;

        let staged =
            discover_staged_files(staging_dir).map_err(|source| PipelineError::Discovery {
                path: staging_dir.clone(),
                source,
            })?;
        info!(
            staged = staged.len(),
            already_recorded = processed.len(),
            "starting pipeline run"
        );

        for file in &staged {
            let ctx = FileContext::from(file);
            let name = ctx.filename.clone();
            *current = Some(ctx);

            if processed.contains(&name) {
                report.entries.push(IngestionLogEntry::already_processed(&name));
                if let (Some(obs), Some(ctx)) = (&self.observer, current.as_ref()) {
                    obs.on_skipped(ctx);
                }
                debug!(file = %name, "already processed, skipping");
                continue;
            }

            let rows = self.process_file(file, &name)?;

            processed.insert(name.clone());
            report.entries.push(IngestionLogEntry::processed(&name, rows));
            if let (Some(obs), Some(ctx)) = (&self.observer, current.as_ref()) {
                obs.on_processed(ctx, LoadStats { rows });
            }
        }

        *current = None;
        Ok(())
    }

    fn process_file(&self, file: &StagedFile, name: &str) -> Result<usize, PipelineError> {
        let dataset =
            ingestion::read(&file.path, file.format).map_err(|e| PipelineError::read(name, e))?;
        debug!(file = name, format = %file.format, rows = dataset.row_count(), "read");

        let batch = self
            .transform
            .apply(dataset)
            .map_err(|e| PipelineError::transform(name, e))?;

        let rows = self
            .warehouse
            .append(&batch, &self.config.target_table)
            .map_err(|e| PipelineError::load(name, e))?;

        self.registry.record(name, Utc::now())?;
        info!(file = name, rows, table = %self.config.target_table, "file processed and saved");
        Ok(rows)
    }
}

/// Build a pipeline from `config`, run it once and return the log lines.
pub fn run_pipeline(config: PipelineConfig) -> Result<Vec<String>, RunAborted> {
    let pipeline = Pipeline::from_config(config)?;
    pipeline.run().map(|report| report.lines())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Utc};

    use super::{FileContext, LoadStats, Pipeline, RunObserver, Severity};
    use crate::config::PipelineConfig;
    use crate::error::{ConfigError, PipelineError, RegistryError, WarehouseError};
    use crate::registry::Registry;
    use crate::types::{DataSet, Value};
    use crate::warehouse::Warehouse;

    #[derive(Default)]
    struct MemoryRegistry {
        names: RefCell<Vec<String>>,
    }

    impl Registry for MemoryRegistry {
        fn ensure_schema(&self) -> Result<(), RegistryError> {
            Ok(())
        }

        fn list_processed(&self) -> Result<HashSet<String>, RegistryError> {
            Ok(self.names.borrow().iter().cloned().collect())
        }

        fn record(&self, filename: &str, _at: DateTime<Utc>) -> Result<(), RegistryError> {
            self.names.borrow_mut().push(filename.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryWarehouse {
        batches: RefCell<Vec<DataSet>>,
    }

    impl Warehouse for MemoryWarehouse {
        fn append(&self, batch: &DataSet, _table: &str) -> Result<usize, WarehouseError> {
            self.batches.borrow_mut().push(batch.clone());
            Ok(batch.row_count())
        }
    }

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl RunObserver for Recording {
        fn on_processed(&self, ctx: &FileContext, stats: LoadStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("processed {} {}", ctx.filename, stats.rows));
        }

        fn on_skipped(&self, ctx: &FileContext) {
            self.events
                .lock()
                .unwrap()
                .push(format!("skipped {}", ctx.filename));
        }

        fn on_failure(&self, ctx: Option<&FileContext>, severity: Severity, _e: &PipelineError) {
            self.events.lock().unwrap().push(format!(
                "failure {} {severity:?}",
                ctx.map(|c| c.filename.as_str()).unwrap_or("-")
            ));
        }

        fn on_alert(&self, _ctx: Option<&FileContext>, severity: Severity, _e: &PipelineError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("alert {severity:?}"));
        }
    }

    fn config_for(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            staging_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn loads_transformed_rows_and_records_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("vendas.csv"),
            "produto,quantidade,valor\ncaneta,2,5.0\nlapis,3,10.0\n",
        )
        .unwrap();

        let pipeline = Pipeline::new(
            config_for(dir.path()),
            Box::new(MemoryRegistry::default()),
            Box::new(MemoryWarehouse::default()),
        );
        let report = pipeline.run().unwrap();
        assert_eq!(
            report.lines(),
            vec!["file vendas.csv processed and saved (2 rows)"]
        );

        let again = pipeline.run().unwrap();
        assert_eq!(
            again.lines(),
            vec!["file vendas.csv already processed, skipped"]
        );
    }

    #[test]
    fn observer_sees_skip_process_and_alert() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "quantidade,valor\n1,2.0\n").unwrap();
        fs::write(dir.path().join("b.csv"), "quantidade,valor\n1,2.0\n").unwrap();
        fs::write(dir.path().join("c.csv"), "quantidade\n1\n").unwrap();

        let registry = MemoryRegistry::default();
        registry.names.borrow_mut().push("a.csv".to_string());
        let recording = Arc::new(Recording::default());

        let err = Pipeline::new(
            config_for(dir.path()),
            Box::new(registry),
            Box::new(MemoryWarehouse::default()),
        )
        .with_observer(recording.clone())
        .with_alert_threshold(Severity::Error)
        .run()
        .unwrap_err();

        assert_eq!(err.file.as_deref(), Some("c.csv"));
        assert!(matches!(err.error, PipelineError::MissingColumn { ref column, .. } if column == "valor"));
        assert_eq!(err.report.entries.len(), 2);
        assert_eq!(
            *recording.events.lock().unwrap(),
            vec![
                "skipped a.csv".to_string(),
                "processed b.csv 1".to_string(),
                "failure c.csv Error".to_string(),
                "alert Error".to_string(),
            ]
        );
    }

    #[test]
    fn from_config_requires_a_warehouse_url() {
        let err = Pipeline::from_config(PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn from_config_rejects_unknown_schemes_without_leaking_passwords() {
        let config = PipelineConfig {
            warehouse_url: Some("mysql://etl:s3cr3t@db/dw".to_string()),
            ..PipelineConfig::default()
        };
        let err = Pipeline::from_config(config).unwrap_err();
        match err {
            PipelineError::Config(ConfigError::InvalidWarehouseUrl { url, message }) => {
                assert_eq!(url, "mysql://etl:***@db/dw");
                assert!(message.contains("unsupported warehouse scheme"));
                assert!(!message.contains("s3cr3t"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn int_times_float_yields_float_totals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("v.csv"), "quantidade,valor\n2,5.0\n3,10.0\n").unwrap();

        struct Capture(Arc<Mutex<Vec<Value>>>);
        impl Warehouse for Capture {
            fn append(&self, batch: &DataSet, _table: &str) -> Result<usize, WarehouseError> {
                let idx = batch.schema.index_of("total_vendas").unwrap();
                self.0
                    .lock()
                    .unwrap()
                    .extend(batch.column_values(idx).cloned());
                Ok(batch.row_count())
            }
        }

        let totals = Arc::new(Mutex::new(Vec::new()));
        Pipeline::new(
            config_for(dir.path()),
            Box::new(MemoryRegistry::default()),
            Box::new(Capture(totals.clone())),
        )
        .run()
        .unwrap();

        assert_eq!(
            *totals.lock().unwrap(),
            vec![Value::Float64(10.0), Value::Float64(30.0)]
        );
    }
}
