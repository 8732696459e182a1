//! High-level pipeline: uploaded files in, stored report out.
//!
//! Combines ingestion, normalization, reconciliation and storage, logging
//! each step to the run log.
//!
//! ```text
//! source bytes ─parse─▶ records ─normalize─┐
//!                                          ├─▶ engine ─▶ store ─▶ Report
//! target bytes ─parse─▶ records ─normalize─┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use ledgerdiff::pipeline::reconcile_bytes;
//! use ledgerdiff::{CancelToken, InMemoryReportStore, ReconcileOptions};
//!
//! let store = InMemoryReportStore::new();
//! let output = reconcile_bytes(
//!     b"id,tax\n1,100\n2,200\n",
//!     b"id,tax\n1,999\n",
//!     &store,
//!     &ReconcileOptions::default(),
//!     &CancelToken::new(),
//!     "doc",
//! )
//! .unwrap();
//!
//! assert_eq!(output.report.id, "1");
//! assert_eq!(output.report.result.discrepancies.len(), 1);
//! ```

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::api::logs::{log_run, LogEntry};
use crate::engine::{reconcile_into, CancelToken, ReconcileOptions};
use crate::error::{CsvError, PipelineError, PipelineResult};
use crate::models::{Report, Side};
use crate::normalize::normalize_all;
use crate::parser::{parse_bytes_auto, ParseResult};
use crate::store::ReportStore;

/// Ingestion metadata for one input file
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.records.len(),
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: Arc<Report>,
    pub source: CsvInfo,
    pub target: CsvInfo,
}

/// Reconcile two files on disk.
pub fn reconcile_files(
    source: &Path,
    target: &Path,
    store: &dyn ReportStore,
    options: &ReconcileOptions,
    cancel: &CancelToken,
    run_id: &str,
) -> PipelineResult<PipelineOutput> {
    let read = |side: Side, path: &Path| {
        std::fs::read(path).map_err(|e| PipelineError::Csv { side, source: CsvError::from(e) })
    };
    let source_bytes = read(Side::Source, source)?;
    let target_bytes = read(Side::Target, target)?;
    reconcile_bytes(&source_bytes, &target_bytes, store, options, cancel, run_id)
}

/// Reconcile two uploaded files and store the report.
pub fn reconcile_bytes(
    source: &[u8],
    target: &[u8],
    store: &dyn ReportStore,
    options: &ReconcileOptions,
    cancel: &CancelToken,
    run_id: &str,
) -> PipelineResult<PipelineOutput> {
    let source_parsed = ingest(Side::Source, source, run_id)?;
    let target_parsed = ingest(Side::Target, target, run_id)?;
    let source_info = CsvInfo::from(&source_parsed);
    let target_info = CsvInfo::from(&target_parsed);

    log_run(run_id, LogEntry::info("🧹 Normalizing records..."));
    let source_records = normalize_all(source_parsed.records);
    let target_records = normalize_all(target_parsed.records);

    log_run(
        run_id,
        LogEntry::info(format!(
            "⚖️  Reconciling on key field '{}' ({} vs {} records)...",
            options.key_field,
            source_records.len(),
            target_records.len()
        )),
    );
    let report = reconcile_into(store, &source_records, &target_records, options, cancel)
        .map_err(|e| {
            log_run(run_id, LogEntry::error(e.to_string()));
            PipelineError::from(e)
        })?;

    log_outcome(&report, options, run_id);

    Ok(PipelineOutput { report, source: source_info, target: target_info })
}

fn ingest(side: Side, bytes: &[u8], run_id: &str) -> PipelineResult<ParseResult> {
    log_run(run_id, LogEntry::info(format!("📖 Reading {} file ({} bytes)...", side, bytes.len())));

    let parsed = parse_bytes_auto(bytes).map_err(|source| {
        log_run(run_id, LogEntry::error(format!("{} file: {}", side, source)));
        PipelineError::Csv { side, source }
    })?;

    log_run(
        run_id,
        LogEntry::success(format!(
            "{} rows, encoding {}, delimiter '{}'",
            parsed.records.len(),
            parsed.encoding,
            format_delimiter(parsed.delimiter)
        ))
        .with_indent(1),
    );
    if parsed.headers.is_empty() {
        log_run(run_id, LogEntry::warning(format!("{} file is empty", side)).with_indent(1));
    }

    Ok(parsed)
}

fn log_outcome(report: &Report, options: &ReconcileOptions, run_id: &str) {
    let result = &report.result;

    if !result.duplicates.is_empty() {
        log_run(
            run_id,
            LogEntry::warning(format!(
                "{} duplicate key(s) resolved by {}",
                result.duplicates.len(),
                options.duplicates
            )),
        );
        for collision in result.duplicates.iter().take(5) {
            log_run(
                run_id,
                LogEntry::warning(format!(
                    "{} key {}: kept row {}, dropped row {}",
                    collision.side, collision.key, collision.kept_row, collision.dropped_row
                ))
                .with_indent(1),
            );
        }
    }

    let keyless = result.keyless.source + result.keyless.target;
    if keyless > 0 {
        log_run(
            run_id,
            LogEntry::warning(format!(
                "{} record(s) without '{}' left out ({} source, {} target)",
                keyless, options.key_field, result.keyless.source, result.keyless.target
            )),
        );
    }

    if result.is_clean() {
        log_run(run_id, LogEntry::success(format!("Report {}: sides agree", report.id)));
    } else {
        log_run(run_id, LogEntry::success(format!("Report {}: {}", report.id, result.outcome())));
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}
