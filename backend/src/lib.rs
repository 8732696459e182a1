//! # Ledgerdiff - keyed reconciliation of two tabular datasets
//!
//! Ledgerdiff compares a *source* and a *target* CSV on a key field and
//! reports which records exist on only one side and which field values
//! disagree for shared keys. Values are normalized first (trimmed,
//! lowercased, ISO dates rendered as `Wed, 1 January, 2025`).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│   Parser    │────▶│  Normalize  │────▶│   Engine    │
//! │ source/tgt  │     │  (auto-enc) │     │ (trim/date) │     │ (keyed diff)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                     ┌─────────────┐     ┌─────────────┐     ┌──────▼──────┐
//!                     │  json/csv/  │◀────│  Formatter  │◀────│ ReportStore │
//!                     │    html     │     │             │     │  (id → rpt) │
//!                     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use ledgerdiff::{normalize, reconcile, Record};
//!
//! let source = vec![normalize(Record::new().with("id", "1").with("tax", "100"))];
//! let target = vec![normalize(Record::new().with("id", "1").with("tax", "999"))];
//!
//! let result = reconcile(&source, &target);
//! assert_eq!(result.discrepancies.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`models`] - Records, keys, discrepancies and reports
//! - [`normalize`] - Value canonicalization
//! - [`key`] - Record key extraction
//! - [`engine`] - Keyed reconciliation
//! - [`store`] - Report storage
//! - [`format`] - JSON, CSV and HTML shapes
//! - [`parser`] - CSV parsing with auto-detection
//! - [`pipeline`] - Upload to stored report
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Reconciliation
pub mod engine;
pub mod key;
pub mod normalize;

// Storage and output
pub mod format;
pub mod store;

// Ingestion
pub mod parser;
pub mod pipeline;

pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, FormatError, PipelineError, ReconcileError, ServerError, StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Collision, Difference, Discrepancy, Key, KeylessCount, NormalizedRecord, ReconciliationResult,
    Record, Report, Side,
};

// =============================================================================
// Re-exports - Reconciliation
// =============================================================================

pub use engine::{
    reconcile, reconcile_into, reconcile_with, CancelToken, DuplicatePolicy, KeylessPolicy,
    ReconcileOptions,
};
pub use key::{key_of, key_of_field};
pub use normalize::{normalize, normalize_all, normalize_value};

// =============================================================================
// Re-exports - Storage and output
// =============================================================================

pub use format::{
    listing, report_url, summarize, to_csv, to_html_context, to_json, KindChoice, OutputKind,
    Rendered, ReportListing, ReportSummary,
};
pub use store::{InMemoryReportStore, ReportStore};

// =============================================================================
// Re-exports - Ingestion and configuration
// =============================================================================

pub use config::ServerConfig;
pub use parser::{parse_bytes_auto, parse_file_auto, ParseResult};
pub use pipeline::{reconcile_bytes, reconcile_files, PipelineOutput};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
