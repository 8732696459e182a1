//! Report formatting.
//!
//! Renders a stored [`Report`] as one of three output kinds:
//!
//! | Kind   | Output                                           |
//! |--------|--------------------------------------------------|
//! | `json` | Structured body with the three collections + URL |
//! | `csv`  | `Section,Record` table, one row per finding      |
//! | `html` | [`HtmlContext`] handed to the page renderer      |
//!
//! Formatting never touches the store. An unknown kind falls back to JSON;
//! [`OutputKind::resolve`] reports that fallback explicitly so callers can
//! log it.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::FormatResult;
use crate::models::{Collision, Discrepancy, KeylessCount, NormalizedRecord, Report};

/// Attachment name for delimited-text downloads.
pub const CSV_FILENAME: &str = "reconciliation.csv";

/// Timestamp layout used in listings, e.g. `03:07 PM on Wed, 1 January, 2025`.
pub const LISTING_TIME_FORMAT: &str = "%I:%M %p on %a, %-d %B, %Y";

// =============================================================================
// Output kind
// =============================================================================

/// Requested output shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Json,
    Csv,
    Html,
}

/// Outcome of resolving a requested kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindChoice {
    /// Nothing was requested; the default applies.
    Default,
    /// A recognised kind was requested.
    Requested(OutputKind),
    /// An unrecognised kind was requested; the default applies.
    Fallback { requested: String },
}

impl KindChoice {
    pub fn kind(&self) -> OutputKind {
        match self {
            KindChoice::Requested(kind) => *kind,
            KindChoice::Default | KindChoice::Fallback { .. } => OutputKind::default(),
        }
    }
}

impl OutputKind {
    /// Parse a kind name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    /// Resolve an optional requested kind, falling back to JSON.
    pub fn resolve(requested: Option<&str>) -> KindChoice {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => KindChoice::Default,
            Some(name) => match Self::parse(name) {
                Some(kind) => KindChoice::Requested(kind),
                None => KindChoice::Fallback { requested: name.to_string() },
            },
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Html => write!(f, "html"),
        }
    }
}

// =============================================================================
// Rendered shapes
// =============================================================================

/// Same-side collisions and excluded keyless records.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics<'a> {
    pub duplicates: &'a [Collision],
    pub keyless: KeylessCount,
}

/// JSON body for a report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub id: &'a str,
    pub missing_in_target: &'a [NormalizedRecord],
    pub missing_in_source: &'a [NormalizedRecord],
    pub discrepancies: &'a [Discrepancy],
    pub report_url: String,
    pub diagnostics: Diagnostics<'a>,
}

/// Context consumed by the HTML page renderer.
#[derive(Debug, Clone, Serialize)]
pub struct HtmlContext<'a> {
    pub id: &'a str,
    pub created_at: String,
    pub outcome: String,
    /// Column list for the discrepancy table, sorted.
    pub fields: Vec<&'a str>,
    pub missing_in_target: &'a [NormalizedRecord],
    pub missing_in_source: &'a [NormalizedRecord],
    pub discrepancies: &'a [Discrepancy],
    pub diagnostics: Diagnostics<'a>,
}

/// A formatted report.
#[derive(Debug, Clone)]
pub enum Rendered<'a> {
    Json(JsonReport<'a>),
    Csv(String),
    Html(HtmlContext<'a>),
}

impl Rendered<'_> {
    pub fn kind(&self) -> OutputKind {
        match self {
            Rendered::Json(_) => OutputKind::Json,
            Rendered::Csv(_) => OutputKind::Csv,
            Rendered::Html(_) => OutputKind::Html,
        }
    }
}

/// Listing entry for a stored report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: String,
    pub created_at: String,
    pub outcome: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingMeta {
    pub total: usize,
}

/// Listing of all stored reports.
#[derive(Debug, Clone, Serialize)]
pub struct ReportListing {
    pub reports: Vec<ReportSummary>,
    pub meta: ListingMeta,
}

// =============================================================================
// Formatting
// =============================================================================

/// Detail URL for a report's HTML view.
pub fn report_url(base_url: &str, id: &str) -> String {
    format!("{}/api/reconcile/{}?output=html", base_url.trim_end_matches('/'), id)
}

fn diagnostics(report: &Report) -> Diagnostics<'_> {
    Diagnostics { duplicates: &report.result.duplicates, keyless: report.result.keyless }
}

/// Render a report as the requested kind.
pub fn format<'a>(report: &'a Report, kind: OutputKind, base_url: &str) -> FormatResult<Rendered<'a>> {
    Ok(match kind {
        OutputKind::Json => Rendered::Json(to_json(report, base_url)),
        OutputKind::Csv => Rendered::Csv(to_csv(report)?),
        OutputKind::Html => Rendered::Html(to_html_context(report)),
    })
}

pub fn to_json<'a>(report: &'a Report, base_url: &str) -> JsonReport<'a> {
    JsonReport {
        id: &report.id,
        missing_in_target: &report.result.source_only,
        missing_in_source: &report.result.target_only,
        discrepancies: &report.result.discrepancies,
        report_url: report_url(base_url, &report.id),
        diagnostics: diagnostics(report),
    }
}

/// `Section,Record` table. The record column is the mapping-literal dump.
pub fn to_csv(report: &Report) -> FormatResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(["Section", "Record"])?;
    for record in &report.result.source_only {
        writer.write_record(["missing_in_target", record.to_string().as_str()])?;
    }
    for record in &report.result.target_only {
        writer.write_record(["missing_in_source", record.to_string().as_str()])?;
    }
    for discrepancy in &report.result.discrepancies {
        writer.write_record(["discrepancy", discrepancy.to_string().as_str()])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn to_html_context(report: &Report) -> HtmlContext<'_> {
    HtmlContext {
        id: &report.id,
        created_at: report.created_at.format(LISTING_TIME_FORMAT).to_string(),
        outcome: report.result.outcome(),
        fields: report.result.fields.iter().map(String::as_str).collect(),
        missing_in_target: &report.result.source_only,
        missing_in_source: &report.result.target_only,
        discrepancies: &report.result.discrepancies,
        diagnostics: diagnostics(report),
    }
}

pub fn summarize(report: &Report, base_url: &str) -> ReportSummary {
    ReportSummary {
        id: report.id.clone(),
        created_at: report.created_at.format(LISTING_TIME_FORMAT).to_string(),
        outcome: report.result.outcome(),
        url: report_url(base_url, &report.id),
    }
}

pub fn listing(reports: &[Arc<Report>], base_url: &str) -> ReportListing {
    let reports: Vec<_> = reports.iter().map(|r| summarize(r, base_url)).collect();
    let total = reports.len();
    ReportListing { reports, meta: ListingMeta { total } }
}
