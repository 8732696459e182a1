//! Report Store - keep computed reconciliation reports for later retrieval.
//!
//! [`ReportStore`] is the seam a durable backend plugs into: it exposes only
//! `put`, `get` and `list`. [`InMemoryReportStore`] keeps reports for the
//! lifetime of the process.
//!
//! Identifiers are decimal strings assigned from a monotonic counter, starting
//! at `"1"`. Assignment happens under the write lock, so concurrent `put`s
//! never hand out the same id. `get` and `list` share the read lock.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::models::{ReconciliationResult, Report};

/// Storage for reconciliation reports.
pub trait ReportStore: Send + Sync {
    /// Store a result, returning the stored report with its new id.
    fn put(&self, result: ReconciliationResult) -> Arc<Report>;

    /// Look up a report by id.
    fn get(&self, id: &str) -> StoreResult<Arc<Report>>;

    /// All stored reports, in a stable order for a given store state.
    fn list(&self) -> Vec<Arc<Report>>;

    /// Number of stored reports.
    fn len(&self) -> usize {
        self.list().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Inner {
    /// Last id handed out (0 = none yet).
    last_id: u64,
    reports: BTreeMap<u64, Arc<Report>>,
}

/// Process-lifetime report store guarded by a read/write lock.
#[derive(Default)]
pub struct InMemoryReportStore {
    inner: RwLock<Inner>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for InMemoryReportStore {
    fn put(&self, result: ReconciliationResult) -> Arc<Report> {
        let mut inner = self.inner.write();
        inner.last_id += 1;
        let id = inner.last_id;

        let report = Arc::new(Report {
            id: id.to_string(),
            created_at: Utc::now(),
            result,
        });
        inner.reports.insert(id, Arc::clone(&report));
        report
    }

    fn get(&self, id: &str) -> StoreResult<Arc<Report>> {
        let not_found = || StoreError::NotFound(id.to_string());
        // Only canonical decimal ids were ever issued ("01" was not).
        let numeric: u64 = id.parse().map_err(|_| not_found())?;
        if numeric.to_string() != id {
            return Err(not_found());
        }

        self.inner
            .read()
            .reports
            .get(&numeric)
            .cloned()
            .ok_or_else(not_found)
    }

    fn list(&self) -> Vec<Arc<Report>> {
        self.inner.read().reports.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.inner.read().reports.len()
    }
}
