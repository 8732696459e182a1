//! Reconciliation engine.
//!
//! Given normalized source and target collections, the engine:
//!
//! 1. Indexes each side by key (see [`crate::key`]).
//! 2. Splits keys into source-only, target-only and shared.
//! 3. Compares every shared pair field by field over the union of their
//!    fields, emitting a [`Discrepancy`] only when something differs.
//!
//! ```text
//!  source ──index──┐                      ┌── missing_in_target
//!                  ├── presence sets ─────┼── missing_in_source
//!  target ──index──┘                      └── shared keys ── field diff ── discrepancies
//! ```
//!
//! Each side is indexed into an arena of records plus a key-to-slot map.
//! Slots are allocated in first-seen key order, which makes output order
//! deterministic. Same-side key collisions and keyless records are
//! resolved by [`DuplicatePolicy`] and [`KeylessPolicy`] and reported as
//! diagnostics on the result rather than dropped silently.
//!
//! The engine performs no I/O. A [`CancelToken`] is checked before each of
//! the two scan phases; a cancelled run never reaches the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ReconcileError, ReconcileResult};
use crate::key::{key_of_field, DEFAULT_KEY_FIELD};
use crate::models::{
    Collision, Difference, Discrepancy, Key, KeylessCount, NormalizedRecord,
    ReconciliationResult, Report, Side,
};
use crate::store::ReportStore;

// =============================================================================
// Options
// =============================================================================

/// What to do when two records on one side share a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The later record replaces the earlier one.
    #[default]
    LastWins,
    /// The first record is kept; later ones are dropped.
    FirstWins,
}

/// What to do with records whose key field is missing or null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeylessPolicy {
    /// Leave keyless records out of the comparison and count them.
    #[default]
    Exclude,
    /// Treat the absent key as one shared key (all keyless records collide).
    Bucket,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last-wins" | "last" => Ok(Self::LastWins),
            "first-wins" | "first" => Ok(Self::FirstWins),
            other => Err(format!(
                "unknown duplicate policy '{}' (expected last-wins or first-wins)",
                other
            )),
        }
    }
}

impl FromStr for KeylessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "bucket" => Ok(Self::Bucket),
            other => Err(format!(
                "unknown keyless policy '{}' (expected exclude or bucket)",
                other
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWins => write!(f, "last-wins"),
            Self::FirstWins => write!(f, "first-wins"),
        }
    }
}

impl fmt::Display for KeylessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude => write!(f, "exclude"),
            Self::Bucket => write!(f, "bucket"),
        }
    }
}

/// Options for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Field holding the join key.
    pub key_field: String,
    pub duplicates: DuplicatePolicy,
    pub keyless: KeylessPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            duplicates: DuplicatePolicy::default(),
            keyless: KeylessPolicy::default(),
        }
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self, phase: &'static str) -> ReconcileResult<()> {
        if self.is_cancelled() {
            Err(ReconcileError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Side index
// =============================================================================

/// Arena of one side's surviving records, addressed by key.
struct SideIndex<'a> {
    /// Surviving record per slot.
    records: Vec<&'a NormalizedRecord>,
    /// Input row of the surviving record per slot.
    rows: Vec<usize>,
    /// Key per slot.
    keys: Vec<Key>,
    slots: HashMap<Key, usize>,
    collisions: Vec<Collision>,
    keyless: usize,
}

impl<'a> SideIndex<'a> {
    fn build(side: Side, records: &'a [NormalizedRecord], options: &ReconcileOptions) -> Self {
        let mut index = SideIndex {
            records: Vec::with_capacity(records.len()),
            rows: Vec::with_capacity(records.len()),
            keys: Vec::with_capacity(records.len()),
            slots: HashMap::with_capacity(records.len()),
            collisions: Vec::new(),
            keyless: 0,
        };

        for (row, record) in records.iter().enumerate() {
            let key = key_of_field(record, &options.key_field);
            if key.is_absent() && options.keyless == KeylessPolicy::Exclude {
                index.keyless += 1;
                continue;
            }

            match index.slots.get(&key) {
                Some(&slot) => {
                    let previous_row = index.rows[slot];
                    let (kept_row, dropped_row) = match options.duplicates {
                        DuplicatePolicy::LastWins => {
                            index.records[slot] = record;
                            index.rows[slot] = row;
                            (row, previous_row)
                        }
                        DuplicatePolicy::FirstWins => (previous_row, row),
                    };
                    index.collisions.push(Collision { side, key, kept_row, dropped_row });
                }
                None => {
                    index.slots.insert(key.clone(), index.records.len());
                    index.records.push(record);
                    index.rows.push(row);
                    index.keys.push(key);
                }
            }
        }

        index
    }

    fn contains(&self, key: &Key) -> bool {
        self.slots.contains_key(key)
    }

    fn get(&self, key: &Key) -> Option<&'a NormalizedRecord> {
        self.slots.get(key).map(|&slot| self.records[slot])
    }

    /// `(key, record)` pairs in slot order.
    fn entries(&self) -> impl Iterator<Item = (&Key, &'a NormalizedRecord)> + '_ {
        self.keys.iter().zip(self.records.iter().copied())
    }
}

/// Field-by-field diff of one matched pair over the union of their fields.
///
/// Absent and null compare equal. O(f) in the pair's field count.
fn compare_pair<'a>(
    source: &'a NormalizedRecord,
    target: &'a NormalizedRecord,
    seen: &mut HashSet<&'a str>,
) -> BTreeMap<String, Difference> {
    let mut differences = BTreeMap::new();
    let mut note = |field: &str, source_value: Option<&str>, target_value: Option<&str>| {
        if source_value != target_value {
            differences.insert(
                field.to_string(),
                Difference {
                    source: source_value.map(str::to_string),
                    target: target_value.map(str::to_string),
                },
            );
        }
    };

    for (field, source_value) in source.iter() {
        seen.insert(field);
        note(field, source_value, target.value(field));
    }
    for (field, target_value) in target.iter() {
        if !source.contains(field) {
            seen.insert(field);
            note(field, None, target_value);
        }
    }

    differences
}

// =============================================================================
// Reconcile
// =============================================================================

/// Reconcile two normalized collections with default options.
pub fn reconcile(source: &[NormalizedRecord], target: &[NormalizedRecord]) -> ReconciliationResult {
    match reconcile_with(source, target, &ReconcileOptions::default(), &CancelToken::new()) {
        Ok(result) => result,
        // A fresh token is never cancelled.
        Err(ReconcileError::Cancelled { .. }) => ReconciliationResult::default(),
    }
}

/// Reconcile two normalized collections.
///
/// Inputs are not modified. Cost is linear in record count plus the field
/// count of each shared pair.
pub fn reconcile_with(
    source: &[NormalizedRecord],
    target: &[NormalizedRecord],
    options: &ReconcileOptions,
    cancel: &CancelToken,
) -> ReconcileResult<ReconciliationResult> {
    run_phases(source, target, options, cancel, || {})
}

/// Both scan phases, with `between` called after indexing.
fn run_phases(
    source: &[NormalizedRecord],
    target: &[NormalizedRecord],
    options: &ReconcileOptions,
    cancel: &CancelToken,
    between: impl FnOnce(),
) -> ReconcileResult<ReconciliationResult> {
    cancel.check("indexing")?;
    let source_index = SideIndex::build(Side::Source, source, options);
    let target_index = SideIndex::build(Side::Target, target, options);
    between();

    cancel.check("comparison")?;
    let source_only = source_index
        .entries()
        .filter(|(key, _)| !target_index.contains(key))
        .map(|(_, record)| record.clone())
        .collect();

    let target_only = target_index
        .entries()
        .filter(|(key, _)| !source_index.contains(key))
        .map(|(_, record)| record.clone())
        .collect();

    let mut seen_fields = HashSet::new();
    let mut discrepancies = Vec::new();

    for (key, source_record) in source_index.entries() {
        let Some(target_record) = target_index.get(key) else {
            continue;
        };

        let differences = compare_pair(source_record, target_record, &mut seen_fields);
        if !differences.is_empty() {
            discrepancies.push(Discrepancy { id: key.clone(), differences });
        }
    }

    let fields: BTreeSet<String> = seen_fields.into_iter().map(str::to_string).collect();

    let mut duplicates = source_index.collisions;
    duplicates.extend(target_index.collisions);

    Ok(ReconciliationResult {
        fields,
        source_only,
        target_only,
        discrepancies,
        duplicates,
        keyless: KeylessCount { source: source_index.keyless, target: target_index.keyless },
    })
}

/// Reconcile and store the result, returning the stored report.
///
/// Nothing is written when the run is cancelled.
pub fn reconcile_into(
    store: &dyn ReportStore,
    source: &[NormalizedRecord],
    target: &[NormalizedRecord],
    options: &ReconcileOptions,
    cancel: &CancelToken,
) -> ReconcileResult<Arc<Report>> {
    let result = reconcile_with(source, target, options, cancel)?;
    Ok(store.put(result))
}
