//! Incremental index reconciliation.
//!
//! A cycle runs in two phases, each committed as one transaction:
//!
//! 1. **Events**: moves re-key existing records, deletes drop them, and every
//!    touched path is marked for rescan (`true`) or removal (`false`).
//! 2. **Rescans**: marked paths are scanned in path order outside the
//!    transaction, then the results are written at once. Files with findings
//!    are upserted; files that came back clean lose their record.
//!
//! If either transaction fails nothing from that phase reaches the index.

use crate::error::{Result, SyncError};
use crate::event::ChangeEvent;
use senswatch_db::{detection_results, Database};
use senswatch_detect::{index_key, DetectError, DetectionRecord, PathScanner};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EVENT_PHASE: &str = "event application";
const RESCAN_PHASE: &str = "rescan application";

/// Paths touched by a batch of events, in path order.
///
/// `true` means the file must be rescanned, `false` that it is gone from
/// that path. The last event for a path wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingScans(BTreeMap<PathBuf, bool>);

impl PendingScans {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a path for rescan.
    pub fn rescan(&mut self, path: PathBuf) {
        self.0.insert(path, true);
    }

    /// Mark a path as removed.
    pub fn remove(&mut self, path: PathBuf) {
        self.0.insert(path, false);
    }

    /// Current mark of a path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<bool> {
        self.0.get(path).copied()
    }

    /// Paths to rescan, in path order.
    pub fn rescan_paths(&self) -> impl Iterator<Item = &Path> {
        self.0
            .iter()
            .filter(|(_, rescan)| **rescan)
            .map(|(path, _)| path.as_path())
    }

    /// Number of touched paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no path was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What one reconciliation cycle changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records re-keyed by a move
    pub renamed: usize,
    /// Records dropped by deletes, or overwritten by a move target
    pub deleted: usize,
    /// Records inserted or replaced after a rescan
    pub upserted: usize,
    /// Records dropped because a rescan found nothing
    pub cleared: usize,
    /// Paths whose rescan failed or was not attempted
    pub skipped: usize,
}

impl ReconcileReport {
    /// Whether the cycle wrote anything.
    #[must_use]
    pub fn changed_index(&self) -> bool {
        self.renamed + self.deleted + self.upserted + self.cleared > 0
    }
}

/// Applies change events to the detection index.
#[derive(Debug)]
pub struct Reconciler<S> {
    db: Database,
    scanner: S,
}

impl<S: PathScanner> Reconciler<S> {
    /// Reconciler writing to `db`, rescanning with `scanner`.
    pub fn new(db: Database, scanner: S) -> Self {
        Self { db, scanner }
    }

    /// Index being maintained.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run both phases for one batch of events.
    pub async fn reconcile(&self, events: &[ChangeEvent]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if events.is_empty() {
            return Ok(report);
        }

        let pending = self.apply_events(events, &mut report).await?;
        self.apply_rescans(&pending, &mut report).await?;

        info!(
            "Reconciled {} events: {} renamed, {} deleted, {} upserted, {} cleared, {} skipped",
            events.len(),
            report.renamed,
            report.deleted,
            report.upserted,
            report.cleared,
            report.skipped
        );
        Ok(report)
    }

    /// Phase 1: apply moves and deletes in log order and collect the
    /// touched paths.
    pub async fn apply_events(
        &self,
        events: &[ChangeEvent],
        report: &mut ReconcileReport,
    ) -> Result<PendingScans> {
        let mut pending = PendingScans::new();
        let mut phase = ReconcileReport::default();
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(SyncError::in_phase(EVENT_PHASE))?;

        for event in events {
            match event {
                ChangeEvent::Modify(path) => pending.rescan(path.clone()),
                ChangeEvent::Move { from, to } if from == to => pending.rescan(to.clone()),
                ChangeEvent::Move { from, to } => {
                    let old_key = index_key(from);
                    let new_key = index_key(to);
                    if detection_results::record_exists(&mut *tx, &old_key)
                        .await
                        .map_err(SyncError::in_phase(EVENT_PHASE))?
                    {
                        if detection_results::delete_record(&mut *tx, &new_key)
                            .await
                            .map_err(SyncError::in_phase(EVENT_PHASE))?
                        {
                            phase.deleted += 1;
                        }
                        detection_results::rename_record(&mut *tx, &old_key, &new_key)
                            .await
                            .map_err(SyncError::in_phase(EVENT_PHASE))?;
                        phase.renamed += 1;
                        debug!("Moved record {} -> {}", old_key, new_key);
                    }
                    pending.rescan(to.clone());
                    pending.remove(from.clone());
                }
                ChangeEvent::Delete(path) => {
                    if detection_results::delete_record(&mut *tx, &index_key(path))
                        .await
                        .map_err(SyncError::in_phase(EVENT_PHASE))?
                    {
                        phase.deleted += 1;
                        debug!("Deleted record {}", path.display());
                    }
                    pending.remove(path.clone());
                }
            }
        }

        tx.commit()
            .await
            .map_err(SyncError::transaction(EVENT_PHASE))?;

        report.renamed += phase.renamed;
        report.deleted += phase.deleted;
        Ok(pending)
    }

    /// Phase 2: rescan marked paths one at a time, then write all results
    /// in a single transaction.
    pub async fn apply_rescans(
        &self,
        pending: &PendingScans,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let mut scanned: Vec<DetectionRecord> = Vec::new();
        let mut skipped = 0;

        for path in pending.rescan_paths() {
            match self.scanner.scan(path).await {
                Ok(record) => scanned.push(record),
                Err(DetectError::Skipped(_)) => {
                    debug!("Not rescanning {}: file type skipped", path.display());
                    skipped += 1;
                }
                Err(e) => {
                    warn!("Rescan of {} failed, skipping: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        if scanned.is_empty() {
            report.skipped += skipped;
            return Ok(());
        }

        let mut upserted = 0;
        let mut cleared = 0;
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(SyncError::in_phase(RESCAN_PHASE))?;

        for record in &scanned {
            if record.has_findings() {
                detection_results::upsert_record(&mut *tx, record)
                    .await
                    .map_err(SyncError::in_phase(RESCAN_PHASE))?;
                upserted += 1;
            } else if detection_results::delete_record(&mut *tx, &record.file_path)
                .await
                .map_err(SyncError::in_phase(RESCAN_PHASE))?
            {
                debug!("Cleared record {}: no longer sensitive", record.file_path);
                cleared += 1;
            }
        }

        tx.commit()
            .await
            .map_err(SyncError::transaction(RESCAN_PHASE))?;

        report.upserted += upserted;
        report.cleared += cleared;
        report.skipped += skipped;
        Ok(())
    }
}
