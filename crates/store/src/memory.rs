use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use lai_contracts::{AuditReport, NewAuditReport, ReportSummary};
use ulid::Ulid;

use crate::StoreError;

/// Process-local store used for development and tests. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryReportStore {
    reports: Arc<RwLock<Vec<AuditReport>>>,
    calls: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations served so far, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// While set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<AuditReport>> {
        match self.reports.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<AuditReport>> {
        match self.reports.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert(&self, report: &NewAuditReport) -> Result<String, StoreError> {
        self.begin()?;
        let id = Ulid::new().to_string();
        let record = AuditReport::from_new(id.clone(), Utc::now(), report.clone());
        self.write().push(record);
        Ok(id)
    }

    /// Inserts a fully formed record, `id` and `created_at` included.
    pub fn seed(&self, report: AuditReport) {
        self.write().push(report);
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<AuditReport>, StoreError> {
        self.begin()?;
        Ok(self.read().iter().find(|r| r.id == id).cloned())
    }

    pub fn list_all(&self) -> Result<Vec<ReportSummary>, StoreError> {
        self.begin()?;
        // Reverse insertion order first so equal timestamps list the latest insert first.
        let mut rows = self
            .read()
            .iter()
            .rev()
            .map(AuditReport::summary)
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    pub fn update_by_id(&self, id: &str, report: &NewAuditReport) -> Result<bool, StoreError> {
        self.begin()?;
        let mut reports = self.write();
        let Some(existing) = reports.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        existing.apply_update(report.clone());
        Ok(true)
    }

    pub fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.begin()?;
        self.write().retain(|r| r.id != id);
        Ok(())
    }

    pub fn ping(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
