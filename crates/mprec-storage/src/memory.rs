use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mprec_core::{Case, CaseId, CaseInformation, CaseInformationFields};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{CaseStore, CaseUnitOfWork, PlatformCaseRow, StoreError, UpsertOutcome};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    cases: BTreeMap<CaseId, Case>,
    names: HashMap<String, CaseId>,
    information: BTreeMap<(CaseId, String), CaseInformation>,
}

/// Process-local store. Units of work run one at a time against a private copy
/// that replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCaseStore {
    state: Arc<Mutex<MemoryState>>,
    committed_writes: Arc<AtomicUsize>,
    fail_after_writes: Option<usize>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose units of work fail on the write statement after the first `writes`.
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after_writes: Some(writes),
            ..Self::default()
        }
    }

    /// Share state with `self` but inject a failure after `writes` write statements.
    pub fn with_failure_after(&self, writes: usize) -> Self {
        Self {
            state: self.state.clone(),
            committed_writes: self.committed_writes.clone(),
            fail_after_writes: Some(writes),
        }
    }

    /// Write statements that changed rows and were committed.
    pub fn write_statements(&self) -> usize {
        self.committed_writes.load(Ordering::SeqCst)
    }

    pub async fn cases(&self) -> Vec<Case> {
        self.state.lock().await.cases.values().cloned().collect()
    }

    pub async fn case_information(&self) -> Vec<CaseInformation> {
        self.state.lock().await.information.values().cloned().collect()
    }

    pub async fn case_by_name(&self, name: &str) -> Option<Case> {
        let state = self.state.lock().await;
        let id = state.names.get(name)?;
        state.cases.get(id).cloned()
    }

    pub async fn information_for(&self, case_id: CaseId, platform: &str) -> Option<CaseInformation> {
        self.state
            .lock()
            .await
            .information
            .get(&(case_id, platform.to_string()))
            .cloned()
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn begin(&self) -> Result<Box<dyn CaseUnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            writes: 0,
            fail_after_writes: self.fail_after_writes,
            committed_writes: self.committed_writes.clone(),
        }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    writes: usize,
    fail_after_writes: Option<usize>,
    committed_writes: Arc<AtomicUsize>,
}

impl MemoryUnitOfWork {
    fn record_write(&mut self) -> Result<(), StoreError> {
        if let Some(limit) = self.fail_after_writes {
            if self.writes >= limit {
                return Err(StoreError::Unavailable(format!(
                    "injected failure after {limit} writes"
                )));
            }
        }
        self.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl CaseUnitOfWork for MemoryUnitOfWork {
    async fn platform_rows(&mut self, platform: &str) -> Result<Vec<PlatformCaseRow>, StoreError> {
        let mut rows = self
            .working
            .information
            .values()
            .filter(|info| info.platform == platform)
            .filter_map(|info| {
                let case = self.working.cases.get(&info.case_id)?;
                Some(PlatformCaseRow {
                    case_id: info.case_id,
                    name: case.name.clone(),
                    fields: info.fields.clone(),
                })
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn find_case_by_name(&mut self, name: &str) -> Result<Option<CaseId>, StoreError> {
        Ok(self.working.names.get(name).copied())
    }

    async fn create_case(&mut self, name: &str) -> Result<CaseId, StoreError> {
        if self.working.names.contains_key(name) {
            return Err(StoreError::NameConflict {
                name: name.to_string(),
            });
        }
        self.record_write()?;
        let case = Case {
            id: CaseId::new_random(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = case.id;
        self.working.names.insert(case.name.clone(), id);
        self.working.cases.insert(id, case);
        Ok(id)
    }

    async fn upsert_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
        fields: &CaseInformationFields,
    ) -> Result<UpsertOutcome, StoreError> {
        if !self.working.cases.contains_key(&case_id) {
            return Err(StoreError::Unavailable(format!(
                "foreign key violation: case {case_id} does not exist"
            )));
        }
        let key = (case_id, platform.to_string());
        let outcome = match self.working.information.get(&key) {
            Some(existing) if existing.fields == *fields => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        self.record_write()?;
        self.working.information.insert(
            key,
            CaseInformation {
                case_id,
                platform: platform.to_string(),
                fields: fields.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(outcome)
    }

    async fn delete_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
    ) -> Result<bool, StoreError> {
        let key = (case_id, platform.to_string());
        if !self.working.information.contains_key(&key) {
            return Ok(false);
        }
        self.record_write()?;
        self.working.information.remove(&key);
        Ok(true)
    }

    async fn delete_orphan_cases(&mut self, candidates: &[CaseId]) -> Result<usize, StoreError> {
        let orphans = candidates
            .iter()
            .copied()
            .filter(|id| self.working.cases.contains_key(id))
            .filter(|id| !self.working.information.keys().any(|(case_id, _)| case_id == id))
            .collect::<Vec<_>>();
        if orphans.is_empty() {
            return Ok(0);
        }
        self.record_write()?;
        for id in &orphans {
            if let Some(case) = self.working.cases.remove(id) {
                self.working.names.remove(&case.name);
            }
        }
        Ok(orphans.len())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            mut guard,
            working,
            writes,
            committed_writes,
            ..
        } = *self;
        *guard = working;
        committed_writes.fetch_add(writes, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
