//! Diffing a platform snapshot against the store and applying the result.
//!
//! [`plan`] is pure: it compares the platform's current rows with the snapshot.
//! [`Reconciler::reconcile`] applies a plan inside one unit of work and either
//! commits all of it or rolls all of it back.

use std::collections::HashMap;

use mprec_core::{CaseId, CaseInformationFields};
use mprec_storage::{CaseStore, CaseUnitOfWork, PlatformCaseRow, StoreError, UpsertOutcome};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentAction {
    /// The platform has no row for this name yet.
    Attach,
    Update {
        case_id: CaseId,
        changed: Vec<&'static str>,
    },
    Unchanged { case_id: CaseId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentEntry {
    pub name: String,
    pub fields: CaseInformationFields,
    pub action: PresentAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub platform: String,
    pub present: Vec<PresentEntry>,
    /// Rows whose names the snapshot no longer lists.
    pub stale: Vec<PlatformCaseRow>,
    /// Rows whose listed record failed to normalize; left as they are.
    pub protected: Vec<PlatformCaseRow>,
    pub retire: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Retire stale rows even when the snapshot is known to be incomplete.
    pub retire_on_incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub platform: String,
    pub snapshot_records: usize,
    pub cases_created: usize,
    pub cases_reused: usize,
    pub information_inserted: usize,
    pub information_updated: usize,
    pub information_unchanged: usize,
    pub information_retired: usize,
    pub orphan_cases_deleted: usize,
    /// Stale rows left in place because the snapshot was incomplete.
    pub retirement_skipped: usize,
    /// Rows kept because their record was listed but could not be normalized.
    pub information_protected: usize,
    pub name_conflicts_recovered: usize,
}

impl ReconcileSummary {
    /// Rows created, rewritten or deleted by the pass.
    pub fn rows_changed(&self) -> usize {
        self.cases_created
            + self.information_inserted
            + self.information_updated
            + self.information_retired
            + self.orphan_cases_deleted
    }
}

pub fn plan(existing: &[PlatformCaseRow], snapshot: &Snapshot, options: ReconcileOptions) -> ReconcilePlan {
    let by_name = existing
        .iter()
        .map(|row| (row.name.as_str(), row))
        .collect::<HashMap<_, _>>();

    let present = snapshot
        .records
        .iter()
        .map(|(name, record)| {
            let action = match by_name.get(name.as_str()) {
                None => PresentAction::Attach,
                Some(row) => {
                    let changed = row.fields.changed_fields(&record.fields);
                    if changed.is_empty() {
                        PresentAction::Unchanged { case_id: row.case_id }
                    } else {
                        PresentAction::Update {
                            case_id: row.case_id,
                            changed,
                        }
                    }
                }
            };
            PresentEntry {
                name: name.clone(),
                fields: record.fields.clone(),
                action,
            }
        })
        .collect();

    let (protected, stale): (Vec<_>, Vec<_>) = existing
        .iter()
        .filter(|row| !snapshot.contains(&row.name))
        .cloned()
        .partition(|row| snapshot.is_protected(&row.name));

    ReconcilePlan {
        platform: snapshot.platform.clone(),
        present,
        stale,
        protected,
        retire: snapshot.complete || options.retire_on_incomplete,
    }
}

const MAX_ATTEMPTS: usize = 2;

pub struct Reconciler<'a> {
    store: &'a dyn CaseStore,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn CaseStore) -> Self {
        Self {
            store,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Make the store's view of `snapshot.platform` match the snapshot.
    ///
    /// Any store error rolls back every write of the pass. A pass the store
    /// aborted as transient (deadlock, serialization failure) is run once more
    /// from scratch.
    pub async fn reconcile(&self, snapshot: &Snapshot) -> Result<ReconcileSummary, StoreError> {
        let span = info_span!("reconcile", platform = %snapshot.platform);
        async {
            let mut attempt = 1;
            loop {
                match self.reconcile_once(snapshot).await {
                    Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                        warn!(attempt, error = %err, "store aborted the pass; retrying");
                        attempt += 1;
                    }
                    result => return result,
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn reconcile_once(&self, snapshot: &Snapshot) -> Result<ReconcileSummary, StoreError> {
        let mut uow = self.store.begin().await?;
        match self.apply(uow.as_mut(), snapshot).await {
            Ok(summary) => {
                uow.commit().await?;
                info!(
                    created = summary.cases_created,
                    inserted = summary.information_inserted,
                    updated = summary.information_updated,
                    retired = summary.information_retired,
                    orphans = summary.orphan_cases_deleted,
                    protected = summary.information_protected,
                    "reconciliation committed"
                );
                Ok(summary)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn CaseUnitOfWork,
        snapshot: &Snapshot,
    ) -> Result<ReconcileSummary, StoreError> {
        let platform = snapshot.platform.as_str();
        let existing = uow.platform_rows(platform).await?;
        let plan = plan(&existing, snapshot, self.options);
        let mut summary = ReconcileSummary {
            platform: platform.to_string(),
            snapshot_records: snapshot.len(),
            information_protected: plan.protected.len(),
            ..ReconcileSummary::default()
        };
        for row in &plan.protected {
            debug!(case_name = %row.name, "record failed to normalize; keeping stored information");
        }

        for entry in &plan.present {
            match &entry.action {
                PresentAction::Unchanged { .. } => summary.information_unchanged += 1,
                PresentAction::Update { case_id, changed } => {
                    debug!(case_name = %entry.name, ?changed, "updating information");
                    record_upsert(
                        &mut summary,
                        uow.upsert_case_information(*case_id, platform, &entry.fields).await?,
                    );
                }
                PresentAction::Attach => {
                    let case_id = resolve_case(uow, &entry.name, &mut summary).await?;
                    record_upsert(
                        &mut summary,
                        uow.upsert_case_information(case_id, platform, &entry.fields).await?,
                    );
                }
            }
        }

        if !plan.retire {
            if !plan.stale.is_empty() {
                warn!(
                    stale = plan.stale.len(),
                    "listing incomplete; leaving stale rows in place"
                );
            }
            summary.retirement_skipped = plan.stale.len();
            return Ok(summary);
        }

        let mut candidates = Vec::with_capacity(plan.stale.len());
        for row in &plan.stale {
            if uow.delete_case_information(row.case_id, platform).await? {
                debug!(case_name = %row.name, "retired information");
                summary.information_retired += 1;
            }
            candidates.push(row.case_id);
        }
        summary.orphan_cases_deleted = uow.delete_orphan_cases(&candidates).await?;
        Ok(summary)
    }
}

fn record_upsert(summary: &mut ReconcileSummary, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Inserted => summary.information_inserted += 1,
        UpsertOutcome::Updated => summary.information_updated += 1,
        UpsertOutcome::Unchanged => summary.information_unchanged += 1,
    }
}

/// Reuse the live case with this name, or create it. A creation that loses a
/// race to another unit of work falls back to the winner's case.
async fn resolve_case(
    uow: &mut dyn CaseUnitOfWork,
    name: &str,
    summary: &mut ReconcileSummary,
) -> Result<CaseId, StoreError> {
    if let Some(id) = uow.find_case_by_name(name).await? {
        summary.cases_reused += 1;
        return Ok(id);
    }
    match uow.create_case(name).await {
        Ok(id) => {
            summary.cases_created += 1;
            Ok(id)
        }
        Err(StoreError::NameConflict { .. }) => {
            info!(case_name = name, "case created concurrently; reusing it");
            let id = uow
                .find_case_by_name(name)
                .await?
                .ok_or_else(|| StoreError::NameConflict {
                    name: name.to_string(),
                })?;
            summary.name_conflicts_recovered += 1;
            summary.cases_reused += 1;
            Ok(id)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use mprec_core::{NormalizedRecord, PersonDetails, RawDetail, RawRecord};
    use mprec_storage::InMemoryCaseStore;

    fn snapshot(platform: &str, records: &[NormalizedRecord]) -> Snapshot {
        let mut builder = SnapshotBuilder::new(platform);
        for record in records {
            builder.push(record.clone());
        }
        builder.build()
    }

    fn record(name: &str, picture: &str) -> NormalizedRecord {
        NormalizedRecord::new(name, Some(picture), Some("http://x/1"), None)
    }

    #[tokio::test]
    async fn first_sighting_creates_case_and_information() {
        let store = InMemoryCaseStore::new();
        let summary = Reconciler::new(&store)
            .reconcile(&snapshot("platformA", &[record("สมชาย ใจดี", "a.jpg")]))
            .await
            .unwrap();

        assert_eq!(summary.cases_created, 1);
        assert_eq!(summary.information_inserted, 1);
        let case = store.case_by_name("สมชาย ใจดี").await.unwrap();
        let info = store.information_for(case.id, "platformA").await.unwrap();
        assert_eq!(info.fields.picture.as_deref(), Some("a.jpg"));
        assert_eq!(info.fields.url.as_deref(), Some("http://x/1"));
        assert_eq!(info.fields.description, None);
    }

    #[tokio::test]
    async fn second_identical_run_writes_nothing() {
        let store = InMemoryCaseStore::new();
        let snap = snapshot(
            "platformA",
            &[record("สมชาย ใจดี", "a.jpg"), record("สมหญิง", "b.jpg")],
        );
        Reconciler::new(&store).reconcile(&snap).await.unwrap();
        let writes_after_first = store.write_statements();

        let summary = Reconciler::new(&store).reconcile(&snap).await.unwrap();
        assert_eq!(store.write_statements(), writes_after_first);
        assert_eq!(summary.rows_changed(), 0);
        assert_eq!(summary.information_unchanged, 2);
    }

    #[tokio::test]
    async fn changed_fields_update_in_place() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("สมชาย", "a.jpg")]))
            .await
            .unwrap();
        let before = store.case_by_name("สมชาย").await.unwrap();
        let writes = store.write_statements();

        let summary = Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("สมชาย", "b.jpg")]))
            .await
            .unwrap();
        assert_eq!(summary.information_updated, 1);
        assert_eq!(summary.cases_created, 0);
        assert_eq!(store.write_statements(), writes + 1);
        let info = store.information_for(before.id, "p").await.unwrap();
        assert_eq!(info.fields.picture.as_deref(), Some("b.jpg"));
    }

    #[tokio::test]
    async fn same_name_on_two_platforms_is_one_case() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("a", &[record("สมชาย", "a.jpg")]))
            .await
            .unwrap();
        let summary = Reconciler::new(&store)
            .reconcile(&snapshot("b", &[record("สมชาย", "b.jpg")]))
            .await
            .unwrap();

        assert_eq!(summary.cases_reused, 1);
        assert_eq!(summary.cases_created, 0);
        assert_eq!(store.cases().await.len(), 1);
        let case = store.case_by_name("สมชาย").await.unwrap();
        assert!(store.information_for(case.id, "a").await.is_some());
        assert!(store.information_for(case.id, "b").await.is_some());
    }

    #[tokio::test]
    async fn missing_names_are_retired_and_orphans_removed() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("สมชาย ใจดี", "a.jpg")]))
            .await
            .unwrap();

        let summary = Reconciler::new(&store)
            .reconcile(&snapshot("p", &[]))
            .await
            .unwrap();
        assert_eq!(summary.information_retired, 1);
        assert_eq!(summary.orphan_cases_deleted, 1);
        assert!(store.cases().await.is_empty());
        assert!(store.case_information().await.is_empty());
    }

    #[tokio::test]
    async fn retirement_keeps_cases_other_platforms_still_list() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("a", &[record("สมชาย", "a.jpg")]))
            .await
            .unwrap();
        Reconciler::new(&store)
            .reconcile(&snapshot("b", &[record("สมชาย", "b.jpg")]))
            .await
            .unwrap();

        let summary = Reconciler::new(&store)
            .reconcile(&snapshot("a", &[]))
            .await
            .unwrap();
        assert_eq!(summary.information_retired, 1);
        assert_eq!(summary.orphan_cases_deleted, 0);
        let case = store.case_by_name("สมชาย").await.unwrap();
        assert!(store.information_for(case.id, "a").await.is_none());
        assert!(store.information_for(case.id, "b").await.is_some());
    }

    #[tokio::test]
    async fn incomplete_snapshots_do_not_retire() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("สมชาย", "a.jpg"), record("สมหญิง", "b.jpg")]))
            .await
            .unwrap();

        let mut builder = SnapshotBuilder::new("p");
        builder.mark_source_incomplete();
        builder.push(record("สมชาย", "a.jpg"));
        let partial = builder.build();

        let summary = Reconciler::new(&store).reconcile(&partial).await.unwrap();
        assert_eq!(summary.retirement_skipped, 1);
        assert_eq!(summary.information_retired, 0);
        assert!(store.case_by_name("สมหญิง").await.is_some());

        let summary = Reconciler::new(&store)
            .with_options(ReconcileOptions {
                retire_on_incomplete: true,
            })
            .reconcile(&partial)
            .await
            .unwrap();
        assert_eq!(summary.information_retired, 1);
        assert!(store.case_by_name("สมหญิง").await.is_none());
    }

    #[tokio::test]
    async fn store_failure_leaves_prior_state_untouched() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("เก่า", "old.jpg")]))
            .await
            .unwrap();
        let cases_before = store.cases().await;
        let info_before = store.case_information().await;
        let writes_before = store.write_statements();

        // Fails on the third write: after one case and its information are staged.
        let failing = store.with_failure_after(2);
        let err = Reconciler::new(&failing)
            .reconcile(&snapshot("p", &[record("ใหม่", "a.jpg"), record("อีกคน", "b.jpg")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        assert_eq!(store.cases().await, cases_before);
        assert_eq!(store.case_information().await, info_before);
        assert_eq!(store.write_statements(), writes_before);
    }

    #[test]
    fn plan_sorts_names_into_actions() {
        let case = CaseId::new_random();
        let other = CaseId::new_random();
        let existing = vec![
            PlatformCaseRow {
                case_id: case,
                name: "คงอยู่".into(),
                fields: record("คงอยู่", "a.jpg").fields,
            },
            PlatformCaseRow {
                case_id: other,
                name: "หายไป".into(),
                fields: record("หายไป", "b.jpg").fields,
            },
        ];
        let snap = snapshot("p", &[record("คงอยู่", "c.jpg"), record("ใหม่", "d.jpg")]);
        let plan = plan(&existing, &snap, ReconcileOptions::default());

        let actions = plan
            .present
            .iter()
            .map(|entry| (entry.name.as_str(), entry.action.clone()))
            .collect::<HashMap<_, _>>();
        assert_eq!(
            actions["คงอยู่"],
            PresentAction::Update {
                case_id: case,
                changed: vec!["picture"],
            }
        );
        assert_eq!(actions["ใหม่"], PresentAction::Attach);
        assert_eq!(plan.stale.len(), 1);
        assert_eq!(plan.stale[0].case_id, other);
        assert!(plan.retire);
    }

    /// Wraps the in-memory store to replay concurrency outcomes.
    ///
    /// `hide_first_lookup` hides existing cases from the first lookup of each
    /// unit of work, as if another platform committed the same name between our
    /// lookup and our insert. Each of the first `deadlocks` orphan cleanups
    /// fails the way Postgres reports a deadlock victim.
    struct ScriptedStore {
        inner: InMemoryCaseStore,
        hide_first_lookup: bool,
        deadlocks_left: Arc<AtomicUsize>,
    }

    impl ScriptedStore {
        fn racing(inner: &InMemoryCaseStore) -> Self {
            Self {
                inner: inner.clone(),
                hide_first_lookup: true,
                deadlocks_left: Arc::default(),
            }
        }

        fn deadlocking(inner: &InMemoryCaseStore, deadlocks: usize) -> Self {
            Self {
                inner: inner.clone(),
                hide_first_lookup: false,
                deadlocks_left: Arc::new(AtomicUsize::new(deadlocks)),
            }
        }
    }

    struct ScriptedUnitOfWork {
        inner: Box<dyn CaseUnitOfWork>,
        hide_first_lookup: bool,
        lookups: usize,
        deadlocks_left: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CaseStore for ScriptedStore {
        async fn begin(&self) -> Result<Box<dyn CaseUnitOfWork>, StoreError> {
            Ok(Box::new(ScriptedUnitOfWork {
                inner: self.inner.begin().await?,
                hide_first_lookup: self.hide_first_lookup,
                lookups: 0,
                deadlocks_left: self.deadlocks_left.clone(),
            }))
        }
    }

    #[async_trait]
    impl CaseUnitOfWork for ScriptedUnitOfWork {
        async fn platform_rows(&mut self, platform: &str) -> Result<Vec<PlatformCaseRow>, StoreError> {
            self.inner.platform_rows(platform).await
        }

        async fn find_case_by_name(&mut self, name: &str) -> Result<Option<CaseId>, StoreError> {
            self.lookups += 1;
            if self.hide_first_lookup && self.lookups == 1 {
                return Ok(None);
            }
            self.inner.find_case_by_name(name).await
        }

        async fn create_case(&mut self, name: &str) -> Result<CaseId, StoreError> {
            self.inner.create_case(name).await
        }

        async fn upsert_case_information(
            &mut self,
            case_id: CaseId,
            platform: &str,
            fields: &CaseInformationFields,
        ) -> Result<UpsertOutcome, StoreError> {
            self.inner.upsert_case_information(case_id, platform, fields).await
        }

        async fn delete_case_information(
            &mut self,
            case_id: CaseId,
            platform: &str,
        ) -> Result<bool, StoreError> {
            self.inner.delete_case_information(case_id, platform).await
        }

        async fn delete_orphan_cases(&mut self, candidates: &[CaseId]) -> Result<usize, StoreError> {
            let deadlocked = self
                .deadlocks_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if deadlocked {
                return Err(StoreError::Transient("deadlock detected".into()));
            }
            self.inner.delete_orphan_cases(candidates).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn losing_a_creation_race_reuses_the_winner() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("a", &[record("สมชาย", "a.jpg")]))
            .await
            .unwrap();
        let winner = store.case_by_name("สมชาย").await.unwrap();

        let racing = ScriptedStore::racing(&store);
        let summary = Reconciler::new(&racing)
            .reconcile(&snapshot("b", &[record("สมชาย", "b.jpg")]))
            .await
            .unwrap();

        assert_eq!(summary.name_conflicts_recovered, 1);
        assert_eq!(summary.cases_created, 0);
        assert_eq!(store.cases().await.len(), 1);
        assert!(store.information_for(winner.id, "b").await.is_some());
    }

    #[tokio::test]
    async fn a_deadlocked_pass_is_retried_from_scratch() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("หายไป", "a.jpg"), record("คงอยู่", "b.jpg")]))
            .await
            .unwrap();

        let deadlocking = ScriptedStore::deadlocking(&store, 1);
        let summary = Reconciler::new(&deadlocking)
            .reconcile(&snapshot("p", &[record("คงอยู่", "b.jpg"), record("ใหม่", "c.jpg")]))
            .await
            .unwrap();

        assert_eq!(summary.information_retired, 1);
        assert_eq!(summary.orphan_cases_deleted, 1);
        assert_eq!(summary.cases_created, 1);
        assert!(store.case_by_name("หายไป").await.is_none());
        assert!(store.case_by_name("ใหม่").await.is_some());
        assert_eq!(store.cases().await.len(), 2);
    }

    #[tokio::test]
    async fn repeated_deadlocks_give_up_and_leave_the_store_alone() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("หายไป", "a.jpg")]))
            .await
            .unwrap();
        let info_before = store.case_information().await;

        let deadlocking = ScriptedStore::deadlocking(&store, 2);
        let err = Reconciler::new(&deadlocking)
            .reconcile(&snapshot("p", &[record("ใหม่", "c.jpg")]))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.case_information().await, info_before);
        assert!(store.case_by_name("ใหม่").await.is_none());
    }

    fn unparseable(platform: &str, name: &str) -> RawRecord {
        RawRecord {
            platform: platform.into(),
            display_name: Some(name.into()),
            image_url: None,
            detail_url: None,
            detail: Some(RawDetail::Person(PersonDetails {
                age_missing: Some("ไม่ระบุ".into()),
                ..PersonDetails::default()
            })),
        }
    }

    #[tokio::test]
    async fn an_unparseable_record_does_not_block_retirement() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("gone", "a.jpg"), record("stays", "b.jpg")]))
            .await
            .unwrap();

        let mut builder = SnapshotBuilder::new("p");
        builder.push(record("stays", "b.jpg"));
        builder.push_raw(&unparseable("p", "other person"));
        let snap = builder.build();
        assert!(snap.complete);
        assert_eq!(snap.dropped, 1);

        let summary = Reconciler::new(&store).reconcile(&snap).await.unwrap();
        assert_eq!(summary.information_retired, 1);
        assert_eq!(summary.retirement_skipped, 0);
        assert!(store.case_by_name("gone").await.is_none());
        assert!(store.case_by_name("stays").await.is_some());
    }

    #[tokio::test]
    async fn a_listed_but_unparseable_record_keeps_its_stored_row() {
        let store = InMemoryCaseStore::new();
        Reconciler::new(&store)
            .reconcile(&snapshot("p", &[record("สมชาย", "a.jpg"), record("gone", "b.jpg")]))
            .await
            .unwrap();
        let kept = store.case_by_name("สมชาย").await.unwrap();

        let mut builder = SnapshotBuilder::new("p");
        builder.push_raw(&unparseable("p", "สมชาย"));
        let snap = builder.build();

        let summary = Reconciler::new(&store).reconcile(&snap).await.unwrap();
        assert_eq!(summary.information_protected, 1);
        assert_eq!(summary.information_retired, 1);
        let info = store.information_for(kept.id, "p").await.unwrap();
        assert_eq!(info.fields.picture.as_deref(), Some("a.jpg"));
        assert!(store.case_by_name("gone").await.is_none());
    }
}
