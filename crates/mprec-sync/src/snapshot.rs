use std::collections::{BTreeMap, BTreeSet};

use mprec_adapters::SourceListing;
use mprec_core::{normalize_record, NormalizedRecord, RawRecord};
use serde::Serialize;
use tracing::{debug, warn};

/// Every record one platform currently lists, keyed by canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub platform: String,
    pub records: BTreeMap<String, NormalizedRecord>,
    /// Names of listed records that failed to normalize. Their stored rows are
    /// neither updated nor retired.
    pub protected: BTreeSet<String>,
    /// False when a listing page failed or the fetch deadline passed.
    pub complete: bool,
    pub dropped: usize,
    pub duplicates: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&NormalizedRecord> {
        self.records.get(name)
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }
}

#[derive(Debug)]
pub struct SnapshotBuilder {
    platform: String,
    records: BTreeMap<String, NormalizedRecord>,
    protected: BTreeSet<String>,
    source_complete: bool,
    dropped: usize,
    duplicates: usize,
}

impl SnapshotBuilder {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            records: BTreeMap::new(),
            protected: BTreeSet::new(),
            source_complete: true,
            dropped: 0,
            duplicates: 0,
        }
    }

    /// Normalize every record of an adapter listing, in listing order.
    pub fn from_listing(platform: impl Into<String>, listing: &SourceListing) -> Snapshot {
        let mut builder = Self::new(platform);
        if !listing.complete {
            builder.mark_source_incomplete();
        }
        for raw in &listing.records {
            builder.push_raw(raw);
        }
        builder.build()
    }

    pub fn mark_source_incomplete(&mut self) {
        self.source_complete = false;
    }

    pub fn push_raw(&mut self, raw: &RawRecord) {
        match normalize_record(raw) {
            Ok(record) => self.push(record),
            Err(err) => {
                warn!(
                    platform = %self.platform,
                    detail_url = ?raw.detail_url,
                    error = %err,
                    "dropping record that failed to normalize"
                );
                self.protected.insert(err.name);
                self.dropped += 1;
            }
        }
    }

    /// Later records replace earlier ones with the same name.
    pub fn push(&mut self, record: NormalizedRecord) {
        if record.name.trim().is_empty() {
            warn!(platform = %self.platform, "dropping record with an empty name");
            self.dropped += 1;
            return;
        }
        if let Some(previous) = self.records.insert(record.name.clone(), record) {
            debug!(platform = %self.platform, case_name = %previous.name, "duplicate name; later record wins");
            self.duplicates += 1;
        }
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            complete: self.source_complete,
            platform: self.platform,
            records: self.records,
            protected: self.protected,
            dropped: self.dropped,
            duplicates: self.duplicates,
        }
    }
}
