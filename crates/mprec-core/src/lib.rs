//! Core domain model for the missing-person reconciler.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod normalize;

pub use normalize::{
    canonical_name, normalize_record, FieldError, NormalizeError, ParseErrorKind, UNSPECIFIED_NAME,
};

pub const CRATE_NAME: &str = "mprec-core";

/// Opaque identity of a canonical case, assigned once on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Canonical identity of one real person across every platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The mutable payload one platform holds about a case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseInformationFields {
    pub picture: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl CaseInformationFields {
    /// Names of the fields that differ from `other`; empty when a write would be a no-op.
    pub fn changed_fields(&self, other: &CaseInformationFields) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.picture != other.picture {
            changed.push("picture");
        }
        if self.url != other.url {
            changed.push("url");
        }
        if self.description != other.description {
            changed.push("description");
        }
        changed
    }
}

/// One platform's current knowledge about a case, keyed by `(case_id, platform)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInformation {
    pub case_id: CaseId,
    pub platform: String,
    pub fields: CaseInformationFields,
    pub updated_at: DateTime<Utc>,
}

/// Structured detail payload as published by an API source, still unparsed text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonDetails {
    pub nationality: Option<String>,
    pub age_missing: Option<String>,
    pub age_current: Option<String>,
    pub gender: Option<String>,
    pub missing_date: Option<String>,
    pub missing_time: Option<String>,
    pub missing_location: Option<String>,
    pub inform_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawDetail {
    Text(String),
    Person(PersonDetails),
}

/// Handoff contract from source adapters into the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub platform: String,
    pub display_name: Option<String>,
    pub image_url: Option<String>,
    pub detail_url: Option<String>,
    pub detail: Option<RawDetail>,
}

impl RawRecord {
    pub fn new(platform: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            platform: platform.into(),
            display_name,
            image_url: None,
            detail_url: None,
            detail: None,
        }
    }
}

/// A record with its canonical name resolved, ready to be placed in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub fields: CaseInformationFields,
}

impl NormalizedRecord {
    pub fn new(
        name: impl Into<String>,
        picture: Option<&str>,
        url: Option<&str>,
        description: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            fields: CaseInformationFields {
                picture: picture.map(ToString::to_string),
                url: url.map(ToString::to_string),
                description: description.map(ToString::to_string),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_fields_reports_only_differences() {
        let stored = CaseInformationFields {
            picture: Some("a.jpg".into()),
            url: Some("http://x/1".into()),
            description: None,
        };
        let mut incoming = stored.clone();
        assert!(stored.changed_fields(&incoming).is_empty());

        incoming.description = Some("seen near the market".into());
        incoming.picture = Some("b.jpg".into());
        assert_eq!(stored.changed_fields(&incoming), vec!["picture", "description"]);
    }

    #[test]
    fn raw_detail_serializes_with_kind_tag() {
        let detail = RawDetail::Text("hello".into());
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["value"], "hello");
    }
}
