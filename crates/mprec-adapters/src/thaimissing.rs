use async_trait::async_trait;
use mprec_core::{PersonDetails, RawDetail, RawRecord};
use mprec_storage::HttpFetcher;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    fetch_before_deadline, AdapterContext, AdapterError, SourceAdapter, SourceKind, SourceListing,
};

pub(crate) const PLATFORM: &str = "thaimissing";

/// The national missing-person JSON API; one request returns every open case.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThaiMissingAdapter;

fn json_text(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_from_json(platform: &str, record: &Value) -> RawRecord {
    let details = PersonDetails {
        nationality: json_text(record, "nationality"),
        age_missing: json_text(record, "ageMissing"),
        age_current: json_text(record, "ageCurrent"),
        gender: json_text(record, "sex"),
        missing_date: json_text(record, "missingDate"),
        missing_time: json_text(record, "missingTime"),
        missing_location: json_text(record, "missingLocation"),
        inform_location: json_text(record, "informLocation"),
    };
    RawRecord {
        platform: platform.to_string(),
        display_name: json_text(record, "fullName"),
        image_url: json_text(record, "image"),
        detail_url: json_text(record, "url"),
        detail: Some(RawDetail::Person(details)),
    }
}

/// Decode the API body; anything but a top-level array is a parse error.
pub fn parse_api_payload(platform: &str, body: &str) -> Result<Vec<RawRecord>, AdapterError> {
    let value: Value = serde_json::from_str(body).map_err(|e| AdapterError::Parse {
        what: format!("{platform} payload"),
        message: e.to_string(),
    })?;
    let Value::Array(items) = value else {
        return Err(AdapterError::Parse {
            what: format!("{platform} payload"),
            message: "expected a JSON array".to_string(),
        });
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        if !item.is_object() {
            warn!(platform, index = idx, "skipping non-object entry");
            continue;
        }
        records.push(record_from_json(platform, item));
    }
    Ok(records)
}

#[async_trait]
impl SourceAdapter for ThaiMissingAdapter {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn kind(&self) -> SourceKind {
        SourceKind::JsonApi
    }

    async fn list_snapshot_source_records(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<SourceListing, AdapterError> {
        let body = fetch_before_deadline(http, ctx, PLATFORM, &ctx.listing_url).await?;
        let records = parse_api_payload(PLATFORM, &body)?;
        info!(platform = PLATFORM, records = records.len(), "listing collected");
        Ok(SourceListing {
            records,
            complete: true,
            ..SourceListing::default()
        })
    }
}
