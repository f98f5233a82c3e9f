//! Source adapter contract + the per-platform listing adapters.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mprec_core::RawRecord;
use mprec_storage::{FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

mod backtohome;
mod thaimissing;

pub use backtohome::{
    clean_detail_text, parse_detail_page, parse_listing_page, parse_total_pages, BackToHomeAdapter,
    ListingEntry,
};
pub use thaimissing::{parse_api_payload, ThaiMissingAdapter};

pub const CRATE_NAME: &str = "mprec-adapters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    HtmlRegistry,
    JsonApi,
}

#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub listing_url: String,
    pub page_concurrency: usize,
    pub detail_concurrency: usize,
    /// Outstanding fetches are abandoned once this passes.
    pub deadline: Option<Instant>,
}

/// Everything one adapter run observed.
#[derive(Debug, Clone, Default)]
pub struct SourceListing {
    pub records: Vec<RawRecord>,
    /// False when a listing page failed or the deadline cut the run short.
    pub complete: bool,
    pub page_failures: usize,
    pub detail_failures: usize,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("parsing {what}: {message}")]
    Parse { what: String, message: String },
    #[error("deadline passed before {0} could be fetched")]
    DeadlineExpired(String),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn platform(&self) -> &'static str;
    fn kind(&self) -> SourceKind;

    async fn list_snapshot_source_records(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<SourceListing, AdapterError>;
}

pub fn adapter_for_platform(platform: &str) -> Option<Box<dyn SourceAdapter>> {
    match platform {
        backtohome::PLATFORM => Some(Box::new(BackToHomeAdapter::default())),
        thaimissing::PLATFORM => Some(Box::new(ThaiMissingAdapter)),
        _ => None,
    }
}

/// Run `tasks` on at most `limit` concurrent workers and collect what finishes
/// before `deadline`. The flag is false when the deadline cut collection short.
pub(crate) async fn collect_bounded<I, F, T>(
    tasks: I,
    limit: usize,
    deadline: Option<Instant>,
) -> (Vec<T>, bool)
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    let mut pending = std::pin::pin!(stream::iter(tasks).buffer_unordered(limit.max(1)));
    let mut done = Vec::new();
    loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(next) => next,
                Err(_) => return (done, false),
            },
            None => pending.next().await,
        };
        match next {
            Some(value) => done.push(value),
            None => return (done, true),
        }
    }
}

pub(crate) async fn fetch_before_deadline(
    http: &HttpFetcher,
    ctx: &AdapterContext,
    platform: &str,
    url: &str,
) -> Result<String, AdapterError> {
    let fetch = http.fetch_text(ctx.run_id, platform, url);
    let result = match ctx.deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fetch)
            .await
            .map_err(|_| AdapterError::DeadlineExpired(url.to_string()))?,
        None => fetch.await,
    };
    result.map_err(|source| AdapterError::Fetch {
        url: url.to_string(),
        source,
    })
}
