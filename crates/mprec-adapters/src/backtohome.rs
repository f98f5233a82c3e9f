use async_trait::async_trait;
use mprec_core::{RawDetail, RawRecord};
use mprec_storage::HttpFetcher;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    collect_bounded, fetch_before_deadline, AdapterContext, AdapterError, SourceAdapter,
    SourceKind, SourceListing,
};

pub(crate) const PLATFORM: &str = "backtohome";
const SITE_ROOT: &str = "https://web.backtohome.org/";
const PLACEHOLDER_IMAGES: [&str; 2] = ["small_missing", "small_childmissing"];

/// One `.miss_img` / `.miss_detail` pair from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub listing_id: Option<String>,
    pub name: Option<String>,
    pub detail_url: Option<String>,
    pub image_url: Option<String>,
}

/// The HTML missing-person registry; listing pages are `listing_url` + page number.
#[derive(Debug, Clone)]
pub struct BackToHomeAdapter {
    site_root: String,
}

impl Default for BackToHomeAdapter {
    fn default() -> Self {
        Self {
            site_root: SITE_ROOT.to_string(),
        }
    }
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Parse {
        what: format!("selector {css}"),
        message: e.to_string(),
    })
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Highest `pages=N` among the pager links; 1 when the page has no pager.
pub fn parse_total_pages(html: &str) -> Result<u32, AdapterError> {
    let document = Html::parse_document(html);
    let links = selector(r#"a[href*="pages="]"#)?;
    let max = document
        .select(&links)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| href.split("pages=").nth(1))
        .filter_map(|tail| {
            let digits = tail
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            digits.parse::<u32>().ok()
        })
        .max();
    Ok(max.unwrap_or(1).max(1))
}

pub fn parse_listing_page(html: &str, site_root: &str) -> Result<Vec<ListingEntry>, AdapterError> {
    let base = Url::parse(site_root).map_err(|e| AdapterError::Parse {
        what: format!("site root {site_root}"),
        message: e.to_string(),
    })?;
    let document = Html::parse_document(html);
    let image_blocks = selector(".miss_img")?;
    let detail_blocks = selector(".miss_detail")?;
    let link = selector("a[href]")?;
    let image = selector("img[src]")?;
    let centered = selector(r#"div[align="center"]"#)?;

    let entries = document
        .select(&image_blocks)
        .zip(document.select(&detail_blocks))
        .map(|(img_div, detail_div)| {
            let detail_url = img_div
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve(&base, href));
            let listing_id = detail_url.as_ref().and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "id")
                    .map(|(_, v)| v.into_owned())
            });
            let image_url = img_div
                .select(&image)
                .filter_map(|img| img.value().attr("src"))
                .find(|src| !PLACEHOLDER_IMAGES.iter().any(|p| src.contains(p)))
                .and_then(|src| resolve(&base, src))
                .map(String::from);
            let name = detail_div
                .select(&centered)
                .next()
                .and_then(|div| text_or_none(div.text().map(str::trim).collect::<String>()));

            ListingEntry {
                listing_id,
                name,
                detail_url: detail_url.map(String::from),
                image_url,
            }
        })
        .collect();
    Ok(entries)
}

/// Collapse whitespace and give every `**` marker exactly one trailing space.
pub fn clean_detail_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut rest = collapsed.as_str();
    while let Some(idx) = rest.find("**") {
        out.push_str(&rest[..idx + 2]);
        out.push(' ');
        rest = rest[idx + 2..].trim_start();
    }
    out.push_str(rest);
    out.trim_end().to_string()
}

/// Text of the second `div` under `#content > article > div`, if the page has one.
pub fn parse_detail_page(html: &str) -> Result<Option<String>, AdapterError> {
    let document = Html::parse_document(html);
    let target = selector("#content > article > div")?;
    let Some(container) = document.select(&target).next() else {
        return Ok(None);
    };
    let body = container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "div")
        .nth(1);
    Ok(body.and_then(|div| {
        let joined = div
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        text_or_none(clean_detail_text(&joined))
    }))
}

impl BackToHomeAdapter {
    /// Resolve listing links against `site_root` instead of the public site.
    pub fn with_site_root(site_root: impl Into<String>) -> Self {
        Self {
            site_root: site_root.into(),
        }
    }

    fn page_url(listing_url: &str, page: u32) -> String {
        format!("{listing_url}{page}")
    }

    async fn fetch_detail(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        entry: &ListingEntry,
    ) -> Result<Option<String>, AdapterError> {
        let Some(url) = entry.detail_url.as_deref() else {
            debug!(listing_name = ?entry.name, "no detail link");
            return Ok(None);
        };
        let html = http
            .fetch_text(ctx.run_id, PLATFORM, url)
            .await
            .map_err(|source| AdapterError::Fetch {
                url: url.to_string(),
                source,
            })?;
        parse_detail_page(&html)
    }
}

#[async_trait]
impl SourceAdapter for BackToHomeAdapter {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn kind(&self) -> SourceKind {
        SourceKind::HtmlRegistry
    }

    async fn list_snapshot_source_records(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
    ) -> Result<SourceListing, AdapterError> {
        // Without the first page there is no listing at all.
        let first_url = Self::page_url(&ctx.listing_url, 1);
        let first_page = fetch_before_deadline(http, ctx, PLATFORM, &first_url).await?;
        let total_pages = parse_total_pages(&first_page)?;
        info!(platform = PLATFORM, total_pages, "listing discovered");

        let mut pages = vec![(1, Ok(first_page))];
        let fetches = (2..=total_pages).map(|page| async move {
            let url = Self::page_url(&ctx.listing_url, page);
            let result = http
                .fetch_text(ctx.run_id, PLATFORM, &url)
                .await
                .map_err(|source| AdapterError::Fetch { url, source });
            (page, result)
        });
        let (rest, pages_finished) = collect_bounded(fetches, ctx.page_concurrency, ctx.deadline).await;
        pages.extend(rest);
        pages.sort_by_key(|(page, _)| *page);

        let mut listing = SourceListing {
            complete: pages_finished,
            ..SourceListing::default()
        };
        let mut entries = Vec::new();
        for (page, result) in pages {
            match result.and_then(|html| parse_listing_page(&html, &self.site_root)) {
                Ok(found) => {
                    debug!(page, listings = found.len(), "parsed listing page");
                    entries.extend(found);
                }
                Err(err) => {
                    warn!(platform = PLATFORM, page, error = %err, "skipping listing page");
                    listing.page_failures += 1;
                    listing.complete = false;
                }
            }
        }
        if !pages_finished {
            warn!(platform = PLATFORM, "deadline passed while fetching listing pages");
        }

        let details: Vec<_> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| async move { (idx, self.fetch_detail(http, ctx, entry).await) })
            .collect();
        let (mut fetched, details_finished) =
            collect_bounded(details, ctx.detail_concurrency, ctx.deadline).await;
        fetched.sort_by_key(|(idx, _)| *idx);
        if !details_finished {
            warn!(
                platform = PLATFORM,
                fetched = fetched.len(),
                listed = entries.len(),
                "deadline passed while fetching details; unfetched listings are left out"
            );
            listing.complete = false;
        }

        for (idx, detail) in fetched {
            let entry = &entries[idx];
            let detail = match detail {
                Ok(detail) => detail,
                Err(err) => {
                    warn!(
                        platform = PLATFORM,
                        listing_id = ?entry.listing_id,
                        error = %err,
                        "detail fetch failed; keeping listing without description"
                    );
                    listing.detail_failures += 1;
                    None
                }
            };
            listing.records.push(RawRecord {
                platform: PLATFORM.to_string(),
                display_name: entry.name.clone(),
                image_url: entry.image_url.clone(),
                detail_url: entry.detail_url.clone(),
                detail: detail.map(RawDetail::Text),
            });
        }

        info!(
            platform = PLATFORM,
            records = listing.records.len(),
            page_failures = listing.page_failures,
            detail_failures = listing.detail_failures,
            complete = listing.complete,
            "listing collected"
        );
        Ok(listing)
    }
}
