//! Per-subreddit pagination loop.
//!
//! Pages through one listing with the `after` cursor, keeps the eligible
//! self posts and stops on the first of: target reached, empty page, end of
//! listing, or a failed request. Failures never escape; they end up in the
//! returned [`SourceOutcome`] next to whatever was already collected.

use crate::api::{ListingSource, PageRequest, RedditPostData};
use crate::rate_limiter::RequestPacer;
use karma_core::{CoreError, PostRecord};
use std::fmt;
use tracing::{debug, info, warn};

/// What to collect from one subreddit.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectRequest {
    pub subreddit: String,
    pub target: usize,
    /// Newest acceptable `created_utc`, in epoch seconds.
    pub cutoff_utc: f64,
    pub page_size: u32,
    pub sort: String,
    pub time_window: String,
}

impl CollectRequest {
    pub fn new(subreddit: impl Into<String>, target: usize, cutoff_utc: f64) -> Self {
        Self {
            subreddit: subreddit.into(),
            target,
            cutoff_utc,
            page_size: 100,
            sort: "top".to_string(),
            time_window: "year".to_string(),
        }
    }

    fn page(&self, after: Option<String>) -> PageRequest {
        PageRequest {
            subreddit: self.subreddit.clone(),
            limit: self.page_size,
            sort: self.sort.clone(),
            time_window: self.time_window.clone(),
            after,
        }
    }
}

/// Why a subreddit's collection loop ended.
#[derive(Debug)]
pub enum StopReason {
    TargetReached,
    /// A page came back with no items.
    Exhausted,
    /// The last page carried no cursor.
    EndOfListing,
    Failed(CoreError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target reached"),
            StopReason::Exhausted => write!(f, "no more posts"),
            StopReason::EndOfListing => write!(f, "end of listing"),
            StopReason::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Why a listing item was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotSelfPost,
    Adult,
    MissingTimestamp,
    TooRecent,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub subreddit: String,
    pub records: Vec<PostRecord>,
    pub stop: StopReason,
    pub pages_fetched: u32,
    pub items_seen: usize,
    pub items_skipped: usize,
}

/// Check a listing item against the collection filters, returning its
/// creation time when it is eligible.
pub fn check_eligibility(item: &RedditPostData, cutoff_utc: f64) -> Result<f64, SkipReason> {
    if !item.is_self_post() {
        return Err(SkipReason::NotSelfPost);
    }
    if item.is_adult() {
        return Err(SkipReason::Adult);
    }
    let created_utc = item.created_utc.ok_or(SkipReason::MissingTimestamp)?;
    if created_utc > cutoff_utc {
        return Err(SkipReason::TooRecent);
    }
    Ok(created_utc)
}

/// Drain one subreddit listing into at most `request.target` records.
pub async fn collect_source<S>(
    source: &S,
    pacer: &mut RequestPacer,
    request: &CollectRequest,
) -> SourceOutcome
where
    S: ListingSource + ?Sized,
{
    info!("=== Fetching r/{} ===", request.subreddit);

    let mut records = Vec::new();
    let mut after: Option<String> = None;
    let mut pages_fetched = 0;
    let mut items_seen = 0;
    let mut items_skipped = 0;

    let stop = loop {
        if records.len() >= request.target {
            break StopReason::TargetReached;
        }

        pacer.acquire().await;
        let listing = match source.fetch_page(&request.page(after.take())).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("[{}] Listing request failed: {}", request.subreddit, e);
                break StopReason::Failed(e);
            }
        };
        pages_fetched += 1;

        let next_cursor = listing.data.next_cursor().map(str::to_string);
        if listing.data.children.is_empty() {
            info!("[{}] No more posts.", request.subreddit);
            break StopReason::Exhausted;
        }

        for child in listing.data.children {
            if records.len() >= request.target {
                break;
            }
            items_seen += 1;

            let item = child.data;
            match check_eligibility(&item, request.cutoff_utc) {
                Ok(created_utc) => records.push(item.into_post_record(created_utc)),
                Err(reason) => {
                    items_skipped += 1;
                    debug!(
                        "[{}] Skipping {}: {:?}",
                        request.subreddit,
                        item.id.as_deref().unwrap_or("<no id>"),
                        reason
                    );
                }
            }
        }

        if records.len() >= request.target {
            break StopReason::TargetReached;
        }

        match next_cursor {
            Some(cursor) => after = Some(cursor),
            None => {
                info!("[{}] Reached end of listing.", request.subreddit);
                break StopReason::EndOfListing;
            }
        }
    };

    info!(
        "[{}] Collected {} posts ({} pages, {} skipped, {}).",
        request.subreddit,
        records.len(),
        pages_fetched,
        items_skipped,
        stop
    );

    SourceOutcome {
        subreddit: request.subreddit.clone(),
        records,
        stop,
        pages_fetched,
        items_seen,
        items_skipped,
    }
}
