pub mod api;
pub mod collector;
pub mod metrics;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod rate_limiter;


pub use api::{
    ClientConfig, ListingSource, PageRequest, RedditApiClient, RedditListing, RedditListingChild,
    RedditListingData, RedditPostData, REDDIT_WEB_BASE,
};
pub use collector::{
    check_eligibility, collect_source, CollectRequest, SkipReason, SourceOutcome, StopReason,
};
pub use metrics::{ApiMetrics, MetricsCollector, RequestMetrics, SubredditMetrics};
pub use rate_limiter::{PacerStatus, PacingClock, RequestPacer, TokioClock};

#[cfg(any(test, feature = "test-util"))]
pub use rate_limiter::ManualClock;
