use crate::metrics::{MetricsCollector, RequestMetrics};
use async_trait::async_trait;
use karma_core::{estimate_votes, CoreError, PostRecord, RedditApiError};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

/// Longest slice of an error body kept for logging.
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default)]
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

impl<T> Default for RedditListingData<T> {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            after: None,
            before: None,
            dist: None,
        }
    }
}

impl<T> RedditListingData<T> {
    /// Cursor for the next page, `None` once the listing is exhausted.
    pub fn next_cursor(&self) -> Option<&str> {
        self.after.as_deref().filter(|after| !after.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    #[serde(default)]
    pub kind: String,
    pub data: T,
}

/// A post as served by the public listing endpoint.
///
/// Everything is optional: the public JSON is not a stable contract and a
/// single odd item must not reject the whole page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditPostData {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub selftext: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subreddit: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub permalink: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_utc: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub num_comments: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub over_18: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub subreddit_over18: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub ups: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub downs: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub upvote_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_self: Option<bool>,
}

/// Keep a field only when it has the expected shape; anything else reads as
/// absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_f64())
        .filter(|timestamp| timestamp.is_finite()))
}

impl RedditPostData {
    pub fn is_self_post(&self) -> bool {
        self.is_self.unwrap_or(false)
    }

    /// Adult-flagged on the post itself or on its subreddit.
    pub fn is_adult(&self) -> bool {
        self.over_18.unwrap_or(false) || self.subreddit_over18.unwrap_or(false)
    }

    /// Build the exported record. `created_utc` is the already validated
    /// creation time of this item.
    pub fn into_post_record(self, created_utc: f64) -> PostRecord {
        let score = self.score.unwrap_or(0);
        let estimate = estimate_votes(Some(score), self.upvote_ratio);

        PostRecord {
            id: self.id.unwrap_or_default(),
            subreddit: self.subreddit.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            selftext: self.selftext.unwrap_or_default(),
            score,
            upvote_ratio: self.upvote_ratio,
            ups_raw: self.ups,
            downs_raw: self.downs,
            ups_estimated: estimate.map(|e| e.upvotes),
            downs_estimated: estimate.map(|e| e.downvotes),
            num_comments: self.num_comments.unwrap_or(0),
            created_utc,
            permalink: format!(
                "{}{}",
                REDDIT_WEB_BASE,
                self.permalink.as_deref().unwrap_or_default()
            ),
            over_18: self.over_18.unwrap_or(false),
            is_self: self.is_self.unwrap_or(false),
        }
    }
}

/// One page request against a subreddit listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub subreddit: String,
    pub limit: u32,
    pub sort: String,
    pub time_window: String,
    pub after: Option<String>,
}

impl PageRequest {
    pub fn endpoint(&self) -> String {
        format!("/r/{}/{}.json", self.subreddit, self.sort)
    }
}

/// Anything that can serve pages of a subreddit listing.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError>;
}

#[async_trait]
impl<S: ListingSource + ?Sized> ListingSource for Arc<S> {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        (**self).fetch_page(request).await
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            base_url: REDDIT_WEB_BASE.to_string(),
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: Url,
    metrics: Arc<MetricsCollector>,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid API base URL '{}': {}", config.base_url, e),
        })?;

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            metrics: Arc::new(MetricsCollector::new()),
            user_agent: config.user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn send_listing_request(&self, request: &PageRequest) -> Result<Response, CoreError> {
        let endpoint = request.endpoint();
        let url = self
            .base_url
            .join(&endpoint)
            .map_err(|e| CoreError::InvalidInput {
                message: format!("invalid listing endpoint '{}': {}", endpoint, e),
            })?;

        let limit = request.limit.to_string();
        let mut params = vec![("limit", limit.as_str()), ("t", request.time_window.as_str())];
        if let Some(after) = request.after.as_deref() {
            params.push(("after", after));
        }

        info!("Making Reddit listing request: GET {}", endpoint);
        let response = self
            .http_client
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(status_error(status, &endpoint, request, response).await)
    }

    pub async fn get_subreddit_posts(
        &self,
        request: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let start_time = Instant::now();
        let outcome = match self.send_listing_request(request).await {
            Ok(response) => response
                .json::<RedditListing<RedditPostData>>()
                .await
                .map_err(|e| {
                    error!("Failed to parse subreddit posts: {}", e);
                    CoreError::RedditApi(RedditApiError::InvalidResponse {
                        details: format!("Failed to parse posts for r/{}", request.subreddit),
                    })
                }),
            Err(e) => Err(e),
        };

        self.metrics
            .record_request(request_metrics(request, &outcome, start_time.elapsed()))
            .await;

        let listing = outcome?;
        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            request.subreddit
        );
        Ok(listing)
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    /// Metrics as pretty JSON.
    pub async fn export_metrics(&self) -> Result<String, CoreError> {
        Ok(self.metrics.export_metrics().await?)
    }
}

#[async_trait]
impl ListingSource for RedditApiClient {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        self.get_subreddit_posts(request).await
    }
}

async fn status_error(
    status: StatusCode,
    endpoint: &str,
    request: &PageRequest,
    response: Response,
) -> CoreError {
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(60);
    let body = response.text().await.unwrap_or_default();
    let body_excerpt = body_excerpt(&body);
    warn!("HTTP {} for {}: {}", status, endpoint, body_excerpt);

    let error = match status.as_u16() {
        429 => {
            warn!("Rate limited, Reddit asked for {} seconds", retry_after);
            RedditApiError::RateLimitExceeded {
                retry_after,
                body_excerpt,
            }
        }
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
            body_excerpt,
        },
        404 => RedditApiError::SubredditNotFound {
            subreddit: request.subreddit.clone(),
            body_excerpt,
        },
        code => RedditApiError::HttpStatus {
            status_code: code,
            body_excerpt,
        },
    };
    CoreError::RedditApi(error)
}

fn body_excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

fn request_metrics(
    request: &PageRequest,
    outcome: &Result<RedditListing<RedditPostData>, CoreError>,
    response_time: Duration,
) -> RequestMetrics {
    let (status_code, error_type, rate_limited) = match outcome {
        Ok(_) => (Some(200), None, false),
        Err(CoreError::RedditApi(e)) => {
            let status = match e {
                RedditApiError::RateLimitExceeded { .. } => Some(429),
                RedditApiError::Forbidden { .. } => Some(403),
                RedditApiError::SubredditNotFound { .. } => Some(404),
                RedditApiError::HttpStatus { status_code, .. } => Some(*status_code),
                _ => None,
            };
            (
                status,
                Some(karma_core::ErrorExt::error_code(e)),
                matches!(e, RedditApiError::RateLimitExceeded { .. }),
            )
        }
        Err(e) => (None, Some(karma_core::ErrorExt::error_code(e)), false),
    };

    RequestMetrics {
        subreddit: request.subreddit.clone(),
        status_code,
        response_time,
        success: outcome.is_ok(),
        rate_limited,
        items_received: outcome
            .as_ref()
            .map(|listing| listing.data.children.len() as u64)
            .unwrap_or(0),
        error_type,
    }
}
