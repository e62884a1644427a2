//! Scripted listing source for exercising the collector without a network.

use crate::api::{
    ListingSource, PageRequest, RedditListing, RedditListingChild, RedditListingData,
    RedditPostData,
};
use async_trait::async_trait;
use karma_core::{CoreError, RedditApiError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum ScriptedPage {
    Listing(RedditListing<RedditPostData>),
    Failure(RedditApiError),
}

/// Serves pre-recorded pages per subreddit, in order. Once a subreddit's
/// script runs out it answers with an empty page.
#[derive(Debug, Default)]
pub struct ScriptedListing {
    pages: Mutex<HashMap<String, VecDeque<ScriptedPage>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(
        self,
        subreddit: &str,
        items: Vec<RedditPostData>,
        after: Option<&str>,
    ) -> Self {
        let listing = RedditListing {
            kind: "Listing".to_string(),
            data: RedditListingData {
                children: items
                    .into_iter()
                    .map(|data| RedditListingChild {
                        kind: "t3".to_string(),
                        data,
                    })
                    .collect(),
                after: after.map(str::to_string),
                before: None,
                dist: None,
            },
        };
        self.push(subreddit, ScriptedPage::Listing(listing));
        self
    }

    pub fn with_failure(self, subreddit: &str, error: RedditApiError) -> Self {
        self.push(subreddit, ScriptedPage::Failure(error));
        self
    }

    fn push(&self, subreddit: &str, page: ScriptedPage) {
        let mut pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        pages.entry(subreddit.to_string()).or_default().push_back(page);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn requests_for(&self, subreddit: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.subreddit == subreddit)
            .count()
    }
}

#[async_trait]
impl ListingSource for ScriptedListing {
    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let next = self
            .pages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&request.subreddit)
            .and_then(VecDeque::pop_front);

        match next {
            Some(ScriptedPage::Listing(listing)) => Ok(listing),
            Some(ScriptedPage::Failure(error)) => Err(CoreError::RedditApi(error)),
            None => Ok(RedditListing {
                kind: "Listing".to_string(),
                data: RedditListingData::default(),
            }),
        }
    }
}

/// An eligible-looking self post with a 0.75 ratio and a score of 100.
pub fn self_post(id: &str, subreddit: &str, created_utc: f64) -> RedditPostData {
    RedditPostData {
        id: Some(id.to_string()),
        title: Some(format!("Post {}", id)),
        selftext: Some(format!("Body of {}", id)),
        author: Some("someone".to_string()),
        subreddit: Some(subreddit.to_string()),
        permalink: Some(format!("/r/{}/comments/{}/post/", subreddit, id)),
        url: Some(format!(
            "https://www.reddit.com/r/{}/comments/{}/post/",
            subreddit, id
        )),
        created_utc: Some(created_utc),
        score: Some(100),
        num_comments: Some(12),
        over_18: Some(false),
        subreddit_over18: Some(false),
        ups: Some(100),
        downs: Some(0),
        upvote_ratio: Some(0.75),
        is_self: Some(true),
    }
}

pub fn adult_post(id: &str, subreddit: &str, created_utc: f64) -> RedditPostData {
    RedditPostData {
        over_18: Some(true),
        ..self_post(id, subreddit, created_utc)
    }
}

pub fn link_post(id: &str, subreddit: &str, created_utc: f64) -> RedditPostData {
    RedditPostData {
        is_self: Some(false),
        selftext: Some(String::new()),
        ..self_post(id, subreddit, created_utc)
    }
}
