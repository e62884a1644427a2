use serde::{Deserialize, Serialize};

/// Column order of the exported dataset.
pub const POST_COLUMNS: [&str; 15] = [
    "id",
    "subreddit",
    "title",
    "selftext",
    "score",
    "upvote_ratio",
    "ups_raw",
    "downs_raw",
    "ups_estimated",
    "downs_estimated",
    "num_comments",
    "created_utc",
    "permalink",
    "over_18",
    "is_self",
];

/// One retained self-text post, ready for export.
///
/// Built once from a listing item and never updated afterwards. The estimated
/// vote fields are either both present or both absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    pub score: i64,
    pub upvote_ratio: Option<f64>,
    pub ups_raw: Option<i64>,
    pub downs_raw: Option<i64>,
    pub ups_estimated: Option<u64>,
    pub downs_estimated: Option<u64>,
    pub num_comments: u64,
    pub created_utc: f64,
    pub permalink: String,
    pub over_18: bool,
    pub is_self: bool,
}

impl PostRecord {
    /// Self-text and not flagged adult.
    pub fn passes_safety_filter(&self) -> bool {
        self.is_self && !self.over_18
    }

    pub fn has_vote_estimate(&self) -> bool {
        self.ups_estimated.is_some() && self.downs_estimated.is_some()
    }
}
