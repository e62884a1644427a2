//! Vote breakdown estimation.
//!
//! Reddit's public listing only exposes the net score and the upvote ratio.
//! Given `score = up - down` and `ratio = up / (up + down)`, the total vote
//! count is `n = score / (2 * ratio - 1)`, from which both sides follow. The
//! result is advisory: both inputs are fuzzed aggregates upstream.

use serde::{Deserialize, Serialize};

/// Ratios closer than this to 0.5 make the denominator degenerate.
pub const BALANCED_RATIO_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEstimate {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteEstimate {
    /// Net score implied by the estimate.
    pub fn implied_score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    pub fn total(&self) -> u64 {
        self.upvotes + self.downvotes
    }
}

/// Estimate up/down votes from a net score and an upvote ratio.
///
/// Returns `None` whenever the estimate is undefined: a missing input, a ratio
/// outside the open interval (0, 1), a ratio within
/// [`BALANCED_RATIO_TOLERANCE`] of 0.5, or a non-positive implied total.
pub fn estimate_votes(score: Option<i64>, upvote_ratio: Option<f64>) -> Option<VoteEstimate> {
    let score = score? as f64;
    let ratio = upvote_ratio?;

    if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
        return None;
    }

    let denominator = 2.0 * ratio - 1.0;
    if denominator.abs() < BALANCED_RATIO_TOLERANCE {
        return None;
    }

    let total = score / denominator;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    Some(VoteEstimate {
        upvotes: round_non_negative(ratio * total),
        downvotes: round_non_negative((1.0 - ratio) * total),
    })
}

// Half-to-even; ties like 2.5 go to 2.
fn round_non_negative(value: f64) -> u64 {
    value.round_ties_even().max(0.0) as u64
}
