//! Drives the per-subreddit collector across the configured sources and folds
//! the outcomes into one dataset.

use chrono::{DateTime, Utc};
use dataset_writer::RecordSink;
use karma_core::{created_cutoff, AppConfig, CoreError, ErrorReporter, PostRecord};
use reddit_client::{collect_source, CollectRequest, ListingSource, RequestPacer, StopReason};
use std::path::PathBuf;
use tracing::{info, warn};

#[cfg(test)]
mod tests;

/// What to collect across all sources.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestPlan {
    pub subreddits: Vec<String>,
    pub max_total: usize,
    pub min_age_days: u32,
    pub page_size: u32,
    pub sort: String,
    pub time_window: String,
}

impl HarvestPlan {
    pub fn new(subreddits: Vec<String>, max_total: usize, min_age_days: u32) -> Self {
        Self {
            subreddits,
            max_total,
            min_age_days,
            page_size: 100,
            sort: "top".to_string(),
            time_window: "year".to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            subreddits: config.subreddits.clone(),
            max_total: config.max_total_posts,
            min_age_days: config.min_age_days,
            page_size: config.page_size,
            sort: config.listing_sort.clone(),
            time_window: config.time_window.clone(),
        }
    }

    /// Even share of the global budget, rounded up.
    pub fn per_source_quota(&self) -> usize {
        if self.subreddits.is_empty() {
            return 0;
        }
        self.max_total.div_ceil(self.subreddits.len())
    }
}

/// Per-subreddit line of the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub subreddit: String,
    pub requested: usize,
    pub collected: usize,
    pub pages_fetched: u32,
    pub stop: String,
    pub failed: bool,
}

#[derive(Debug, Default)]
pub struct HarvestReport {
    pub records: Vec<PostRecord>,
    pub sources: Vec<SourceSummary>,
    /// Rows cut by truncation to the global maximum.
    pub truncated: usize,
    /// Rows removed by the final safety filter.
    pub dropped_by_final_filter: usize,
}

impl HarvestReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceSummary> {
        self.sources.iter().filter(|s| s.failed)
    }

    /// Truncate to `max_total`, then drop anything that is not a non-adult
    /// self post. Collection already filters, so drops here mean a source
    /// handed back rows it should not have.
    pub fn finish(&mut self, max_total: usize) {
        if self.records.len() > max_total {
            self.truncated = self.records.len() - max_total;
            self.records.truncate(max_total);
        }

        let before = self.records.len();
        self.records.retain(PostRecord::passes_safety_filter);
        self.dropped_by_final_filter = before - self.records.len();
        if self.dropped_by_final_filter > 0 {
            warn!(
                "Final filter removed {} rows that slipped past collection",
                self.dropped_by_final_filter
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HarvestOutcome {
    Written { path: PathBuf, rows: usize },
    /// Nothing eligible was collected; no file was produced.
    Empty,
}

pub struct Harvester<S> {
    source: S,
    pacer: RequestPacer,
    plan: HarvestPlan,
    reporter: ErrorReporter,
}

impl<S: ListingSource> Harvester<S> {
    pub fn new(source: S, pacer: RequestPacer, plan: HarvestPlan) -> Self {
        Self {
            source,
            pacer,
            plan,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn plan(&self) -> &HarvestPlan {
        &self.plan
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Collect every configured subreddit in order, stopping early once the
    /// global budget is spent.
    pub async fn run(&mut self, now: DateTime<Utc>) -> HarvestReport {
        let cutoff_utc = created_cutoff(now, self.plan.min_age_days);
        let quota = self.plan.per_source_quota();
        info!(
            "Harvesting {} subreddits, up to {} posts each, {} total, created before {}",
            self.plan.subreddits.len(),
            quota,
            self.plan.max_total,
            cutoff_utc
        );

        let mut report = HarvestReport::default();

        for subreddit in &self.plan.subreddits {
            let remaining = self.plan.max_total.saturating_sub(report.records.len());
            if remaining == 0 {
                info!("Global budget reached, skipping remaining subreddits");
                break;
            }

            let request = CollectRequest {
                subreddit: subreddit.clone(),
                target: quota.min(remaining),
                cutoff_utc,
                page_size: self.plan.page_size,
                sort: self.plan.sort.clone(),
                time_window: self.plan.time_window.clone(),
            };

            let outcome = collect_source(&self.source, &mut self.pacer, &request).await;
            if let StopReason::Failed(error) = &outcome.stop {
                warn!(
                    "[{}] Collection abandoned after {} posts",
                    subreddit,
                    outcome.records.len()
                );
                self.reporter.report_warning(error);
            }

            report.sources.push(SourceSummary {
                subreddit: outcome.subreddit.clone(),
                requested: request.target,
                collected: outcome.records.len(),
                pages_fetched: outcome.pages_fetched,
                stop: outcome.stop.to_string(),
                failed: outcome.stop.is_failure(),
            });
            report.records.extend(outcome.records);
        }

        report.finish(self.plan.max_total);

        for failed in report.failed_sources() {
            warn!("[{}] ended early: {}", failed.subreddit, failed.stop);
        }
        info!("Total posts collected: {}", report.records.len());
        report
    }
}

/// Run the harvest and hand the rows to `sink`. Writes nothing when no row
/// survived.
pub async fn harvest_to_sink<S, K>(
    harvester: &mut Harvester<S>,
    sink: &mut K,
    now: DateTime<Utc>,
) -> Result<HarvestOutcome, CoreError>
where
    S: ListingSource,
    K: RecordSink + ?Sized,
{
    let report = harvester.run(now).await;

    if report.is_empty() {
        warn!("No data collected; nothing written");
        return Ok(HarvestOutcome::Empty);
    }

    let path = sink.write_records(&report.records)?;
    Ok(HarvestOutcome::Written {
        path,
        rows: report.records.len(),
    })
}
