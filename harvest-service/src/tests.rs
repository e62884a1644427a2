#[cfg(test)]
mod tests {
    use crate::{harvest_to_sink, HarvestOutcome, HarvestPlan, HarvestReport, Harvester};
    use chrono::{DateTime, TimeZone, Utc};
    use dataset_writer::{CsvFileSink, RecordSink};
    use karma_core::{AppConfig, CoreError, PostRecord, RedditApiError};
    use reddit_client::mock::{adult_post, self_post, ScriptedListing};
    use reddit_client::{ManualClock, RequestPacer};
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    // 2023-11-14T22:13:20Z; posts at OLD are well over 30 days older.
    const NOW_TS: i64 = 1_700_000_000;
    const OLD: f64 = 1_650_000_000.0;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW_TS, 0).unwrap()
    }

    fn harvester(
        source: Arc<ScriptedListing>,
        plan: HarvestPlan,
    ) -> (Harvester<Arc<ScriptedListing>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let pacer = RequestPacer::new(Duration::from_secs(2), clock.clone());
        (Harvester::new(source, pacer, plan), clock)
    }

    fn plan(subreddits: &[&str], max_total: usize) -> HarvestPlan {
        HarvestPlan::new(
            subreddits.iter().map(|s| s.to_string()).collect(),
            max_total,
            30,
        )
    }

    fn posts(prefix: &str, subreddit: &str, count: usize) -> Vec<reddit_client::RedditPostData> {
        (0..count)
            .map(|i| self_post(&format!("{}{}", prefix, i), subreddit, OLD))
            .collect()
    }

    fn temp_output() -> PathBuf {
        env::temp_dir()
            .join(format!("test_harvest_{}", uuid::Uuid::new_v4()))
            .join("dataset.csv")
    }

    struct RecordingSink {
        written: Vec<PostRecord>,
    }

    impl RecordSink for RecordingSink {
        fn write_records(&mut self, records: &[PostRecord]) -> Result<PathBuf, CoreError> {
            self.written.extend_from_slice(records);
            Ok(PathBuf::from("memory"))
        }
    }

    #[test]
    fn test_per_source_quota_rounds_up() {
        assert_eq!(plan(&["a"; 10], 10_000).per_source_quota(), 1_000);
        assert_eq!(plan(&["a", "b", "c"], 5).per_source_quota(), 2);
        assert_eq!(plan(&["a", "b", "c"], 1).per_source_quota(), 1);
        assert_eq!(plan(&[], 10).per_source_quota(), 0);
    }

    #[test]
    fn test_plan_from_config() {
        let config = AppConfig::default();
        let plan = HarvestPlan::from_config(&config);
        assert_eq!(plan.subreddits.len(), 10);
        assert_eq!(plan.per_source_quota(), 1_000);
        assert_eq!(plan.sort, "top");
        assert_eq!(plan.time_window, "year");
    }

    #[tokio::test]
    async fn test_single_source_end_to_end_writes_three_rows() {
        let mut items = posts("ok", "AskReddit", 3);
        items.insert(1, adult_post("nsfw1", "AskReddit", OLD));
        items.push(adult_post("nsfw2", "AskReddit", OLD));
        let source = Arc::new(ScriptedListing::new().with_page("AskReddit", items, None));
        let (mut harvester, _clock) = harvester(source, plan(&["AskReddit"], 5));

        let path = temp_output();
        let mut sink = CsvFileSink::new(&path);
        let outcome = harvest_to_sink(&mut harvester, &mut sink, now())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HarvestOutcome::Written {
                path: path.clone(),
                rows: 3
            }
        );

        let contents = fs::read_to_string(&path).unwrap();
        let rows: Vec<_> = contents.lines().skip(1).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.contains(",AskReddit,")));
        assert!(rows[0].contains(",150,50,"));

        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_nothing_eligible_writes_no_file() {
        let source = Arc::new(
            ScriptedListing::new()
                .with_page("AskReddit", vec![adult_post("x", "AskReddit", OLD)], None)
                .with_page("offmychest", vec![], None),
        );
        let (mut harvester, _clock) = harvester(source, plan(&["AskReddit", "offmychest"], 10));

        let path = temp_output();
        let mut sink = CsvFileSink::new(&path);
        let outcome = harvest_to_sink(&mut harvester, &mut sink, now())
            .await
            .unwrap();

        assert_eq!(outcome, HarvestOutcome::Empty);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_quota_split_respects_global_maximum() {
        let source = Arc::new(
            ScriptedListing::new()
                .with_page("a", posts("a", "a", 4), None)
                .with_page("b", posts("b", "b", 4), None)
                .with_page("c", posts("c", "c", 4), None),
        );
        let (mut harvester, _clock) = harvester(source, plan(&["a", "b", "c"], 5));

        let report = harvester.run(now()).await;

        assert_eq!(report.records.len(), 5);
        let requested: Vec<_> = report.sources.iter().map(|s| s.requested).collect();
        assert_eq!(requested, vec![2, 2, 1]);
        let collected: Vec<_> = report.sources.iter().map(|s| s.collected).collect();
        assert_eq!(collected, vec![2, 2, 1]);
        assert_eq!(report.truncated, 0);
    }

    #[tokio::test]
    async fn test_spent_budget_skips_remaining_sources() {
        let source = Arc::new(
            ScriptedListing::new()
                .with_page("a", posts("a", "a", 3), None)
                .with_page("b", posts("b", "b", 3), None)
                .with_page("c", posts("c", "c", 3), None),
        );
        let (mut harvester, _clock) = harvester(source.clone(), plan(&["a", "b", "c"], 2));

        let report = harvester.run(now()).await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.sources.len(), 2);
        assert_eq!(source.requests_for("c"), 0);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_the_run() {
        let source = Arc::new(
            ScriptedListing::new()
                .with_failure(
                    "private",
                    RedditApiError::Forbidden {
                        resource: "/r/private/top.json".to_string(),
                        body_excerpt: String::new(),
                    },
                )
                .with_page("open", posts("o", "open", 2), None),
        );
        let (mut harvester, _clock) = harvester(source, plan(&["private", "open"], 10));

        let report = harvester.run(now()).await;

        assert_eq!(report.records.len(), 2);
        let failed: Vec<_> = report.failed_sources().map(|s| s.subreddit.as_str()).collect();
        assert_eq!(failed, vec!["private"]);
        assert!(report.sources[1].stop.contains("end of listing"));
    }

    #[tokio::test]
    async fn test_pacing_spans_source_boundaries() {
        let source = Arc::new(
            ScriptedListing::new()
                .with_page("a", posts("a", "a", 1), Some("t3_a0"))
                .with_page("a", posts("x", "a", 1), None)
                .with_page("b", posts("b", "b", 1), None),
        );
        let (mut harvester, clock) = harvester(source.clone(), plan(&["a", "b"], 10));

        harvester.run(now()).await;

        assert_eq!(source.requests().len(), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
        assert_eq!(harvester.pacer().status().acquisitions, 3);
    }

    #[tokio::test]
    async fn test_recent_posts_are_excluded_by_age() {
        let recent = NOW_TS as f64 - 5.0 * 86_400.0;
        let source = Arc::new(ScriptedListing::new().with_page(
            "legaladvice",
            vec![
                self_post("old", "legaladvice", OLD),
                self_post("new", "legaladvice", recent),
            ],
            None,
        ));
        let (mut harvester, _clock) = harvester(source, plan(&["legaladvice"], 10));

        let mut sink = RecordingSink {
            written: Vec::new(),
        };
        let outcome = harvest_to_sink(&mut harvester, &mut sink, now())
            .await
            .unwrap();

        assert!(matches!(outcome, HarvestOutcome::Written { rows: 1, .. }));
        assert_eq!(sink.written.len(), 1);
        assert_eq!(sink.written[0].id, "old");
    }

    fn record(id: &str, is_self: bool, over_18: bool) -> PostRecord {
        let mut record = self_post(id, "AskReddit", OLD).into_post_record(OLD);
        record.is_self = is_self;
        record.over_18 = over_18;
        record
    }

    #[test]
    fn test_finish_truncates_then_filters() {
        let mut report = HarvestReport {
            records: vec![
                record("keep", true, false),
                record("adult", true, true),
                record("link", false, false),
                record("also_keep", true, false),
                record("past_max", true, false),
            ],
            ..Default::default()
        };

        report.finish(4);

        assert_eq!(report.truncated, 1);
        assert_eq!(report.dropped_by_final_filter, 2);
        let ids: Vec<_> = report.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["keep", "also_keep"]);
    }

    #[test]
    fn test_finish_leaves_clean_rows_alone() {
        let mut report = HarvestReport {
            records: vec![record("a", true, false), record("b", true, false)],
            ..Default::default()
        };

        report.finish(10);

        assert_eq!(report.truncated, 0);
        assert_eq!(report.dropped_by_final_filter, 0);
        assert_eq!(report.records.len(), 2);
    }
}
