//! Executive summary metrics, rendering and week-keyed cache

use crate::aggregator::{self, TrendLabel};
use chrono::{DateTime, Datelike, Duration, Utc};
use echolens_core::Topic;
use echolens_core::types::CompletedCall;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of weekly cache entries retained after a write
const CACHE_WEEKS: usize = 4;

/// Risk score at or above which a topic is called out in the summary
const HIGH_RISK_THRESHOLD: f64 = 0.6;

/// ISO year and week number, the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekKey {
    /// ISO week-based year
    pub year: i32,
    /// ISO week number, 1-53
    pub week: u32,
}

impl From<DateTime<Utc>> for WeekKey {
    fn from(at: DateTime<Utc>) -> Self {
        let iso = at.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }
}

impl std::fmt::Display for WeekKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// A generated summary plus the freshness bookkeeping around it
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Rendered summary text
    pub summary: String,
    /// When the summary was generated
    pub generated_at: DateTime<Utc>,
    /// Most recent DONE call at generation time
    pub watermark: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Whether this entry is still current given the present watermark
    ///
    /// No completed calls at all, or no new completed call since generation,
    /// means the entry needs no refresh.
    #[must_use]
    pub fn is_fresh(&self, current_watermark: Option<DateTime<Utc>>) -> bool {
        match (self.watermark, current_watermark) {
            (_, None) => true,
            (Some(cached), Some(current)) => cached >= current,
            (None, Some(_)) => false,
        }
    }
}

/// Week-keyed summary cache with a fixed retention window
///
/// Eviction keeps the 4 most recently keyed weeks, by key ordering rather
/// than insertion time.
#[derive(Debug, Default)]
pub struct SummaryCache {
    entries: RwLock<BTreeMap<WeekKey, CacheEntry>>,
}

impl SummaryCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a week
    #[must_use]
    pub fn get(&self, key: WeekKey) -> Option<CacheEntry> {
        self.entries.read().get(&key).cloned()
    }

    /// Store an entry, then trim to the retention window
    pub fn insert(&self, key: WeekKey, entry: CacheEntry) {
        let mut entries = self.entries.write();
        entries.insert(key, entry);
        while entries.len() > CACHE_WEEKS {
            let oldest = entries.keys().next().copied();
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
    }

    /// Number of cached weeks
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Aggregate numbers feeding the executive summary
#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    /// Completed calls in the last 7 days
    pub window_calls: u64,
    /// Top topics by 7-day volume with their share of the window
    pub top_topics: Vec<(Topic, u64, f64)>,
    /// Topic with the largest positive week-over-week change
    pub fastest_growing: Option<(Topic, f64)>,
    /// Topic with the highest negative-sentiment rate
    pub most_negative: Option<(Topic, f64)>,
    /// Topics whose escalation risk score clears the callout threshold
    pub high_risk: Vec<(Topic, f64)>,
    /// Negative-sentiment rate over all completed calls
    pub negative_rate: f64,
    /// Resolution rate over all completed calls
    pub resolution_rate: f64,
}

impl SummaryMetrics {
    /// Compute summary metrics from completed calls
    #[must_use]
    pub fn compute(calls: &[CompletedCall], now: DateTime<Utc>) -> Self {
        let window_start = now - Duration::days(7);
        let mut window_by_topic: BTreeMap<&'static str, (Topic, u64)> = BTreeMap::new();
        let mut window_calls = 0u64;

        for call in calls {
            if call.created_at > window_start && call.created_at <= now {
                window_calls += 1;
                window_by_topic
                    .entry(call.topic.as_str())
                    .or_insert((call.topic, 0))
                    .1 += 1;
            }
        }

        let mut top_topics: Vec<(Topic, u64, f64)> = window_by_topic
            .into_values()
            .map(|(topic, count)| {
                let share = if window_calls == 0 {
                    0.0
                } else {
                    count as f64 / window_calls as f64
                };
                (topic, count, share)
            })
            .collect();
        top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        top_topics.truncate(3);

        let fastest_growing = aggregator::topic_trends(calls)
            .into_iter()
            .filter(|t| t.label == TrendLabel::Up)
            .max_by(|a, b| a.pct_change.total_cmp(&b.pct_change))
            .map(|t| (t.topic, t.pct_change));

        let effectiveness = aggregator::resolution_effectiveness(calls);
        let most_negative = effectiveness
            .iter()
            .filter(|e| e.negative_rate > 0.0)
            .max_by(|a, b| a.negative_rate.total_cmp(&b.negative_rate))
            .map(|e| (e.topic, e.negative_rate));

        let high_risk: Vec<(Topic, f64)> = aggregator::escalation_risk(calls, now)
            .into_iter()
            .filter(|r| r.score >= HIGH_RISK_THRESHOLD)
            .map(|r| (r.topic, r.score))
            .collect();

        let total = calls.len() as f64;
        let negative_rate = if calls.is_empty() {
            0.0
        } else {
            calls
                .iter()
                .filter(|c| c.sentiment == echolens_core::Sentiment::Negative)
                .count() as f64
                / total
        };
        let resolution_rate = if calls.is_empty() {
            0.0
        } else {
            calls.iter().filter(|c| c.problem_resolved).count() as f64 / total
        };

        Self {
            window_calls,
            top_topics,
            fastest_growing,
            most_negative,
            high_risk,
            negative_rate,
            resolution_rate,
        }
    }

    /// Render the metrics as the digest handed to the summary model
    #[must_use]
    pub fn digest(&self) -> String {
        let mut lines = vec![format!(
            "Calls in the last 7 days: {}",
            self.window_calls
        )];

        if !self.top_topics.is_empty() {
            let topics: Vec<String> = self
                .top_topics
                .iter()
                .map(|(topic, count, share)| {
                    format!("{} ({count} calls, {:.0}%)", topic.display_name(), share * 100.0)
                })
                .collect();
            lines.push(format!("Top topics: {}", topics.join(", ")));
        }
        if let Some((topic, change)) = &self.fastest_growing {
            lines.push(format!(
                "Fastest-growing topic: {} (+{:.0}% week-over-week)",
                topic.display_name(),
                change * 100.0
            ));
        }
        if let Some((topic, rate)) = &self.most_negative {
            lines.push(format!(
                "Most negative topic: {} ({:.0}% negative)",
                topic.display_name(),
                rate * 100.0
            ));
        }
        if !self.high_risk.is_empty() {
            let topics: Vec<String> = self
                .high_risk
                .iter()
                .map(|(topic, score)| format!("{} (score {score:.2})", topic.display_name()))
                .collect();
            lines.push(format!("High escalation risk: {}", topics.join(", ")));
        }
        lines.push(format!(
            "Overall negative sentiment rate: {:.0}%",
            self.negative_rate * 100.0
        ));
        lines.push(format!(
            "Overall resolution rate: {:.0}%",
            self.resolution_rate * 100.0
        ));

        lines.join("\n")
    }

    /// Render the deterministic fallback summary
    ///
    /// Built from the same metrics the model would see, clause by clause, so
    /// a provider outage still yields a usable briefing.
    #[must_use]
    pub fn render_template(&self) -> String {
        let mut clauses = Vec::new();

        if self.window_calls > 0 {
            clauses.push(format!(
                "Handled {} calls over the past week with {:.0}% negative sentiment.",
                self.window_calls,
                self.negative_rate * 100.0
            ));
        }
        if !self.top_topics.is_empty() {
            let topics: Vec<String> = self
                .top_topics
                .iter()
                .map(|(topic, _, share)| {
                    format!("{} ({:.0}%)", topic.display_name(), share * 100.0)
                })
                .collect();
            clauses.push(format!("Top topics were {}.", topics.join(", ")));
        }
        if let Some((topic, change)) = &self.fastest_growing {
            clauses.push(format!(
                "{} is the fastest-growing topic, up {:.0}% week-over-week.",
                topic.display_name(),
                change * 100.0
            ));
        }
        if let Some((topic, rate)) = &self.most_negative {
            clauses.push(format!(
                "{} drew the most negative sentiment at {:.0}%.",
                topic.display_name(),
                rate * 100.0
            ));
        }
        if !self.high_risk.is_empty() {
            let topics: Vec<String> = self
                .high_risk
                .iter()
                .map(|(topic, _)| topic.display_name())
                .collect();
            clauses.push(format!(
                "Escalation risk is elevated for {}.",
                topics.join(", ")
            ));
        }
        if self.window_calls > 0 || self.resolution_rate > 0.0 {
            clauses.push(format!(
                "Overall resolution rate stands at {:.0}%.",
                self.resolution_rate * 100.0
            ));
        }

        if clauses.is_empty() {
            "Insufficient data to generate an executive summary.".to_string()
        } else {
            clauses.join(" ")
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use echolens_core::Sentiment;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn call(topic: Topic, sentiment: Sentiment, resolved: bool, days_ago: i64) -> CompletedCall {
        CompletedCall {
            call_id: Uuid::new_v4(),
            topic,
            sentiment,
            problem_resolved: resolved,
            confidence: Some(0.8),
            created_at: now() - Duration::days(days_ago),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    fn entry(summary: &str, watermark: Option<DateTime<Utc>>) -> CacheEntry {
        CacheEntry {
            summary: summary.to_string(),
            generated_at: now(),
            watermark,
        }
    }

    #[test]
    fn test_week_key_from_timestamp() {
        let key = WeekKey::from(now());
        assert_eq!(key, WeekKey { year: 2026, week: 35 });
        assert_eq!(key.to_string(), "2026-W35");
    }

    #[test]
    fn test_week_key_ordering_crosses_years() {
        let late_2025 = WeekKey { year: 2025, week: 52 };
        let early_2026 = WeekKey { year: 2026, week: 1 };
        assert!(late_2025 < early_2026);
    }

    #[test]
    fn test_cache_evicts_to_four_newest_weeks() {
        let cache = SummaryCache::new();
        for week in 1..=6 {
            cache.insert(WeekKey { year: 2026, week }, entry("s", None));
        }

        assert_eq!(cache.len(), 4);
        assert!(cache.get(WeekKey { year: 2026, week: 1 }).is_none());
        assert!(cache.get(WeekKey { year: 2026, week: 2 }).is_none());
        assert!(cache.get(WeekKey { year: 2026, week: 6 }).is_some());
    }

    #[test]
    fn test_cache_eviction_uses_key_order_not_insertion_order() {
        let cache = SummaryCache::new();
        // Insert the newest week first, then backfill older ones
        for week in [10, 7, 8, 9, 6] {
            cache.insert(WeekKey { year: 2026, week }, entry("s", None));
        }

        assert!(cache.get(WeekKey { year: 2026, week: 6 }).is_none());
        assert!(cache.get(WeekKey { year: 2026, week: 10 }).is_some());
    }

    #[test]
    fn test_entry_freshness() {
        let watermark = now();
        let cached = entry("s", Some(watermark));

        assert!(cached.is_fresh(None));
        assert!(cached.is_fresh(Some(watermark)));
        assert!(!cached.is_fresh(Some(watermark + Duration::hours(1))));

        let no_watermark = entry("s", None);
        assert!(no_watermark.is_fresh(None));
        assert!(!no_watermark.is_fresh(Some(watermark)));
    }

    #[test]
    fn test_metrics_window_and_shares() {
        let calls = vec![
            call(Topic::BillingIssue, Sentiment::Negative, false, 1),
            call(Topic::BillingIssue, Sentiment::Neutral, true, 2),
            call(Topic::Shipping, Sentiment::Positive, true, 3),
            // Outside the 7-day window
            call(Topic::TechSupport, Sentiment::Negative, false, 12),
        ];

        let metrics = SummaryMetrics::compute(&calls, now());
        assert_eq!(metrics.window_calls, 3);
        assert_eq!(metrics.top_topics[0].0, Topic::BillingIssue);
        assert_eq!(metrics.top_topics[0].1, 2);
        assert!((metrics.top_topics[0].2 - 2.0 / 3.0).abs() < 1e-9);
        // Overall rates cover all completed calls, not just the window
        assert!((metrics.negative_rate - 0.5).abs() < 1e-9);
        assert!((metrics.resolution_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_template_empty_data() {
        let metrics = SummaryMetrics::compute(&[], now());
        assert_eq!(
            metrics.render_template(),
            "Insufficient data to generate an executive summary."
        );
    }

    #[test]
    fn test_template_mentions_top_topics_and_resolution() {
        let calls = vec![
            call(Topic::BillingIssue, Sentiment::Negative, false, 1),
            call(Topic::BillingIssue, Sentiment::Negative, true, 2),
            call(Topic::Shipping, Sentiment::Positive, true, 3),
        ];

        let text = SummaryMetrics::compute(&calls, now()).render_template();
        assert!(text.contains("Handled 3 calls"));
        assert!(text.contains("Billing Issue (67%)"));
        assert!(text.contains("resolution rate stands at 67%"));
    }

    #[test]
    fn test_digest_is_line_oriented() {
        let calls = vec![call(Topic::Other, Sentiment::Neutral, true, 1)];
        let digest = SummaryMetrics::compute(&calls, now()).digest();
        assert!(digest.contains("Calls in the last 7 days: 1"));
        assert!(digest.contains("Overall resolution rate: 100%"));
    }
}
