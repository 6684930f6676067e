//! Analytics engine serving trend queries and the executive summary

use crate::aggregator::{self, EscalationRisk, SpikeAlert, TopicEffectiveness, TopicTrend};
use crate::summary::{CacheEntry, SummaryCache, SummaryMetrics, WeekKey};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use echolens_core::Result;
use echolens_core::types::CompletedCall;
use echolens_database::{AnalyticsQueries, Database};
use echolens_providers::SummaryModel;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Fixed reply when summary generation fails with nothing cached
const SUMMARY_UNAVAILABLE: &str = "Executive summary is temporarily unavailable.";

/// Weeks of history the trend queries look back over by default
const DEFAULT_TREND_WINDOW_WEEKS: u32 = 8;

/// Read access to completed-call data
///
/// One implementation is backed by Postgres; tests use an in-memory source.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Completed calls with their analyses, optionally bounded to those
    /// created at or after `since`
    async fn completed_calls(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CompletedCall>>;

    /// Most recent completion timestamp, the data watermark
    async fn watermark(&self) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
impl AnalyticsSource for Database {
    async fn completed_calls(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CompletedCall>> {
        AnalyticsQueries::completed_since(self.pool(), since).await
    }

    async fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        AnalyticsQueries::latest_completed_at(self.pool()).await
    }
}

/// Analytics over completed calls, with a cached weekly executive summary
///
/// Trend queries are best-effort: a failed read is logged and returns an
/// empty result set instead of propagating.
pub struct AnalyticsEngine {
    source: Arc<dyn AnalyticsSource>,
    summarizer: Option<Arc<dyn SummaryModel>>,
    cache: SummaryCache,
    trend_window_weeks: u32,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("summarizer", &self.summarizer.is_some())
            .field("cached_weeks", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl AnalyticsEngine {
    /// Create an engine over a data source, with an optional summary model
    pub fn new(
        source: Arc<dyn AnalyticsSource>,
        summarizer: Option<Arc<dyn SummaryModel>>,
    ) -> Self {
        Self {
            source,
            summarizer,
            cache: SummaryCache::new(),
            trend_window_weeks: DEFAULT_TREND_WINDOW_WEEKS,
        }
    }

    /// Bound trend history to the given number of weeks
    #[must_use]
    pub const fn with_trend_window(mut self, weeks: u32) -> Self {
        self.trend_window_weeks = weeks;
        self
    }

    async fn fetch_or_empty(&self, since: Option<DateTime<Utc>>) -> Vec<CompletedCall> {
        match self.source.completed_calls(since).await {
            Ok(calls) => calls,
            Err(e) => {
                error!(error = %e, "Analytics query failed, returning empty result");
                Vec::new()
            }
        }
    }

    /// Weekly volume and sentiment history per topic over the trend window
    pub async fn topic_trends(&self) -> Vec<TopicTrend> {
        self.topic_trends_at(Utc::now()).await
    }

    /// Weekly volume and sentiment history for the window ending at a given
    /// instant
    pub async fn topic_trends_at(&self, now: DateTime<Utc>) -> Vec<TopicTrend> {
        let since = now - Duration::weeks(i64::from(self.trend_window_weeks));
        aggregator::topic_trends(&self.fetch_or_empty(Some(since)).await)
    }

    /// Resolution and sentiment rates per topic
    pub async fn resolution_effectiveness(&self) -> Vec<TopicEffectiveness> {
        aggregator::resolution_effectiveness(&self.fetch_or_empty(None).await)
    }

    /// Escalation risk scores per topic
    pub async fn escalation_risk(&self) -> Vec<EscalationRisk> {
        self.escalation_risk_at(Utc::now()).await
    }

    /// Escalation risk scores with the growth factor anchored at a given
    /// instant
    pub async fn escalation_risk_at(&self, now: DateTime<Utc>) -> Vec<EscalationRisk> {
        aggregator::escalation_risk(&self.fetch_or_empty(None).await, now)
    }

    /// Spike alerts for the 7-day window ending now
    pub async fn spike_alerts(&self) -> Vec<SpikeAlert> {
        self.spike_alerts_at(Utc::now()).await
    }

    /// Spike alerts for the 7-day window ending at a given instant
    pub async fn spike_alerts_at(&self, now: DateTime<Utc>) -> Vec<SpikeAlert> {
        aggregator::spike_alerts(&self.fetch_or_empty(None).await, now)
    }

    /// Executive summary for the current ISO week
    pub async fn executive_summary(&self) -> String {
        self.executive_summary_at(Utc::now()).await
    }

    /// Executive summary keyed to the ISO week of a given instant
    ///
    /// Returns cached text while no new call has completed since the cached
    /// entry was generated. Any error falls back to the cached entry for the
    /// week, or a fixed message when there is none.
    pub async fn executive_summary_at(&self, now: DateTime<Utc>) -> String {
        let week = WeekKey::from(now);

        let watermark = match self.source.watermark().await {
            Ok(watermark) => watermark,
            Err(e) => {
                error!(error = %e, "Watermark query failed");
                return self.cached_or_unavailable(week);
            }
        };

        if let Some(entry) = self.cache.get(week) {
            if entry.is_fresh(watermark) {
                return entry.summary;
            }
        }

        let calls = match self.source.completed_calls(None).await {
            Ok(calls) => calls,
            Err(e) => {
                error!(error = %e, "Completed-call query failed");
                return self.cached_or_unavailable(week);
            }
        };

        let metrics = SummaryMetrics::compute(&calls, now);
        let summary = self.render(&metrics).await;

        self.cache.insert(
            week,
            CacheEntry {
                summary: summary.clone(),
                generated_at: now,
                watermark,
            },
        );
        info!(%week, "Executive summary regenerated");

        summary
    }

    async fn render(&self, metrics: &SummaryMetrics) -> String {
        if let Some(model) = &self.summarizer {
            match model.narrative(&metrics.digest()).await {
                Ok(summary) => return summary,
                Err(e) => {
                    warn!(error = %e, "Summary model failed, using template fallback");
                }
            }
        }
        metrics.render_template()
    }

    fn cached_or_unavailable(&self, week: WeekKey) -> String {
        self.cache
            .get(week)
            .map_or_else(|| SUMMARY_UNAVAILABLE.to_string(), |entry| entry.summary)
    }
}
