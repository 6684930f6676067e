//! Trend analytics and executive summaries for `EchoLens`

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod aggregator;
pub mod engine;
pub mod summary;

pub use aggregator::{
    EscalationRisk, SpikeAlert, TopicEffectiveness, TopicTrend, TrendLabel, escalation_risk,
    resolution_effectiveness, spike_alerts, topic_trends,
};
pub use engine::{AnalyticsEngine, AnalyticsSource};
pub use summary::{CacheEntry, SummaryCache, SummaryMetrics, WeekKey};
