//! Trend aggregation over completed calls
//!
//! Every function here is a pure computation over a slice of completed
//! calls. Only DONE calls ever reach these slices; the read queries filter
//! on status before the rows are converted.

use chrono::{DateTime, Datelike, Duration, IsoWeek, Utc};
use echolens_core::types::CompletedCall;
use echolens_core::{Sentiment, Topic};
use serde::Serialize;
use std::collections::BTreeMap;

/// Relative change beyond which a weekly count move is labeled up or down
const TREND_THRESHOLD: f64 = 0.15;

/// Week-over-week ratio beyond which a topic counts as spiking
const SPIKE_RATIO_THRESHOLD: f64 = 1.4;

/// Negative-sentiment rate beyond which a spike becomes an alert
const SPIKE_NEGATIVE_THRESHOLD: f64 = 0.6;

/// Direction of a topic's week-over-week movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    /// Weekly count grew by more than the threshold
    Up,
    /// Weekly count shrank by more than the threshold
    Down,
    /// Weekly count held within the threshold
    Flat,
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Weekly history and movement for one topic
#[derive(Debug, Clone, Serialize)]
pub struct TopicTrend {
    /// Topic under analysis
    pub topic: Topic,
    /// Call counts per ISO week, oldest first
    pub weekly_counts: Vec<u64>,
    /// Negative-sentiment rate per ISO week, oldest first
    pub weekly_negative_rates: Vec<f64>,
    /// Relative change between the two most recent weeks
    pub pct_change: f64,
    /// Direction label derived from `pct_change`
    pub label: TrendLabel,
}

/// Resolution and sentiment rates for one topic
#[derive(Debug, Clone, Serialize)]
pub struct TopicEffectiveness {
    /// Topic under analysis
    pub topic: Topic,
    /// Total completed calls
    pub total: u64,
    /// Share of calls marked resolved
    pub resolution_rate: f64,
    /// Share of calls with negative sentiment
    pub negative_rate: f64,
    /// Mean model confidence over calls that reported one
    pub avg_confidence: f64,
}

/// Escalation risk assessment for one topic
#[derive(Debug, Clone, Serialize)]
pub struct EscalationRisk {
    /// Topic under analysis
    pub topic: Topic,
    /// Additive risk score in [0, 1]
    pub score: f64,
    /// Human-readable factors behind the score
    pub drivers: Vec<String>,
}

/// A topic whose current-week volume spiked with heavy negative sentiment
#[derive(Debug, Clone, Serialize)]
pub struct SpikeAlert {
    /// Topic under analysis
    pub topic: Topic,
    /// Current window count over prior window count; `None` for a topic
    /// with no prior-window calls at all
    pub spike_ratio: Option<f64>,
    /// Negative-sentiment rate inside the current window
    pub negative_rate: f64,
    /// Alert text for operators
    pub message: String,
}

/// Per-week tallies inside a topic bucket
#[derive(Debug, Default, Clone, Copy)]
struct WeekTally {
    count: u64,
    negative: u64,
}

fn weekly_tallies(calls: &[&CompletedCall]) -> BTreeMap<IsoWeek, WeekTally> {
    let mut weeks: BTreeMap<IsoWeek, WeekTally> = BTreeMap::new();
    for call in calls {
        let tally = weeks.entry(call.created_at.iso_week()).or_default();
        tally.count += 1;
        if call.sentiment == Sentiment::Negative {
            tally.negative += 1;
        }
    }
    weeks
}

fn by_topic(calls: &[CompletedCall]) -> BTreeMap<&'static str, (Topic, Vec<&CompletedCall>)> {
    let mut topics: BTreeMap<&'static str, (Topic, Vec<&CompletedCall>)> = BTreeMap::new();
    for call in calls {
        topics
            .entry(call.topic.as_str())
            .or_insert_with(|| (call.topic, Vec::new()))
            .1
            .push(call);
    }
    topics
}

/// Relative change between the two most recent weekly counts
///
/// Fewer than two weeks of history reads as no movement.
fn weekly_pct_change(counts: &[u64]) -> f64 {
    match counts {
        [.., previous, current] => {
            let denominator = (*previous).max(1) as f64;
            (*current as f64 - *previous as f64) / denominator
        }
        _ => 0.0,
    }
}

/// Growth of the last 7 days over the 7 days before, used by the risk score
///
/// Anchored to `now`, so a dormant topic reads as zero growth no matter how
/// sharply it once grew. A zero prior window also reads as zero growth
/// rather than being floored to one.
fn window_growth(calls: &[&CompletedCall], now: DateTime<Utc>) -> f64 {
    let window_start = now - Duration::days(7);
    let prior_start = now - Duration::days(14);

    let current = calls
        .iter()
        .filter(|c| c.created_at > window_start && c.created_at <= now)
        .count();
    let prior = calls
        .iter()
        .filter(|c| c.created_at > prior_start && c.created_at <= window_start)
        .count();

    if prior == 0 {
        0.0
    } else {
        (current as f64 - prior as f64) / prior as f64
    }
}

/// Weekly count and negative-rate history per topic, sorted by topic name
#[must_use]
pub fn topic_trends(calls: &[CompletedCall]) -> Vec<TopicTrend> {
    by_topic(calls)
        .into_values()
        .map(|(topic, topic_calls)| {
            let weeks = weekly_tallies(&topic_calls);
            let weekly_counts: Vec<u64> = weeks.values().map(|t| t.count).collect();
            let weekly_negative_rates: Vec<f64> = weeks
                .values()
                .map(|t| {
                    if t.count == 0 {
                        0.0
                    } else {
                        t.negative as f64 / t.count as f64
                    }
                })
                .collect();

            let pct_change = weekly_pct_change(&weekly_counts);
            let label = if pct_change > TREND_THRESHOLD {
                TrendLabel::Up
            } else if pct_change < -TREND_THRESHOLD {
                TrendLabel::Down
            } else {
                TrendLabel::Flat
            };

            TopicTrend {
                topic,
                weekly_counts,
                weekly_negative_rates,
                pct_change,
                label,
            }
        })
        .collect()
}

/// Resolution, sentiment and confidence rates per topic, sorted by topic name
#[must_use]
pub fn resolution_effectiveness(calls: &[CompletedCall]) -> Vec<TopicEffectiveness> {
    by_topic(calls)
        .into_values()
        .map(|(topic, topic_calls)| {
            let total = topic_calls.len() as u64;
            let resolved = topic_calls.iter().filter(|c| c.problem_resolved).count();
            let negative = topic_calls
                .iter()
                .filter(|c| c.sentiment == Sentiment::Negative)
                .count();
            let confidences: Vec<f64> =
                topic_calls.iter().filter_map(|c| c.confidence).collect();

            let rate = |n: usize| {
                if total == 0 {
                    0.0
                } else {
                    n as f64 / total as f64
                }
            };
            let avg_confidence = if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f64>() / confidences.len() as f64
            };

            TopicEffectiveness {
                topic,
                total,
                resolution_rate: rate(resolved),
                negative_rate: rate(negative),
                avg_confidence,
            }
        })
        .collect()
}

/// Additive escalation risk per topic, sorted by score descending
///
/// Three independent factors, each with a fixed weight: heavy negative
/// sentiment (+0.4), poor resolution (+0.3), fast growth of the 7 days
/// ending at `now` over the 7 days before (+0.3). The sum is capped at 1.0.
#[must_use]
pub fn escalation_risk(calls: &[CompletedCall], now: DateTime<Utc>) -> Vec<EscalationRisk> {
    let mut risks: Vec<EscalationRisk> = by_topic(calls)
        .into_values()
        .map(|(topic, topic_calls)| {
            let total = topic_calls.len() as f64;
            let negative_rate = topic_calls
                .iter()
                .filter(|c| c.sentiment == Sentiment::Negative)
                .count() as f64
                / total.max(1.0);
            let resolution_rate =
                topic_calls.iter().filter(|c| c.problem_resolved).count() as f64 / total.max(1.0);

            let growth = window_growth(&topic_calls, now);

            let mut score: f64 = 0.0;
            let mut drivers = Vec::new();

            if negative_rate > 0.6 {
                score += 0.4;
                drivers.push(format!(
                    "negative sentiment rate at {:.0}%",
                    negative_rate * 100.0
                ));
            }
            if resolution_rate < 0.4 {
                score += 0.3;
                drivers.push(format!(
                    "resolution rate at {:.0}%",
                    resolution_rate * 100.0
                ));
            }
            if growth > 0.3 {
                score += 0.3;
                drivers.push(format!(
                    "call volume grew {:.0}% week-over-week",
                    growth * 100.0
                ));
            }

            if drivers.is_empty() {
                drivers.push("no significant risk factors".to_string());
            }

            EscalationRisk {
                topic,
                score: score.min(1.0),
                drivers,
            }
        })
        .collect();

    risks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.topic.as_str().cmp(b.topic.as_str()))
    });
    risks
}

/// Spike alerts comparing the last 7 days to the 7 days before, sorted by
/// topic name
///
/// An alert fires only when the volume ratio clears 1.4 and the current
/// window's negative-sentiment rate clears 0.6.
#[must_use]
pub fn spike_alerts(calls: &[CompletedCall], now: DateTime<Utc>) -> Vec<SpikeAlert> {
    let window_start = now - Duration::days(7);
    let prior_start = now - Duration::days(14);

    by_topic(calls)
        .into_values()
        .filter_map(|(topic, topic_calls)| {
            let current: Vec<&&CompletedCall> = topic_calls
                .iter()
                .filter(|c| c.created_at > window_start && c.created_at <= now)
                .collect();
            let prior_count = topic_calls
                .iter()
                .filter(|c| c.created_at > prior_start && c.created_at <= window_start)
                .count();

            let current_count = current.len();
            let spike_ratio = if prior_count == 0 {
                if current_count == 0 {
                    Some(1.0)
                } else {
                    None
                }
            } else {
                Some(current_count as f64 / prior_count as f64)
            };

            let negative_rate = if current_count == 0 {
                0.0
            } else {
                current
                    .iter()
                    .filter(|c| c.sentiment == Sentiment::Negative)
                    .count() as f64
                    / current_count as f64
            };

            let spiking = spike_ratio.is_none_or(|r| r > SPIKE_RATIO_THRESHOLD);
            if !(spiking && negative_rate > SPIKE_NEGATIVE_THRESHOLD) {
                return None;
            }

            let message = spike_ratio.map_or_else(
                || {
                    format!(
                        "{} is a new topic this week with {:.0}% negative sentiment",
                        topic.display_name(),
                        negative_rate * 100.0
                    )
                },
                |ratio| {
                    format!(
                        "{} call volume up {:.0}% week-over-week with {:.0}% negative sentiment",
                        topic.display_name(),
                        (ratio - 1.0) * 100.0,
                        negative_rate * 100.0
                    )
                },
            );

            Some(SpikeAlert {
                topic,
                spike_ratio,
                negative_rate,
                message,
            })
        })
        .collect()
}
