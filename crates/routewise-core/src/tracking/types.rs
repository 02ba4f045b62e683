//! Types for request outcome tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classifier::TaskCategory;
use crate::provider::Provider;

/// Outcome of one completed provider request. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub provider: Provider,
    pub model: String,
    pub task_type: TaskCategory,
    pub latency_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Cost in USD
    pub cost: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// 1 to 5 stars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<u8>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

impl PerformanceMetric {
    /// Create a successful, zero-cost metric stamped now
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        task_type: TaskCategory,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            task_type,
            latency_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            success: true,
            error_kind: None,
            user_rating: None,
            timestamp: Utc::now(),
            session_id: session_id.into(),
        }
    }

    /// Set latency
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    /// Set token counts
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    /// Set cost; negative or non-finite values are stored as zero
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        self
    }

    /// Mark as failed with an error kind
    pub fn failed(mut self, error_kind: impl Into<String>) -> Self {
        self.success = false;
        self.error_kind = Some(error_kind.into());
        self
    }

    /// Set success flag
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Set the user's rating, clamped to 1..=5
    pub fn with_rating(mut self, rating: u8) -> Self {
        self.user_rating = Some(rating.clamp(1, 5));
        self
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Time-windowed summary for one provider/task pair. Derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub provider: Provider,
    pub task_type: TaskCategory,
    pub avg_latency_ms: f64,
    pub avg_cost: f64,
    /// 0.0 to 1.0
    pub success_rate: f64,
    /// Always at least 1
    pub total_requests: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
    pub window_hours: u32,
}

impl AggregatedMetrics {
    /// Weighted score: 40% success rate, 30% speed, 30% cost efficiency.
    ///
    /// Speed and cost terms are `min(1, 1/x)` with latency in seconds; a zero
    /// latency or cost counts as the best possible term.
    pub fn composite_score(&self) -> f64 {
        let latency_secs = self.avg_latency_ms / 1000.0;
        let latency_term = if latency_secs > 0.0 {
            (1.0 / latency_secs).min(1.0)
        } else {
            1.0
        };
        let cost_term = if self.avg_cost > 0.0 {
            (1.0 / self.avg_cost).min(1.0)
        } else {
            1.0
        };

        (self.success_rate * 0.4) + (latency_term * 0.3) + (cost_term * 0.3)
    }
}

/// Aggregate across every provider in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
    pub total_requests: u64,
    pub total_cost: f64,
    pub avg_latency: f64,
    pub success_rate: f64,
    pub provider_breakdown: BTreeMap<Provider, u64>,
}

impl GlobalSummary {
    /// Fold a sequence of metrics into a summary in one pass
    pub fn from_metrics<'a>(metrics: impl IntoIterator<Item = &'a PerformanceMetric>) -> Self {
        let mut total_requests = 0u64;
        let mut total_cost = 0.0;
        let mut total_latency = 0.0;
        let mut successes = 0u64;
        let mut provider_breakdown = BTreeMap::new();

        for metric in metrics {
            total_requests += 1;
            total_cost += metric.cost;
            total_latency += metric.latency_ms as f64;
            if metric.success {
                successes += 1;
            }
            *provider_breakdown.entry(metric.provider).or_insert(0) += 1;
        }

        let (avg_latency, success_rate) = if total_requests > 0 {
            (
                total_latency / total_requests as f64,
                successes as f64 / total_requests as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total_requests,
            total_cost,
            avg_latency,
            success_rate,
            provider_breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(success_rate: f64, latency_ms: f64, cost: f64) -> AggregatedMetrics {
        AggregatedMetrics {
            provider: Provider::Google,
            task_type: TaskCategory::Reasoning,
            avg_latency_ms: latency_ms,
            avg_cost: cost,
            success_rate,
            total_requests: 1,
            avg_rating: None,
            window_hours: 24,
        }
    }

    #[test]
    fn test_composite_score_weights() {
        // 2s latency -> 0.5 speed term; cost 0.001 -> capped at 1.0
        let score = aggregate(1.0, 2000.0, 0.001).composite_score();
        assert!((score - (0.4 + 0.15 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_composite_score_guards_zero_division() {
        let score = aggregate(0.5, 0.0, 0.0).composite_score();
        assert!((score - (0.2 + 0.3 + 0.3)).abs() < 1e-9);
        assert!(score.is_finite());
    }

    #[test]
    fn test_metric_builder_clamps() {
        let metric = PerformanceMetric::new(Provider::OpenAi, "gpt-4o", TaskCategory::Research, "s1")
            .with_cost(-3.0)
            .with_rating(9)
            .failed("timeout");

        assert_eq!(metric.cost, 0.0);
        assert_eq!(metric.user_rating, Some(5));
        assert!(!metric.success);
        assert_eq!(metric.error_kind.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_global_summary_empty() {
        let summary = GlobalSummary::from_metrics(std::iter::empty());
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.avg_latency, 0.0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(summary.provider_breakdown.is_empty());
    }
}
