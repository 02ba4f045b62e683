//! Rolling performance tracking
//!
//! The tracker keeps the most recent request outcomes in a bounded ring
//! buffer and derives time-windowed aggregates from it on demand. Nothing is
//! cached: every aggregate is recomputed from the log at call time, so a
//! concurrent append may or may not be visible to a simultaneous read.

mod store;
mod types;

pub use store::{CREATE_PERFORMANCE_METRICS_TABLE_SQL, MetricStore, spawn_writer};
pub use types::{AggregatedMetrics, GlobalSummary, PerformanceMetric};

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::classifier::TaskCategory;
use crate::error::Result;
use crate::provider::Provider;

/// Default number of metrics kept in memory
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default aggregation window in hours
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Largest window accepted from callers (ten years)
pub const MAX_WINDOW_HOURS: u32 = 24 * 365 * 10;

/// Bounded, append-only log of request outcomes
#[derive(Debug)]
pub struct PerformanceTracker {
    metrics: RwLock<VecDeque<PerformanceMetric>>,
    capacity: usize,
    /// Optional durable sink fed on every append
    sink: Option<UnboundedSender<PerformanceMetric>>,
}

impl PerformanceTracker {
    /// Create a tracker holding at most `capacity` metrics (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            metrics: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
            sink: None,
        }
    }

    /// Forward every tracked metric to a channel (e.g. a [`MetricStore`] writer)
    pub fn with_sink(mut self, sink: UnboundedSender<PerformanceMetric>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Maximum number of metrics retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of metrics currently retained
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no metrics are retained
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Append a completed request, evicting the oldest entries beyond capacity
    pub fn track_request(&self, metric: PerformanceMetric) -> Result<()> {
        let forwarded = self.sink.as_ref().map(|_| metric.clone());

        {
            let mut metrics = self.metrics.write()?;
            metrics.push_back(metric);
            while metrics.len() > self.capacity {
                metrics.pop_front();
            }
        }

        if let (Some(sink), Some(metric)) = (&self.sink, forwarded) {
            if sink.send(metric).is_err() {
                warn!("Metric sink closed; metric kept in memory only");
            }
        }

        Ok(())
    }

    /// Load previously persisted metrics, keeping only the newest `capacity`
    pub fn restore(&self, restored: impl IntoIterator<Item = PerformanceMetric>) -> Result<usize> {
        let mut metrics = self.metrics.write()?;
        let before = metrics.len();
        metrics.extend(restored);
        let added = metrics.len() - before;
        while metrics.len() > self.capacity {
            metrics.pop_front();
        }
        debug!(added, retained = metrics.len(), "Restored performance metrics");
        Ok(added)
    }

    /// Aggregate outcomes for a provider and task type inside the window.
    ///
    /// Returns `None` when no rows match; callers must read that as "no data",
    /// not as poor performance.
    pub fn aggregated_metrics(
        &self,
        provider: Provider,
        task_type: TaskCategory,
        window_hours: u32,
    ) -> Option<AggregatedMetrics> {
        let cutoff = cutoff(window_hours);
        let metrics = self.read();

        let mut total = 0u64;
        let mut successes = 0u64;
        let mut latency_sum = 0.0;
        let mut cost_sum = 0.0;
        let mut rating_sum = 0.0;
        let mut rated = 0u64;

        for metric in metrics.iter().filter(|m| {
            m.provider == provider && m.task_type == task_type && m.timestamp >= cutoff
        }) {
            total += 1;
            if metric.success {
                successes += 1;
            }
            latency_sum += metric.latency_ms as f64;
            cost_sum += metric.cost;
            if let Some(rating) = metric.user_rating {
                rating_sum += f64::from(rating);
                rated += 1;
            }
        }

        if total == 0 {
            return None;
        }

        let n = total as f64;
        Some(AggregatedMetrics {
            provider,
            task_type,
            avg_latency_ms: latency_sum / n,
            avg_cost: cost_sum / n,
            success_rate: successes as f64 / n,
            total_requests: total,
            avg_rating: (rated > 0).then(|| rating_sum / rated as f64),
            window_hours,
        })
    }

    /// Rank every provider with data for a task type, best first
    pub fn compare_providers(&self, task_type: TaskCategory) -> Vec<AggregatedMetrics> {
        let mut ranked: Vec<AggregatedMetrics> = Provider::ALL
            .into_iter()
            .filter_map(|p| self.aggregated_metrics(p, task_type, DEFAULT_WINDOW_HOURS))
            .collect();

        ranked.sort_by(|a, b| b.composite_score().total_cmp(&a.composite_score()));
        ranked
    }

    /// Raw metrics recorded for a provider inside the window
    pub fn provider_metrics(&self, provider: Provider, window_hours: u32) -> Vec<PerformanceMetric> {
        let cutoff = cutoff(window_hours);
        self.read()
            .iter()
            .filter(|m| m.provider == provider && m.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Summary across all providers inside the window
    pub fn global_summary(&self, window_hours: u32) -> GlobalSummary {
        let cutoff = cutoff(window_hours);
        let metrics = self.read();
        GlobalSummary::from_metrics(metrics.iter().filter(|m| m.timestamp >= cutoff))
    }

    /// Metrics inside the window matching a predicate, oldest first
    pub fn metrics_in_window<F>(&self, window_hours: u32, predicate: F) -> Vec<PerformanceMetric>
    where
        F: Fn(&PerformanceMetric) -> bool,
    {
        let cutoff = cutoff(window_hours);
        self.read()
            .iter()
            .filter(|m| m.timestamp >= cutoff && predicate(m))
            .cloned()
            .collect()
    }

    /// Point-in-time copy of the whole log, oldest first
    pub fn snapshot(&self) -> Vec<PerformanceMetric> {
        self.read().iter().cloned().collect()
    }

    // Readers tolerate poisoning: the deque is never left half-updated by push/pop.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<PerformanceMetric>> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn cutoff(window_hours: u32) -> DateTime<Utc> {
    window_start(Duration::hours(i64::from(window_hours)))
}

/// Start of a window ending now; a window reaching past the calendar covers everything
pub fn window_start(window: Duration) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metric(provider: Provider, task: TaskCategory) -> PerformanceMetric {
        PerformanceMetric::new(provider, "model", task, "session-1")
            .with_latency(1000)
            .with_cost(0.002)
    }

    #[test]
    fn test_aggregated_metrics_none_without_data() {
        let tracker = PerformanceTracker::default();
        assert!(
            tracker
                .aggregated_metrics(Provider::Google, TaskCategory::Reasoning, 24)
                .is_none()
        );

        tracker
            .track_request(metric(Provider::OpenAi, TaskCategory::Reasoning))
            .unwrap();
        assert!(
            tracker
                .aggregated_metrics(Provider::Google, TaskCategory::Reasoning, 24)
                .is_none()
        );
    }

    #[test]
    fn test_aggregated_metrics_counts_and_means() {
        let tracker = PerformanceTracker::default();
        tracker
            .track_request(
                metric(Provider::Google, TaskCategory::Reasoning)
                    .with_latency(1000)
                    .with_cost(0.01)
                    .with_rating(4),
            )
            .unwrap();
        tracker
            .track_request(
                metric(Provider::Google, TaskCategory::Reasoning)
                    .with_latency(3000)
                    .with_cost(0.03)
                    .failed("rate_limited"),
            )
            .unwrap();
        // Different task type must not be counted
        tracker
            .track_request(metric(Provider::Google, TaskCategory::Translation))
            .unwrap();

        let agg = tracker
            .aggregated_metrics(Provider::Google, TaskCategory::Reasoning, 24)
            .unwrap();

        assert_eq!(agg.total_requests, 2);
        assert!((agg.avg_latency_ms - 2000.0).abs() < 1e-9);
        assert!((agg.avg_cost - 0.02).abs() < 1e-9);
        assert!((agg.success_rate - 0.5).abs() < 1e-9);
        // Only the rated row contributes to the mean rating
        assert_eq!(agg.avg_rating, Some(4.0));
        assert_eq!(agg.window_hours, 24);
    }

    #[test]
    fn test_window_excludes_old_metrics() {
        let tracker = PerformanceTracker::default();
        let old = Utc::now() - Duration::hours(30);
        tracker
            .track_request(metric(Provider::Anthropic, TaskCategory::Research).at(old))
            .unwrap();

        assert!(
            tracker
                .aggregated_metrics(Provider::Anthropic, TaskCategory::Research, 24)
                .is_none()
        );
        let wide = tracker
            .aggregated_metrics(Provider::Anthropic, TaskCategory::Research, 48)
            .unwrap();
        assert_eq!(wide.total_requests, 1);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest_only() {
        let tracker = PerformanceTracker::new(3);
        for i in 0..5u64 {
            tracker
                .track_request(metric(Provider::Google, TaskCategory::Reasoning).with_latency(i))
                .unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 3);
        let latencies: Vec<u64> = snapshot.iter().map(|m| m.latency_ms).collect();
        assert_eq!(latencies, vec![2, 3, 4]);
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let tracker = Arc::new(PerformanceTracker::new(500));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker
                            .track_request(metric(Provider::Google, TaskCategory::Reasoning))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 500);
    }

    #[test]
    fn test_concurrent_appends_under_capacity_keep_everything() {
        let tracker = Arc::new(PerformanceTracker::new(10_000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        tracker
                            .track_request(metric(Provider::OpenAi, TaskCategory::Research))
                            .unwrap();
                        let _ = tracker.global_summary(24);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let agg = tracker
            .aggregated_metrics(Provider::OpenAi, TaskCategory::Research, 24)
            .unwrap();
        assert_eq!(agg.total_requests, 1000);
    }

    #[test]
    fn test_compare_providers_sorted_by_composite() {
        let tracker = PerformanceTracker::default();
        // Google: always succeeds, fast
        tracker
            .track_request(metric(Provider::Google, TaskCategory::CodeReview).with_latency(500))
            .unwrap();
        // OpenAI: fails, slow
        tracker
            .track_request(
                metric(Provider::OpenAi, TaskCategory::CodeReview)
                    .with_latency(4000)
                    .failed("timeout"),
            )
            .unwrap();

        let ranked = tracker.compare_providers(TaskCategory::CodeReview);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].provider, Provider::Google);
        assert_eq!(ranked[1].provider, Provider::OpenAi);
    }

    #[test]
    fn test_global_summary() {
        let tracker = PerformanceTracker::default();
        tracker
            .track_request(metric(Provider::Google, TaskCategory::Reasoning).with_cost(0.01))
            .unwrap();
        tracker
            .track_request(
                metric(Provider::Anthropic, TaskCategory::Research)
                    .with_cost(0.03)
                    .with_latency(3000)
                    .failed("overloaded"),
            )
            .unwrap();
        tracker
            .track_request(
                metric(Provider::Google, TaskCategory::Research).at(Utc::now() - Duration::days(3)),
            )
            .unwrap();

        let summary = tracker.global_summary(24);
        assert_eq!(summary.total_requests, 2);
        assert!((summary.total_cost - 0.04).abs() < 1e-9);
        assert!((summary.avg_latency - 2000.0).abs() < 1e-9);
        assert!((summary.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(summary.provider_breakdown.get(&Provider::Google), Some(&1));
        assert_eq!(summary.provider_breakdown.get(&Provider::Anthropic), Some(&1));
    }

    #[test]
    fn test_provider_metrics_filters_by_provider() {
        let tracker = PerformanceTracker::default();
        tracker
            .track_request(metric(Provider::Google, TaskCategory::Reasoning))
            .unwrap();
        tracker
            .track_request(metric(Provider::HuggingFace, TaskCategory::Reasoning))
            .unwrap();

        let google = tracker.provider_metrics(Provider::Google, 24);
        assert_eq!(google.len(), 1);
        assert_eq!(google[0].provider, Provider::Google);
    }

    #[test]
    fn test_restore_keeps_newest() {
        let tracker = PerformanceTracker::new(2);
        let restored: Vec<_> = (0..4u64)
            .map(|i| metric(Provider::Google, TaskCategory::Reasoning).with_latency(i))
            .collect();

        let added = tracker.restore(restored).unwrap();
        assert_eq!(added, 4);
        let latencies: Vec<u64> = tracker.snapshot().iter().map(|m| m.latency_ms).collect();
        assert_eq!(latencies, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_sink_receives_tracked_metrics() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let tracker = PerformanceTracker::default().with_sink(tx);

        tracker
            .track_request(metric(Provider::Anthropic, TaskCategory::CodeReview))
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.provider, Provider::Anthropic);
    }

    #[test]
    fn test_closed_sink_does_not_fail_tracking() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let tracker = PerformanceTracker::default().with_sink(tx);

        assert!(
            tracker
                .track_request(metric(Provider::Google, TaskCategory::Reasoning))
                .is_ok()
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_window_past_calendar_covers_whole_log() {
        let tracker = PerformanceTracker::default();
        tracker
            .track_request(
                metric(Provider::Google, TaskCategory::Reasoning).at(Utc::now() - Duration::days(900)),
            )
            .unwrap();
        tracker
            .track_request(metric(Provider::OpenAi, TaskCategory::Reasoning))
            .unwrap();

        assert_eq!(tracker.global_summary(u32::MAX).total_requests, 2);
        assert_eq!(tracker.metrics_in_window(u32::MAX, |_| true).len(), 2);
        assert!(
            tracker
                .aggregated_metrics(Provider::Google, TaskCategory::Reasoning, u32::MAX)
                .is_some()
        );
    }

    #[test]
    fn test_window_start_saturates() {
        assert_eq!(window_start(Duration::MAX), DateTime::<Utc>::MIN_UTC);
        assert!(window_start(Duration::hours(1)) < Utc::now());
    }
}
