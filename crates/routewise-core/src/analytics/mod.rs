//! Usage analytics over the tracker and the ledger

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::classifier::TaskCategory;
use crate::cost::CostLedger;
use crate::provider::Provider;
use crate::tracking::{GlobalSummary, PerformanceMetric, PerformanceTracker, window_start};

/// Share of the premium-only baseline that routed traffic is assumed to cost
pub const ROUTED_COST_RATIO: f64 = 0.7;

/// Summary of recent traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_requests: u64,
    pub total_cost: f64,
    pub avg_latency: f64,
    pub success_rate: f64,
    /// Requests per provider
    pub top_providers: BTreeMap<Provider, u64>,
    /// Requests per task category
    pub task_breakdown: BTreeMap<TaskCategory, u64>,
    /// Estimated saving against always using premium models
    pub cost_savings: f64,
    pub window_hours: u32,
}

/// Tracker report plus ledger totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostOverview {
    #[serde(flatten)]
    pub report: AnalyticsReport,
    /// Sum of ledger records in the window, for the user when one is given
    pub ledger_total: f64,
    pub record_count: usize,
}

/// Builds reports on demand; holds no state of its own
#[derive(Debug, Clone)]
pub struct AnalyticsReporter {
    tracker: Arc<PerformanceTracker>,
    ledger: Arc<CostLedger>,
}

impl AnalyticsReporter {
    pub fn new(tracker: Arc<PerformanceTracker>, ledger: Arc<CostLedger>) -> Self {
        Self { tracker, ledger }
    }

    /// Report over the window, optionally restricted to one user.
    ///
    /// A metric belongs to a user when its session id starts with the user id.
    pub fn report(&self, window_hours: u32, user_id: Option<&str>) -> AnalyticsReport {
        let metrics = self
            .tracker
            .metrics_in_window(window_hours, |m| belongs_to(m, user_id));

        let summary = GlobalSummary::from_metrics(&metrics);

        let mut task_breakdown = BTreeMap::new();
        for metric in &metrics {
            *task_breakdown.entry(metric.task_type).or_insert(0) += 1;
        }

        AnalyticsReport {
            total_requests: summary.total_requests,
            total_cost: summary.total_cost,
            avg_latency: summary.avg_latency,
            success_rate: summary.success_rate,
            top_providers: summary.provider_breakdown,
            task_breakdown,
            cost_savings: cost_savings(summary.total_cost),
            window_hours,
        }
    }

    /// Report plus what the ledger has booked inside the same window
    pub fn cost_overview(&self, window_hours: u32, user_id: Option<&str>) -> CostOverview {
        let report = self.report(window_hours, user_id);

        let start = window_start(Duration::hours(i64::from(window_hours)));
        // An open end bound never fails
        let (ledger_total, record_count) = self
            .ledger
            .export_costs(Some(start), None)
            .unwrap_or_default()
            .iter()
            .filter(|r| user_id.is_none_or(|user| r.user_id.as_deref() == Some(user)))
            .fold((0.0, 0), |(total, count), r| (total + r.cost, count + 1));

        CostOverview {
            report,
            ledger_total,
            record_count,
        }
    }
}

fn belongs_to(metric: &PerformanceMetric, user_id: Option<&str>) -> bool {
    user_id.is_none_or(|user| metric.session_id.starts_with(user))
}

/// `total / 0.7 - total`
pub fn cost_savings(total_cost: f64) -> f64 {
    total_cost / ROUTED_COST_RATIO - total_cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn reporter() -> AnalyticsReporter {
        AnalyticsReporter::new(
            Arc::new(PerformanceTracker::default()),
            Arc::new(CostLedger::default()),
        )
    }

    fn track(reporter: &AnalyticsReporter, provider: Provider, task: TaskCategory, session: &str, cost: f64) {
        reporter
            .tracker
            .track_request(
                PerformanceMetric::new(provider, "m", task, session)
                    .with_latency(1000)
                    .with_cost(cost),
            )
            .unwrap();
    }

    #[test]
    fn test_empty_report() {
        let report = reporter().report(24, None);
        assert_eq!(report.total_requests, 0);
        assert_eq!(report.total_cost, 0.0);
        assert_eq!(report.cost_savings, 0.0);
        assert!(report.task_breakdown.is_empty());
    }

    #[test]
    fn test_report_totals_and_breakdowns() {
        let reporter = reporter();
        track(&reporter, Provider::Google, TaskCategory::Reasoning, "alice-1", 0.07);
        track(&reporter, Provider::Google, TaskCategory::Translation, "alice-2", 0.0);
        track(&reporter, Provider::OpenAi, TaskCategory::Reasoning, "bob-1", 0.0);

        let report = reporter.report(24, None);
        assert_eq!(report.total_requests, 3);
        assert_eq!(report.top_providers.get(&Provider::Google), Some(&2));
        assert_eq!(report.task_breakdown.get(&TaskCategory::Reasoning), Some(&2));
        assert!((report.cost_savings - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_user_filter_applies_to_every_figure() {
        let reporter = reporter();
        track(&reporter, Provider::Google, TaskCategory::Reasoning, "alice-1", 0.01);
        track(&reporter, Provider::OpenAi, TaskCategory::Translation, "bob-1", 0.02);

        let report = reporter.report(24, Some("alice"));
        assert_eq!(report.total_requests, 1);
        assert!((report.total_cost - 0.01).abs() < 1e-12);
        assert_eq!(report.top_providers.len(), 1);
        assert_eq!(report.task_breakdown.get(&TaskCategory::Translation), None);
    }

    #[test]
    fn test_window_excludes_old_metrics() {
        let reporter = reporter();
        reporter
            .tracker
            .track_request(
                PerformanceMetric::new(Provider::Google, "m", TaskCategory::Reasoning, "s")
                    .at(Utc::now() - Duration::hours(48)),
            )
            .unwrap();

        assert_eq!(reporter.report(24, None).total_requests, 0);
        assert_eq!(reporter.report(72, None).total_requests, 1);
    }

    #[test]
    fn test_cost_overview_includes_ledger() {
        let reporter = reporter();
        reporter
            .ledger
            .track_billed_cost("google", "gemini-2.5-flash", 0, 0, 0.5, "alice-1", Some("alice"))
            .unwrap();
        reporter
            .ledger
            .track_billed_cost("openai", "gpt-4o", 0, 0, 0.25, "bob-1", Some("bob"))
            .unwrap();

        let all = reporter.cost_overview(24, None);
        assert_eq!(all.record_count, 2);
        assert!((all.ledger_total - 0.75).abs() < 1e-12);

        let alice = reporter.cost_overview(24, Some("alice"));
        assert_eq!(alice.record_count, 1);
        assert!((alice.ledger_total - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cost_overview_ledger_follows_window() {
        let reporter = reporter();
        reporter
            .ledger
            .track_cost_at(
                "google",
                "gemini-2.5-flash",
                1000,
                0,
                "alice-1",
                Some("alice"),
                Utc::now() - Duration::hours(72),
            )
            .unwrap();
        reporter
            .ledger
            .track_billed_cost("google", "gemini-2.5-flash", 0, 0, 0.5, "alice-2", Some("alice"))
            .unwrap();

        let day = reporter.cost_overview(24, Some("alice"));
        assert_eq!(day.record_count, 1);
        assert!((day.ledger_total - 0.5).abs() < 1e-12);

        let week = reporter.cost_overview(168, None);
        assert_eq!(week.record_count, 2);
    }
}
