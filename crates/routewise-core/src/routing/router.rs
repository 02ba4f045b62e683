//! Provider router
//!
//! Combines the classifier, the performance tracker and the cost ledger into
//! one selection step:
//! - classify the message
//! - build `{provider, model}` candidates from the catalog
//! - score each from recent history plus user preferences
//! - pick the best and keep the runners-up as fallbacks
//!
//! The router holds no mutable state of its own. Everything it learns flows
//! through the shared tracker and ledger.

use std::sync::Arc;

use tracing::{debug, warn};

use super::catalog::ProviderCatalog;
use super::types::{
    ConversationContext, RequestOutcome, RoutingDecision, ScoredCandidate, UserPreferences,
};
use crate::classifier::{TaskCategory, TaskClassification, TaskClassifier};
use crate::config::Config;
use crate::cost::CostLedger;
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::tracking::{PerformanceMetric, PerformanceTracker};

/// History window used when scoring candidates
pub const SCORING_WINDOW_HOURS: u32 = 24;

/// Base score for candidates without history
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Estimated cost reported by the fallback decision
pub const FALLBACK_ESTIMATED_COST: f64 = 0.001;

/// Estimated latency reported by the fallback decision
pub const FALLBACK_ESTIMATED_LATENCY_MS: u64 = 2000;

const PREFERRED_PROVIDER_BONUS: f64 = 0.2;
const RATING_WEIGHT: f64 = 0.1;
const PREFERENCE_WEIGHT: f64 = 0.15;
const LATENCY_CEILING_MS: f64 = 3000.0;
const COST_CEILING_USD: f64 = 0.01;
const FORCED_ESTIMATE_TOKENS: u64 = 100;

/// The narrow interface shared by the router and its decorators
pub trait ProviderRouter: Send + Sync {
    /// Choose a provider and model for a message. Never fails.
    fn select_provider(&self, message: &str, context: &ConversationContext) -> RoutingDecision;

    /// Record what happened after a decision was executed. Never fails.
    fn record_performance(
        &self,
        decision: &RoutingDecision,
        outcome: &RequestOutcome,
        context: &ConversationContext,
    );

    /// Bypass scoring and pin a provider
    fn force_provider(&self, provider: Provider, reason: &str) -> RoutingDecision;
}

/// Configuration for the router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// When false every selection returns the fallback decision
    pub enabled: bool,
    /// When false `record_performance` is a no-op
    pub tracking_enabled: bool,
    /// Provider used by the fallback decision
    pub default_provider: Provider,
    /// Upper bound on `fallback_providers`
    pub max_fallbacks: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tracking_enabled: true,
            default_provider: Provider::Google,
            max_fallbacks: 3,
        }
    }
}

impl RouterConfig {
    /// Build from the routing and tracking sections of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.routing.enabled,
            tracking_enabled: config.tracking.enabled,
            default_provider: config.routing.default_provider,
            max_fallbacks: config.routing.max_fallbacks,
        }
    }
}

/// Score-based provider router
#[derive(Debug)]
pub struct Router {
    config: RouterConfig,
    classifier: TaskClassifier,
    catalog: ProviderCatalog,
    tracker: Arc<PerformanceTracker>,
    ledger: Arc<CostLedger>,
}

impl Router {
    /// Create a router over shared tracker and ledger instances
    pub fn new(
        config: RouterConfig,
        tracker: Arc<PerformanceTracker>,
        ledger: Arc<CostLedger>,
    ) -> Self {
        RouterBuilder::new()
            .config(config)
            .tracker(tracker)
            .ledger(ledger)
            .build()
    }

    /// Start building a router
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn classifier(&self) -> &TaskClassifier {
        &self.classifier
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// Every scored candidate for a message, best first
    pub fn rank(&self, message: &str, context: &ConversationContext) -> Result<Vec<ScoredCandidate>> {
        let classification = self.classify_or_neutral(message);
        self.rank_classified(&classification, &context.preferences())
    }

    fn classify_or_neutral(&self, message: &str) -> TaskClassification {
        match self.classifier.try_classify(message) {
            Ok(classification) => classification,
            Err(e) => {
                warn!(error = %e, "Classification failed, using neutral classification");
                TaskClassification::neutral(message)
            }
        }
    }

    fn rank_classified(
        &self,
        classification: &TaskClassification,
        preferences: &UserPreferences,
    ) -> Result<Vec<ScoredCandidate>> {
        let candidates = self.candidates(classification.task_type)?;

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|(provider, model)| self.score(provider, model, classification, preferences))
            .collect();

        // Stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scored)
    }

    /// `{provider, model}` pairs for a task among available providers
    fn candidates(&self, task: TaskCategory) -> Result<Vec<(Provider, String)>> {
        let advertised: Vec<(Provider, String)> = self
            .catalog
            .available()
            .filter_map(|p| self.catalog.model_for(p, task).map(|m| (p, m)))
            .collect();

        if !advertised.is_empty() {
            return Ok(advertised);
        }

        let defaults: Vec<(Provider, String)> = self
            .catalog
            .available()
            .map(|p| (p, self.catalog.default_model(p).to_string()))
            .collect();

        if defaults.is_empty() {
            return Err(Error::NoCandidates(task.to_string()));
        }

        debug!(task_type = %task, "No provider advertises task, using default models");
        Ok(defaults)
    }

    fn score(
        &self,
        provider: Provider,
        model: String,
        classification: &TaskClassification,
        preferences: &UserPreferences,
    ) -> ScoredCandidate {
        let estimated_cost = self.ledger.calculate_cost(
            provider.as_str(),
            &model,
            classification.estimated_tokens,
            classification.estimated_tokens * 2,
        );
        let estimated_latency_ms = self.catalog.estimated_latency_ms(provider, &model);

        let history = self.tracker.aggregated_metrics(
            provider,
            classification.task_type,
            SCORING_WINDOW_HOURS,
        );

        let (mut score, mut reasoning) = match history {
            Some(agg) => {
                let mut score = agg.composite_score();
                let mut reasoning = format!(
                    "Performance: {:.1}% success, {:.0}ms latency, ${:.4} avg cost",
                    agg.success_rate * 100.0,
                    agg.avg_latency_ms,
                    agg.avg_cost
                );
                if let Some(rating) = agg.avg_rating {
                    score += rating * RATING_WEIGHT;
                    reasoning.push_str(&format!(", {:.1}★ rating", rating));
                }
                (score, reasoning)
            }
            None => (NEUTRAL_SCORE, "No historical performance data".to_string()),
        };

        if preferences.preferred_provider == Some(provider) {
            score += PREFERRED_PROVIDER_BONUS;
            reasoning.push_str(", preferred provider");
        }
        if preferences.speed_priority {
            score += (1.0 - estimated_latency_ms as f64 / LATENCY_CEILING_MS).max(0.0)
                * PREFERENCE_WEIGHT;
        }
        if preferences.cost_sensitive {
            score += (1.0 - estimated_cost / COST_CEILING_USD).max(0.0) * PREFERENCE_WEIGHT;
        }

        ScoredCandidate {
            provider,
            model,
            score: score.clamp(0.0, 1.0),
            reasoning,
            estimated_cost,
            estimated_latency_ms,
        }
    }

    fn fallback_decision(&self, reasoning: impl Into<String>) -> RoutingDecision {
        let provider = self.config.default_provider;
        RoutingDecision {
            provider,
            model: self.catalog.default_model(provider).to_string(),
            confidence: NEUTRAL_SCORE,
            reasoning: reasoning.into(),
            estimated_cost: FALLBACK_ESTIMATED_COST,
            estimated_latency_ms: FALLBACK_ESTIMATED_LATENCY_MS,
            fallback_providers: Vec::new(),
        }
    }
}

impl ProviderRouter for Router {
    fn select_provider(&self, message: &str, context: &ConversationContext) -> RoutingDecision {
        if !self.config.enabled {
            return self
                .fallback_decision("Intelligent routing disabled - using default provider");
        }

        let classification = self.classify_or_neutral(message);
        let ranked = match self.rank_classified(&classification, &context.preferences()) {
            Ok(ranked) => ranked,
            Err(e) => {
                debug!(error = %e, "No candidates, returning fallback decision");
                return self.fallback_decision(format!("No suitable providers found: {}", e));
            }
        };

        let mut ranked = ranked.into_iter();
        let Some(best) = ranked.next() else {
            return self.fallback_decision("No suitable providers found");
        };

        let mut fallback_providers: Vec<Provider> = Vec::new();
        for candidate in ranked {
            if fallback_providers.len() >= self.config.max_fallbacks {
                break;
            }
            if candidate.provider != best.provider
                && !fallback_providers.contains(&candidate.provider)
            {
                fallback_providers.push(candidate.provider);
            }
        }

        debug!(
            task_type = %classification.task_type,
            provider = %best.provider,
            model = %best.model,
            score = best.score,
            fallbacks = fallback_providers.len(),
            "Selected provider"
        );

        RoutingDecision {
            provider: best.provider,
            model: best.model,
            confidence: best.score,
            reasoning: best.reasoning,
            estimated_cost: best.estimated_cost,
            estimated_latency_ms: best.estimated_latency_ms,
            fallback_providers,
        }
    }

    fn record_performance(
        &self,
        decision: &RoutingDecision,
        outcome: &RequestOutcome,
        context: &ConversationContext,
    ) {
        if !self.config.tracking_enabled {
            return;
        }

        let classification = self.classifier.classify(context.last_message());
        let input_tokens = classification.estimated_tokens;
        let output_tokens = outcome.latency_ms.div_ceil(10);

        let mut metric = PerformanceMetric::new(
            decision.provider,
            decision.model.clone(),
            classification.task_type,
            context.session_id.clone(),
        )
        .with_latency(outcome.latency_ms)
        .with_tokens(input_tokens, output_tokens)
        .with_cost(outcome.cost)
        .with_success(outcome.success);

        if let Some(kind) = &outcome.error_kind {
            metric = metric.failed(kind.clone()).with_success(outcome.success);
        }
        if let Some(rating) = outcome.user_rating {
            metric = metric.with_rating(rating);
        }
        let cost = metric.cost;

        if let Err(e) = self.tracker.track_request(metric) {
            warn!(error = %e, provider = %decision.provider, "Failed to track request");
        }

        if let Err(e) = self.ledger.track_billed_cost(
            decision.provider.as_str(),
            &decision.model,
            input_tokens,
            output_tokens,
            cost,
            &context.session_id,
            context.user_id.as_deref(),
        ) {
            warn!(error = %e, provider = %decision.provider, "Failed to book request cost");
        }
    }

    fn force_provider(&self, provider: Provider, reason: &str) -> RoutingDecision {
        let model = self.catalog.default_model(provider);
        RoutingDecision {
            provider,
            model: model.to_string(),
            confidence: 1.0,
            reasoning: format!("Forced selection: {}", reason),
            estimated_cost: self.ledger.calculate_cost(
                provider.as_str(),
                model,
                FORCED_ESTIMATE_TOKENS,
                FORCED_ESTIMATE_TOKENS * 2,
            ),
            estimated_latency_ms: self.catalog.estimated_latency_ms(provider, model),
            fallback_providers: Vec::new(),
        }
    }
}

/// Builder for Router
pub struct RouterBuilder {
    config: RouterConfig,
    classifier: Option<TaskClassifier>,
    catalog: Option<ProviderCatalog>,
    tracker: Option<Arc<PerformanceTracker>>,
    ledger: Option<Arc<CostLedger>>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            classifier: None,
            catalog: None,
            tracker: None,
            ledger: None,
        }
    }

    /// Set configuration
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the classifier
    pub fn classifier(mut self, classifier: TaskClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Set the provider catalog
    pub fn catalog(mut self, catalog: ProviderCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the shared performance tracker
    pub fn tracker(mut self, tracker: Arc<PerformanceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Set the shared cost ledger
    pub fn ledger(mut self, ledger: Arc<CostLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Build the router
    pub fn build(self) -> Router {
        Router {
            config: self.config,
            classifier: self.classifier.unwrap_or_default(),
            catalog: self.catalog.unwrap_or_else(ProviderCatalog::from_env),
            tracker: self.tracker.unwrap_or_default(),
            ledger: self.ledger.unwrap_or_default(),
        }
    }
}
