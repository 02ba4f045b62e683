//! Logging decorator for any [`ProviderRouter`]

use std::time::Instant;

use tracing::{debug, info};

use super::router::ProviderRouter;
use super::types::{ConversationContext, RequestOutcome, RoutingDecision};
use crate::provider::Provider;

/// Wraps a router and logs every call with its duration
#[derive(Debug)]
pub struct LoggingRouter<R> {
    inner: R,
}

impl<R: ProviderRouter> LoggingRouter<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped router
    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ProviderRouter> ProviderRouter for LoggingRouter<R> {
    fn select_provider(&self, message: &str, context: &ConversationContext) -> RoutingDecision {
        debug!(
            session_id = %context.session_id,
            message_bytes = message.len(),
            "select_provider called"
        );
        let start = Instant::now();

        let decision = self.inner.select_provider(message, context);

        info!(
            session_id = %context.session_id,
            provider = %decision.provider,
            model = %decision.model,
            confidence = decision.confidence,
            fallbacks = decision.fallback_providers.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Routed request"
        );
        decision
    }

    fn record_performance(
        &self,
        decision: &RoutingDecision,
        outcome: &RequestOutcome,
        context: &ConversationContext,
    ) {
        debug!(
            session_id = %context.session_id,
            provider = %decision.provider,
            "record_performance called"
        );
        let start = Instant::now();

        self.inner.record_performance(decision, outcome, context);

        info!(
            session_id = %context.session_id,
            provider = %decision.provider,
            model = %decision.model,
            latency_ms = outcome.latency_ms,
            success = outcome.success,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Recorded request outcome"
        );
    }

    fn force_provider(&self, provider: Provider, reason: &str) -> RoutingDecision {
        debug!(provider = %provider, reason = %reason, "force_provider called");
        let start = Instant::now();

        let decision = self.inner.force_provider(provider, reason);

        info!(
            provider = %decision.provider,
            model = %decision.model,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Forced provider"
        );
        decision
    }
}
