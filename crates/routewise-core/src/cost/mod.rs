//! Cost ledger and approval thresholds
//!
//! This module provides:
//! - Per-provider, per-model-family pricing (USD per 1K tokens)
//! - An append-only ledger of request costs
//! - Approval checks for a prospective cost
//! - Session, user and date-range queries for reporting

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tracking::window_start;

/// Costs at or below this are approved without asking
pub const DEFAULT_AUTO_APPROVE_THRESHOLD: f64 = 0.01;

/// Costs strictly above this require explicit approval
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 0.10;

/// One booked request cost. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Provider name as given by the caller; unknown names are priced at the default rate
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Cost in USD, never negative
    pub cost: f64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Pricing for a model family (USD per 1K tokens)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    /// Create new model pricing
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Calculate cost for given token counts
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input = (input_tokens as f64 / 1000.0) * self.input_per_1k;
        let output = (output_tokens as f64 / 1000.0) * self.output_per_1k;
        (input + output).max(0.0)
    }
}

/// Rate used when the provider or model family is not in the table
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(0.00025, 0.0005);

/// Model family: the model id up to the first `-` (`gemini-2.5-flash` → `gemini`)
pub fn model_family(model: &str) -> &str {
    model.split('-').next().unwrap_or(model)
}

/// Pricing keyed by provider and model family
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<(String, String), ModelPricing>,
}

impl PricingTable {
    /// Empty table; every lookup falls back to [`DEFAULT_PRICING`]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add or replace pricing for a provider/family pair
    pub fn insert(&mut self, provider: &str, family: &str, pricing: ModelPricing) {
        self.entries
            .insert((provider.to_lowercase(), family.to_lowercase()), pricing);
    }

    /// Pricing for a provider and model, falling back to the default rate
    pub fn lookup(&self, provider: &str, model: &str) -> ModelPricing {
        let key = (
            provider.trim().to_lowercase(),
            model_family(model.trim()).to_lowercase(),
        );
        self.entries.get(&key).copied().unwrap_or(DEFAULT_PRICING)
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no explicit entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("google", "gemini", ModelPricing::new(0.00025, 0.0005));
        table.insert("anthropic", "claude", ModelPricing::new(0.0008, 0.0024));
        table.insert("openai", "gpt", ModelPricing::new(0.0015, 0.002));
        table.insert("hf", "local", ModelPricing::new(0.0, 0.0));
        table
    }
}

/// Ledger for recording and querying request costs
#[derive(Debug)]
pub struct CostLedger {
    pricing: PricingTable,
    records: RwLock<Vec<CostRecord>>,
    auto_approve_threshold: f64,
    approval_threshold: f64,
}

impl CostLedger {
    /// Create a ledger with default pricing and the given thresholds
    pub fn new(auto_approve_threshold: f64, approval_threshold: f64) -> Self {
        Self {
            pricing: PricingTable::default(),
            records: RwLock::new(Vec::new()),
            auto_approve_threshold,
            approval_threshold,
        }
    }

    /// Create a ledger from config
    pub fn from_config(config: &crate::config::CostConfig) -> Self {
        Self::new(config.auto_approve_threshold, config.approval_threshold)
    }

    /// Add custom pricing for a provider and model family
    pub fn add_pricing(&mut self, provider: &str, family: &str, pricing: ModelPricing) {
        self.pricing.insert(provider, family, pricing);
    }

    /// Pricing table in use
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Price a request without recording it
    pub fn calculate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> f64 {
        self.pricing
            .lookup(provider, model)
            .calculate_cost(input_tokens, output_tokens)
    }

    /// Price a request and append it to the ledger
    pub fn track_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<CostRecord> {
        let cost = self.calculate_cost(provider, model, input_tokens, output_tokens);
        self.append(
            provider,
            model,
            input_tokens,
            output_tokens,
            cost,
            session_id,
            user_id,
            Utc::now(),
        )
    }

    /// Append a request whose cost is already known
    #[allow(clippy::too_many_arguments)]
    pub fn track_billed_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost: f64,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<CostRecord> {
        let cost = if cost.is_finite() { cost.max(0.0) } else { 0.0 };
        self.append(
            provider,
            model,
            input_tokens,
            output_tokens,
            cost,
            session_id,
            user_id,
            Utc::now(),
        )
    }

    /// Append a priced request with an explicit timestamp
    #[allow(clippy::too_many_arguments)]
    pub fn track_cost_at(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        session_id: &str,
        user_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<CostRecord> {
        let cost = self.calculate_cost(provider, model, input_tokens, output_tokens);
        self.append(
            provider,
            model,
            input_tokens,
            output_tokens,
            cost,
            session_id,
            user_id,
            timestamp,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cost: f64,
        session_id: &str,
        user_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<CostRecord> {
        let record = CostRecord {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost,
            session_id: session_id.to_string(),
            user_id: user_id.map(str::to_string),
        };

        self.records.write()?.push(record.clone());

        debug!(
            provider = %record.provider,
            model = %record.model,
            cost = record.cost,
            "Booked request cost"
        );
        Ok(record)
    }

    /// Whether a cost is large enough to need explicit approval
    pub fn needs_approval(&self, cost: f64) -> bool {
        cost > self.approval_threshold
    }

    /// Whether a cost is small enough to approve automatically
    pub fn can_auto_approve(&self, cost: f64) -> bool {
        cost <= self.auto_approve_threshold
    }

    /// Whether the caller must collect payment before proceeding
    pub fn payment_required(&self, cost: f64) -> bool {
        self.needs_approval(cost) && !self.can_auto_approve(cost)
    }

    /// All records for a session, oldest first
    pub fn session_costs(&self, session_id: &str) -> Vec<CostRecord> {
        self.filtered(|r| r.session_id == session_id)
    }

    /// Sum of a session's costs
    pub fn session_total(&self, session_id: &str) -> f64 {
        self.read()
            .iter()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.cost)
            .sum()
    }

    /// All records for a user, oldest first
    pub fn user_costs(&self, user_id: &str) -> Vec<CostRecord> {
        self.filtered(|r| r.user_id.as_deref() == Some(user_id))
    }

    /// Sum of a user's costs
    pub fn user_total(&self, user_id: &str) -> f64 {
        self.read()
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(user_id))
            .map(|r| r.cost)
            .sum()
    }

    /// Records with `start <= timestamp <= end`; either bound may be open
    pub fn export_costs(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CostRecord>> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::InvalidExportRange { start, end });
            }
        }

        Ok(self.filtered(|r| {
            start.is_none_or(|s| r.timestamp >= s) && end.is_none_or(|e| r.timestamp <= e)
        }))
    }

    /// Drop records older than `days_old` days; returns how many were removed
    pub fn cleanup(&self, days_old: u32) -> Result<usize> {
        let cutoff = window_start(Duration::days(i64::from(days_old)));
        let mut records = self.records.write()?;
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        let removed = before - records.len();

        if removed > 0 {
            info!(removed, days_old, "Cleaned up cost records");
        }
        Ok(removed)
    }

    /// Number of records in the ledger
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the ledger holds no records
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sum of every recorded cost
    pub fn total_cost(&self) -> f64 {
        self.read().iter().map(|r| r.cost).sum()
    }

    fn filtered<F>(&self, predicate: F) -> Vec<CostRecord>
    where
        F: Fn(&CostRecord) -> bool,
    {
        self.read().iter().filter(|r| predicate(r)).cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CostRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_APPROVE_THRESHOLD, DEFAULT_APPROVAL_THRESHOLD)
    }
}

/// Periodically drop ledger records older than `retention_days`
pub fn spawn_cleanup(
    ledger: Arc<CostLedger>,
    retention_days: u32,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = ledger.cleanup(retention_days) {
                warn!(error = %e, "Failed to clean up cost records");
            }
        }
    })
}
