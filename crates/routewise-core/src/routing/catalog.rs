//! Provider availability, capability and latency tables

use std::collections::{BTreeSet, HashMap};
use std::env;

use crate::classifier::TaskCategory;
use crate::config::ProvidersConfig;
use crate::provider::Provider;

/// Latency assumed for models missing from the latency table
pub const DEFAULT_LATENCY_MS: u64 = 2000;

/// Which providers can be used and which model each offers per task
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    available: BTreeSet<Provider>,
    /// `None` withdraws the provider from the task
    overrides: HashMap<(Provider, TaskCategory), Option<String>>,
}

impl ProviderCatalog {
    /// Catalog with availability derived from credential environment variables
    pub fn from_env() -> Self {
        Self::with_available(
            Provider::ALL
                .into_iter()
                .filter(|p| has_credentials(*p)),
        )
    }

    /// Catalog with an explicit availability list
    pub fn with_available(available: impl IntoIterator<Item = Provider>) -> Self {
        Self {
            available: available.into_iter().collect(),
            overrides: HashMap::new(),
        }
    }

    /// Catalog in which every provider is available
    pub fn all_available() -> Self {
        Self::with_available(Provider::ALL)
    }

    /// Catalog from configuration; falls back to credentials when no list is given
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut catalog = match &config.available {
            Some(list) => Self::with_available(list.iter().copied()),
            None => Self::from_env(),
        };
        for o in &config.overrides {
            catalog = catalog.with_override(o.provider, o.task, o.model.clone());
        }
        catalog
    }

    /// Replace (`Some`) or withdraw (`None`) a provider's model for a task
    pub fn with_override(
        mut self,
        provider: Provider,
        task: TaskCategory,
        model: Option<String>,
    ) -> Self {
        self.overrides.insert((provider, task), model);
        self
    }

    pub fn is_available(&self, provider: Provider) -> bool {
        self.available.contains(&provider)
    }

    /// Available providers in candidate order
    pub fn available(&self) -> impl Iterator<Item = Provider> + '_ {
        Provider::ALL
            .into_iter()
            .filter(|p| self.available.contains(p))
    }

    /// Model a provider advertises for a task, if any
    pub fn model_for(&self, provider: Provider, task: TaskCategory) -> Option<String> {
        match self.overrides.get(&(provider, task)) {
            Some(model) => model.clone(),
            None => builtin_model(provider, task).map(str::to_string),
        }
    }

    /// Model used for forced selections and fallback decisions
    pub fn default_model(&self, provider: Provider) -> &'static str {
        default_model(provider)
    }

    /// Rough latency estimate for a model
    pub fn estimated_latency_ms(&self, provider: Provider, model: &str) -> u64 {
        estimated_latency_ms(provider, model)
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::from_env()
    }
}

fn has_credentials(provider: Provider) -> bool {
    provider
        .credential_env_vars()
        .iter()
        .any(|var| env::var(var).is_ok_and(|v| !v.trim().is_empty()))
}

/// Default model per provider
pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => "gemini-2.5-flash",
        Provider::OpenAi => "gpt-4o-mini",
        Provider::Anthropic => "claude-3-5-sonnet-20241022",
        Provider::HuggingFace => "meta-llama/Llama-3.2-3B-Instruct",
    }
}

/// Built-in capability table. Exhaustive so a new provider or task
/// category fails to compile until it is mapped.
fn builtin_model(provider: Provider, task: TaskCategory) -> Option<&'static str> {
    use Provider::*;
    use TaskCategory::*;

    let model = match (provider, task) {
        (
            Google,
            CodeGeneration | CodeDebugging | CodeReview | Reasoning | CreativeWriting,
        ) => "gemini-2.5-pro",
        (
            Google,
            Translation | MathCalculation | DataAnalysis | GeneralConversation | Summarization
            | Research,
        ) => "gemini-2.5-flash",

        (OpenAi, _) => "gpt-4o",

        (Anthropic, _) => "claude-3-5-sonnet-20241022",

        (
            HuggingFace,
            CodeGeneration | CodeDebugging | CodeReview | Reasoning | CreativeWriting,
        ) => "deepseek-ai/DeepSeek-V3-0324",
        (
            HuggingFace,
            Translation | MathCalculation | DataAnalysis | GeneralConversation | Summarization
            | Research,
        ) => "meta-llama/Llama-3.2-3B-Instruct",
    };
    Some(model)
}

/// Latency keyed by provider and the model id up to its first `/`
fn estimated_latency_ms(provider: Provider, model: &str) -> u64 {
    let prefix = model.split('/').next().unwrap_or(model).to_lowercase();
    match (provider, prefix.as_str()) {
        (Provider::Google, "gemini-2.5-flash") => 500,
        (Provider::Google, "gemini-2.5-pro") => 1500,
        (Provider::OpenAi, "gpt-4o-mini") => 800,
        (Provider::Anthropic, "claude-3-5-sonnet-20241022") => 2000,
        (Provider::HuggingFace, "deepseek-ai") => 3000,
        (Provider::HuggingFace, "meta-llama") => 1000,
        _ => DEFAULT_LATENCY_MS,
    }
}
