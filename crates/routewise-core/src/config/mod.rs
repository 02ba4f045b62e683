//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::classifier::{DEFAULT_MAX_INPUT_BYTES, TaskCategory};
use crate::cost::{DEFAULT_APPROVAL_THRESHOLD, DEFAULT_AUTO_APPROVE_THRESHOLD};
use crate::provider::Provider;
use crate::tracking::{DEFAULT_CAPACITY, DEFAULT_WINDOW_HOURS, MAX_WINDOW_HOURS};

/// Environment variable that overrides the config directory
pub const CONFIG_DIR_ENV: &str = "ROUTEWISE_CONFIG_DIR";

/// Environment variable carrying the tool server API key
pub const TOOLS_API_KEY_ENV: &str = "ROUTEWISE_TOOLS_API_KEY";

/// Routewise configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    pub tracking: TrackingConfig,
    pub cost: CostConfig,
    pub providers: ProvidersConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// When false every selection returns the default-provider decision
    pub enabled: bool,
    pub default_provider: Provider,
    pub max_fallbacks: usize,
    pub max_input_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// When false recorded outcomes are dropped
    pub enabled: bool,
    pub capacity: usize,
    pub window_hours: u32,
    /// SQLite file for warm starts; in-memory only when unset
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub auto_approve_threshold: f64,
    pub approval_threshold: f64,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Explicit availability list; derived from credentials when unset
    pub available: Option<Vec<Provider>>,
    /// Replace or withdraw the model a provider advertises for a task
    pub overrides: Vec<CapabilityOverride>,
}

/// One capability table override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    pub provider: Provider,
    pub task: TaskCategory,
    /// `None` withdraws the provider from the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub server_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_provider: Provider::Google,
            max_fallbacks: 3,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            window_hours: DEFAULT_WINDOW_HOURS,
            database_path: None,
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            auto_approve_threshold: DEFAULT_AUTO_APPROVE_THRESHOLD,
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            retention_days: 30,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            server_url: None,
            timeout_secs: 30,
        }
    }
}

impl ToolsConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(env::var(TOOLS_API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Tool server keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

/// Keys accepted by [`Config::get`] and [`Config::set`]
pub const KEYS: &[&str] = &[
    "server.bind",
    "routing.enabled",
    "routing.default_provider",
    "routing.max_fallbacks",
    "routing.max_input_bytes",
    "tracking.enabled",
    "tracking.capacity",
    "tracking.window_hours",
    "tracking.database_path",
    "cost.auto_approve_threshold",
    "cost.approval_threshold",
    "cost.retention_days",
    "providers.available",
    "tools.server_url",
    "tools.timeout_secs",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("routewise")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.tools.enforce_env_only()?;

        if self.routing.max_input_bytes == 0 {
            return Err(anyhow!("routing.max_input_bytes must be greater than zero"));
        }
        if self.tracking.capacity == 0 {
            return Err(anyhow!("tracking.capacity must be greater than zero"));
        }
        if self.tracking.window_hours == 0 || self.tracking.window_hours > MAX_WINDOW_HOURS {
            return Err(anyhow!(
                "tracking.window_hours must be between 1 and {}",
                MAX_WINDOW_HOURS
            ));
        }
        for (name, value) in [
            ("cost.auto_approve_threshold", self.cost.auto_approve_threshold),
            ("cost.approval_threshold", self.cost.approval_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{} must be a non-negative number", name));
            }
        }
        if self.tools.timeout_secs == 0 {
            return Err(anyhow!("tools.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "server.bind" => Ok(self.server.bind.clone()),

            "routing.enabled" => Ok(self.routing.enabled.to_string()),
            "routing.default_provider" => Ok(self.routing.default_provider.to_string()),
            "routing.max_fallbacks" => Ok(self.routing.max_fallbacks.to_string()),
            "routing.max_input_bytes" => Ok(self.routing.max_input_bytes.to_string()),

            "tracking.enabled" => Ok(self.tracking.enabled.to_string()),
            "tracking.capacity" => Ok(self.tracking.capacity.to_string()),
            "tracking.window_hours" => Ok(self.tracking.window_hours.to_string()),
            "tracking.database_path" => Ok(self
                .tracking
                .database_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())),

            "cost.auto_approve_threshold" => Ok(self.cost.auto_approve_threshold.to_string()),
            "cost.approval_threshold" => Ok(self.cost.approval_threshold.to_string()),
            "cost.retention_days" => Ok(self.cost.retention_days.to_string()),

            "providers.available" => Ok(match &self.providers.available {
                Some(list) => list
                    .iter()
                    .map(Provider::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                None => "(from credentials)".to_string(),
            }),

            "tools.server_url" => Ok(self
                .tools
                .server_url
                .clone()
                .unwrap_or_else(|| "(not set)".to_string())),
            "tools.timeout_secs" => Ok(self.tools.timeout_secs.to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `routewise config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "server.bind" => {
                value
                    .parse::<std::net::SocketAddr>()
                    .with_context(|| format!("Invalid bind address: {}", value))?;
                self.server.bind = value.to_string();
            }

            "routing.enabled" => {
                self.routing.enabled = parse_bool(value)?;
            }
            "routing.default_provider" => {
                self.routing.default_provider = value.parse()?;
            }
            "routing.max_fallbacks" => {
                self.routing.max_fallbacks = value
                    .parse()
                    .with_context(|| format!("Invalid max_fallbacks value: {}", value))?;
            }
            "routing.max_input_bytes" => {
                let bytes: usize = value
                    .parse()
                    .with_context(|| format!("Invalid max_input_bytes value: {}", value))?;
                if bytes == 0 {
                    return Err(anyhow!("max_input_bytes must be greater than zero"));
                }
                self.routing.max_input_bytes = bytes;
            }

            "tracking.enabled" => {
                self.tracking.enabled = parse_bool(value)?;
            }
            "tracking.capacity" => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("Invalid capacity value: {}", value))?;
                if capacity == 0 {
                    return Err(anyhow!("Capacity must be greater than zero"));
                }
                self.tracking.capacity = capacity;
            }
            "tracking.window_hours" => {
                let hours: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid window_hours value: {}", value))?;
                if hours == 0 || hours > MAX_WINDOW_HOURS {
                    return Err(anyhow!(
                        "Window must be between 1 and {} hours",
                        MAX_WINDOW_HOURS
                    ));
                }
                self.tracking.window_hours = hours;
            }
            "tracking.database_path" => {
                self.tracking.database_path = non_empty(value).map(PathBuf::from);
            }

            "cost.auto_approve_threshold" => {
                self.cost.auto_approve_threshold = parse_threshold(value)?;
            }
            "cost.approval_threshold" => {
                self.cost.approval_threshold = parse_threshold(value)?;
            }
            "cost.retention_days" => {
                self.cost.retention_days = value
                    .parse()
                    .with_context(|| format!("Invalid retention_days value: {}", value))?;
            }

            "providers.available" => {
                self.providers.available = match non_empty(value) {
                    Some(list) => Some(
                        list.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::parse::<Provider>)
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    None => None,
                };
            }

            "tools.server_url" => {
                self.tools.server_url = non_empty(value).map(str::to_string);
            }
            "tools.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be greater than zero"));
                }
                self.tools.timeout_secs = secs;
            }

            "tools.api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration. \
                     Set the {} environment variable instead.",
                    TOOLS_API_KEY_ENV
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `routewise config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("Invalid boolean value: {}", value)),
    }
}

fn parse_threshold(value: &str) -> anyhow::Result<f64> {
    let threshold: f64 = value
        .parse()
        .with_context(|| format!("Invalid threshold value: {}", value))?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(anyhow!("Threshold must be a non-negative number"));
    }
    Ok(threshold)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && trimmed != "none").then_some(trimmed)
}
