//! Supported model providers

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An external AI model vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    #[serde(rename = "hf")]
    HuggingFace,
}

impl Provider {
    /// Every provider, in the order candidates are generated
    pub const ALL: [Provider; 4] = [
        Self::Google,
        Self::OpenAi,
        Self::Anthropic,
        Self::HuggingFace,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::HuggingFace => "hf",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google Gemini",
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic Claude",
            Self::HuggingFace => "Hugging Face",
        }
    }

    /// Environment variables that carry this provider's credentials
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Google => &["GOOGLE_GENERATIVE_AI_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::HuggingFace => &["HF_TOKEN", "HUGGINGFACE_HUB_TOKEN"],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "hf" | "huggingface" | "hugging-face" => Ok(Self::HuggingFace),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}
