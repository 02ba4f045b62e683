//! Types produced by the task classifier

use serde::{Deserialize, Serialize};

/// Inferred kind of a chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    CodeGeneration,
    CodeDebugging,
    CodeReview,
    Reasoning,
    CreativeWriting,
    Translation,
    MathCalculation,
    DataAnalysis,
    GeneralConversation,
    Summarization,
    Research,
}

impl TaskCategory {
    /// Every category in tie-break priority order.
    ///
    /// When two categories match the same number of patterns, the one listed
    /// earlier here wins. Specific code categories come before the broad ones.
    pub const ALL: [TaskCategory; 11] = [
        Self::CodeGeneration,
        Self::CodeDebugging,
        Self::CodeReview,
        Self::Reasoning,
        Self::CreativeWriting,
        Self::Translation,
        Self::MathCalculation,
        Self::DataAnalysis,
        Self::GeneralConversation,
        Self::Summarization,
        Self::Research,
    ];

    /// Wire name, e.g. `code-generation`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "code-generation",
            Self::CodeDebugging => "code-debugging",
            Self::CodeReview => "code-review",
            Self::Reasoning => "reasoning",
            Self::CreativeWriting => "creative-writing",
            Self::Translation => "translation",
            Self::MathCalculation => "math-calculation",
            Self::DataAnalysis => "data-analysis",
            Self::GeneralConversation => "general-conversation",
            Self::Summarization => "summarization",
            Self::Research => "research",
        }
    }

    /// User-facing description of the category
    pub fn describe(&self) -> &'static str {
        match self {
            Self::CodeGeneration => "Writing code",
            Self::CodeDebugging => "Debugging code",
            Self::CodeReview => "Reviewing code",
            Self::Reasoning => "Logical reasoning",
            Self::CreativeWriting => "Creative writing",
            Self::Translation => "Translation",
            Self::MathCalculation => "Mathematical calculation",
            Self::DataAnalysis => "Data analysis",
            Self::GeneralConversation => "General conversation",
            Self::Summarization => "Summarization",
            Self::Research => "Research",
        }
    }

    /// Whether the category is one of the code tasks
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::CodeGeneration | Self::CodeDebugging | Self::CodeReview
        )
    }

    fn priority(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(usize::MAX)
    }

    /// Ordering key used to pick the winning category: higher count first,
    /// then earlier position in [`TaskCategory::ALL`].
    pub(crate) fn rank_key(&self, count: usize) -> (usize, std::cmp::Reverse<usize>) {
        (count, std::cmp::Reverse(self.priority()))
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Unknown task type: {}", s))
    }
}

/// Heuristic difficulty of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Result of classifying a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClassification {
    #[serde(rename = "type")]
    pub task_type: TaskCategory,
    /// Share of all pattern hits that went to the winning category (0.0 to 1.0)
    pub confidence: f64,
    pub complexity: Complexity,
    pub requires_tools: bool,
    pub estimated_tokens: u64,
}

impl TaskClassification {
    /// Confidence reported when nothing matched
    pub const DEFAULT_CONFIDENCE: f64 = 0.3;

    /// Classification substituted when the classifier cannot process a message
    pub fn neutral(message: &str) -> Self {
        Self {
            task_type: TaskCategory::GeneralConversation,
            confidence: Self::DEFAULT_CONFIDENCE,
            complexity: Complexity::Low,
            requires_tools: false,
            estimated_tokens: estimate_tokens(message),
        }
    }
}

/// Rough token estimate: one token per four bytes, rounded up
pub fn estimate_tokens(message: &str) -> u64 {
    (message.len() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_category_parse_roundtrip() {
        for category in TaskCategory::ALL {
            assert_eq!(category.as_str().parse::<TaskCategory>().unwrap(), category);
        }
        assert_eq!(
            "code_generation".parse::<TaskCategory>().unwrap(),
            TaskCategory::CodeGeneration
        );
        assert!("cooking".parse::<TaskCategory>().is_err());
    }

    #[test]
    fn test_task_category_serde_is_kebab_case() {
        let json = serde_json::to_string(&TaskCategory::MathCalculation).unwrap();
        assert_eq!(json, "\"math-calculation\"");
    }

    #[test]
    fn test_rank_key_prefers_earlier_category_on_tie() {
        let code = TaskCategory::CodeGeneration.rank_key(2);
        let research = TaskCategory::Research.rank_key(2);
        assert!(code > research);
        assert!(TaskCategory::Research.rank_key(3) > code);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn test_neutral_classification() {
        let neutral = TaskClassification::neutral("hello there");
        assert_eq!(neutral.task_type, TaskCategory::GeneralConversation);
        assert_eq!(neutral.confidence, 0.3);
        assert_eq!(neutral.estimated_tokens, 3);
        assert!(!neutral.requires_tools);
    }
}
