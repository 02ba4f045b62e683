//! Task classification from free-text chat messages
//!
//! Each [`TaskCategory`] owns an ordered list of case-insensitive patterns.
//! A message scores one point per matching pattern; the category with the most
//! points wins and its share of all points becomes the confidence. Messages
//! that match nothing are treated as general conversation with a confidence
//! of 0.3.
//!
//! Ties are broken by the fixed priority order of [`TaskCategory::ALL`].

mod types;

pub use types::{Complexity, TaskCategory, TaskClassification, estimate_tokens};

use regex::RegexSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Patterns per category, compiled once.
static TASK_PATTERNS: LazyLock<Vec<(TaskCategory, RegexSet)>> = LazyLock::new(|| {
    TaskCategory::ALL
        .into_iter()
        .map(|category| {
            let set = RegexSet::new(patterns_for(category)).unwrap();
            (category, set)
        })
        .collect()
});

/// Messages hinting that the model will need external tools.
static TOOL_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)weather|temperature|forecast",
        r"(?i)search|google|find\s+online",
        r"(?i)calculate|math",
        r"(?i)\b(current|today|now|latest)\b",
    ])
    .unwrap()
});

fn patterns_for(category: TaskCategory) -> &'static [&'static str] {
    match category {
        TaskCategory::CodeGeneration => &[
            r"(?i)write\s+(a|an|some)?\s*(function|class|component|script|program|code)",
            r"(?i)create\s+(a|an)?\s*(function|class|component|api|endpoint)",
            r"(?i)implement\s+",
            r"(?i)build\s+(a|an)?\s*(app|feature|component|function)",
            r"(?i)generate\s+(code|function|class)",
            r"(?i)\b(javascript|typescript|python|java|rust|go|react|vue|angular)\b|c\+\+",
        ],
        TaskCategory::CodeDebugging => &[
            r"(?i)debug|fix\s+(this|the|my)\s+(code|error|bug)",
            r"(?i)why\s+(isn't|doesn't|won't)\s+(this|my)\s+code",
            r"(?i)error|exception|stack\s+trace",
            r"(?i)not\s+working",
            r"(?i)broken",
        ],
        TaskCategory::CodeReview => &[
            r"(?i)review\s+(this|my)\s+code",
            r"(?i)what\s+(do\s+you\s+)?think\s+(of|about)\s+(this|my)\s+code",
            r"(?i)optimize|improve\s+(this|my)\s+code",
            r"(?i)best\s+practices",
        ],
        TaskCategory::Reasoning => &[
            r"(?i)why\s+(does|is|should|would)",
            r"(?i)explain\s+(why|how|the)",
            r"(?i)what\s+is\s+the\s+(reason|logic|rationale)",
            r"(?i)analy[sz]e",
            r"(?i)compare|contrast",
            r"(?i)pros\s+and\s+cons",
            r"(?i)should\s+i\b",
        ],
        TaskCategory::CreativeWriting => &[
            r"(?i)write\s+(a|an)?\s*(story|poem|essay|article|blog|script)",
            r"(?i)creative|imaginative",
            r"(?i)fiction|narrative",
            r"(?i)brainstorm",
            r"(?i)come\s+up\s+with\s+(ideas|names|titles)",
        ],
        TaskCategory::Translation => &[
            r"(?i)translate\s+(this|to|from|into)",
            r"(?i)\b(chinese|spanish|french|german|japanese|korean|arabic|hindi|russian)\b",
            r"(?i)what\s+(does|is)\s+.*\s+in\s+(english|spanish|french)",
        ],
        TaskCategory::MathCalculation => &[
            r"(?i)calculate|compute|solve",
            r"(?i)what\s+is\s+\d+\s*[-+*/^]",
            r"(?i)math|mathematical|equation",
            r"(?i)derivative|integral|probability|statistics",
        ],
        TaskCategory::DataAnalysis => &[
            r"(?i)analy[sz]e\s+(this|the)\s+data",
            r"(?i)data\s+analysis",
            r"(?i)visuali[sz]e|chart|graph",
            r"(?i)statistics|trends|patterns",
            r"(?i)dataset",
        ],
        TaskCategory::GeneralConversation => &[
            r"(?i)\b(hello|hi|hey|greetings)\b",
            r"(?i)how\s+are\s+you",
            r"(?i)\bthank",
            r"(?i)what\s+can\s+you\s+do",
        ],
        TaskCategory::Summarization => &[
            r"(?i)summari[sz]e|summary",
            r"(?i)tl;?dr",
            r"(?i)key\s+points",
            r"(?i)brief\s+(overview|summary)",
            r"(?i)in\s+short",
        ],
        TaskCategory::Research => &[
            r"(?i)research|investigate",
            r"(?i)find\s+(information|data|sources)",
            r"(?i)what\s+(are|is)\s+the\s+(latest|current|recent)",
            r"(?i)tell\s+me\s+about",
            r"(?i)learn\s+about",
        ],
    }
}

/// Default upper bound on message size accepted by the classifier (64 KiB)
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024;

/// Infers the task category, complexity and tool needs of a message
#[derive(Debug, Clone)]
pub struct TaskClassifier {
    max_input_bytes: usize,
}

impl TaskClassifier {
    /// Create a classifier with the default input limit
    pub fn new() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }

    /// Set the largest message (in bytes) the classifier will analyse
    pub fn with_max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    /// Classify a message, falling back to the neutral classification for
    /// input the classifier refuses to analyse.
    pub fn classify(&self, message: &str) -> TaskClassification {
        self.try_classify(message)
            .unwrap_or_else(|_| TaskClassification::neutral(message))
    }

    /// Classify a message, rejecting oversized input
    pub fn try_classify(&self, message: &str) -> Result<TaskClassification> {
        if message.len() > self.max_input_bytes {
            return Err(Error::ClassificationFailed(format!(
                "message is {} bytes, limit is {}",
                message.len(),
                self.max_input_bytes
            )));
        }

        let hits = pattern_hits(message);
        let total: usize = hits.iter().map(|(_, count)| count).sum();
        let (top_category, top_count) = hits
            .iter()
            .copied()
            .max_by_key(|(category, count)| category.rank_key(*count))
            .unwrap_or((TaskCategory::GeneralConversation, 0));

        let (task_type, confidence) = if top_count > 0 {
            (top_category, top_count as f64 / total as f64)
        } else {
            (
                TaskCategory::GeneralConversation,
                TaskClassification::DEFAULT_CONFIDENCE,
            )
        };

        let classification = TaskClassification {
            task_type,
            confidence,
            complexity: estimate_complexity(message, task_type),
            requires_tools: TOOL_PATTERNS.is_match(message),
            estimated_tokens: estimate_tokens(message),
        };

        debug!(
            task_type = %classification.task_type,
            confidence = classification.confidence,
            complexity = %classification.complexity,
            requires_tools = classification.requires_tools,
            "Classified message"
        );

        Ok(classification)
    }
}

impl Default for TaskClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of matching patterns for every category, in priority order
pub fn pattern_hits(message: &str) -> Vec<(TaskCategory, usize)> {
    TASK_PATTERNS
        .iter()
        .map(|(category, set)| (*category, set.matches(message).iter().count()))
        .collect()
}

fn estimate_complexity(message: &str, task_type: TaskCategory) -> Complexity {
    let length = message.len();

    if task_type.is_code() {
        // Code tasks never drop below medium
        return if length > 500 {
            Complexity::High
        } else {
            Complexity::Medium
        };
    }

    let (high, medium) = match task_type {
        TaskCategory::CreativeWriting | TaskCategory::Reasoning | TaskCategory::Research => {
            (300, 100)
        }
        _ => (400, 150),
    };

    if length > high {
        Complexity::High
    } else if length > medium {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}
