/// Reasoning effort attached to a model alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThinkingTier {
    High,
    Low,
}

impl ThinkingTier {
    pub fn budget(self) -> u32 {
        match self {
            ThinkingTier::High => 8192,
            ThinkingTier::Low => 1024,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(ThinkingTier::High),
            "low" => Some(ThinkingTier::Low),
            _ => None,
        }
    }
}

/// Physical model a logical name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub model: String,
    pub thinking: Option<ThinkingTier>,
}

impl ModelTarget {
    pub fn plain(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            thinking: None,
        }
    }
}
