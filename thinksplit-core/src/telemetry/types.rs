use serde::{Deserialize, Serialize};

use crate::extractor::{ExtractorStats, Phase};

/// Summary of one wrapped stream, emitted when the upstream completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExtractionTrace {
    /// Configured tag name, e.g. "think".
    pub tag: Option<String>,

    /// Phase reached at completion: "pending", "reasoning" or "done".
    /// "reasoning" means the block was never closed.
    pub phase: Option<String>,

    pub reasoning_chars: usize,
    pub text_chars: usize,
    pub separators: usize,
    pub skipped: usize,
}

impl ExtractionTrace {
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    pub fn set_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase.as_str().to_string());
        self
    }

    pub fn set_stats(mut self, stats: ExtractorStats) -> Self {
        self.reasoning_chars = stats.reasoning_chars;
        self.text_chars = stats.text_chars;
        self.separators = stats.separators;
        self.skipped = stats.skipped;
        self
    }

    pub fn unterminated(&self) -> bool {
        self.phase.as_deref() == Some(Phase::Reasoning.as_str())
    }
}
