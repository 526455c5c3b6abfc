/// Span/Log attribute keys for extraction runs.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_TAG: &str = "extract.tag";
pub const KEY_PHASE: &str = "extract.phase";

pub const KEY_REASONING_CHARS: &str = "extract.reasoning_chars";
pub const KEY_TEXT_CHARS: &str = "extract.text_chars";
pub const KEY_SEPARATORS: &str = "extract.separators";

/// Deltas dropped by the defensive closing-tag check.
pub const KEY_SKIPPED: &str = "extract.skipped";
