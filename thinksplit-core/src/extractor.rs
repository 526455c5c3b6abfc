//! Reasoning extractor: a per-stream state machine that reclassifies
//! `TextDelta` content found between one `<tag>` / `</tag>` pair as
//! `ReasoningDelta`.
//!
//! Contract:
//! - For any chunking of the same text, the concatenated reasoning deltas equal
//!   the content between the tags and the concatenated text deltas equal
//!   everything else, in order.
//! - The opening tag is only recognised at the start of the undecided buffer:
//!   the start of the stream, or the first delta after emitted text.
//! - A tag candidate immediately preceded by a backtick is never structural.
//! - Phases only move forward: `Pending -> Reasoning -> Done`.
//! - Only the undecided fragment is buffered; reasoning already emitted is
//!   remembered by its last character alone.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::ExtractorCfg;
use crate::error::CoreResult;
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No opening tag seen yet.
    Pending,
    /// Inside the tagged block.
    Reasoning,
    /// Block closed; everything else is text.
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Reasoning => "reasoning",
            Phase::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Reasoning,
    Text,
}

/// Running counters, exported through telemetry when a stream completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorStats {
    /// Characters published on the reasoning channel, separators excluded.
    pub reasoning_chars: usize,
    /// Characters published on the text channel, separators excluded.
    pub text_chars: usize,
    pub separators: usize,
    /// Deltas dropped because a closing-tag overlap could not be located.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ReasoningExtractor {
    opening: String,
    closing: String,
    opening_chars: usize,
    closing_chars: usize,
    separator: String,

    phase: Phase,
    /// Characters of delta content seen so far.
    seen_chars: usize,
    /// Received but not yet classified.
    pending: String,
    /// Last character of reasoning content before `pending` (the opening tag's `>`
    /// right after the switch).
    lookbehind: Option<char>,
    first_reasoning: bool,
    first_text: bool,
    after_switch: bool,
    last_id: String,
    stats: ExtractorStats,
}

impl ReasoningExtractor {
    pub fn new(cfg: &ExtractorCfg) -> CoreResult<Self> {
        cfg.validate()?;
        let opening = cfg.opening_tag();
        let closing = cfg.closing_tag();
        Ok(Self {
            opening_chars: opening.chars().count(),
            closing_chars: closing.chars().count(),
            opening,
            closing,
            separator: cfg.separator.clone(),
            phase: Phase::Pending,
            seen_chars: 0,
            pending: String::new(),
            lookbehind: None,
            first_reasoning: true,
            first_text: true,
            after_switch: false,
            last_id: String::new(),
            stats: ExtractorStats::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }

    /// Feed one upstream event; resulting events are appended to `out` in order.
    pub fn process(&mut self, event: StreamEvent, out: &mut VecDeque<StreamEvent>) {
        match event {
            StreamEvent::TextDelta { id, delta } => self.on_delta(id, &delta, out),
            StreamEvent::TextEnd { id } => {
                self.end_text_run(out);
                out.push_back(StreamEvent::TextEnd { id });
            }
            other => out.push_back(other),
        }
    }

    /// Terminal flush, run once the upstream stream has ended.
    /// Buffered content is published at most once.
    ///
    /// - `Pending`: a residue shorter than the opening tag goes out as text.
    /// - `Reasoning`: a held closing tag with nothing after it closes the block;
    ///   any other fragment stays reasoning. Nothing is promoted to text.
    pub fn finish(&mut self, out: &mut VecDeque<StreamEvent>) {
        match self.phase {
            Phase::Pending => self.end_text_run(out),
            Phase::Reasoning => self.flush_reasoning(out),
            Phase::Done => {}
        }
    }

    /// A `TextEnd` only settles a short `Pending` residue. Inside the block the
    /// buffer is kept, since the closing tag may continue in the next text run.
    fn end_text_run(&mut self, out: &mut VecDeque<StreamEvent>) {
        if self.phase == Phase::Pending
            && self.seen_chars > 0
            && self.seen_chars < self.opening_chars
        {
            self.publish_pending(Channel::Text, out);
        }
    }

    fn on_delta(&mut self, id: String, delta: &str, out: &mut VecDeque<StreamEvent>) {
        if delta.is_empty() {
            return;
        }
        self.pending.push_str(delta);
        self.seen_chars += delta.chars().count();
        self.last_id = id;

        match self.phase {
            Phase::Done => self.publish_pending(Channel::Text, out),
            Phase::Pending => self.test_opening(out),
            Phase::Reasoning => self.search_closing(out),
        }
    }

    fn test_opening(&mut self, out: &mut VecDeque<StreamEvent>) {
        if self.seen_chars < self.opening_chars {
            return;
        }
        if !self.pending.starts_with(self.opening.as_str()) {
            self.publish_pending(Channel::Text, out);
            return;
        }
        self.pending.replace_range(..self.opening.len(), "");
        self.lookbehind = self.opening.chars().next_back();
        self.switch_to(Phase::Reasoning);
        // The rest of this chunk may already hold the closing tag.
        self.search_closing(out);
    }

    fn search_closing(&mut self, out: &mut VecDeque<StreamEvent>) {
        let Some(start) = find_overlap_start_after(self.lookbehind, &self.pending, &self.closing)
        else {
            self.publish_pending(Channel::Reasoning, out);
            return;
        };

        let candidate = &self.pending[start..];
        // Wait for one character past the tag before deciding.
        if candidate.chars().count() < self.closing_chars + 1 {
            return;
        }

        // The finder never returns a backtick-quoted candidate.
        debug_assert_ne!(
            match start {
                0 => self.lookbehind,
                _ => self.pending[..start].chars().next_back(),
            },
            Some('`'),
        );

        if !candidate.starts_with(self.closing.as_str()) {
            warn!(
                closing_tag = %self.closing,
                offset = start,
                buffered = self.pending.len(),
                "closing tag overlap not present in buffered reasoning; dropping delta"
            );
            self.stats.skipped += 1;
            self.pending.clear();
            return;
        }

        let tail = self.pending.split_off(start + self.closing.len());
        self.pending.truncate(start);
        self.publish_pending(Channel::Reasoning, out);
        self.switch_to(Phase::Done);
        self.pending = tail;
        self.publish_pending(Channel::Text, out);
    }

    fn flush_reasoning(&mut self, out: &mut VecDeque<StreamEvent>) {
        if self.pending.is_empty() {
            return;
        }
        let held_tag = find_overlap_start_after(self.lookbehind, &self.pending, &self.closing)
            .filter(|&start| &self.pending[start..] == self.closing.as_str());
        match held_tag {
            Some(start) => {
                self.pending.truncate(start);
                self.publish_pending(Channel::Reasoning, out);
                self.switch_to(Phase::Done);
            }
            None => self.publish_pending(Channel::Reasoning, out),
        }
    }

    fn switch_to(&mut self, next: Phase) {
        debug!(from = self.phase.as_str(), to = next.as_str(), "phase switch");
        self.phase = next;
        self.after_switch = true;
    }

    fn publish_pending(&mut self, channel: Channel, out: &mut VecDeque<StreamEvent>) {
        let content = std::mem::take(&mut self.pending);
        self.publish(channel, content, out);
    }

    fn publish(&mut self, channel: Channel, mut content: String, out: &mut VecDeque<StreamEvent>) {
        if content.is_empty() {
            return;
        }
        let chars = content.chars().count();
        let first = match channel {
            Channel::Reasoning => &mut self.first_reasoning,
            Channel::Text => &mut self.first_text,
        };
        if self.after_switch && !*first {
            content.insert_str(0, &self.separator);
            self.stats.separators += 1;
        }
        *first = false;
        self.after_switch = false;

        let id = self.last_id.clone();
        match channel {
            Channel::Reasoning => {
                self.lookbehind = content.chars().next_back();
                self.stats.reasoning_chars += chars;
                out.push_back(StreamEvent::ReasoningDelta { id, delta: content });
            }
            Channel::Text => {
                self.stats.text_chars += chars;
                out.push_back(StreamEvent::TextDelta { id, delta: content });
            }
        }
    }
}

/// Earliest offset of `needle` in `text` not preceded by a backtick; failing
/// that, the rightmost offset whose suffix is a non-empty prefix of `needle`
/// (again not preceded by a backtick). Offsets are byte offsets on char
/// boundaries.
pub fn find_overlap_start(text: &str, needle: &str) -> Option<usize> {
    find_overlap_start_after(None, text, needle)
}

/// Same as [`find_overlap_start`], with `prev` standing for the character
/// that precedes `text` in the full stream.
pub fn find_overlap_start_after(prev: Option<char>, text: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let escaped = |idx: usize| match text[..idx].chars().next_back() {
        Some(c) => c == '`',
        None => prev == Some('`'),
    };

    let direct = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| text[i..].starts_with(needle) && !escaped(i));
    if direct.is_some() {
        return direct;
    }

    text.char_indices()
        .rev()
        .map(|(i, _)| i)
        .find(|&i| needle.starts_with(&text[i..]) && !escaped(i))
}
