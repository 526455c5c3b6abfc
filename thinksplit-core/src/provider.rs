use async_trait::async_trait;
use futures::StreamExt;

use crate::error::CoreResult;
use crate::model::{ChatRequest, StopReason};
use crate::stream::{BoxStreamEv, StreamEvent};

/// Anything that turns a request into a stream of events: a model transport,
/// a replay, or another wrapper.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn stream(&self, req: ChatRequest) -> CoreResult<BoxStreamEv>;
}

/// Split `text` into chunks of at most `size` characters, never inside a
/// character. `size == 0` yields the whole text as one chunk.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Replays a fixed list of text chunks as one text run.
/// Useful for tests, the CLI, and as a stand-in for a real transport.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    name: String,
    id: String,
    chunks: Vec<String>,
    fail_with: Option<String>,
}

impl ScriptedProvider {
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            name: "scripted".into(),
            id: "text-0".into(),
            chunks,
            fail_with: None,
        }
    }

    pub fn from_text(text: &str, chunk_size: usize) -> Self {
        Self::new(chunk_text(text, chunk_size))
    }

    /// End the replay with an `Error` event instead of `TextEnd` + `Finish`.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    fn events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(self.chunks.len() + 3);
        events.push(StreamEvent::TextStart { id: self.id.clone() });
        events.extend(
            self.chunks
                .iter()
                .map(|c| StreamEvent::text_delta(self.id.clone(), c.clone())),
        );
        match &self.fail_with {
            Some(message) => events.push(StreamEvent::Error {
                message: message.clone(),
            }),
            None => {
                events.push(StreamEvent::TextEnd { id: self.id.clone() });
                events.push(StreamEvent::Finish {
                    reason: Some(StopReason::Stop),
                });
            }
        }
        events
    }
}

#[async_trait]
impl StreamProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, _req: ChatRequest) -> CoreResult<BoxStreamEv> {
        Ok(futures::stream::iter(self.events()).boxed())
    }
}
