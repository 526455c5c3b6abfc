//! Wrapping streams and providers with a reasoning extractor.
//!
//! Every wrapped stream owns a fresh `ReasoningExtractor`; nothing is shared
//! between concurrent calls. Upstream items are pulled one at a time, only
//! when the output queue is empty.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use tracing::{debug, field, info_span, Span};
use tracing_futures::Instrument;

use crate::config::ExtractorCfg;
use crate::error::{CoreResult, ThinkSplitError};
use crate::extractor::ReasoningExtractor;
use crate::model::ChatRequest;
use crate::provider::StreamProvider;
use crate::stream::{BoxStreamEv, StreamEvent};
use crate::telemetry::{self, ExtractionTrace};

pub struct ExtractReasoningStream {
    inner: BoxStreamEv,
    extractor: ReasoningExtractor,
    tag: String,
    queue: VecDeque<StreamEvent>,
    upstream_done: bool,
    span: Span,
}

impl ExtractReasoningStream {
    pub fn new(inner: BoxStreamEv, cfg: &ExtractorCfg) -> CoreResult<Self> {
        let extractor = ReasoningExtractor::new(cfg)?;
        let span = info_span!(
            "reasoning_extract",
            extract.tag = %cfg.tag_name,
            extract.phase = field::Empty,
            extract.reasoning_chars = field::Empty,
            extract.text_chars = field::Empty,
            extract.separators = field::Empty,
            extract.skipped = field::Empty,
        );
        Ok(Self {
            inner,
            extractor,
            tag: cfg.tag_name.clone(),
            queue: VecDeque::new(),
            upstream_done: false,
            span,
        })
    }

    fn complete(&mut self) {
        self.extractor.finish(&mut self.queue);
        self.upstream_done = true;

        let phase = self.extractor.phase();
        let stats = self.extractor.stats();
        self.span.record(telemetry::KEY_PHASE, phase.as_str());
        self.span
            .record(telemetry::KEY_REASONING_CHARS, stats.reasoning_chars as u64);
        self.span.record(telemetry::KEY_TEXT_CHARS, stats.text_chars as u64);
        self.span.record(telemetry::KEY_SEPARATORS, stats.separators as u64);
        self.span.record(telemetry::KEY_SKIPPED, stats.skipped as u64);
        debug!(phase = phase.as_str(), "upstream completed");

        telemetry::emit(
            ExtractionTrace::with_tag(self.tag.clone())
                .set_phase(phase)
                .set_stats(stats),
        );
    }
}

impl Stream for ExtractReasoningStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let span = this.span.clone();
        let _entered = span.enter();
        loop {
            if let Some(ev) = this.queue.pop_front() {
                return Poll::Ready(Some(ev));
            }
            if this.upstream_done {
                return Poll::Ready(None);
            }
            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(ev)) => this.extractor.process(ev, &mut this.queue),
                Poll::Ready(None) => this.complete(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Wrap `stream` so its text deltas are split into reasoning and text.
pub fn extract_reasoning(stream: BoxStreamEv, cfg: &ExtractorCfg) -> CoreResult<BoxStreamEv> {
    Ok(ExtractReasoningStream::new(stream, cfg)?.boxed())
}

/// A provider whose streams come out with reasoning split off.
pub struct ReasoningProvider<P> {
    inner: P,
    cfg: ExtractorCfg,
}

impl<P: StreamProvider> ReasoningProvider<P> {
    pub fn new(inner: P, cfg: ExtractorCfg) -> CoreResult<Self> {
        cfg.validate()?;
        Ok(Self { inner, cfg })
    }

    pub fn config(&self) -> &ExtractorCfg {
        &self.cfg
    }
}

#[async_trait]
impl<P: StreamProvider> StreamProvider for ReasoningProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn stream(&self, req: ChatRequest) -> CoreResult<BoxStreamEv> {
        let span = info_span!(
            "provider_stream",
            llm.provider = self.inner.name(),
            llm.model = %req.model,
        );
        let upstream = self.inner.stream(req).instrument(span).await?;
        extract_reasoning(upstream, &self.cfg)
    }
}

/// Both channels of a drained stream, concatenated.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Channels {
    pub reasoning: String,
    pub text: String,
}

/// Drain `stream`, concatenating each channel. An `Error` event becomes
/// `ThinkSplitError::Upstream` attributed to `provider`.
pub async fn collect_channels(mut stream: BoxStreamEv, provider: &str) -> CoreResult<Channels> {
    let mut out = Channels::default();
    while let Some(ev) = stream.next().await {
        match ev {
            StreamEvent::ReasoningDelta { delta, .. } => out.reasoning.push_str(&delta),
            StreamEvent::TextDelta { delta, .. } => out.text.push_str(&delta),
            StreamEvent::Error { message } => {
                return Err(ThinkSplitError::Upstream {
                    provider: provider.to_string(),
                    message,
                });
            }
            _ => {}
        }
    }
    Ok(out)
}
