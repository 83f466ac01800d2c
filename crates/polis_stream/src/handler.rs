//! Handler trait and the pull-loop projector.

use polis_protocol::defaults::DEFAULT_STREAM_LIMIT;
use polis_protocol::events::CURSOR_START;
use polis_protocol::{Result, StreamEvent, StreamFilter};

use crate::checkpoint::{CheckpointStore, HandlerCheckpoint};
use crate::source::StreamSource;

/// A projection handler folding stream events into an opaque state blob.
///
/// `process` must be a pure, idempotent reducer: applying the same events
/// twice yields the same state.
pub trait StreamHandler: Send + Sync {
    /// Checkpoint key, stable across runs.
    fn name(&self) -> &'static str;

    /// Event-type filter prefix this handler subscribes to.
    fn type_prefix(&self) -> &'static str;

    /// Concrete event types the handler reacts to.
    fn event_types(&self) -> &'static [&'static str];

    fn new_state(&self) -> serde_json::Value;

    /// Query parameters for one page. Handlers narrow this further (e.g. by
    /// target domain) when the service can do the filtering.
    fn stream_filter(&self, since: &str, limit: usize) -> StreamFilter {
        StreamFilter::new(since, limit).with_type(self.type_prefix())
    }

    fn process(
        &self,
        events: &[StreamEvent],
        state: serde_json::Value,
    ) -> Result<serde_json::Value>;

    fn handles(&self, event: &StreamEvent) -> bool {
        self.event_types().contains(&event.event_type.as_str())
    }
}

/// Outcome of one handler run.
#[derive(Debug, Clone)]
pub struct HandlerRunReport {
    pub handler: &'static str,
    pub batches: usize,
    pub events: usize,
    pub cursor: String,
}

/// Cursor-driven pull loop over a [`StreamSource`].
///
/// The checkpoint is persisted only after a full batch processes cleanly, so
/// a mid-batch failure re-delivers the batch on the next run (at-least-once).
pub struct Projector<'a, S: StreamSource> {
    source: &'a S,
    checkpoints: &'a CheckpointStore,
    limit: usize,
}

impl<'a, S: StreamSource> Projector<'a, S> {
    pub fn new(source: &'a S, checkpoints: &'a CheckpointStore) -> Self {
        Self {
            source,
            checkpoints,
            limit: DEFAULT_STREAM_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Run one handler to the head of the stream. `refresh` resets the
    /// cursor to the beginning and rebuilds state by full replay.
    pub async fn run(&self, handler: &dyn StreamHandler, refresh: bool) -> Result<HandlerRunReport> {
        let checkpoint = if refresh {
            None
        } else {
            self.checkpoints.load(handler.name())?
        };
        let (mut cursor, mut state) = match checkpoint {
            Some(cp) => (cp.cursor, cp.state),
            None => (CURSOR_START.to_string(), handler.new_state()),
        };

        let mut batches = 0usize;
        let mut events = 0usize;
        loop {
            let filter = handler.stream_filter(&cursor, self.limit);
            let batch = self.source.query(&filter).await?;

            if batch.events.is_empty() {
                if batches == 0 {
                    // Record the initial checkpoint so fresh handlers expose
                    // their empty state to readers.
                    self.checkpoints.save(
                        handler.name(),
                        &HandlerCheckpoint {
                            cursor: cursor.clone(),
                            state: state.clone(),
                        },
                    )?;
                }
                break;
            }

            // Events apply in discovery-returned order.
            state = handler.process(&batch.events, state)?;
            events += batch.events.len();
            cursor = batch.cursor.clone();
            self.checkpoints.save(
                handler.name(),
                &HandlerCheckpoint {
                    cursor: cursor.clone(),
                    state: state.clone(),
                },
            )?;
            batches += 1;

            if !batch.has_more {
                break;
            }
        }

        tracing::debug!(
            handler = handler.name(),
            batches,
            events,
            %cursor,
            "projection run complete"
        );
        Ok(HandlerRunReport {
            handler: handler.name(),
            batches,
            events,
            cursor,
        })
    }
}
