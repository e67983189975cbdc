//! Per-channel debounced message batching.
//!
//! Every incoming message restarts the channel's quiet-period timer, so a
//! burst of near-simultaneous player actions collapses into one batch. The
//! timer task is aborted (not awaited) on restart; a generation counter
//! checked under the channel lock makes a stale timer's flush a no-op even
//! if the abort raced its wakeup. Batches for one channel are handed to the
//! handler strictly in the order their windows closed; channels are fully
//! independent.

use gm_core::types::{AuthorId, ChannelId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A player message waiting in a channel's batch.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub author_id: AuthorId,
    pub display_name: String,
    /// Name of the author's character, or their display name when they
    /// have none.
    pub character_name: String,
    pub content: String,
    pub queued_at: Instant,
}

impl PendingMessage {
    /// Create a message queued now.
    pub fn new(
        author_id: AuthorId,
        display_name: impl Into<String>,
        character_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            display_name: display_name.into(),
            character_name: character_name.into(),
            content: content.into(),
            queued_at: Instant::now(),
        }
    }
}

/// Consumer of flushed batches.
#[async_trait::async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    /// Process one flushed batch for a channel.
    async fn handle_batch(&self, channel: ChannelId, batch: Vec<PendingMessage>);
}

#[derive(Default)]
struct ChannelQueue {
    pending: Vec<PendingMessage>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    flush_lock: Arc<Mutex<()>>,
}

struct BatcherInner<H> {
    channels: Mutex<HashMap<ChannelId, ChannelQueue>>,
    delay: Duration,
    handler: Arc<H>,
}

/// Debouncing batcher over all channels. Cheap to clone; clones share the
/// same queues.
pub struct MessageBatcher<H> {
    inner: Arc<BatcherInner<H>>,
}

impl<H> Clone for MessageBatcher<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: BatchHandler> MessageBatcher<H> {
    /// Create a batcher flushing to `handler` after `delay` of quiet.
    pub fn new(handler: Arc<H>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                channels: Mutex::new(HashMap::new()),
                delay,
                handler,
            }),
        }
    }

    /// Queue a message and restart the channel's debounce window.
    pub async fn enqueue(&self, channel: ChannelId, message: PendingMessage) {
        let mut channels = self.inner.channels.lock().await;
        let queue = channels.entry(channel).or_default();

        queue.pending.push(message);
        queue.generation += 1;
        if let Some(timer) = queue.timer.take() {
            timer.abort();
        }

        let generation = queue.generation;
        let delay = self.inner.delay;
        let inner = Arc::clone(&self.inner);
        tracing::debug!(channel, pending = queue.pending.len(), "debounce window restarted");
        queue.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush(channel, generation).await;
        }));
    }

    /// Messages currently waiting for a channel.
    pub async fn pending(&self, channel: ChannelId) -> usize {
        let channels = self.inner.channels.lock().await;
        channels.get(&channel).map_or(0, |q| q.pending.len())
    }

    /// Tear down a channel: abort its timer and drop pending messages.
    pub async fn remove_channel(&self, channel: ChannelId) {
        let mut channels = self.inner.channels.lock().await;
        if let Some(mut queue) = channels.remove(&channel) {
            if let Some(timer) = queue.timer.take() {
                timer.abort();
            }
            if !queue.pending.is_empty() {
                tracing::debug!(
                    channel,
                    dropped = queue.pending.len(),
                    "channel removed with pending messages"
                );
            }
        }
    }
}

impl<H: BatchHandler> BatcherInner<H> {
    async fn flush(&self, channel: ChannelId, generation: u64) {
        let (batch, flush_lock) = {
            let mut channels = self.channels.lock().await;
            let Some(queue) = channels.get_mut(&channel) else {
                return;
            };
            // A newer message restarted the window after this timer was
            // scheduled; its timer owns the batch now.
            if queue.generation != generation {
                return;
            }
            queue.timer = None;
            if queue.pending.is_empty() {
                return;
            }
            (std::mem::take(&mut queue.pending), Arc::clone(&queue.flush_lock))
        };

        // The flush lock serializes batch processing per channel, in the
        // order the windows closed.
        let _guard = flush_lock.lock().await;
        tracing::info!(channel, batch_size = batch.len(), "flushing batch");
        self.handler.handle_batch(channel, batch).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CollectingHandler {
        batches: Mutex<Vec<Vec<PendingMessage>>>,
    }

    impl CollectingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
            })
        }

        async fn batches(&self) -> Vec<Vec<PendingMessage>> {
            self.batches.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl BatchHandler for CollectingHandler {
        async fn handle_batch(&self, _channel: ChannelId, batch: Vec<PendingMessage>) {
            self.batches.lock().await.push(batch);
        }
    }

    fn message(author: AuthorId, content: &str) -> PendingMessage {
        PendingMessage::new(author, format!("player-{author}"), format!("hero-{author}"), content)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_batch() {
        let handler = CollectingHandler::new();
        let batcher = MessageBatcher::new(Arc::clone(&handler), Duration::from_secs(3));

        batcher.enqueue(1, message(100, "I attack")).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        batcher.enqueue(1, message(101, "I cast fireball")).await;

        // One second short of the restarted window: nothing flushed.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handler.batches().await.is_empty());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let batches = handler.batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].content, "I attack");
        assert_eq!(batches[0][1].content, "I cast fireball");
    }

    #[tokio::test(start_paused = true)]
    async fn later_message_starts_a_second_batch() {
        let handler = CollectingHandler::new();
        let batcher = MessageBatcher::new(Arc::clone(&handler), Duration::from_secs(3));

        batcher.enqueue(1, message(100, "first")).await;
        tokio::time::sleep(Duration::from_millis(3100)).await;
        batcher.enqueue(1, message(100, "second")).await;
        tokio::time::sleep(Duration::from_millis(3100)).await;

        let batches = handler.batches().await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].content, "first");
        assert_eq!(batches[1][0].content, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn channels_batch_independently() {
        let handler = CollectingHandler::new();
        let batcher = MessageBatcher::new(Arc::clone(&handler), Duration::from_secs(3));

        batcher.enqueue(1, message(100, "channel one")).await;
        batcher.enqueue(2, message(200, "channel two")).await;
        tokio::time::sleep(Duration::from_millis(3100)).await;

        let batches = handler.batches().await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_channel_drops_pending() {
        let handler = CollectingHandler::new();
        let batcher = MessageBatcher::new(Arc::clone(&handler), Duration::from_secs(3));

        batcher.enqueue(1, message(100, "doomed")).await;
        batcher.remove_channel(1).await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert!(handler.batches().await.is_empty());
        assert_eq!(batcher.pending(1).await, 0);
    }
}
