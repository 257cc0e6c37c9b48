//! The cache reader: a background task draining cached chunks into the
//! verification pipeline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{Segment, SyncCache, SyncItem};
use crate::error::SyncError;

/// Read access to the local chain's snapshot head height, used to decide
/// which chunks are stale, applicable or still ahead of us.
pub trait ChainHeightReader: Send + Sync {
    fn latest_snapshot_height(&self) -> u64;
}

/// Callback invoked for every block read out of a chunk. An error abandons
/// the chunk; it stays cached and is retried on the next round.
pub type SyncHandler = dyn Fn(SyncItem) -> Result<(), SyncError> + Send + Sync;

struct ReaderInner {
    cache: Arc<dyn SyncCache>,
    chain: Arc<dyn ChainHeightReader>,
    handler: Box<SyncHandler>,
}

/// Consumes chunks the downloader materialised into the sync cache.
///
/// Runs as a background task with cooperative cancellation: the shutdown
/// signal is checked between chunks, never mid-block. Chunks are processed
/// in ascending order; a fully consumed chunk is deleted from the cache, a
/// mismatched one is deleted so the downloader fetches it again.
pub struct CacheReader {
    inner: Arc<ReaderInner>,
    period: Duration,
    shutdown: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CacheReader {
    pub fn new(
        cache: Arc<dyn SyncCache>,
        chain: Arc<dyn ChainHeightReader>,
        handler: Box<SyncHandler>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ReaderInner {
                cache,
                chain,
                handler,
            }),
            period: Duration::from_millis(100),
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Override the polling period (mostly for tests).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the background task. Idempotent while running.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let mut shutdown = self.shutdown.subscribe();
        let period = self.period;
        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => {
                        if let Err(err) = inner.read_round() {
                            tracing::warn!(%err, "cache read round failed");
                        }
                    }
                }
            }
            tracing::debug!("cache reader stopped");
        }));
    }

    /// Stop the background task and wait for it to exit. Best-effort: the
    /// signal is honoured between chunks, not mid-block.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(());
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Run one synchronous pass over the cached chunks. Returns the number
    /// of blocks forwarded to the handler.
    pub fn read_round(&self) -> Result<usize, SyncError> {
        self.inner.read_round()
    }
}

impl ReaderInner {
    fn read_round(&self) -> Result<usize, SyncError> {
        let mut height = self.chain.latest_snapshot_height();
        let mut chunks = self.cache.chunks();
        chunks.sort_by_key(|segment| segment.bound[0]);

        let mut forwarded = 0;
        for segment in chunks {
            if segment.bound[1] <= height {
                // Everything in the chunk is already on chain.
                tracing::debug!(from = segment.bound[0], to = segment.bound[1], "stale chunk");
                self.cache.delete(&segment)?;
                continue;
            }
            if segment.bound[0] > height + 1 {
                // A gap the downloader has not filled yet.
                break;
            }

            match self.consume_chunk(&segment) {
                Ok(count) => {
                    forwarded += count;
                    height = height.max(segment.bound[1]);
                    self.cache.delete(&segment)?;
                }
                Err(SyncError::Handler(err)) => {
                    // The chunk itself is fine; retry next round.
                    tracing::warn!(
                        from = segment.bound[0],
                        to = segment.bound[1],
                        %err,
                        "handler rejected block, chunk abandoned"
                    );
                    return Ok(forwarded);
                }
                Err(err) => {
                    // Corrupt or mismatched chunk: drop it so the
                    // downloader fetches it again.
                    tracing::warn!(
                        from = segment.bound[0],
                        to = segment.bound[1],
                        %err,
                        "chunk failed, deleting for re-download"
                    );
                    self.cache.delete(&segment)?;
                    return Ok(forwarded);
                }
            }
        }
        Ok(forwarded)
    }

    fn consume_chunk(&self, segment: &Segment) -> Result<usize, SyncError> {
        let mut reader = self.cache.new_reader(segment)?;
        let mut count = 0;
        loop {
            match reader.read()? {
                Some(item) => {
                    (self.handler)(item).map_err(|err| SyncError::Handler(err.to_string()))?;
                    count += 1;
                }
                None => return Ok(count),
            }
        }
    }
}
