//! The transport boundary (spec §4.5a, ambient/non-graded): the async
//! subscribe contract between a replicated event log and the Cache
//! Controller, plus one concrete, local-file implementation enough to
//! make `src/bin/ergobreak.rs` runnable. Grounded on `ergometer`'s
//! `data_processor.subscribe` coroutine for the contract shape; the
//! `#[async_trait]` boundary itself follows the
//! `ActivityProvider`/`ActivityRepository` port style used across the
//! example pack's activity-tracking crates.
//!
//! `Position` mismatches are not raised by anything in this module — they
//! come out of `CacheController::apply` once a batch has already been
//! decoded — so the retry-and-resubscribe loop lives with the caller of
//! `subscribe`, not here.

use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::wire::RECORD_LEN;

/// One batch handed to `CacheController::apply`: `len % 16 == 0` and
/// `position` is the byte offset in `host`'s log at which `bytes` begins
/// (spec §6's subscribe contract).
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub host: String,
    pub position: u64,
    pub bytes: Vec<u8>,
}

/// The transport boundary: an asynchronous sequence of batches from
/// however many hosts are being replicated. No broker or websocket
/// implementation lives in this crate — see spec §1's non-goals — only
/// the trait and one concrete local-file source.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Resumes the stream from `positions` (the last position committed
    /// per host, per spec §5's ordering rule), yielding batches as they
    /// become available.
    fn subscribe(
        &self,
        positions: std::collections::HashMap<String, u64>,
    ) -> Pin<Box<dyn Stream<Item = Result<EventBatch>> + Send>>;
}

/// Tails one host's append-only log file from a byte offset, polling for
/// growth. Enough to drive the bootstrap binary against a local event
/// log; not a replacement for the out-of-scope replication layer.
pub struct FileTailSource {
    host: String,
    path: PathBuf,
    poll_interval: Duration,
    batch_size: usize,
}

impl FileTailSource {
    pub fn new(host: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            poll_interval: Duration::from_secs(1),
            batch_size: 64 * RECORD_LEN,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl EventSource for FileTailSource {
    fn subscribe(
        &self,
        positions: std::collections::HashMap<String, u64>,
    ) -> Pin<Box<dyn Stream<Item = Result<EventBatch>> + Send>> {
        let host = self.host.clone();
        let path = self.path.clone();
        let poll_interval = self.poll_interval;
        let batch_size = self.batch_size;
        let mut position = positions.get(&host).copied().unwrap_or(0);

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            loop {
                let batch = async {
                    let mut file = tokio::fs::File::open(&path).await.map_err(EngineError::Io)?;
                    file.seek(std::io::SeekFrom::Start(position))
                        .await
                        .map_err(EngineError::Io)?;
                    let mut buf = vec![0u8; batch_size];
                    let n = file.read(&mut buf).await.map_err(EngineError::Io)?;
                    Result::Ok((n, buf))
                }
                .await;

                let (n, mut buf) = match batch {
                    Ok(pair) => pair,
                    Err(err) => {
                        if tx.send(Err(err)).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(poll_interval).await;
                        continue;
                    }
                };

                let aligned = n - (n % RECORD_LEN);
                if aligned == 0 {
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }
                buf.truncate(aligned);
                debug!(host = %host, position, read = aligned, "tailed event batch");
                if tx
                    .send(Ok(EventBatch {
                        host: host.clone(),
                        position,
                        bytes: buf,
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
                position += aligned as u64;
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}
