//! Stream tee: one render stream, two consumers.
//!
//! # Responsibilities
//! - Feed every chunk of a source stream to a live branch and a cache branch
//! - Bound the live branch by chunk count and the cache branch by bytes
//! - Keep feeding the remaining branch when the other is released
//! - Report a source that stopped before completing
//!
//! # Design Decisions
//! - A single producer task owns the source; branches are channel receivers
//! - The cache branch is never awaited on, so a stalled cache consumer cannot block the client
//! - Exceeding the cache cap ends the cache branch with `PayloadTooLarge`
//! - Each branch sees an explicit end marker; a closed channel without one is an error

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::render::engine::ByteStream;
use crate::render::RenderError;

enum Frame {
    Data(Bytes),
    Failed(RenderError),
    End,
}

enum Receiver {
    Bounded(mpsc::Receiver<Frame>),
    Unbounded(mpsc::UnboundedReceiver<Frame>),
}

impl Receiver {
    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        match self {
            Receiver::Bounded(rx) => rx.poll_recv(cx),
            Receiver::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

/// One branch of a tee. Dropping it (or calling `release`) detaches the branch.
pub struct StreamToken {
    rx: Receiver,
    done: bool,
}

impl StreamToken {
    fn new(rx: Receiver) -> Self {
        Self { rx, done: false }
    }

    /// Next chunk, `None` once the source completed.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, RenderError>> {
        self.next().await
    }

    /// Stop consuming this branch.
    pub fn release(self) {}
}

impl Stream for StreamToken {
    type Item = Result<Bytes, RenderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let frame = match self.rx.poll_recv(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(frame) => frame,
        };
        Poll::Ready(match frame {
            Some(Frame::Data(chunk)) => Some(Ok(chunk)),
            Some(Frame::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            Some(Frame::End) => {
                self.done = true;
                None
            }
            None => {
                self.done = true;
                Some(Err(RenderError::Stream(
                    "source stopped before completing".to_string(),
                )))
            }
        })
    }
}

/// The two branches of a tee and the task feeding them.
pub struct Tee {
    pub live: StreamToken,
    pub cache: StreamToken,
    pub producer: JoinHandle<()>,
}

/// Split `source` into a live branch buffering up to `live_buffer` chunks and a
/// cache branch holding at most `cache_cap` bytes.
pub fn tee(mut source: ByteStream, live_buffer: usize, cache_cap: usize) -> Tee {
    let (live_tx, live_rx) = mpsc::channel(live_buffer.max(1));
    let (cache_tx, cache_rx) = mpsc::unbounded_channel();

    let producer = tokio::spawn(async move {
        let mut live = Some(live_tx);
        let mut cache = Some(cache_tx);
        let mut cached_bytes = 0usize;

        while let Some(item) = source.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Some(tx) = &cache {
                        let _ = tx.send(Frame::Failed(e.clone()));
                    }
                    if let Some(tx) = &live {
                        let _ = tx.send(Frame::Failed(e)).await;
                    }
                    return;
                }
            };

            if let Some(tx) = &cache {
                cached_bytes += chunk.len();
                let frame = if cached_bytes > cache_cap {
                    Frame::Failed(RenderError::PayloadTooLarge { limit: cache_cap })
                } else {
                    Frame::Data(chunk.clone())
                };
                let overflow = matches!(frame, Frame::Failed(_));
                if tx.send(frame).is_err() || overflow {
                    cache = None;
                }
            }

            if let Some(tx) = &live {
                if tx.send(Frame::Data(chunk)).await.is_err() {
                    live = None;
                }
            }

            if live.is_none() && cache.is_none() {
                tracing::debug!("Both tee branches released; stopping render stream");
                return;
            }
        }

        if let Some(tx) = &cache {
            let _ = tx.send(Frame::End);
        }
        if let Some(tx) = &live {
            let _ = tx.send(Frame::End).await;
        }
    });

    Tee {
        live: StreamToken::new(Receiver::Bounded(live_rx)),
        cache: StreamToken::new(Receiver::Unbounded(cache_rx)),
        producer,
    }
}
