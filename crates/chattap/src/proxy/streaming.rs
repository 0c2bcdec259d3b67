//! Streaming passthrough with tee functionality
//!
//! A single task reads the upstream byte stream and routes every chunk to two
//! consumers: the client response body (through a bounded channel, so the
//! caller sees each chunk as soon as it arrives) and an in-memory accumulator
//! handed back through a [`BufferHandle`] once the upstream ends.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

/// Chunks buffered between the upstream reader and a slow client
const CLIENT_CHANNEL_CAPACITY: usize = 64;

/// Stream handed to the client response body
pub type ClientStream = ReceiverStream<Result<Bytes, std::io::Error>>;

/// Result of teeing a stream - the forwarding stream and a handle to the buffered content
pub struct TeeResult<S> {
    /// Stream to forward to client (yields original chunks unchanged)
    pub client_stream: S,
    /// Handle to retrieve the outcome after the upstream completes
    pub buffer_handle: BufferHandle,
}

/// How the upstream stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Upstream finished; all bytes read, in order
    Completed(Bytes),
    /// Upstream failed mid-stream with this message
    Failed(String),
}

/// Handle to retrieve the buffered stream content after completion
pub struct BufferHandle {
    receiver: oneshot::Receiver<StreamOutcome>,
}

impl BufferHandle {
    /// Wait for the upstream to finish
    pub async fn outcome(self) -> StreamOutcome {
        self.receiver
            .await
            .unwrap_or_else(|_| StreamOutcome::Failed("stream relay task ended early".to_string()))
    }
}

/// Tee an upstream stream: forward every chunk to the client while accumulating it.
///
/// If the upstream yields an error, a single JSON error chunk is sent to the
/// client and the stream ends with [`StreamOutcome::Failed`]. If the client
/// goes away, forwarding stops but accumulation continues to the end.
pub fn tee_stream<S, E>(upstream: S) -> TeeResult<ClientStream>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut upstream = Box::pin(upstream);
        let mut accumulated = Vec::new();
        let mut client_open = true;

        let outcome = loop {
            match upstream.next().await {
                Some(Ok(chunk)) => {
                    accumulated.extend_from_slice(&chunk);
                    if client_open && tx.send(Ok(chunk)).await.is_err() {
                        debug!("Client disconnected mid-stream, stopping forwarding");
                        client_open = false;
                    }
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    error!("Streaming error: {message}");
                    if client_open {
                        let _ = tx.send(Ok(error_chunk(&message))).await;
                    }
                    break StreamOutcome::Failed(message);
                }
                None => break StreamOutcome::Completed(Bytes::from(accumulated)),
            }
        };

        drop(tx);
        let _ = done_tx.send(outcome);
    });

    TeeResult {
        client_stream: ReceiverStream::new(rx),
        buffer_handle: BufferHandle { receiver: done_rx },
    }
}

/// Terminal chunk reporting a streaming failure to the client
pub fn error_chunk(message: &str) -> Bytes {
    Bytes::from(serde_json::json!({ "error": message }).to_string())
}
