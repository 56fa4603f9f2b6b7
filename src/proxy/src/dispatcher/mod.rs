//! C8: the per-client dual-pipe dispatcher shared by both wire protocols.
//!
//! A client connection spawns two halves: an inbound task that reads from
//! the client, classifies each statement, and either routes it to a
//! secondary or forwards it untouched to the primary; and an outbound
//! task that is a pure byte pump from the primary back to the client.
//! Both halves write to the client socket, so writes are funneled through
//! a single [`ClientWriter`] task instead of sharing the socket directly.
pub mod mysql;
pub mod postgres;

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

/// Set once the inbound half finishes, so the outbound half can treat its
/// own read/write errors as an ordinary consequence of shutdown instead
/// of logging them as failures.
#[derive(Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Serializes writes to the client socket across the inbound and outbound
/// halves. Cloning sends into the same background writer task.
#[derive(Clone)]
pub struct ClientWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ClientWriter {
    pub fn spawn(mut write_half: OwnedWriteHalf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            while let Some(buf) = rx.recv().await {
                if write_half.write_all(&buf).await.is_err() {
                    return;
                }
            }
        });
        Self { tx }
    }
}

impl AsyncWrite for ClientWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let len = buf.len();
        // the background task owns the real socket; a successful send just
        // means the bytes are queued for it, not that they've reached the
        // wire. the task exits and drops its receiver the moment a real
        // write fails, so a send error here means the client socket is
        // already dead and must be surfaced rather than swallowed.
        match self.tx.send(buf.to_vec()) {
            Ok(()) => Poll::Ready(Ok(len)),
            Err(_) => Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client writer task has exited",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
