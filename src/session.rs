use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Notify;
use tonic::Status;

use crate::stub::{MediaStream, ObjectChunk};

/// Idempotent cancellation signal for one in-flight media call.
///
/// The handle is armed when the session is constructed, before the first
/// chunk is pulled, so firing it is legal at any point in the session's
/// life, including after natural completion.
#[derive(Clone)]
pub(crate) struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationHandle {
    fn new() -> Self {
        CancellationHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before the flag check so a concurrent cancel cannot slip
        // between the check and the await.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// One in-flight server-streaming media call: the chunk stream, its
/// cancellation handle, and the range parameters it was issued with.
pub(crate) struct StreamSession {
    stream: MediaStream,
    cancel: CancellationHandle,
    read_offset: u64,
    read_limit: Option<u64>,
}

impl StreamSession {
    pub(crate) fn new(stream: MediaStream, read_offset: u64, read_limit: Option<u64>) -> Self {
        StreamSession {
            stream,
            cancel: CancellationHandle::new(),
            read_offset,
            read_limit,
        }
    }

    /// Offset the underlying request started at.
    pub(crate) fn read_offset(&self) -> u64 {
        self.read_offset
    }

    pub(crate) fn read_limit(&self) -> Option<u64> {
        self.read_limit
    }

    /// Pulls the next chunk. A cancelled session reports end-of-stream
    /// without advancing the underlying stream; a naturally-finished one
    /// fires its own handle so later cancels are no-ops.
    pub(crate) async fn next_chunk(&mut self) -> std::result::Result<Option<ObjectChunk>, Status> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            item = self.stream.next() => match item {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(status)) => Err(status),
                None => {
                    self.cancel.cancel();
                    Ok(None)
                }
            },
        }
    }

    pub(crate) fn shut_down(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Backstop: every exit path leaves the call cancelled.
        self.cancel.cancel();
    }
}
