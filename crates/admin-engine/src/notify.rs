//! One-shot wake-up rendezvous between a suspended admin request and the
//! sources that may resume it.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use weir_admin_core::AdminError;

use crate::request::AdminRequest;

/// Sender half of the engine work queue.
pub(crate) type OpSender = mpsc::UnboundedSender<Box<AdminRequest>>;

struct Parked {
    handle: Box<AdminRequest>,
    queue: OpSender,
}

struct Inner {
    request_id: u64,
    slot: Mutex<Option<Parked>>,
}

/// Wake-up rendezvous shared by every source that may need to resume a
/// suspended admin request: the timeout timer, broker state changes, and
/// response arrival.
///
/// The worker parks the request handle here before suspending; whichever
/// source fires first takes the handle and reposts it on the engine work
/// queue, and later sources find the slot empty and back off. This is what
/// makes racing wake-ups (e.g. a response arriving after the timeout
/// already fired) safe without any coordination between the sources.
///
/// Each clone represents one potential wake source; the storage is freed
/// when the last clone drops.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub(crate) fn new(request_id: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                request_id,
                slot: Mutex::new(None),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Parked>> {
        // Poisoning would require a panic while the short critical section
        // below held the lock.
        self.inner.slot.lock().unwrap()
    }

    /// Install `handle` for the next wake-up round-trip. Called each time
    /// the worker suspends, because every trigger clears the slot.
    pub(crate) fn park(&self, handle: Box<AdminRequest>, queue: OpSender) {
        *self.slot() = Some(Parked { handle, queue });
    }

    /// Atomically claim the parked handle, or `None` if a wake-up already
    /// happened. Engine-task use only.
    pub(crate) fn disable(&self) -> Option<(Box<AdminRequest>, OpSender)> {
        self.slot().take().map(|p| (p.handle, p.queue))
    }

    /// Whether this is the last live reference to the rendezvous storage.
    #[cfg(test)]
    pub(crate) fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Wake the parked request: record `err` as the reason and repost the
    /// handle on the engine work queue. If the slot is already empty the
    /// wake-up has happened through another source and this call is a no-op.
    ///
    /// Callable from any thread or task.
    pub fn trigger(&self, err: Option<AdminError>, reason: &str) {
        let taken = self.slot().take();
        let Some(Parked { mut handle, queue }) = taken else {
            tracing::trace!(
                request_id = self.inner.request_id,
                reason,
                "wake-up already claimed, ignoring trigger"
            );
            return;
        };

        handle.last_error = err;
        tracing::trace!(request_id = self.inner.request_id, reason, "waking admin request");
        if queue.send(handle).is_err() {
            tracing::debug!(
                request_id = self.inner.request_id,
                reason,
                "engine work queue closed, dropping admin request"
            );
        }
    }
}
