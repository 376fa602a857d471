//! **Outbound frame queue** — bounded, ordered, with a cancel-and-drain path.
//!
//! The cognition task pushes (blocking when full, which throttles a runaway
//! TTS producer), the egress task pops, and the ingest task drains on
//! barge-in. Pushes re-check the producer's cancellation flag under the queue
//! lock, so a frame can never slip in after a drain observed the flag.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

struct Inner {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

pub struct OutboundQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    /// Bumped on every drain; a popped frame whose epoch is stale belongs to
    /// an interrupted reply and must not reach the wire.
    epoch: AtomicU64,
    /// Signalled when space frees up (pop or drain).
    space: Notify,
    /// Signalled when a frame arrives or the queue closes.
    items: Notify,
    /// Signalled whenever the queue becomes empty.
    drained: Notify,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::new(),
                closed: false,
            }),
            capacity: capacity.max(1),
            epoch: AtomicU64::new(0),
            space: Notify::new(),
            items: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Enqueue one frame, waiting while the queue is full. Returns `false`
    /// without enqueuing when the producer has been cancelled or the queue is
    /// closed; the cancellation check happens under the queue lock.
    pub async fn push(&self, frame: Vec<u8>, cancelled: &AtomicBool) -> bool {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.closed || cancelled.load(Ordering::SeqCst) {
                    return false;
                }
                if inner.frames.len() < self.capacity {
                    inner.frames.push_back(frame);
                    self.items.notify_one();
                    return true;
                }
            }
            self.space.notified().await;
        }
    }

    /// Dequeue the next frame and the epoch it was observed under, waiting
    /// while empty. `None` when closed and drained.
    pub async fn pop(&self) -> Option<(Vec<u8>, u64)> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(frame) = inner.frames.pop_front() {
                    self.space.notify_one();
                    if inner.frames.is_empty() {
                        self.drained.notify_one();
                    }
                    return Some((frame, self.epoch.load(Ordering::SeqCst)));
                }
                if inner.closed {
                    return None;
                }
            }
            self.items.notified().await;
        }
    }

    /// Current drain epoch. A consumer compares this against the epoch a frame
    /// was popped under right before writing it out.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Discard everything synchronously (barge-in). Set the producer's
    /// cancellation flag before calling so late pushes are rejected.
    pub fn drain(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames.clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.space.notify_one();
        self.drained.notify_one();
    }

    /// Close on session shutdown: releases buffered audio and wakes the
    /// consumer and any blocked producer so both terminate promptly.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.frames.clear();
        self.items.notify_one();
        self.space.notify_one();
        self.drained.notify_one();
    }

    /// Wait until the queue is empty (or closed). Used by the dispatcher to
    /// hold SPEAKING until the last paced frame left.
    pub async fn wait_drained(&self) {
        loop {
            {
                let inner = self.inner.lock().unwrap();
                if inner.frames.is_empty() || inner.closed {
                    return;
                }
            }
            self.drained.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
