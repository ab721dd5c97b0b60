//! Result channel — latest-value delivery of step results to one session's
//! live connection.
//!
//! Backed by a `watch` slot: publishing overwrites the previous event and
//! never waits on the consumer, so a slow socket only ever sees the newest
//! values and the stepping task never builds a backlog. Every response gets
//! a sequence number so consumers can tell when ticks were coalesced.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use simlive_core::engine::Values;
use simlive_core::protocol::PushEvent;
use simlive_core::SessionError;

pub struct ResultChannel {
    tx: watch::Sender<Option<PushEvent>>,
    seq: AtomicU64,
}

impl Default for ResultChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultChannel {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    /// Publish one step's values. Returns the sequence number assigned.
    pub fn publish_values(&self, time: f64, data: Values) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.tx
            .send_replace(Some(PushEvent::Response { seq, time, data }));
        seq
    }

    pub fn publish_error(&self, err: &SessionError) {
        self.tx.send_replace(Some(PushEvent::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }));
    }

    /// Sequence number of the most recent response, 0 if none yet.
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// New receiver. Events published before this call are not replayed.
    pub fn subscribe(&self) -> ResultReceiver {
        ResultReceiver {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct ResultReceiver {
    rx: watch::Receiver<Option<PushEvent>>,
}

impl ResultReceiver {
    /// Wait for the next unseen event. `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(event) = self.rx.borrow_and_update().clone() {
                return Some(event);
            }
        }
    }
}
