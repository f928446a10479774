//! Last-used stamping
//!
//! Every served redirect stamps "last used" on its originating rule so
//! editors can spot dead rules. The stamp happens off the request path: hits
//! are queued to a dedicated worker thread, and when the queue is full or
//! the write fails the hit is simply dropped. Serving the redirect never
//! waits on, and never fails because of, this bookkeeping.

use crate::source::{ContentSource, SourceId};
use chrono::Utc;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Pending stamps the worker may fall behind by before hits are dropped
const QUEUE_CAPACITY: usize = 256;

/// Fire-and-forget recorder for redirect hits
///
/// Dropping the recorder disconnects the queue and joins the worker, so
/// stamps already queued still land during shutdown.
pub struct UsageRecorder {
    sender: Option<SyncSender<SourceId>>,
    worker: Option<JoinHandle<()>>,
}

impl UsageRecorder {
    /// Spawns the worker thread over the given source
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<SourceId>(QUEUE_CAPACITY);

        let worker = thread::spawn(move || {
            for rule in receiver {
                if let Err(e) = source.record_use(&rule, Utc::now()) {
                    debug!(rule = %rule, error = %e, "last-used stamp failed");
                }
            }
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queues a hit for stamping; never blocks
    pub fn record(&self, rule: SourceId) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(rule) {
            Ok(()) => {}
            Err(TrySendError::Full(rule)) => {
                debug!(rule = %rule, "usage queue full, hit dropped");
            }
            Err(TrySendError::Disconnected(rule)) => {
                debug!(rule = %rule, "usage worker gone, hit dropped");
            }
        }
    }
}

impl Drop for UsageRecorder {
    fn drop(&mut self) {
        // Disconnect first so the worker's receive loop ends.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
