//! Background transfer queue: a single consumer task draining long-running
//! out-of-band uploads, with per-transfer status tracking for diagnostics.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Enqueued,
    Running,
    Finished,
    Cancelled,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStatus::Enqueued => "enqueued",
            TransferStatus::Running => "running",
            TransferStatus::Finished => "finished",
            TransferStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A deferred upload produced by a storage backend.
///
/// `start` must notify the owning backend exactly once that the upload is
/// finished, on every exit path; [`FinishedFlag`] provides the latch.
/// `dispose` releases temporary resources and is invoked exactly once by the
/// worker, strictly after `start` has resolved, so the two never race on the
/// notification flag.
#[async_trait]
pub trait BackgroundTransfer: Send {
    fn transfer_id(&self) -> &str;

    async fn start(&mut self, token: CancellationToken) -> io::Result<()>;

    async fn dispose(&mut self);
}

/// Once-only latch for the finished-notification.
#[derive(Debug, Default)]
pub struct FinishedFlag {
    notified: bool,
}

impl FinishedFlag {
    /// Returns `true` the first time only.
    pub fn mark(&mut self) -> bool {
        !std::mem::replace(&mut self.notified, true)
    }

    pub fn is_marked(&self) -> bool {
        self.notified
    }
}

/// Producer handle to the queue. Producers only enqueue; the worker task is
/// the single owner of consumption.
#[derive(Clone)]
pub struct TransferQueue {
    tx: mpsc::UnboundedSender<Box<dyn BackgroundTransfer>>,
    statuses: Arc<Mutex<HashMap<String, TransferStatus>>>,
}

impl TransferQueue {
    /// Spawns the worker and returns the producer handle. The token ends the
    /// worker; a transfer in flight when it fires is cancelled through its
    /// own child token.
    pub fn start(token: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Box<dyn BackgroundTransfer>>();
        let statuses: Arc<Mutex<HashMap<String, TransferStatus>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let worker_statuses = Arc::clone(&statuses);
        tokio::spawn(async move {
            loop {
                let mut transfer = tokio::select! {
                    _ = token.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(transfer) => transfer,
                        None => break,
                    },
                };
                let id = transfer.transfer_id().to_string();
                set_status(&worker_statuses, &id, TransferStatus::Running);
                let child = token.child_token();
                let result = transfer.start(child.clone()).await;
                let status = if child.is_cancelled() {
                    TransferStatus::Cancelled
                } else {
                    TransferStatus::Finished
                };
                match result {
                    Ok(()) => info!("background transfer {} {}", id, status),
                    Err(err) => error!("background transfer {} failed: {}", id, err),
                }
                // disposal is sequenced after start so the notified flag is
                // never touched from two tasks
                transfer.dispose().await;
                set_status(&worker_statuses, &id, status);
            }
        });
        Self { tx, statuses }
    }

    pub fn enqueue(&self, transfer: Box<dyn BackgroundTransfer>) -> io::Result<String> {
        let id = transfer.transfer_id().to_string();
        set_status(&self.statuses, &id, TransferStatus::Enqueued);
        self.tx.send(transfer).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "transfer worker has shut down")
        })?;
        Ok(id)
    }

    pub fn status_of(&self, id: &str) -> Option<TransferStatus> {
        self.statuses.lock().unwrap().get(id).copied()
    }

    /// Snapshot for SITE BLST, ordered by transfer ID.
    pub fn statuses(&self) -> Vec<(String, TransferStatus)> {
        let mut entries: Vec<_> = self
            .statuses
            .lock()
            .unwrap()
            .iter()
            .map(|(id, status)| (id.clone(), *status))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn set_status(statuses: &Arc<Mutex<HashMap<String, TransferStatus>>>, id: &str, status: TransferStatus) {
    statuses.lock().unwrap().insert(id.to_string(), status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    struct RecordingTransfer {
        id: String,
        notifications: Arc<AtomicUsize>,
        disposals: Arc<AtomicUsize>,
        finished: FinishedFlag,
        done_tx: Option<oneshot::Sender<()>>,
    }

    #[async_trait]
    impl BackgroundTransfer for RecordingTransfer {
        fn transfer_id(&self) -> &str {
            &self.id
        }

        async fn start(&mut self, _token: CancellationToken) -> io::Result<()> {
            if self.finished.mark() {
                self.notifications.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn dispose(&mut self) {
            // the start path already notified; the flag keeps this a no-op
            if self.finished.mark() {
                self.notifications.fetch_add(1, Ordering::SeqCst);
            }
            self.disposals.fetch_add(1, Ordering::SeqCst);
            if let Some(tx) = self.done_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    #[tokio::test]
    async fn worker_runs_and_disposes_exactly_once() {
        let queue = TransferQueue::start(CancellationToken::new());
        let notifications = Arc::new(AtomicUsize::new(0));
        let disposals = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = oneshot::channel();
        let id = queue
            .enqueue(Box::new(RecordingTransfer {
                id: "job-1".into(),
                notifications: Arc::clone(&notifications),
                disposals: Arc::clone(&disposals),
                finished: FinishedFlag::default(),
                done_tx: Some(done_tx),
            }))
            .unwrap();
        done_rx.await.unwrap();
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        // the worker may still be writing the terminal status; poll briefly
        for _ in 0..50 {
            if queue.status_of(&id) == Some(TransferStatus::Finished) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(queue.status_of(&id), Some(TransferStatus::Finished));
    }

    #[tokio::test]
    async fn finished_flag_latches() {
        let mut flag = FinishedFlag::default();
        assert!(flag.mark());
        assert!(!flag.mark());
        assert!(flag.is_marked());
    }

    #[tokio::test]
    async fn statuses_are_listed_in_id_order() {
        let queue = TransferQueue::start(CancellationToken::new());
        set_status(&queue.statuses, "b", TransferStatus::Running);
        set_status(&queue.statuses, "a", TransferStatus::Enqueued);
        let listed = queue.statuses();
        assert_eq!(listed[0].0, "a");
        assert_eq!(listed[1].0, "b");
    }
}
