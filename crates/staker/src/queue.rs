//! Bounded work queue for stake adjustments.
//!
//! Request handlers [`StakeQueue::submit`] a [`WorkItem`] and return immediately; a
//! dispatcher task hands items to at most `workers` concurrent [`ItemProcessor`] runs.
//! Submitting never waits: a full buffer is reported as [`QueueError::Full`].
//!
//! On [`WorkerPool::shutdown`] the queue stops accepting items, buffered items are still
//! processed, and the call returns once every in-flight item has finished.

use async_trait::async_trait;
use std::sync::Arc;
use taodiv_core::{Hotkey, Netuid};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, error, info};

/// One stake adjustment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Subnet.
    pub netuid: Netuid,
    /// Hotkey to adjust stake on.
    pub hotkey: Hotkey,
}

/// Why an item was not accepted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The buffer is at capacity.
    #[error("stake queue is full")]
    Full,

    /// The worker pool has shut down.
    #[error("stake queue is closed")]
    Closed,
}

/// Work performed for each item.
#[async_trait]
pub trait ItemProcessor: Send + Sync + 'static {
    /// Handle one item. Failures are the processor's to log.
    async fn process(&self, item: WorkItem);
}

/// Producer side of the queue.
#[derive(Debug, Clone)]
pub struct StakeQueue {
    sender: mpsc::Sender<WorkItem>,
}

impl StakeQueue {
    /// Enqueue without waiting.
    pub fn submit(&self, item: WorkItem) -> Result<(), QueueError> {
        self.sender.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Free buffer slots.
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }
}

/// Dispatcher task and its shutdown handle.
pub struct WorkerPool {
    dispatcher: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn the dispatcher. `workers` and `capacity` are raised to at least 1.
    pub fn start(
        processor: Arc<dyn ItemProcessor>,
        workers: usize,
        capacity: usize,
    ) -> (StakeQueue, WorkerPool) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let workers = workers.max(1);

        info!(workers, capacity, "Starting stake worker pool");
        let dispatcher = tokio::spawn(dispatch(receiver, shutdown_rx, processor, workers));

        (StakeQueue { sender }, WorkerPool { dispatcher, shutdown })
    }

    /// Stop accepting items, drain the buffer and wait for in-flight items.
    pub async fn shutdown(self) {
        info!("Shutting down stake worker pool");
        // The dispatcher treats a dropped sender as shutdown too.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.dispatcher.await {
            error!("Stake dispatcher failed: {}", e);
        }
        info!("Stake worker pool stopped");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<WorkItem>,
    mut shutdown: watch::Receiver<bool>,
    processor: Arc<dyn ItemProcessor>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut closing = false;

    loop {
        // A free worker is claimed before the next item leaves the buffer, so queue
        // capacity is the number of items waiting beyond the running ones.
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        let next = if closing {
            receiver.recv().await
        } else {
            tokio::select! {
                item = receiver.recv() => item,
                _ = shutdown.changed() => {
                    closing = true;
                    receiver.close();
                    continue;
                }
            }
        };
        let Some(item) = next else {
            break;
        };

        debug!(netuid = item.netuid, hotkey = %item.hotkey, "Dispatching stake work item");
        let processor = processor.clone();
        tokio::spawn(async move {
            processor.process(item).await;
            drop(permit);
        });
    }

    // Every permit back means every spawned item has finished.
    let _ = permits.acquire_many(workers as u32).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Gated {
        started: mpsc::UnboundedSender<Netuid>,
        gate: Arc<Semaphore>,
        done: Mutex<Vec<Netuid>>,
    }

    #[async_trait]
    impl ItemProcessor for Gated {
        async fn process(&self, item: WorkItem) {
            let _ = self.started.send(item.netuid);
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.done.lock().unwrap().push(item.netuid);
        }
    }

    fn item(netuid: Netuid) -> WorkItem {
        WorkItem {
            netuid,
            hotkey: Hotkey::from_account([netuid as u8; 32]),
        }
    }

    fn gated() -> (Arc<Gated>, mpsc::UnboundedReceiver<Netuid>, Arc<Semaphore>) {
        let (started, started_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        let processor = Arc::new(Gated {
            started,
            gate: gate.clone(),
            done: Mutex::new(Vec::new()),
        });
        (processor, started_rx, gate)
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let (processor, mut started, gate) = gated();
        let (queue, pool) = WorkerPool::start(processor.clone(), 1, 1);

        queue.submit(item(1)).unwrap();
        assert_eq!(started.recv().await, Some(1));

        // Worker busy: one item fits in the buffer, the next is refused.
        queue.submit(item(2)).unwrap();
        assert_eq!(queue.submit(item(3)), Err(QueueError::Full));

        gate.add_permits(10);
        pool.shutdown().await;

        assert_eq!(*processor.done.lock().unwrap(), vec![1, 2]);
        assert_eq!(queue.submit(item(4)), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_workers_run_concurrently() {
        let (processor, mut started, gate) = gated();
        let (queue, pool) = WorkerPool::start(processor.clone(), 3, 8);

        for netuid in 1..=3 {
            queue.submit(item(netuid)).unwrap();
        }

        let mut running = Vec::new();
        for _ in 0..3 {
            running.push(started.recv().await.unwrap());
        }
        running.sort_unstable();
        assert_eq!(running, vec![1, 2, 3]);

        gate.add_permits(3);
        pool.shutdown().await;
        assert_eq!(processor.done.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffer() {
        let (processor, _started, gate) = gated();
        gate.add_permits(100);
        let (queue, pool) = WorkerPool::start(processor.clone(), 2, 16);

        for netuid in 1..=10 {
            queue.submit(item(netuid)).unwrap();
        }
        pool.shutdown().await;

        let mut done = processor.done.lock().unwrap().clone();
        done.sort_unstable();
        assert_eq!(done, (1..=10).collect::<Vec<Netuid>>());
    }
}
