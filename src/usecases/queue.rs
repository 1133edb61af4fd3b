//! Task Queue - Scheduler/Worker Hand-off Channel
//!
//! Unbounded in-memory queue between task producers (scheduler,
//! registration one-shots) and the worker pool. `put` never blocks the
//! producer and never drops; `take` suspends until a task is available;
//! `ack` records completion for drain bookkeeping. FIFO per producer;
//! the queue never inspects task content and never retries; failure
//! handling belongs to the workers, and dropped work is simply
//! re-requested on the next scheduling cycle.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::domain::{CollectorError, FetchTask};

/// Unbounded hand-off queue for fetch tasks.
pub struct TaskQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<FetchTask>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FetchTask>>,
    depth: AtomicUsize,
    in_flight: AtomicUsize,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            depth: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Enqueue a task. Never blocks; fails only once the queue is closed.
    pub fn put(&self, task: FetchTask) -> Result<(), CollectorError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = guard.as_ref() else {
            return Err(CollectorError::QueueClosed);
        };
        tx.send(task).map_err(|_| CollectorError::QueueClosed)?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Take the next task, suspending until one is available.
    ///
    /// Returns `None` once the queue is closed and fully drained. Each
    /// returned task is owned by exactly one caller.
    pub async fn take(&self) -> Option<FetchTask> {
        let mut rx = self.rx.lock().await;
        let task = rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Some(task)
    }

    /// Mark a previously taken task as finished.
    pub fn ack(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    /// Close the queue: further `put` calls fail, `take` drains what is
    /// left and then returns `None`.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Tasks currently queued (not yet taken).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Tasks taken but not yet acked.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DataKind;

    fn task(id: &str) -> FetchTask {
        FetchTask::new(id, &[DataKind::Balance])
    }

    #[tokio::test]
    async fn put_take_preserves_producer_order() {
        let queue = TaskQueue::new();
        queue.put(task("a")).unwrap();
        queue.put(task("b")).unwrap();
        queue.put(task("c")).unwrap();

        assert_eq!(queue.take().await.unwrap().account_id, "a");
        assert_eq!(queue.take().await.unwrap().account_id, "b");
        assert_eq!(queue.take().await.unwrap().account_id, "c");
    }

    #[tokio::test]
    async fn take_suspends_until_a_task_arrives() {
        let queue = TaskQueue::new();

        let mut take = tokio_test::task::spawn(queue.take());
        tokio_test::assert_pending!(take.poll());

        queue.put(task("late")).unwrap();
        assert!(take.is_woken());

        let taken = tokio_test::assert_ready!(take.poll()).unwrap();
        assert_eq!(taken.account_id, "late");
    }

    #[tokio::test]
    async fn ack_tracks_in_flight_work() {
        let queue = TaskQueue::new();
        queue.put(task("a")).unwrap();
        assert_eq!(queue.depth(), 1);

        let _ = queue.take().await.unwrap();
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.in_flight(), 1);

        queue.ack();
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn closed_queue_rejects_put_and_drains_take() {
        let queue = TaskQueue::new();
        queue.put(task("a")).unwrap();
        queue.close();

        assert!(matches!(
            queue.put(task("b")),
            Err(CollectorError::QueueClosed)
        ));
        assert_eq!(queue.take().await.unwrap().account_id, "a");
        assert!(queue.take().await.is_none());
    }
}
