//! Striped worker pool executing per-connection work items.
//!
//! N long-lived worker tasks, each owning its own FIFO queue. Submissions
//! are striped by an atomic round-robin cursor; there is no stealing and no
//! priority. The pool bounds concurrent handler execution under connection
//! floods instead of spawning a task per accept.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One worker's queue and wakeup handle.
struct Stripe {
    queue: Mutex<VecDeque<Job>>,
    wake: Notify,
}

/// Fixed-size pool of worker tasks.
pub struct WorkerPool {
    stripes: Vec<Arc<Stripe>>,
    handles: Vec<JoinHandle<()>>,
    cursor: AtomicUsize,
    running: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks and return the running pool.
    pub fn start(workers: usize) -> Self {
        assert!(workers > 0, "worker pool needs at least one worker");
        let running = Arc::new(AtomicBool::new(true));
        let stripes: Vec<Arc<Stripe>> = (0..workers)
            .map(|_| {
                Arc::new(Stripe {
                    queue: Mutex::new(VecDeque::new()),
                    wake: Notify::new(),
                })
            })
            .collect();
        let handles = stripes
            .iter()
            .enumerate()
            .map(|(id, stripe)| {
                let stripe = stripe.clone();
                let running = running.clone();
                tokio::spawn(worker_loop(id, stripe, running))
            })
            .collect();
        Self {
            stripes,
            handles,
            cursor: AtomicUsize::new(0),
            running,
        }
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.stripes.len()
    }

    /// Queue a work item on the next stripe. Returns false once the pool
    /// has been stopped; the item is dropped in that case.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.stripes.len();
        let stripe = &self.stripes[idx];
        stripe.queue.lock().push_back(Box::pin(task));
        stripe.wake.notify_one();
        true
    }

    /// Stop the pool: refuse new work, wake every worker, and wait up to
    /// `timeout` for them to finish their in-flight items. Queued items
    /// that never started are discarded.
    pub async fn stop(self, timeout: Duration) {
        self.running.store(false, Ordering::Release);
        for stripe in &self.stripes {
            stripe.wake.notify_one();
        }
        let join_all = async {
            for handle in self.handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!(timeout_secs = timeout.as_secs(), "worker pool still busy at shutdown");
        }
    }
}

async fn worker_loop(id: usize, stripe: Arc<Stripe>, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Acquire) {
            let discarded = {
                let mut queue = stripe.queue.lock();
                let n = queue.len();
                queue.clear();
                n
            };
            if discarded > 0 {
                debug!(worker = id, discarded, "dropped queued work at shutdown");
            }
            break;
        }
        let job = stripe.queue.lock().pop_front();
        match job {
            Some(job) => {
                // One misbehaving connection must not take the worker down.
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    warn!(worker = id, "work item panicked");
                }
            }
            None => stripe.wake.notified().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    async fn wait_for_count(counter: &Arc<AtomicUsize>, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("counter never reached expected value");
    }

    #[tokio::test]
    async fn executes_submitted_work_across_stripes() {
        let pool = WorkerPool::start(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..9 {
            let counter = counter.clone();
            assert!(pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        wait_for_count(&counter, 9).await;
        pool.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn refuses_work_once_stopped() {
        let pool = WorkerPool::start(2);
        pool.running.store(false, Ordering::Release);
        assert!(!pool.submit(async {}));
        pool.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn stop_discards_queued_items() {
        let pool = WorkerPool::start(1);
        let counter = Arc::new(AtomicUsize::new(0));

        // First item occupies the only worker long enough for stop() to
        // clear the running flag.
        {
            let counter = counter.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.stop(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_item_does_not_kill_worker() {
        let pool = WorkerPool::start(1);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(async {
            panic!("bad connection");
        });
        {
            let counter = counter.clone();
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        wait_for_count(&counter, 1).await;
        pool.stop(Duration::from_secs(1)).await;
    }
}
