//! Background task queue for fire-and-forget side effects.
//!
//! Welcome notifications, async fraud checks and audit writes must never
//! block or fail the primary flow, so they are submitted here and executed
//! with isolated error handling: a failing task is logged and dropped.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;

struct Job {
    label: &'static str,
    fut: BoxFuture<'static, Result<(), anyhow::Error>>,
}

/// Handle for submitting background work. Cheap to clone.
#[derive(Clone)]
pub struct BackgroundTasks {
    tx: mpsc::UnboundedSender<Job>,
}

impl BackgroundTasks {
    /// Start the worker loop on the current runtime and return a handle.
    pub fn spawn_worker() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // Each job runs in its own task so one slow side effect
                // cannot back up the queue.
                tokio::spawn(async move {
                    if let Err(e) = job.fut.await {
                        tracing::warn!(task = job.label, error = %e, "Background task failed");
                    }
                });
            }
        });
        Self { tx }
    }

    /// Submit a task. Errors from the task are logged, never surfaced.
    pub fn submit<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let job = Job {
            label,
            fut: Box::pin(fut),
        };
        if self.tx.send(job).is_err() {
            tracing::warn!(task = label, "Background worker is gone; task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_submitted_task_runs() {
        let tasks = BackgroundTasks::spawn_worker();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        tasks.submit("test_task", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_task_does_not_poison_queue() {
        let tasks = BackgroundTasks::spawn_worker();
        tasks.submit("failing_task", async { Err(anyhow::anyhow!("boom")) });

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        tasks.submit("second_task", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::SeqCst));
    }
}
