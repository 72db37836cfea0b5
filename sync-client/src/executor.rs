//! Serial job executor.
//!
//! Runs queued async jobs one at a time, in submission order, on a
//! dedicated task. Each executor carries a label made of a caller-chosen
//! suffix and a per-instance UUID, e.g. `channel-loader#6f1c…`.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Runs jobs one after another.
#[derive(Debug, Clone)]
pub struct SerialExecutor {
    label: String,
    jobs: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl SerialExecutor {
    /// Start an executor. Must be called within a Tokio runtime.
    pub fn new(suffix: &str) -> Self {
        let label = format!("{}#{}", suffix, Uuid::new_v4());
        let (jobs, mut queue) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();

        let task_label = label.clone();
        tokio::spawn(async move {
            while let Some(job) = queue.recv().await {
                job.await;
            }
            tracing::debug!("Executor {} stopped", task_label);
        });

        Self { label, jobs }
    }

    /// The executor's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue a job. Returns `false` if the executor has stopped.
    pub fn spawn<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.jobs.send(job.boxed()).is_ok()
    }
}
