//! Task management for Tryst nodes.
//!
//! [`TaskManager`] owns the shutdown [`Signal`] and watches critical tasks. Tasks are
//! spawned through a cloneable [`TaskExecutor`], which hands every task a clone of the
//! node-wide [`Shutdown`] future via [`TaskExecutor::on_shutdown_signal`].
//!
//! ```ignore
//! let manager = TaskManager::current();
//! let executor = manager.executor();
//!
//! executor.spawn_critical("discovery", async move { /* ... */ });
//!
//! // Resolves on Ctrl-C or when a critical task exits.
//! let exit = manager.wait_for_exit().await;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod metrics;
mod shutdown;

pub use metrics::{IncCounterOnDrop, TaskExecutorMetrics};
pub use shutdown::{Shutdown, Signal, signal};

use core::future::Future;
use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use tracing_futures::Instrument;

/// Why the task manager stopped waiting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskExit {
    /// The operator interrupted the process.
    #[error("interrupted")]
    Interrupted,
    /// A critical task returned.
    #[error("critical task `{0}` exited")]
    CriticalExited(&'static str),
    /// A critical task panicked.
    #[error("critical task `{0}` panicked")]
    CriticalPanicked(&'static str),
}

impl TaskExit {
    /// Whether this exit is a failure the process should report.
    ///
    /// Critical tasks run until shutdown, so any critical exit counts.
    pub fn is_failure(&self) -> bool {
        !matches!(self, TaskExit::Interrupted)
    }
}

/// Owns the node-wide shutdown signal and supervises critical tasks.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    signal: Option<Signal>,
    on_shutdown: Shutdown,
    exit_tx: UnboundedSender<TaskExit>,
    exit_rx: UnboundedReceiver<TaskExit>,
    running: Arc<AtomicUsize>,
    metrics: TaskExecutorMetrics,
}

impl TaskManager {
    /// Create a task manager bound to the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Create a task manager bound to the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        let (exit_tx, exit_rx) = unbounded_channel();
        let (signal, on_shutdown) = signal();
        Self {
            handle,
            signal: Some(signal),
            on_shutdown,
            exit_tx,
            exit_rx,
            running: Arc::new(AtomicUsize::new(0)),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    /// Returns a new executor spawning onto this manager's runtime.
    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            on_shutdown: self.on_shutdown.clone(),
            exit_tx: self.exit_tx.clone(),
            running: self.running.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Wait until the operator interrupts the process or a critical task exits.
    ///
    /// Does not fire the shutdown signal; call [`graceful_shutdown`](Self::graceful_shutdown).
    pub async fn wait_for_exit(&mut self) -> TaskExit {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(%e, "failed to listen for ctrl-c");
                }
                info!("Received ctrl-c");
                TaskExit::Interrupted
            }
            Some(exit) = self.exit_rx.recv() => exit,
        }
    }

    /// Fire the shutdown signal and wait up to `timeout` for spawned tasks to finish.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn graceful_shutdown(mut self, timeout: Duration) -> bool {
        if let Some(signal) = self.signal.take() {
            signal.fire();
        }

        let running = self.running.clone();
        let drained = tokio::time::timeout(timeout, async move {
            while running.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok();

        if drained {
            debug!("All tasks finished");
        } else {
            warn!(
                remaining = self.running.load(Ordering::SeqCst),
                "Tasks still running after shutdown timeout"
            );
        }
        drained
    }
}

/// Cloneable handle for spawning tasks.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    on_shutdown: Shutdown,
    exit_tx: UnboundedSender<TaskExit>,
    running: Arc<AtomicUsize>,
    metrics: TaskExecutorMetrics,
}

impl TaskExecutor {
    /// The node-wide shutdown future.
    pub fn on_shutdown_signal(&self) -> &Shutdown {
        &self.on_shutdown
    }

    /// Spawn a regular task. Panics are logged and contained.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_regular_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_regular_tasks_total.clone());
        let running = RunningGuard::new(self.running.clone());
        let span = tracing::debug_span!("task", name);

        let task = async move {
            let _finished = finished;
            let _running = running;
            if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                error!(task = name, "Task panicked");
            }
        }
        .instrument(span);

        self.handle.spawn(task)
    }

    /// Spawn a critical task. When it returns or panics the task manager stops waiting.
    pub fn spawn_critical<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.metrics.inc_critical_tasks();
        let finished = IncCounterOnDrop::new(self.metrics.finished_critical_tasks_total.clone());
        let running = RunningGuard::new(self.running.clone());
        let exit_tx = self.exit_tx.clone();
        let span = tracing::debug_span!("critical_task", name);

        let task = async move {
            let _finished = finished;
            let _running = running;
            let exit = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(()) => {
                    debug!(task = name, "Critical task exited");
                    TaskExit::CriticalExited(name)
                }
                Err(_) => {
                    error!(task = name, "Critical task panicked");
                    TaskExit::CriticalPanicked(name)
                }
            };
            let _ = exit_tx.send(exit);
        }
        .instrument(span);

        self.handle.spawn(task)
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn running_tasks(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn new(running: Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::SeqCst);
        Self(running)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
