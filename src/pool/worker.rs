// src/pool/worker.rs
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::checks::{Check, CheckError, CheckResult, Execution};
use crate::context::Context;
use crate::target::Address;

/// One scheduled execution of `check` against `target`.
pub struct WorkItem {
    pub ctx: Context,
    pub target: Address,
    pub check: Arc<dyn Check>,
}

/// An idle worker's private mailbox, as advertised to the dispatcher.
pub(super) struct ReadyWorker {
    pub id: usize,
    pub mailbox: mpsc::Sender<WorkItem>,
}

pub(super) struct Worker {
    id: usize,
    ready_tx: mpsc::Sender<ReadyWorker>,
    stop_rx: watch::Receiver<bool>,
    results_tx: mpsc::Sender<Execution>,
    debug_duration: bool,
}

impl Worker {
    pub fn new(
        id: usize,
        ready_tx: mpsc::Sender<ReadyWorker>,
        stop_rx: watch::Receiver<bool>,
        results_tx: mpsc::Sender<Execution>,
        debug_duration: bool,
    ) -> Self {
        Self {
            id,
            ready_tx,
            stop_rx,
            results_tx,
            debug_duration,
        }
    }

    /// Advertise the mailbox, wait for one item, run it, repeat until stopped.
    pub async fn run(mut self) {
        let (mailbox_tx, mut mailbox_rx) = mpsc::channel(1);

        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            let ready = ReadyWorker {
                id: self.id,
                mailbox: mailbox_tx.clone(),
            };
            if self.ready_tx.send(ready).await.is_err() {
                break;
            }

            tokio::select! {
                biased;
                item = mailbox_rx.recv() => match item {
                    Some(item) => self.execute(item).await,
                    None => break,
                },
                _ = self.stop_rx.changed() => break,
            }
        }

        info!(worker = self.id, "worker is stopping");
    }

    async fn execute(&self, item: WorkItem) {
        let WorkItem { ctx, target, check } = item;

        // The check is polled first so it can decline a target even when
        // the context has already fired; its own I/O observes `ctx`.
        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            out = AssertUnwindSafe(check.run(&ctx, &target)).catch_unwind() => Ok(out),
            err = ctx.done() => Err(err),
        };
        let elapsed = start.elapsed();

        let mut result = match outcome {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => return,
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(
                    worker = self.id,
                    name = check.name(),
                    target = %target,
                    "check panicked: {}",
                    message
                );
                CheckResult::failed(vec![target.host.clone()], CheckError::Internal(message))
            }
            Err(e) => CheckResult::failed(vec![target.host.clone()], e),
        };

        result.worker_id = self.id;
        result.timed_out = result
            .error
            .as_ref()
            .is_some_and(CheckError::is_cancellation);

        match result.duration {
            None => result.duration = Some(elapsed),
            Some(own) if self.debug_duration => info!(
                name = check.name(),
                host = %target.host,
                port = target.port,
                check_duration = ?own,
                execution_duration = ?elapsed,
                "debug duration"
            ),
            Some(_) => {}
        }

        let execution = Execution {
            check,
            target,
            result,
        };
        if self.results_tx.send(execution).await.is_err() {
            debug!(worker = self.id, "result pipeline closed, dropping execution");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
