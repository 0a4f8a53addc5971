// src/pipeline/mod.rs
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::checks::Execution;
use crate::context::Context;

/// Bounded queue between workers and the single reporting task.
pub fn channel(capacity: usize) -> (mpsc::Sender<Execution>, ResultPipeline) {
    let (results_tx, results_rx) = mpsc::channel(capacity.max(1));
    (results_tx, ResultPipeline { results_rx })
}

/// Sole consumer of finished executions and sole writer of check metrics.
pub struct ResultPipeline {
    results_rx: mpsc::Receiver<Execution>,
}

impl ResultPipeline {
    /// Report executions in completion order until `ctx` is cancelled or
    /// every sender is gone. Returns how many executions were handled.
    pub async fn run(mut self, ctx: Context) -> usize {
        let mut handled = 0;
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                execution = self.results_rx.recv() => match execution {
                    Some(execution) => {
                        handle(&execution);
                        handled += 1;
                    }
                    None => break,
                },
            }
        }
        info!(handled, "result pipeline stopped");
        handled
    }
}

fn handle(execution: &Execution) {
    let name = execution.check.name();
    match catch_unwind(AssertUnwindSafe(|| execution.check.report(execution))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(name, target = %execution.target, "failed to report result: {}", e),
        Err(_) => error!(name, target = %execution.target, "reporting panicked"),
    }
}
