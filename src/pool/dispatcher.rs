// src/pool/dispatcher.rs
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::worker::{ReadyWorker, Worker, WorkItem};
use crate::checks::Execution;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher is stopped")]
    Stopped,
}

/// Fixed-size worker pool fed through point-to-point handoff.
///
/// Idle workers post their mailbox to a ready queue; the dispatch loop pairs
/// each submitted item with the next idle mailbox. A worker therefore holds
/// at most one item, and `submit` waits while every worker is busy.
pub struct Dispatcher {
    work_tx: mpsc::Sender<WorkItem>,
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    workers: usize,
}

impl Dispatcher {
    /// Spawn `workers` workers and the dispatch loop. Finished executions
    /// are sent to `results_tx`.
    pub fn start(workers: usize, results_tx: mpsc::Sender<Execution>, debug_duration: bool) -> Self {
        let workers = workers.max(1);
        let (work_tx, work_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = mpsc::channel(workers);
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut tasks = Vec::with_capacity(workers + 1);
        for id in 1..=workers {
            info!(worker = id, "starting worker");
            let worker = Worker::new(
                id,
                ready_tx.clone(),
                stop_rx.clone(),
                results_tx.clone(),
                debug_duration,
            );
            tasks.push(tokio::spawn(worker.run()));
        }
        drop(ready_tx);

        tasks.push(tokio::spawn(dispatch(work_rx, ready_rx, stop_rx)));

        Self {
            work_tx,
            stop_tx,
            tasks,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hand `item` to the pool, waiting while all workers are busy.
    pub async fn submit(&self, item: WorkItem) -> Result<(), DispatchError> {
        if self.is_stopped() {
            return Err(DispatchError::Stopped);
        }
        self.work_tx
            .send(item)
            .await
            .map_err(|_| DispatchError::Stopped)
    }

    /// Stop accepting work. Workers exit after finishing their current item.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            info!("dispatcher is stopping");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stop and wait for every worker to exit.
    pub async fn join(self) {
        self.stop();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("pool task failed: {}", e);
            }
        }
    }
}

async fn dispatch(
    mut work_rx: mpsc::Receiver<WorkItem>,
    mut ready_rx: mpsc::Receiver<ReadyWorker>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            item = work_rx.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let worker = tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                debug!(check = item.check.name(), target = %item.target, "dropping work item, dispatcher stopping");
                break;
            }
            worker = ready_rx.recv() => match worker {
                Some(worker) => worker,
                None => break,
            },
        };

        if worker.mailbox.send(item).await.is_err() {
            warn!(worker = worker.id, "worker mailbox closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::report::testing::RecordingSink;
    use crate::checks::{Check, CheckError, CheckResult, TcpProbeCheck};
    use crate::context::{Context, RootContext};
    use crate::metrics::MetricsError;
    use crate::target::Address;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Sleeps while tracking how many runs overlap.
    #[derive(Default)]
    struct SlowCheck {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Check for SlowCheck {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self, _ctx: &Context, target: &Address) -> Option<CheckResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Some(CheckResult::new(vec![target.host.clone()], Ok(())))
        }

        fn report(&self, _execution: &crate::checks::Execution) -> Result<(), MetricsError> {
            Ok(())
        }
    }

    struct PanickingCheck;

    #[async_trait]
    impl Check for PanickingCheck {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self, _ctx: &Context, _target: &Address) -> Option<CheckResult> {
            panic!("probe exploded");
        }

        fn report(&self, _execution: &crate::checks::Execution) -> Result<(), MetricsError> {
            Ok(())
        }
    }

    /// Holds a worker until the gate hands out a permit.
    struct GatedCheck {
        gate: Semaphore,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl GatedCheck {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Check for GatedCheck {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn run(&self, _ctx: &Context, target: &Address) -> Option<CheckResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Some(CheckResult::new(vec![target.host.clone()], Ok(())))
        }

        fn report(&self, _execution: &crate::checks::Execution) -> Result<(), MetricsError> {
            Ok(())
        }
    }

    fn item(root: &RootContext, check: Arc<dyn Check>, host: &str) -> WorkItem {
        WorkItem {
            ctx: root.with_timeout(Duration::from_secs(5)),
            target: Address::new(host, None),
            check,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_pool_size_in_flight() {
        const WORKERS: usize = 2;
        const ITEMS: usize = 7;

        let root = RootContext::new();
        let (results_tx, mut results_rx) = mpsc::channel(ITEMS);
        let dispatcher = Dispatcher::start(WORKERS, results_tx, false);
        let check = Arc::new(SlowCheck::default());

        for i in 0..ITEMS {
            dispatcher
                .submit(item(&root, check.clone(), &format!("host-{i}")))
                .await
                .unwrap();
        }

        let mut workers_seen = std::collections::HashSet::new();
        for _ in 0..ITEMS {
            let execution = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(execution.result.is_success());
            assert!(execution.result.duration.is_some());
            workers_seen.insert(execution.result.worker_id);
        }

        assert!(check.max_in_flight.load(Ordering::SeqCst) <= WORKERS);
        assert!(workers_seen.iter().all(|id| (1..=WORKERS).contains(id)));
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let root = RootContext::new();
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::start(1, results_tx, false);

        dispatcher
            .submit(item(&root, Arc::new(PanickingCheck), "boom.test"))
            .await
            .unwrap();
        let execution = results_rx.recv().await.unwrap();
        match &execution.result.error {
            Some(CheckError::Internal(message)) => assert!(message.contains("probe exploded")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(execution.result.worker_id, 1);
        assert!(!execution.result.timed_out);

        // the same single worker keeps serving
        dispatcher
            .submit(item(&root, Arc::new(SlowCheck::default()), "ok.test"))
            .await
            .unwrap();
        let execution = results_rx.recv().await.unwrap();
        assert!(execution.result.is_success());
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let root = RootContext::new();
        let (results_tx, _results_rx) = mpsc::channel(1);
        let dispatcher = Dispatcher::start(1, results_tx, false);
        dispatcher.stop();

        let err = dispatcher
            .submit(item(&root, Arc::new(SlowCheck::default()), "late.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Stopped));
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn test_submit_blocks_while_pool_is_busy() {
        const WORKERS: usize = 2;

        let root = RootContext::new();
        let (results_tx, mut results_rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::start(WORKERS, results_tx, false);
        let check = GatedCheck::new();

        for i in 0..WORKERS {
            dispatcher
                .submit(item(&root, check.clone(), &format!("busy-{i}")))
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while check.in_flight.load(Ordering::SeqCst) < WORKERS {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // one item waits in the dispatch loop for a free worker, one in the
        // submission slot; anything beyond that waits in `submit`
        let mut queued = 0;
        let pending = loop {
            let next = item(&root, check.clone(), &format!("queued-{queued}"));
            let mut submit = Box::pin(dispatcher.submit(next));
            match tokio::time::timeout(Duration::from_millis(100), &mut submit).await {
                Ok(accepted) => {
                    accepted.unwrap();
                    queued += 1;
                    assert!(queued <= 2, "submit never blocked");
                }
                Err(_) => break submit,
            }
        };
        assert_eq!(queued, 2);
        assert_eq!(check.in_flight.load(Ordering::SeqCst), WORKERS);

        check.gate.add_permits(16);
        tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();

        let total = WORKERS + queued + 1;
        for _ in 0..total {
            let execution = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(execution.result.is_success());
        }
        assert_eq!(check.max_in_flight.load(Ordering::SeqCst), WORKERS);
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn test_inapplicable_check_is_silent_under_fired_context() {
        let root = RootContext::new();
        let (results_tx, mut results_rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::start(1, results_tx, false);
        let tcp: Arc<dyn Check> = Arc::new(TcpProbeCheck::new(Arc::new(RecordingSink::default())));

        let expired = root.with_timeout(Duration::from_millis(1));
        let expired_with_port = root.with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;

        dispatcher
            .submit(WorkItem {
                ctx: expired,
                target: Address::new("a.test", None),
                check: tcp.clone(),
            })
            .await
            .unwrap();

        // same target with a port still reports the expired deadline
        dispatcher
            .submit(WorkItem {
                ctx: expired_with_port,
                target: Address::new("a.test", Some(80)),
                check: tcp.clone(),
            })
            .await
            .unwrap();
        let execution = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.target.port, Some(80));
        assert!(execution.result.timed_out);
        assert!(matches!(
            execution.result.error,
            Some(CheckError::DeadlineExceeded)
        ));

        root.cancel();
        dispatcher
            .submit(WorkItem {
                ctx: root.context(),
                target: Address::new("b.test", None),
                check: tcp,
            })
            .await
            .unwrap();
        dispatcher
            .submit(item(&root, Arc::new(SlowCheck::default()), "after.test"))
            .await
            .unwrap();
        let execution = tokio::time::timeout(Duration::from_secs(5), results_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.target.host, "after.test");
        assert!(matches!(execution.result.error, Some(CheckError::Cancelled)));
        dispatcher.join().await;
    }
}
