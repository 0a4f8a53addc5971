// src/scheduler/mod.rs
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::checks::Check;
use crate::config::ScheduleConfig;
use crate::context::RootContext;
use crate::pool::{Dispatcher, WorkItem};
use crate::target::Address;

/// Fans every (target, check) pair out to the dispatcher once per interval.
pub struct Scheduler {
    targets: Vec<Address>,
    checks: Vec<Arc<dyn Check>>,
    schedule: ScheduleConfig,
}

impl Scheduler {
    pub fn new(targets: Vec<Address>, checks: Vec<Arc<dyn Check>>, schedule: ScheduleConfig) -> Self {
        Self {
            targets,
            checks,
            schedule,
        }
    }

    /// Work items for one tick, each bounded by its check's timeout.
    pub fn work_items(&self, root: &RootContext) -> Vec<WorkItem> {
        self.pairs()
            .map(|(target, check)| self.work_item(root, target, check))
            .collect()
    }

    fn pairs(&self) -> impl Iterator<Item = (&Address, &Arc<dyn Check>)> {
        self.targets
            .iter()
            .flat_map(move |target| self.checks.iter().map(move |check| (target, check)))
    }

    fn work_item(&self, root: &RootContext, target: &Address, check: &Arc<dyn Check>) -> WorkItem {
        WorkItem {
            ctx: root.with_timeout(self.schedule.timeout_for(check.name())),
            target: target.clone(),
            check: check.clone(),
        }
    }

    /// Submit one tick's items. Each item's deadline starts when it is
    /// created, right before its own submission, so waiting on the items
    /// submitted earlier in the tick is not charged to it. Time spent
    /// waiting for a free worker is. Returns how many items were submitted.
    pub async fn tick(&self, root: &RootContext, dispatcher: &Dispatcher) -> usize {
        let ctx = root.context();
        let mut submitted = 0;

        for (target, check) in self.pairs() {
            let item = self.work_item(root, target, check);
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                outcome = dispatcher.submit(item) => outcome,
            };
            match outcome {
                Ok(()) => submitted += 1,
                Err(e) => {
                    warn!(name = check.name(), target = %target, "failed to submit work item: {}", e);
                    break;
                }
            }
        }

        debug!(submitted, "tick submitted");
        submitted
    }

    /// Tick every interval until `shutdown` resolves or `root` is cancelled,
    /// then cancel `root` so in-flight work observes it. The first tick
    /// fires one interval after start. Does not wait for in-flight work.
    pub async fn run<S>(&self, root: &RootContext, dispatcher: &Dispatcher, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let ctx = root.context();
        let period = self.schedule.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval = ?period,
            targets = self.targets.len(),
            checks = self.checks.len(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ctx.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = self.tick(root, dispatcher) => {}
                    }
                }
            }
        }

        root.cancel();
        info!("scheduler stopped");
    }
}
