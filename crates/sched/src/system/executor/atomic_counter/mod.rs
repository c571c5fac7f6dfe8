use super::{SystemExecutor, SystemFn};
use crate::{
    core::{Context, DependencyGraph, Frame},
    system::{SystemId, SystemStorage},
};
use std::sync::Arc;

pub mod blocker;
pub mod task_group;

pub use blocker::*;
pub use task_group::*;

/// Parallel executor driven by per-system atomic countdowns.
///
/// Every tick the independent systems are submitted to the context. Each
/// completing system decrements the counters of its dependents and submits
/// the ones that reach zero, so work flows through the graph without a
/// central coordinator. The calling thread sleeps on a [`CounterBlocker`]
/// until the last system completes.
pub struct AtomicCounterExecutor {
    task_group: Arc<TaskGroup>,
    frame: Frame,
}

impl AtomicCounterExecutor {
    pub fn new(graph: Arc<DependencyGraph>) -> Self {
        Self {
            task_group: Arc::new(TaskGroup::new(graph)),
            frame: Frame::ZERO,
        }
    }

    pub fn task_group(&self) -> &TaskGroup {
        &self.task_group
    }

    pub fn independent(&self) -> &[SystemId] {
        self.task_group.graph().independent()
    }

    fn reset(&self) {
        self.task_group.reset();
    }

    fn start_execution(
        &self,
        blocker: &Arc<CounterBlocker>,
        ctx: &Arc<dyn Context>,
        f: &Arc<SystemFn>,
    ) {
        for &id in self.independent() {
            self.task_group.submit(blocker, id, ctx, f);
        }
    }
}

impl SystemExecutor for AtomicCounterExecutor {
    fn initialize(&mut self, storage: &SystemStorage) {
        debug_assert_eq!(storage.len(), self.task_group.len());
        self.reset();

        tracing::debug!(
            systems = storage.len(),
            independent = self.independent().len(),
            "atomic counter executor initialized"
        );
    }

    fn execute(&mut self, ctx: &Arc<dyn Context>, f: &Arc<SystemFn>) {
        let _span = tracing::trace_span!("tick", frame = self.frame.get()).entered();

        self.reset();

        let blocker = Arc::new(CounterBlocker::new(self.task_group.len()));
        blocker.execute_and_wait_until_zero(|| self.start_execution(&blocker, ctx, f));

        self.frame += 1;

        if let Some(payload) = self.task_group.take_panic() {
            std::panic::resume_unwind(payload);
        }
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}
