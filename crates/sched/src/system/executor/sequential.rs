use super::{PanicPayload, SystemExecutor, SystemFn, run_system};
use crate::{
    core::{Context, DependencyGraph, Frame},
    system::SystemStorage,
};
use std::sync::Arc;

/// Runs every system on the calling thread in topological order.
pub struct SequentialExecutor {
    graph: Arc<DependencyGraph>,
    frame: Frame,
}

impl SequentialExecutor {
    pub fn new(graph: Arc<DependencyGraph>) -> Self {
        Self {
            graph,
            frame: Frame::ZERO,
        }
    }
}

impl SystemExecutor for SequentialExecutor {
    fn initialize(&mut self, storage: &SystemStorage) {
        debug_assert_eq!(storage.len(), self.graph.len());
        tracing::debug!(systems = storage.len(), "sequential executor initialized");
    }

    fn execute(&mut self, ctx: &Arc<dyn Context>, f: &Arc<SystemFn>) {
        let mut panic: Option<PanicPayload> = None;

        for &id in self.graph.topology() {
            if let Some(payload) = run_system(f.as_ref(), id, ctx.as_ref()) {
                panic.get_or_insert(payload);
            }
        }

        self.frame += 1;

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}
