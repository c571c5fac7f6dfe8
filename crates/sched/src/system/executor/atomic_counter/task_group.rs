use super::CounterBlocker;
use crate::{
    core::{Context, DependencyGraph},
    system::{PanicPayload, SystemFn, SystemId, run_system},
};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

/// Per-tick countdown state of every system.
///
/// Each counter starts a tick at its system's in-degree and is decremented by
/// every completing dependency. The decrement that brings a counter to zero
/// owns the submission of that system, which makes submission exactly-once
/// without any lock on the hot path.
pub struct TaskGroup {
    graph: Arc<DependencyGraph>,
    counters: Box<[AtomicUsize]>,
    panic: Mutex<Option<PanicPayload>>,
}

impl TaskGroup {
    pub fn new(graph: Arc<DependencyGraph>) -> Self {
        let counters = graph
            .ids()
            .map(|id| AtomicUsize::new(graph.dependency_count(id)))
            .collect();

        Self {
            graph,
            counters,
            panic: Mutex::new(None),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Re-arms every counter with its system's in-degree.
    ///
    /// Must not overlap with a running tick.
    pub fn reset(&self) {
        for (id, counter) in self.graph.ids().zip(self.counters.iter()) {
            counter.store(self.graph.dependency_count(id), Ordering::Release);
        }
    }

    /// Unfinished dependencies of `id` in the current tick.
    pub fn remaining(&self, id: SystemId) -> usize {
        self.counters[id.index()].load(Ordering::Acquire)
    }

    /// Whether every counter holds its system's in-degree.
    pub fn is_reset(&self) -> bool {
        self.graph
            .ids()
            .all(|id| self.remaining(id) == self.graph.dependency_count(id))
    }

    /// Takes the first panic raised by a system since the last call.
    pub fn take_panic(&self) -> Option<PanicPayload> {
        self.panic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Runs system `id` on the calling thread, then notifies its dependents.
    ///
    /// Every dependent whose counter drops to zero is submitted to `ctx`.
    /// Finally the blocker is decremented, releasing the tick when this was
    /// the last system to complete.
    pub fn start_from_task_id(
        self: &Arc<Self>,
        blocker: &Arc<CounterBlocker>,
        id: SystemId,
        ctx: &Arc<dyn Context>,
        f: &Arc<SystemFn>,
    ) {
        if let Some(payload) = run_system(f.as_ref(), id, ctx.as_ref()) {
            self.panic
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(payload);
        }

        for &dependent in self.graph.dependents(id) {
            let previous = self.counters[dependent.index()].fetch_sub(1, Ordering::AcqRel);
            debug_assert!(previous > 0, "dependency counter of {dependent} underflowed");

            if previous == 1 {
                tracing::trace!(system = %dependent, after = %id, "system ready");
                self.submit(blocker, dependent, ctx, f);
            }
        }

        blocker.decrement_and_check();
    }

    /// Hands `start_from_task_id(id)` to the thread pool.
    pub fn submit(
        self: &Arc<Self>,
        blocker: &Arc<CounterBlocker>,
        id: SystemId,
        ctx: &Arc<dyn Context>,
        f: &Arc<SystemFn>,
    ) {
        let group = self.clone();
        let blocker = blocker.clone();
        let context = ctx.clone();
        let f = f.clone();

        ctx.submit(Box::new(move || {
            group.start_from_task_id(&blocker, id, &context, &f)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::TaskGroup;
    use crate::{
        core::{Context, IndexDag, Work},
        system::{CounterBlocker, SystemFn, SystemId},
    };
    use std::sync::{Arc, Mutex};

    /// Queues work instead of running it, so tests can step through a tick.
    #[derive(Default)]
    struct Queue(Mutex<Vec<Work>>);

    impl Queue {
        fn drain(&self) -> Vec<Work> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Context for Queue {
        fn submit(&self, work: Work) {
            self.0.lock().unwrap().push(work);
        }
    }

    fn diamond() -> (Arc<TaskGroup>, [SystemId; 4]) {
        let mut dag = IndexDag::new();
        let a = dag.add_node(());
        let b = dag.add_node(());
        let c = dag.add_node(());
        let d = dag.add_node(());
        dag.add_dependency(a, b).unwrap();
        dag.add_dependency(a, c).unwrap();
        dag.add_dependency(b, d).unwrap();
        dag.add_dependency(c, d).unwrap();

        let (_, graph) = dag.freeze().unwrap();
        (Arc::new(TaskGroup::new(Arc::new(graph))), [a, b, c, d])
    }

    #[test]
    fn counters_start_at_in_degree() {
        let (group, [a, b, c, d]) = diamond();
        assert_eq!(group.len(), 4);
        assert_eq!(group.remaining(a), 0);
        assert_eq!(group.remaining(b), 1);
        assert_eq!(group.remaining(c), 1);
        assert_eq!(group.remaining(d), 2);
        assert!(group.is_reset());
    }

    #[test]
    fn completion_submits_ready_dependents() {
        let (group, [a, b, c, d]) = diamond();
        let queue = Arc::new(Queue::default());
        let ctx: Arc<dyn Context> = queue.clone();
        let ran = Arc::new(Mutex::new(vec![]));
        let f: Arc<SystemFn> = {
            let ran = ran.clone();
            Arc::new(move |id: SystemId, _: &dyn Context| ran.lock().unwrap().push(id))
        };
        let blocker = Arc::new(CounterBlocker::new(group.len()));

        group.start_from_task_id(&blocker, a, &ctx, &f);
        assert_eq!(group.remaining(b), 0);
        assert_eq!(group.remaining(c), 0);
        assert_eq!(group.remaining(d), 2);
        assert_eq!(blocker.remaining(), 3);

        let mut ready = queue.drain();
        assert_eq!(ready.len(), 2);

        ready.remove(0)();
        assert_eq!(group.remaining(d), 1);
        assert!(queue.drain().is_empty());

        ready.remove(0)();
        assert_eq!(group.remaining(d), 0);

        let mut last = queue.drain();
        assert_eq!(last.len(), 1);
        assert!(!blocker.is_complete());

        last.remove(0)();
        assert!(blocker.is_complete());
        assert_eq!(*ran.lock().unwrap(), vec![a, b, c, d]);
    }

    #[test]
    fn reset_clears_residual_state() {
        let (group, [a, _, _, d]) = diamond();
        let ctx: Arc<dyn Context> = Arc::new(Queue::default());
        let f: Arc<SystemFn> = Arc::new(|_: SystemId, _: &dyn Context| {});
        let blocker = Arc::new(CounterBlocker::new(group.len()));

        group.start_from_task_id(&blocker, a, &ctx, &f);
        assert!(!group.is_reset());

        group.reset();
        assert!(group.is_reset());
        assert_eq!(group.remaining(d), 2);
    }

    #[test]
    fn panicking_system_still_notifies_dependents() {
        let (group, [a, b, c, _]) = diamond();
        let queue = Arc::new(Queue::default());
        let ctx: Arc<dyn Context> = queue.clone();
        let f: Arc<SystemFn> = Arc::new(move |id: SystemId, _: &dyn Context| {
            if id == a {
                panic!("system failure");
            }
        });
        let blocker = Arc::new(CounterBlocker::new(group.len()));

        group.start_from_task_id(&blocker, a, &ctx, &f);

        assert_eq!(group.remaining(b), 0);
        assert_eq!(group.remaining(c), 0);
        assert_eq!(queue.drain().len(), 2);
        assert_eq!(blocker.remaining(), 3);

        let payload = group.take_panic().expect("panic recorded");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"system failure"));
        assert!(group.take_panic().is_none());
    }
}
