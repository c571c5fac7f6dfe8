use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use sched::{
    AtomicCounterExecutor, Context, DependencyGraph, IndexDag, SequentialExecutor, SystemExecutor,
    SystemFn, SystemId,
};
use std::sync::{
    Arc, Mutex, OnceLock,
    atomic::{AtomicUsize, Ordering},
};

const MAX_SYSTEMS: usize = 24;

/// A random acyclic graph. Edges only point from lower to higher indices.
#[derive(Debug, Clone)]
struct RandomDag {
    len: usize,
    edges: Vec<(usize, usize)>,
}

impl Arbitrary for RandomDag {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % (MAX_SYSTEMS + 1);
        let density = u8::arbitrary(g) % 4 + 1;

        let mut edges = vec![];
        for to in 0..len {
            for from in 0..to {
                if u8::arbitrary(g) % 8 < density {
                    edges.push((from, to));
                }
            }
        }

        Self { len, edges }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let len = self.len;
        let edges = self.edges.clone();
        let fewer_edges = (0..edges.len()).map(move |skip| {
            let mut edges = edges.clone();
            edges.remove(skip);
            Self { len, edges }
        });

        let fewer_systems = (len > 0).then(|| Self {
            len: len - 1,
            edges: self
                .edges
                .iter()
                .copied()
                .filter(|&(_, to)| to < len - 1)
                .collect(),
        });

        Box::new(fewer_systems.into_iter().chain(fewer_edges))
    }
}

impl RandomDag {
    fn graph(&self) -> Arc<DependencyGraph> {
        let mut dag = IndexDag::new();
        for _ in 0..self.len {
            dag.add_node(());
        }

        for &(from, to) in &self.edges {
            dag.add_dependency(SystemId::new(from), SystemId::new(to))
                .expect("edges point at existing systems");
        }

        let (_, graph) = dag.freeze().expect("edges only point forward");
        Arc::new(graph)
    }
}

fn context() -> Arc<dyn Context> {
    static POOL: OnceLock<Arc<dyn Context>> = OnceLock::new();
    POOL.get_or_init(|| Arc::new(threadpool::ThreadPool::with_name("properties".into(), 4)))
        .clone()
}

/// Per tick, every system records its start and finish on a shared clock.
struct Trace {
    clock: AtomicUsize,
    started: Vec<AtomicUsize>,
    finished: Vec<AtomicUsize>,
    runs: Vec<AtomicUsize>,
}

impl Trace {
    fn new(len: usize) -> Arc<Self> {
        let slots = || (0..len).map(|_| AtomicUsize::new(0)).collect();
        Arc::new(Self {
            clock: AtomicUsize::new(0),
            started: slots(),
            finished: slots(),
            runs: slots(),
        })
    }

    fn step(self: &Arc<Self>) -> Arc<SystemFn> {
        let trace = self.clone();
        Arc::new(move |id: SystemId, _: &dyn Context| {
            let index = id.index();
            trace.started[index].store(trace.clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            trace.runs[index].fetch_add(1, Ordering::SeqCst);
            std::thread::yield_now();
            trace.finished[index].store(trace.clock.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
        })
    }

    fn ran_exactly(&self, ticks: usize) -> bool {
        self.runs
            .iter()
            .all(|runs| runs.load(Ordering::SeqCst) == ticks)
    }

    fn respects(&self, graph: &DependencyGraph) -> bool {
        graph.ids().all(|id| {
            let started = self.started[id.index()].load(Ordering::SeqCst);
            graph
                .dependencies(id)
                .iter()
                .all(|dep| self.finished[dep.index()].load(Ordering::SeqCst) < started)
        })
    }
}

#[quickcheck]
fn every_system_runs_once_per_tick(dag: RandomDag) -> bool {
    let mut executor = AtomicCounterExecutor::new(dag.graph());
    let trace = Trace::new(dag.len);
    let step = trace.step();
    let ctx = context();

    (1..=3).all(|tick| {
        executor.execute(&ctx, &step);
        trace.ran_exactly(tick)
    })
}

#[quickcheck]
fn dependencies_finish_before_dependents_start(dag: RandomDag) -> bool {
    let graph = dag.graph();
    let mut executor = AtomicCounterExecutor::new(graph.clone());
    let ctx = context();

    (0..3).all(|_| {
        let trace = Trace::new(dag.len);
        executor.execute(&ctx, &trace.step());
        trace.respects(&graph)
    })
}

#[quickcheck]
fn transitive_dependencies_finish_first(dag: RandomDag) -> bool {
    let graph = dag.graph();
    let mut executor = AtomicCounterExecutor::new(graph.clone());
    let trace = Trace::new(dag.len);
    executor.execute(&context(), &trace.step());

    // Walks every ancestor of every system, not only the direct edges.
    graph.ids().all(|id| {
        let started = trace.started[id.index()].load(Ordering::SeqCst);
        let mut stack = graph.dependencies(id).to_vec();
        let mut seen = vec![false; graph.len()];

        while let Some(ancestor) = stack.pop() {
            if std::mem::replace(&mut seen[ancestor.index()], true) {
                continue;
            }

            if trace.finished[ancestor.index()].load(Ordering::SeqCst) >= started {
                return false;
            }

            stack.extend_from_slice(graph.dependencies(ancestor));
        }

        true
    })
}

#[quickcheck]
fn counters_drain_each_tick_and_reset(dag: RandomDag) -> bool {
    let graph = dag.graph();
    let mut executor = AtomicCounterExecutor::new(graph.clone());
    let step: Arc<SystemFn> = Arc::new(|_: SystemId, _: &dyn Context| {});
    executor.execute(&context(), &step);

    let group = executor.task_group();
    graph.ids().all(|id| group.remaining(id) == 0) && {
        group.reset();
        group.is_reset()
    }
}

#[quickcheck]
fn sequential_order_is_a_topological_order(dag: RandomDag) -> bool {
    let graph = dag.graph();
    let mut executor = SequentialExecutor::new(graph.clone());
    let order = Arc::new(Mutex::new(Vec::with_capacity(dag.len)));
    let step: Arc<SystemFn> = {
        let order = order.clone();
        Arc::new(move |id: SystemId, _: &dyn Context| order.lock().unwrap().push(id))
    };

    executor.execute(&context(), &step);

    let order = order.lock().unwrap();
    let mut position = vec![usize::MAX; dag.len];
    for (index, id) in order.iter().enumerate() {
        position[id.index()] = index;
    }

    order.len() == dag.len
        && dag
            .edges
            .iter()
            .all(|&(from, to)| position[from] < position[to])
}
