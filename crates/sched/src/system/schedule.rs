use super::{
    ConfigId, IntoSystemConfigs, System, SystemConfig, SystemFn, SystemId, SystemMeta,
    SystemName, SystemStorage, executor::{RunMode, SystemExecutor},
};
use crate::core::{Context, DependencyGraph, Frame, GraphError, IndexDag, IndexMap};
use foldhash::fast::RandomState;
use hashbrown::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleBuildError {
    #[error("Cyclic dependency detected: {0:?}")]
    CyclicDependency(Vec<SystemName>),

    #[error("System {system} depends on a system that is not part of the schedule")]
    UnknownDependency { system: SystemName },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Declared systems and their ordering, before validation.
pub struct Schedule {
    mode: RunMode,
    configs: Vec<SystemConfig>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(RunMode::default())
    }
}

impl Schedule {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            configs: vec![],
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn add_systems<M>(&mut self, systems: impl IntoSystemConfigs<M>) -> &mut Self {
        self.configs.extend(systems.configs().flatten());
        self
    }

    /// Validates the declared ordering and creates the executor for the
    /// schedule's [`RunMode`].
    pub fn build(self) -> Result<Systems, ScheduleBuildError> {
        let mut dag = IndexDag::new();
        let mut ids = HashMap::<ConfigId, SystemId, RandomState>::default();

        for config in &self.configs {
            ids.insert(config.id(), dag.add_node(config.id()));
        }

        let configs = self.configs;
        for (index, config) in configs.iter().enumerate() {
            let dependent = SystemId::new(index);
            for dependency in config.dependencies() {
                let Some(&dependency) = ids.get(dependency) else {
                    return Err(ScheduleBuildError::UnknownDependency {
                        system: config.name().clone(),
                    });
                };

                dag.add_dependency(dependency, dependent)?;
            }
        }

        let graph = match dag.freeze() {
            Ok((_, graph)) => graph,
            Err(GraphError::CyclicDependency(cycle)) => {
                let names = cycle
                    .iter()
                    .map(|id| configs[id.index()].name().clone())
                    .collect();

                return Err(ScheduleBuildError::CyclicDependency(names));
            }
            Err(error) => return Err(error.into()),
        };

        let mut names = IndexMap::with_capacity(configs.len());
        let systems = configs
            .into_iter()
            .enumerate()
            .map(|(index, config)| {
                let id = SystemId::new(index);
                let (name, run) = config.into_parts();
                names.entry(name.clone()).or_insert(id);
                System::new(SystemMeta { id, name }, run)
            })
            .collect();

        let storage = Arc::new(SystemStorage::new(systems));
        let graph = Arc::new(graph);

        let mut executor = self.mode.create_executor(graph.clone());
        executor.initialize(&storage);

        let step: Arc<SystemFn> = {
            let storage = storage.clone();
            Arc::new(move |id: SystemId, ctx: &dyn Context| storage.run(id, ctx))
        };

        tracing::debug!(
            mode = ?self.mode,
            systems = graph.len(),
            edges = graph.edge_count(),
            independent = graph.independent().len(),
            "schedule built"
        );

        Ok(Systems {
            mode: self.mode,
            storage,
            graph,
            executor,
            names,
            step,
        })
    }
}

/// A built schedule, ready to run one tick at a time.
pub struct Systems {
    mode: RunMode,
    storage: Arc<SystemStorage>,
    graph: Arc<DependencyGraph>,
    executor: Box<dyn SystemExecutor>,
    names: IndexMap<SystemName, SystemId>,
    step: Arc<SystemFn>,
}

impl Systems {
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn storage(&self) -> &SystemStorage {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn frame(&self) -> Frame {
        self.executor.frame()
    }

    pub fn id_of(&self, name: &str) -> Option<SystemId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: SystemId) -> Option<&str> {
        self.storage.get(id).map(System::name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.storage.iter().map(System::name)
    }

    /// Runs every declared system once.
    pub fn run(&mut self, ctx: &Arc<dyn Context>) {
        self.executor.execute(ctx, &self.step);
    }

    /// Runs one tick with a custom step function instead of the declared
    /// system bodies.
    pub fn run_with(&mut self, ctx: &Arc<dyn Context>, f: &Arc<SystemFn>) {
        self.executor.execute(ctx, f);
    }
}
