use crate::system::SystemId;
use fixedbitset::FixedBitSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Cyclic dependency detected: {0:?}")]
    CyclicDependency(Vec<SystemId>),

    #[error("Unknown system: {0}")]
    UnknownSystem(SystemId),

    #[error("System {0} cannot depend on itself")]
    SelfDependency(SystemId),
}

/// Mutable dependency graph used while systems are being declared.
///
/// Nodes are addressed by the [`SystemId`] returned from [`IndexDag::add_node`].
/// Once every edge is known the dag is frozen into a [`DependencyGraph`].
pub struct IndexDag<N> {
    nodes: Vec<N>,
    dependents: Vec<FixedBitSet>,
    dependencies: Vec<FixedBitSet>,
    topology: Vec<SystemId>,
    is_dirty: bool,
}

impl<N> IndexDag<N> {
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            dependents: vec![],
            dependencies: vec![],
            topology: vec![],
            is_dirty: false,
        }
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn topology(&self) -> &[SystemId] {
        &self.topology
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dependency_count(&self, id: SystemId) -> usize {
        self.dependencies
            .get(id.index())
            .map_or(0, |dependencies| dependencies.count_ones(..))
    }

    pub fn add_node(&mut self, node: N) -> SystemId {
        let id = SystemId::new(self.nodes.len());
        self.nodes.push(node);
        self.dependencies.push(FixedBitSet::new());
        self.dependents.push(FixedBitSet::new());
        self.is_dirty = true;

        id
    }

    /// Declares that `dependent` must run after `dependency`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_dependency(
        &mut self,
        dependency: SystemId,
        dependent: SystemId,
    ) -> Result<bool, GraphError> {
        self.check(dependency)?;
        self.check(dependent)?;

        if dependency == dependent {
            return Err(GraphError::SelfDependency(dependent));
        }

        let dependents = &mut self.dependents[dependency.index()];
        dependents.grow(dependent.index() + 1);
        if dependents.put(dependent.index()) {
            return Ok(false);
        }

        let dependencies = &mut self.dependencies[dependent.index()];
        dependencies.grow(dependency.index() + 1);
        dependencies.insert(dependency.index());
        self.is_dirty = true;

        Ok(true)
    }

    pub fn remove_dependency(&mut self, dependency: SystemId, dependent: SystemId) -> bool {
        let (from, to) = (dependency.index(), dependent.index());
        let exists = self
            .dependents
            .get(from)
            .is_some_and(|dependents| dependents.contains(to));

        if exists {
            self.dependents[from].set(to, false);
            self.dependencies[to].set(from, false);
            self.is_dirty = true;
        }

        exists
    }

    /// Computes a topological order, failing with the ids along the first
    /// cycle found.
    pub fn build(&mut self) -> Result<&[SystemId], GraphError> {
        if self.is_dirty {
            struct Trace {
                path: Vec<usize>,
                closed: bool,
            }

            fn visit(
                index: usize,
                dependents: &[FixedBitSet],
                visited: &mut FixedBitSet,
                stack: &mut FixedBitSet,
                order: &mut Vec<usize>,
            ) -> Result<(), Trace> {
                if stack.contains(index) {
                    return Err(Trace {
                        path: vec![index],
                        closed: false,
                    });
                }

                if visited.contains(index) {
                    return Ok(());
                }

                visited.insert(index);
                stack.insert(index);

                for dependent in dependents[index].ones() {
                    if let Err(mut trace) = visit(dependent, dependents, visited, stack, order) {
                        if !trace.closed {
                            if trace.path[0] == index {
                                trace.closed = true;
                            } else {
                                trace.path.push(index);
                            }
                        }

                        return Err(trace);
                    }
                }

                stack.set(index, false);
                order.push(index);
                Ok(())
            }

            let len = self.nodes.len();
            let mut order = Vec::with_capacity(len);
            let mut visited = FixedBitSet::with_capacity(len);
            let mut stack = FixedBitSet::with_capacity(len);

            for index in 0..len {
                if visited.contains(index) {
                    continue;
                }

                if let Err(trace) =
                    visit(index, &self.dependents, &mut visited, &mut stack, &mut order)
                {
                    let mut cycle = trace.path;
                    cycle.reverse();
                    cycle.rotate_right(1);

                    return Err(GraphError::CyclicDependency(
                        cycle.into_iter().map(SystemId::new).collect(),
                    ));
                }
            }

            order.reverse();
            self.topology = order.into_iter().map(SystemId::new).collect();
            self.is_dirty = false;
        }

        Ok(&self.topology)
    }

    /// Validates the dag and splits it into its nodes and the immutable
    /// [`DependencyGraph`] shared by the executors.
    pub fn freeze(mut self) -> Result<(Vec<N>, DependencyGraph), GraphError> {
        self.build()?;

        let len = self.nodes.len();
        let mut dependencies = Vec::new();
        let mut dependency_offsets = Vec::with_capacity(len + 1);
        let mut dependents = Vec::new();
        let mut dependent_offsets = Vec::with_capacity(len + 1);
        let mut independent = Vec::new();

        dependency_offsets.push(0);
        dependent_offsets.push(0);

        for index in 0..len {
            dependencies.extend(self.dependencies[index].ones().map(SystemId::new));
            dependency_offsets.push(dependencies.len());

            dependents.extend(self.dependents[index].ones().map(SystemId::new));
            dependent_offsets.push(dependents.len());

            if dependency_offsets[index] == dependency_offsets[index + 1] {
                independent.push(SystemId::new(index));
            }
        }

        let graph = DependencyGraph {
            dependencies: dependencies.into_boxed_slice(),
            dependency_offsets: dependency_offsets.into_boxed_slice(),
            dependents: dependents.into_boxed_slice(),
            dependent_offsets: dependent_offsets.into_boxed_slice(),
            independent: independent.into_boxed_slice(),
            topology: self.topology.into_boxed_slice(),
        };

        Ok((self.nodes, graph))
    }

    fn check(&self, id: SystemId) -> Result<(), GraphError> {
        match id.index() < self.nodes.len() {
            true => Ok(()),
            false => Err(GraphError::UnknownSystem(id)),
        }
    }
}

impl<N> Default for IndexDag<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, validated dependency graph.
///
/// Both edge directions are stored as flat arenas of [`SystemId`] sliced per
/// system by an offset table, so a lookup never allocates and the whole graph
/// can be shared read-only between worker threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    dependencies: Box<[SystemId]>,
    dependency_offsets: Box<[usize]>,
    dependents: Box<[SystemId]>,
    dependent_offsets: Box<[usize]>,
    independent: Box<[SystemId]>,
    topology: Box<[SystemId]>,
}

impl DependencyGraph {
    pub fn len(&self) -> usize {
        self.dependency_offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> impl ExactSizeIterator<Item = SystemId> + use<> {
        (0..self.len()).map(SystemId::new)
    }

    /// Direct dependencies of `id`, in ascending id order.
    pub fn dependencies(&self, id: SystemId) -> &[SystemId] {
        let index = id.index();
        &self.dependencies[self.dependency_offsets[index]..self.dependency_offsets[index + 1]]
    }

    /// Systems waiting on `id`, in ascending id order.
    pub fn dependents(&self, id: SystemId) -> &[SystemId] {
        let index = id.index();
        &self.dependents[self.dependent_offsets[index]..self.dependent_offsets[index + 1]]
    }

    /// The in-degree of `id`.
    pub fn dependency_count(&self, id: SystemId) -> usize {
        let index = id.index();
        self.dependency_offsets[index + 1] - self.dependency_offsets[index]
    }

    /// Systems without dependencies, the entry points of every tick.
    pub fn independent(&self) -> &[SystemId] {
        &self.independent
    }

    pub fn topology(&self) -> &[SystemId] {
        &self.topology
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.len()
    }
}
