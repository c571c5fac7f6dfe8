use crate::core::Context;
use std::{borrow::Cow, fmt};

pub mod config;
pub mod executor;
pub mod schedule;

pub use config::*;
pub use executor::*;
pub use schedule::*;

pub type SystemName = Cow<'static, str>;

/// Body of a declared system, invoked once per tick.
pub type SystemRun = Box<dyn Fn(&dyn Context) + Send + Sync>;

/// Dense index of a system inside its schedule.
///
/// Ids are assigned in declaration order starting at zero and index every
/// per-system array of the graph and the executors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u32);

impl SystemId {
    pub fn new(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => Self(index),
            Err(_) => panic!("System index {index} exceeds the id space"),
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<SystemId> for usize {
    fn from(value: SystemId) -> Self {
        value.index()
    }
}

pub struct SystemMeta {
    pub id: SystemId,
    pub name: SystemName,
}

pub struct System {
    meta: SystemMeta,
    run: SystemRun,
}

impl System {
    pub fn new(meta: SystemMeta, run: SystemRun) -> Self {
        Self { meta, run }
    }

    pub fn meta(&self) -> &SystemMeta {
        &self.meta
    }

    pub fn id(&self) -> SystemId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn run(&self, ctx: &dyn Context) {
        (self.run)(ctx)
    }
}

/// The declared systems of a schedule, indexed by [`SystemId`].
pub struct SystemStorage {
    systems: Box<[System]>,
}

impl SystemStorage {
    pub fn new(systems: Vec<System>) -> Self {
        Self {
            systems: systems.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn get(&self, id: SystemId) -> Option<&System> {
        self.systems.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &System> {
        self.systems.iter()
    }

    pub fn run(&self, id: SystemId, ctx: &dyn Context) {
        self.systems[id.index()].run(ctx)
    }
}

impl Default for SystemStorage {
    fn default() -> Self {
        Self::new(vec![])
    }
}
