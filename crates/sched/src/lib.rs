//! Parallel per-tick system scheduling over a static dependency graph.
//!
//! Systems are declared on a [`Schedule`] with `before`/`after` ordering,
//! validated into a [`DependencyGraph`] and run once per tick by the executor
//! picked through [`RunMode`]. The default [`AtomicCounterExecutor`] keeps one
//! atomic countdown per system: a completing system decrements the counters
//! of its dependents and submits every dependent that reaches zero, while the
//! calling thread sleeps on a [`CounterBlocker`] until the tick is done.

pub mod core;
pub mod settings;
pub mod system;

pub use crate::core::{
    Context, DependencyGraph, FixedBitSet, Frame, GraphError, IndexDag, IndexMap, TaskPool,
    TaskPoolBuilder, Work, ext,
};
pub use settings::{SchedulerSettings, SettingsError};
pub use system::{
    AtomicCounterExecutor, CounterBlocker, IntoSystemConfig, IntoSystemConfigs, RunMode, Schedule,
    ScheduleBuildError, SequentialExecutor, System, SystemConfig, SystemConfigs, SystemExecutor,
    SystemFn, SystemId, SystemMeta, SystemName, SystemStorage, Systems, TaskGroup, schedule,
};

pub mod prelude {
    pub use super::*;
}
