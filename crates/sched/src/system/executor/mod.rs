use super::{SystemId, SystemStorage};
use crate::core::{Context, DependencyGraph, Frame};
use serde::{Deserialize, Serialize};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

pub mod atomic_counter;
pub mod sequential;

pub use atomic_counter::*;
pub use sequential::*;

/// Step function driven by an executor, called once per system per tick.
pub type SystemFn = dyn Fn(SystemId, &dyn Context) + Send + Sync;

pub type PanicPayload = Box<dyn Any + Send + 'static>;

pub trait SystemExecutor: Send + 'static {
    /// Brings the executor into a valid pre-tick state.
    fn initialize(&mut self, storage: &SystemStorage);

    /// Runs one tick, returning once every system has completed.
    fn execute(&mut self, ctx: &Arc<dyn Context>, f: &Arc<SystemFn>);

    /// Ticks completed so far.
    fn frame(&self) -> Frame;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    Sequential,
    #[default]
    AtomicCounter,
}

impl RunMode {
    pub fn create_executor(&self, graph: Arc<DependencyGraph>) -> Box<dyn SystemExecutor> {
        match self {
            RunMode::Sequential => Box::new(SequentialExecutor::new(graph)),
            RunMode::AtomicCounter => Box::new(AtomicCounterExecutor::new(graph)),
        }
    }
}

/// Runs `f` for `id`, turning a panic into a returned payload so completion
/// bookkeeping always happens.
pub(crate) fn run_system(f: &SystemFn, id: SystemId, ctx: &dyn Context) -> Option<PanicPayload> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(id, ctx))) {
        Ok(()) => None,
        Err(payload) => {
            tracing::error!(
                system = %id,
                message = panic_message(payload.as_ref()),
                "system panicked"
            );
            Some(payload)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
