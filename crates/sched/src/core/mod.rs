pub mod dag;
pub mod ext;
pub mod frame;
pub mod task;

pub use dag::*;
pub use ext::*;
pub use fixedbitset::*;
pub use frame::*;
pub use indexmap::*;
pub use task::{Context, TaskPool, TaskPoolBuilder, Work, available_parallelism};
