use crate::{
    core::{TaskPool, available_parallelism},
    system::{RunMode, Schedule},
};
use serde::{Deserialize, Serialize};
use std::{ops::Range, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid thread count range {start}..{end}")]
    InvalidThreadCount { start: usize, end: usize },
}

/// Scheduler configuration, usually loaded from a RON file.
///
/// ```ron
/// (
///     run_mode: AtomicCounter,
///     thread_count: (start: 1, end: 8),
///     pool_name: "Systems",
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Executor used for every tick.
    pub run_mode: RunMode,
    /// Range the worker count is clamped to. The available parallelism of the
    /// machine picks the value inside the range.
    pub thread_count: Range<usize>,
    /// Prefix of the worker thread names.
    pub pool_name: String,
    /// Stack size of each worker thread, in bytes.
    pub stack_size: Option<usize>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            thread_count: 1..available_parallelism().get(),
            pool_name: String::from("Scheduler Pool"),
            stack_size: None,
        }
    }
}

impl SchedulerSettings {
    pub fn from_ron(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = ron::from_str(text)?;
        settings.thread_count()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_ron(&text)?;

        tracing::debug!(path = %path.as_ref().display(), ?settings, "scheduler settings loaded");

        Ok(settings)
    }

    pub fn to_ron(&self) -> Result<String, SettingsError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        Ok(text)
    }

    /// Worker count for this machine.
    pub fn thread_count(&self) -> Result<usize, SettingsError> {
        let Range { start, end } = self.thread_count;
        if start == 0 || start > end {
            return Err(SettingsError::InvalidThreadCount { start, end });
        }

        Ok(available_parallelism().get().clamp(start, end))
    }

    pub fn build_pool(&self) -> Result<TaskPool, SettingsError> {
        let mut builder = TaskPool::builder()
            .name(&self.pool_name)
            .size(self.thread_count()?);

        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        Ok(builder.build()?)
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::new(self.run_mode)
    }
}
