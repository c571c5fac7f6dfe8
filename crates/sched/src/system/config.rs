use super::{SystemName, SystemRun};
use crate::core::{Context, ext};
use foldhash::fast::RandomState;
use hashbrown::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of a [`SystemConfig`] before the schedule assigns a
/// [`SystemId`](super::SystemId).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigId(u32);

impl ConfigId {
    fn new() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct SystemConfig {
    id: ConfigId,
    name: SystemName,
    dependencies: HashSet<ConfigId, RandomState>,
    run: SystemRun,
}

impl SystemConfig {
    pub fn new(
        name: impl Into<SystemName>,
        run: impl Fn(&dyn Context) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: ConfigId::new(),
            name: name.into(),
            dependencies: HashSet::default(),
            run: Box::new(run),
        }
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }

    pub fn name(&self) -> &SystemName {
        &self.name
    }

    pub fn dependencies(&self) -> &HashSet<ConfigId, RandomState> {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, id: ConfigId) {
        self.dependencies.insert(id);
    }

    pub(crate) fn into_parts(self) -> (SystemName, SystemRun) {
        (self.name, self.run)
    }
}

impl std::fmt::Debug for SystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

pub enum SystemConfigs {
    Config(SystemConfig),
    Configs(Vec<SystemConfig>),
}

impl SystemConfigs {
    pub fn new(config: SystemConfig) -> Self {
        SystemConfigs::Config(config)
    }

    pub fn configs(configs: Vec<SystemConfig>) -> Self {
        SystemConfigs::Configs(configs)
    }

    pub fn flatten(self) -> Vec<SystemConfig> {
        match self {
            SystemConfigs::Config(config) => vec![config],
            SystemConfigs::Configs(configs) => configs,
        }
    }
}

pub trait IntoSystemConfig<M>: Sized {
    fn config(self) -> SystemConfig;

    fn named(self, name: impl Into<SystemName>) -> SystemConfig {
        let mut config = self.config();
        config.name = name.into();
        config
    }
}

impl IntoSystemConfig<()> for SystemConfig {
    fn config(self) -> SystemConfig {
        self
    }
}

impl<F: Fn() + Send + Sync + 'static> IntoSystemConfig<fn()> for F {
    fn config(self) -> SystemConfig {
        SystemConfig::new(ext::short_type_name::<F>(), move |_: &dyn Context| self())
    }
}

impl<F: Fn(&dyn Context) + Send + Sync + 'static> IntoSystemConfig<fn(&dyn Context)> for F {
    fn config(self) -> SystemConfig {
        SystemConfig::new(ext::short_type_name::<F>(), self)
    }
}

pub trait IntoSystemConfigs<M> {
    fn configs(self) -> SystemConfigs;

    /// Orders every system of `self` before every system of `configs`.
    fn before<Marker>(self, configs: impl IntoSystemConfigs<Marker>) -> SystemConfigs;

    fn after<Marker>(self, configs: impl IntoSystemConfigs<Marker>) -> SystemConfigs
    where
        Self: Sized,
    {
        configs.before(self)
    }
}

impl<M, I: IntoSystemConfig<M>> IntoSystemConfigs<M> for I {
    fn configs(self) -> SystemConfigs {
        SystemConfigs::Config(self.config())
    }

    fn before<Marker>(self, configs: impl IntoSystemConfigs<Marker>) -> SystemConfigs {
        self.configs().before(configs)
    }
}

impl IntoSystemConfigs<()> for SystemConfigs {
    fn configs(self) -> SystemConfigs {
        self
    }

    fn before<Marker>(self, configs: impl IntoSystemConfigs<Marker>) -> SystemConfigs {
        let mut before = self.flatten();
        let mut after = configs.configs().flatten();

        let ids = before.iter().map(|config| config.id).collect::<Vec<_>>();
        for config in &mut after {
            config.dependencies.extend(ids.iter().copied());
        }

        before.append(&mut after);
        SystemConfigs::Configs(before)
    }
}

impl IntoSystemConfigs<()> for Vec<SystemConfig> {
    fn configs(self) -> SystemConfigs {
        SystemConfigs::Configs(self)
    }

    fn before<Marker>(self, configs: impl IntoSystemConfigs<Marker>) -> SystemConfigs {
        SystemConfigs::Configs(self).before(configs)
    }
}
