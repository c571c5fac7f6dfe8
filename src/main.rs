use sched::{
    Context, IntoSystemConfig, IntoSystemConfigs, ScheduleBuildError, SchedulerSettings,
    SettingsError,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TICKS: u32 = 60;

#[derive(Debug, Error)]
enum TickerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Schedule(#[from] ScheduleBuildError),

    #[error("Invalid tick count: {0}")]
    TickCount(String),
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_thread_names(true))
        .init();

    if let Err(error) = run() {
        tracing::error!(%error, "ticker failed");
        std::process::exit(1);
    }
}

/// `ticker [settings.ron] [ticks]`
fn run() -> Result<(), TickerError> {
    let mut args = std::env::args().skip(1);

    let settings = match args.next() {
        Some(path) => SchedulerSettings::load(path)?,
        None => SchedulerSettings::default(),
    };

    let ticks = match args.next() {
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| TickerError::TickCount(value))?,
        None => DEFAULT_TICKS,
    };

    let pool: Arc<dyn Context> = Arc::new(settings.build_pool()?);

    let world = Arc::new(World::default());
    let mut schedule = settings.schedule();
    schedule.add_systems(
        world
            .system("input", 1)
            .before(vec![world.system("physics", 3), world.system("audio", 2)])
            .before(world.system("render", 1)),
    );

    let mut systems = schedule.build()?;

    tracing::info!(
        mode = ?systems.mode(),
        systems = systems.len(),
        threads = settings.thread_count()?,
        ticks,
        "starting"
    );

    let start = Instant::now();
    for _ in 0..ticks {
        let tick = Instant::now();
        systems.run(&pool);
        tracing::debug!(frame = %systems.frame(), elapsed = ?tick.elapsed(), "tick");
    }

    let elapsed = start.elapsed();
    tracing::info!(
        frames = %systems.frame(),
        work = world.work.load(Ordering::Relaxed),
        ?elapsed,
        per_tick = ?elapsed.checked_div(ticks).unwrap_or_default(),
        "done"
    );

    Ok(())
}

/// Shared state the demo systems write into.
#[derive(Default)]
struct World {
    work: AtomicU64,
}

impl World {
    fn system(self: &Arc<Self>, name: &'static str, millis: u64) -> sched::SystemConfig {
        let world = self.clone();
        (move || {
            std::thread::sleep(Duration::from_millis(millis));
            world.work.fetch_add(millis, Ordering::Relaxed);
        })
        .named(name)
    }
}
