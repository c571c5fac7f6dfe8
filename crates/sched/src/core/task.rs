use smol::future::FutureExt;
use std::{num::NonZeroUsize, panic::AssertUnwindSafe, sync::Arc, thread::JoinHandle};

pub use smol::block_on;

/// A unit of work handed to a [`Context`].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Submission interface of a thread pool.
///
/// Work may run on any worker, at any later time, in any order relative to
/// other submissions.
pub trait Context: Send + Sync + 'static {
    fn submit(&self, work: Work);
}

impl Context for TaskPool {
    fn submit(&self, work: Work) {
        self.executor.spawn(async move { work() }).detach();
    }
}

impl Context for threadpool::ThreadPool {
    fn submit(&self, work: Work) {
        self.execute(work);
    }
}

impl<C: Context> Context for Arc<C> {
    fn submit(&self, work: Work) {
        self.as_ref().submit(work);
    }
}

/// Worker count used when none is configured.
pub fn available_parallelism() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Configuration of a [`TaskPool`].
#[derive(Default)]
pub struct TaskPoolBuilder {
    name: Option<String>,
    /// Worker count. Defaults to the available parallelism.
    threads: Option<usize>,
    stack_size: Option<usize>,
    on_start: Option<Callback>,
    on_stop: Option<Callback>,
}

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

impl TaskPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix of the worker thread names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn size(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Runs on every worker before it takes any work.
    pub fn on_spawn(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(callback));
        self
    }

    /// Runs on every worker after the pool shut it down.
    pub fn on_destroy(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> std::io::Result<TaskPool> {
        TaskPool::new(self)
    }
}

/// Fixed set of worker threads driving a shared executor.
pub struct TaskPool {
    executor: Arc<smol::Executor<'static>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: smol::channel::Sender<()>,
}

impl TaskPool {
    pub fn builder() -> TaskPoolBuilder {
        TaskPoolBuilder::new()
    }

    pub fn new(builder: TaskPoolBuilder) -> std::io::Result<Self> {
        let (shutdown, stopped) = smol::channel::bounded::<()>(1);
        let executor = Arc::new(smol::Executor::new());
        let threads = builder
            .threads
            .unwrap_or_else(|| available_parallelism().get())
            .max(1);
        let prefix = builder.name.as_deref().unwrap_or("Worker");

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let executor = executor.clone();
            let stopped = stopped.clone();
            let on_start = builder.on_start.clone();
            let on_stop = builder.on_stop.clone();

            let mut thread = std::thread::Builder::new().name(format!("{prefix}: {index}"));
            if let Some(bytes) = builder.stack_size {
                thread = thread.stack_size(bytes);
            }

            let worker = thread.spawn(move || {
                if let Some(callback) = on_start {
                    callback();
                }

                tracing::trace!(worker = index, "worker started");

                let serve = || {
                    let ticks = async {
                        loop {
                            executor.tick().await;
                        }
                    };

                    block_on(ticks.or(stopped.recv()))
                };

                // A panicking task unwinds out of `tick`; keep serving until shutdown.
                while std::panic::catch_unwind(AssertUnwindSafe(&serve)).is_err() {
                    tracing::error!(worker = index, "task panicked on worker");
                }

                tracing::trace!(worker = index, "worker stopped");

                if let Some(callback) = on_stop {
                    callback();
                }
            })?;

            workers.push(worker);
        }

        tracing::debug!(name = prefix, threads, "task pool started");

        Ok(Self {
            executor,
            workers,
            shutdown,
        })
    }

    /// Spawns a future onto the pool's executor.
    pub fn spawn<T: Send + 'static>(
        &self,
        future: impl Future<Output = T> + Send + 'static,
    ) -> smol::Task<T> {
        self.executor.spawn(future)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown.close();

        let unwinding = std::thread::panicking();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() && !unwinding {
                tracing::error!("task pool worker panicked during shutdown");
            }
        }
    }
}
