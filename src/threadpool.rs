//! Worker thread pool bridging blocking work back to a single-threaded event
//! loop, after `ngx_thread_pool.c`: detached OS workers pull tasks off a
//! bounded FIFO under a mutex+condvar, run the work off-lock, and publish
//! completions to a single dispatcher shared by every pool so the loop
//! thread drains them all through one notify.

use crate::error::{ConfigError, CoreError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Per-task completion state, handed to `on_complete` once the work runs.
pub struct TaskEvent<C> {
    pub active: bool,
    pub complete: bool,
    pub ctx: C,
}

/// A unit of work: `work` runs on a pool thread, `on_complete` runs on the
/// loop thread after the dispatcher drains it. Mirrors `ngx_thread_task_t`'s
/// split between the worker-side handler and the completion event, minus
/// the inline-trailing-bytes context — a type parameter does that job in Rust.
pub struct Task<C> {
    id: u64,
    work: fn(&mut C, &str),
    on_complete: fn(&mut TaskEvent<C>),
    event: TaskEvent<C>,
}

impl<C> Task<C> {
    pub fn new(ctx: C, work: fn(&mut C, &str), on_complete: fn(&mut TaskEvent<C>)) -> Self {
        Task { id: 0, work, on_complete, event: TaskEvent { active: false, complete: false, ctx } }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Type-erased completion, since the global dispatcher is shared across
/// pools whose `Task<C>` context types differ (nginx just used `void *`).
trait CompletedTask: Send {
    fn finish(self: Box<Self>);
}

impl<C: Send> CompletedTask for Task<C> {
    fn finish(mut self: Box<Self>) {
        self.event.complete = true;
        self.event.active = false;
        (self.on_complete)(&mut self.event);
    }
}

/// The single global completion FIFO (`ngx_thread_pool_done`), guarded by a
/// spinlock rather than the full mutex the per-pool queues use — completions
/// are pushed from worker threads and drained in a burst by the loop thread,
/// so contention is brief.
pub struct CompletionDispatcher {
    queue: spin::Mutex<VecDeque<Box<dyn CompletedTask>>>,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl CompletionDispatcher {
    pub fn new(notify: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(CompletionDispatcher { queue: spin::Mutex::new(VecDeque::new()), notify: Box::new(notify) })
    }

    fn publish(&self, task: Box<dyn CompletedTask>) {
        self.queue.lock().push_back(task);
        (self.notify)();
    }

    /// Steals the whole queue and runs every completion handler, called once
    /// per `notify` on the loop thread (`ngx_thread_pool_handler`).
    pub fn drain(&self) -> usize {
        let drained: VecDeque<Box<dyn CompletedTask>> = {
            let mut guard = self.queue.lock();
            std::mem::take(&mut *guard)
        };
        let n = drained.len();
        for task in drained {
            task.finish();
        }
        n
    }
}

/// A queue slot: ordinary work, or a poison pill telling one worker to exit.
/// `ngx_thread_pool_destroy` does the equivalent with a dedicated
/// `ngx_thread_pool_exit_handler` task.
enum Item<C> {
    Work(Task<C>),
    Exit,
}

/// Queue plus the `waiting` bookkeeping, guarded by one mutex so both move
/// together exactly as `tp->mtx` protects both `tp->queue` and `tp->waiting`.
struct QueueState<C> {
    items: VecDeque<Item<C>>,
    /// Incremented on `post`, decremented by a worker at the top of every
    /// loop iteration — not just the ones that actually block — so it can
    /// transiently go negative when more than one worker wakes for the same
    /// posted task. This is the documented race, not a bug to paper over;
    /// nothing here (or in tests) asserts it stays non-negative.
    waiting: i64,
}

struct Shared<C> {
    state: Mutex<QueueState<C>>,
    condvar: Condvar,
    max_queue: usize,
    /// One flag per worker, true while it's running. `shutdown` clears each
    /// and spin-waits on them, mirroring the destroy sequence's busy wait.
    alive: Vec<Arc<AtomicBool>>,
}

/// A bounded pool of detached worker threads plus the queue they pull from.
pub struct ThreadPool<C> {
    name: String,
    shared: Arc<Shared<C>>,
    dispatcher: Arc<CompletionDispatcher>,
}

impl<C: Send + 'static> ThreadPool<C> {
    pub fn new(name: impl Into<String>, config: PoolConfig, dispatcher: Arc<CompletionDispatcher>) -> Result<Self, CoreError> {
        let name = name.into();
        config.validate(&name)?;
        let mut alive_flags = Vec::with_capacity(config.threads);
        for _ in 0..config.threads {
            alive_flags.push(Arc::new(AtomicBool::new(true)));
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState { items: VecDeque::new(), waiting: 0 }),
            condvar: Condvar::new(),
            max_queue: config.max_queue,
            alive: alive_flags.clone(),
        });

        for (i, flag) in alive_flags.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let dispatcher = Arc::clone(&dispatcher);
            let pool_name = name.clone();
            let builder = std::thread::Builder::new().name(format!("{name}-worker-{i}"));
            builder
                .spawn(move || worker_loop(shared, dispatcher, flag, pool_name))
                .map_err(|e| CoreError::PoolInit { name: name.clone(), reason: e.to_string() })?;
        }

        tracing::debug!(pool = %name, threads = config.threads, max_queue = config.max_queue, "thread pool started");
        Ok(ThreadPool { name, shared, dispatcher })
    }

    pub fn dispatcher(&self) -> &Arc<CompletionDispatcher> {
        &self.dispatcher
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the `waiting` counter. Per spec this may be transiently
    /// negative under race; callers observing it should not assert on its
    /// sign, only use it as a rough backlog indicator.
    pub fn waiting(&self) -> i64 {
        self.shared.state.lock().unwrap().waiting
    }

    /// Submits `task`, returning its id. Fails if the task was already
    /// active (reuse-while-queued guard) or `waiting` is at `max_queue`
    /// (backpressure), handing `task` back in both cases.
    pub fn post(&self, mut task: Task<C>) -> Result<u64, (CoreError, Task<C>)> {
        if task.event.active {
            return Err((CoreError::TaskAlreadyActive { id: task.id }, task));
        }

        let mut state = self.shared.state.lock().unwrap();
        if state.waiting >= self.shared.max_queue as i64 {
            tracing::warn!(pool = %self.name, waiting = state.waiting, "thread pool queue overflow");
            return Err((
                CoreError::QueueOverflow { pool: self.name.clone(), waiting: state.waiting },
                task,
            ));
        }

        task.id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        task.event.active = true;
        let id = task.id;
        state.items.push_back(Item::Work(task));
        state.waiting += 1;
        self.shared.condvar.notify_one();
        tracing::debug!(pool = %self.name, task = id, "task submitted");
        Ok(id)
    }

    /// Posts one poison pill per worker and spin-waits for every worker to
    /// pick it up and exit, mirroring `ngx_thread_pool_destroy`'s
    /// set-lock/spin-yield/pthread_exit sequence. Bypasses `waiting`
    /// bookkeeping, same as the original destroy path bypasses normal task
    /// submission.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            for _ in &self.shared.alive {
                state.items.push_back(Item::Exit);
            }
        }
        self.shared.condvar.notify_all();
        for flag in &self.shared.alive {
            while flag.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
        }
        tracing::debug!(pool = %self.name, "thread pool shut down");
    }
}

#[cfg(unix)]
fn mask_worker_signals() {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        libc::sigdelset(&mut set, libc::SIGILL);
        libc::sigdelset(&mut set, libc::SIGFPE);
        libc::sigdelset(&mut set, libc::SIGSEGV);
        libc::sigdelset(&mut set, libc::SIGBUS);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

#[cfg(not(unix))]
fn mask_worker_signals() {
    // No POSIX signal mask on this platform; ngx_thread_pool_cycle's mask is
    // a pthread/signal concept that doesn't exist here.
}

fn worker_loop<C: Send + 'static>(
    shared: Arc<Shared<C>>,
    dispatcher: Arc<CompletionDispatcher>,
    alive: Arc<AtomicBool>,
    pool_name: String,
) {
    mask_worker_signals();

    loop {
        let mut guard = shared.state.lock().unwrap();
        // Decremented every iteration, not only when about to block — this
        // is what lets `waiting` run transiently negative.
        guard.waiting -= 1;
        while guard.items.is_empty() {
            guard = shared.condvar.wait(guard).unwrap();
        }
        let item = guard.items.pop_front().unwrap();
        drop(guard);

        let mut task = match item {
            Item::Exit => {
                alive.store(false, Ordering::Release);
                return;
            }
            Item::Work(task) => task,
        };
        (task.work)(&mut task.event.ctx, &pool_name);
        dispatcher.publish(Box::new(task));
    }
}

/// Thread pool directive: `name`, `threads=N` (required), `max_queue=M`
/// (default 65536) — `ngx_thread_pool()`'s config surface, minus the
/// surrounding config-file syntax (out of scope).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub threads: usize,
    pub max_queue: usize,
}

impl PoolConfig {
    pub const DEFAULT_MAX_QUEUE: usize = 65536;
    pub const DEFAULT_POOL_THREADS: usize = 32;

    pub fn new(threads: usize) -> Self {
        PoolConfig { threads, max_queue: Self::DEFAULT_MAX_QUEUE }
    }

    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    /// Rejects `threads=0` (the directive requires a `threads` count, not
    /// just the field's presence) and `max_queue=0` (a pool that can never
    /// hold a queued task).
    fn validate(&self, pool: &str) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::MissingThreads { pool: pool.to_string() });
        }
        if self.max_queue == 0 {
            return Err(ConfigError::InvalidOption {
                pool: pool.to_string(),
                option: "max_queue".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Named-pool registry with `"default"` auto-configuration
/// (`ngx_thread_pool_init_conf`): a `"default"` pool referenced but never
/// explicitly configured gets `threads=32, max_queue=65536`; any other
/// unconfigured pool is a config error.
#[derive(Default)]
pub struct PoolRegistry {
    configs: HashMap<String, PoolConfig>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, name: impl Into<String>, config: PoolConfig) -> Result<(), CoreError> {
        let name = name.into();
        if self.configs.contains_key(&name) {
            return Err(ConfigError::DuplicatePool { name }.into());
        }
        config.validate(&name)?;
        self.configs.insert(name, config);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<PoolConfig, CoreError> {
        if let Some(c) = self.configs.get(name) {
            return Ok(c.clone());
        }
        if name == "default" {
            return Ok(PoolConfig::new(PoolConfig::DEFAULT_POOL_THREADS));
        }
        Err(ConfigError::UnknownPool { name: name.to_string() }.into())
    }
}

static DEFAULT_DISPATCHER: OnceLock<Arc<CompletionDispatcher>> = OnceLock::new();

/// Returns the process-wide completion dispatcher, creating it with a no-op
/// notify on first use. Most callers should instead build their own
/// `CompletionDispatcher` with a real notify hook and share it across pools
/// explicitly; this exists for tests and examples that don't need one.
pub fn default_dispatcher() -> Arc<CompletionDispatcher> {
    DEFAULT_DISPATCHER.get_or_init(|| CompletionDispatcher::new(|| {})).clone()
}
