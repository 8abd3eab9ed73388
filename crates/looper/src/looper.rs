use crate::config::LooperConfig;
use crate::error::LooperError;
use crate::message::MessageQueue;
use crate::scheduler::Scheduler;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;
use tracing::{debug, warn};

static NEXT_LOOPER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LooperState {
    Running,
    Paused,
    Quitting,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Quitting,
    Quit,
}

/// Virtual run loop of one thread.
///
/// Work posted to a looper is deferred to its [`Scheduler`]; tests drive the
/// scheduler through the idle and run controls below. The main looper
/// cannot quit and keeps its identity across resets.
pub struct Looper {
    id: u64,
    thread: ThreadId,
    thread_name: String,
    main: bool,
    config: LooperConfig,
    queue: MessageQueue,
    lifecycle: Mutex<Lifecycle>,
    quit_signal: Condvar,
}

impl Looper {
    pub(crate) fn new(thread: ThreadId, thread_name: String, main: bool, config: LooperConfig) -> Arc<Self> {
        let id = NEXT_LOOPER_ID.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::new(Scheduler::for_thread(thread, &config));
        debug!(looper = id, thread = %thread_name, main, "looper created");
        Arc::new(Self {
            id,
            thread,
            thread_name,
            main,
            config,
            queue: MessageQueue::new(scheduler),
            lifecycle: Mutex::new(Lifecycle::Active),
            quit_signal: Condvar::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn is_main(&self) -> bool {
        self.main
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// The current scheduler. Replaced on every [`Looper::reset`].
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.queue.scheduler()
    }

    pub fn state(&self) -> LooperState {
        let lifecycle = *self.lock();
        match lifecycle {
            Lifecycle::Quitting => LooperState::Quitting,
            Lifecycle::Quit => LooperState::Quit,
            Lifecycle::Active if self.scheduler().is_paused() => LooperState::Paused,
            Lifecycle::Active => LooperState::Running,
        }
    }

    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed(task, 0)
    }

    pub fn post_delayed<F>(&self, task: F, delay_ms: u64) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.has_quit() {
            warn!(looper = self.id, "post rejected: looper has quit");
            return false;
        }
        self.scheduler().post(Box::new(task), delay_ms)
    }

    pub fn post_at_front_of_queue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.has_quit() {
            warn!(looper = self.id, "post rejected: looper has quit");
            return false;
        }
        self.scheduler().post_at_front(Box::new(task))
    }

    /// Stops the looper, discarding queued work and waking [`Looper::run`].
    pub fn quit(&self) -> Result<(), LooperError> {
        if self.main {
            return Err(LooperError::QuitMainLooper);
        }
        self.quit_unchecked();
        Ok(())
    }

    /// Quits without the main-looper check; used by environment teardown.
    pub fn quit_unchecked(&self) {
        {
            let mut lifecycle = self.lock();
            if *lifecycle != Lifecycle::Active {
                return;
            }
            *lifecycle = Lifecycle::Quitting;
        }
        self.queue.quit();
        self.scheduler().shutdown();
        *self.lock() = Lifecycle::Quit;
        self.quit_signal.notify_all();
        debug!(looper = self.id, "looper quit");
    }

    pub fn has_quit(&self) -> bool {
        *self.lock() != Lifecycle::Active
    }

    /// Blocks until the looper quits. Returns at once on the main looper,
    /// whose work is driven by the test itself.
    pub fn run(&self) {
        if self.main {
            return;
        }
        let mut lifecycle = self.lock();
        while *lifecycle != Lifecycle::Quit {
            lifecycle = self.quit_signal.wait(lifecycle).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Runs the tasks that are due now.
    pub fn idle(&self) -> usize {
        self.scheduler().advance_by(0)
    }

    /// Advances the clock by `ms`, running everything that becomes due.
    pub fn idle_for(&self, ms: u64) -> usize {
        self.scheduler().advance_by(ms)
    }

    pub fn idle_constantly(&self, enabled: bool) {
        self.scheduler().idle_constantly(enabled);
    }

    pub fn pause(&self) {
        self.scheduler().pause();
    }

    pub fn unpause(&self) {
        self.scheduler().unpause();
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler().is_paused()
    }

    /// Pauses or unpauses and returns whether the looper was paused before.
    pub fn set_paused(&self, paused: bool) -> bool {
        let scheduler = self.scheduler();
        let was_paused = scheduler.is_paused();
        if paused {
            scheduler.pause();
        } else {
            scheduler.unpause();
        }
        was_paused
    }

    /// Runs `f` with the looper paused, restoring the previous state after.
    pub fn run_paused<R>(&self, f: impl FnOnce() -> R) -> R {
        let was_paused = self.set_paused(true);
        let result = f();
        if !was_paused {
            self.unpause();
        }
        result
    }

    pub fn run_to_end_of_tasks(&self) -> usize {
        self.scheduler().advance_to_last_posted_runnable()
    }

    pub fn run_one_task(&self) -> bool {
        self.scheduler().run_one_task()
    }

    pub fn run_to_next_task(&self) -> usize {
        self.scheduler().advance_to_next_posted_runnable()
    }

    /// Installs a fresh scheduler, clears the queue and revives a quit looper.
    pub fn reset(&self) {
        let fresh = Arc::new(Scheduler::for_thread(self.thread, &self.config));
        let stale = self.queue.replace_scheduler(fresh);
        stale.shutdown();
        self.queue.reset();
        *self.lock() = Lifecycle::Active;
        debug!(looper = self.id, "looper reset");
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Looper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Looper")
            .field("id", &self.id)
            .field("thread", &self.thread_name)
            .field("main", &self.main)
            .field("lifecycle", &*self.lock())
            .finish_non_exhaustive()
    }
}
