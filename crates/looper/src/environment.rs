use crate::config::LooperConfig;
use crate::error::{LooperError, current_thread_label};
use crate::looper::Looper;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

static NEXT_ENVIRONMENT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Loopers prepared on this thread, keyed by environment id. Owning them
    /// here ties each looper's lifetime to its thread.
    static THREAD_LOOPERS: RefCell<HashMap<u64, Arc<Looper>>> = RefCell::new(HashMap::new());
}

/// Thread model of one test: the main thread and its looper, plus the
/// loopers prepared on other threads.
pub struct LooperEnvironment {
    id: u64,
    config: LooperConfig,
    main_thread: ThreadId,
    main: Arc<Looper>,
    loopers: Mutex<HashMap<ThreadId, Weak<Looper>>>,
}

impl LooperEnvironment {
    /// Creates the environment with the calling thread as main thread.
    pub fn new(config: LooperConfig) -> Arc<Self> {
        let current = thread::current();
        let main_thread = current.id();
        let main = Looper::new(main_thread, current_thread_label(), true, config);
        let mut loopers = HashMap::new();
        loopers.insert(main_thread, Arc::downgrade(&main));
        Arc::new(Self {
            id: NEXT_ENVIRONMENT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            main_thread,
            main,
            loopers: Mutex::new(loopers),
        })
    }

    pub fn config(&self) -> &LooperConfig {
        &self.config
    }

    pub fn main_thread(&self) -> ThreadId {
        self.main_thread
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    pub fn main_looper(&self) -> Arc<Looper> {
        Arc::clone(&self.main)
    }

    /// Creates the looper of the calling thread.
    pub fn prepare(&self) -> Result<Arc<Looper>, LooperError> {
        if self.my_looper().is_some() {
            return Err(LooperError::AlreadyPrepared { thread: current_thread_label() });
        }
        let config = LooperConfig { paused: false, idle_constantly: false, ..self.config };
        let looper = Looper::new(thread::current().id(), current_thread_label(), false, config);
        THREAD_LOOPERS.with(|loopers| loopers.borrow_mut().insert(self.id, Arc::clone(&looper)));
        self.lock().insert(looper.thread(), Arc::downgrade(&looper));
        Ok(looper)
    }

    /// The looper of the calling thread, if it has one.
    pub fn my_looper(&self) -> Option<Arc<Looper>> {
        if self.is_main_thread() {
            return Some(self.main_looper());
        }
        THREAD_LOOPERS.with(|loopers| loopers.borrow().get(&self.id).cloned())
    }

    pub fn looper_for_thread(&self, thread: ThreadId) -> Option<Arc<Looper>> {
        self.lock().get(&thread).and_then(Weak::upgrade)
    }

    /// Resets the main looper and quits every other live looper.
    ///
    /// Only the main thread may do this.
    pub fn reset_thread_loopers(&self) -> Result<(), LooperError> {
        if !self.is_main_thread() {
            return Err(LooperError::ResetOffMainThread { thread: current_thread_label() });
        }
        let others: Vec<Arc<Looper>> = {
            let mut loopers = self.lock();
            let live = loopers
                .iter()
                .filter(|(thread, _)| **thread != self.main_thread)
                .filter_map(|(_, looper)| looper.upgrade())
                .collect();
            loopers.retain(|thread, _| *thread == self.main_thread);
            live
        };
        for looper in &others {
            looper.quit_unchecked();
        }
        self.main.reset();
        debug!(environment = self.id, quit = others.len(), "thread loopers reset");
        Ok(())
    }

    /// Every looper whose thread is still alive.
    pub fn live_loopers(&self) -> Vec<Arc<Looper>> {
        let mut loopers = self.lock();
        loopers.retain(|_, looper| looper.strong_count() > 0);
        loopers.values().filter_map(Weak::upgrade).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Weak<Looper>>> {
        self.loopers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LooperEnvironment {
    fn drop(&mut self) {
        let _ = THREAD_LOOPERS.try_with(|loopers| loopers.borrow_mut().remove(&self.id));
    }
}

impl Debug for LooperEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LooperEnvironment")
            .field("id", &self.id)
            .field("main_thread", &self.main_thread)
            .field("loopers", &self.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_thread::HandlerThread;
    use rstest::{fixture, rstest};

    #[fixture]
    fn environment() -> Arc<LooperEnvironment> {
        LooperEnvironment::new(LooperConfig::new())
    }

    #[rstest]
    fn main_thread_owns_the_main_looper(environment: Arc<LooperEnvironment>) {
        let mine = environment.my_looper().unwrap();
        assert!(mine.is_main());
        assert!(Arc::ptr_eq(&mine, &environment.main_looper()));
        assert!(matches!(environment.prepare(), Err(LooperError::AlreadyPrepared { .. })));
    }

    #[rstest]
    fn threads_prepare_exactly_one_looper(environment: Arc<LooperEnvironment>) {
        let env = Arc::clone(&environment);
        let (thread, twice) = thread::spawn(move || {
            let looper = env.prepare().unwrap();
            assert!(Arc::ptr_eq(&looper, &env.my_looper().unwrap()));
            (thread::current().id(), env.prepare())
        })
        .join()
        .unwrap();

        assert!(matches!(twice, Err(LooperError::AlreadyPrepared { .. })));
        assert!(environment.looper_for_thread(thread).is_none());
        assert_eq!(environment.live_loopers().len(), 1);
    }

    #[rstest]
    fn reset_quits_background_loopers(environment: Arc<LooperEnvironment>) {
        let worker = HandlerThread::start(&environment, "background").unwrap();
        let looper = Arc::clone(worker.looper());
        assert!(environment.looper_for_thread(looper.thread()).is_some());
        assert_eq!(environment.live_loopers().len(), 2);

        environment.reset_thread_loopers().unwrap();
        assert!(looper.has_quit());
        assert!(!environment.main_looper().has_quit());
        worker.join().unwrap();
        assert_eq!(environment.live_loopers().len(), 1);
    }

    #[rstest]
    fn reset_off_main_thread_is_refused(environment: Arc<LooperEnvironment>) {
        let env = Arc::clone(&environment);
        let result = thread::spawn(move || env.reset_thread_loopers()).join().unwrap();
        assert!(matches!(result, Err(LooperError::ResetOffMainThread { .. })));
    }
}
