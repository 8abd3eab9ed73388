use crate::config::{IdleState, LooperConfig};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

/// Unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Metadata attached to a task so it can be found again for bulk removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskTag {
    /// Identifier of the component that posted the task (e.g. a handler).
    pub owner: u64,
    /// Message code, `None` for plain callbacks.
    pub what: Option<i32>,
    pub token: Option<u64>,
    /// Unique id of the posted unit.
    pub id: u64,
}

/// Ordering key: execution time, then sequence number.
///
/// Normal posts draw increasing sequence numbers from zero, front posts
/// decreasing ones from -1. Front posts therefore precede every normal post
/// at the same instant, the most recent front post first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct TaskKey {
    at: u64,
    seq: i64,
}

struct Entry {
    task: Task,
    tag: Option<TaskTag>,
}

struct State {
    now: u64,
    start_time: u64,
    next_seq: i64,
    next_front_seq: i64,
    tasks: BTreeMap<TaskKey, Entry>,
    idle: IdleState,
    initial_idle: IdleState,
    shut_down: bool,
    running: usize,
}

impl State {
    fn new(config: &LooperConfig) -> Self {
        let idle = config.initial_idle_state();
        Self {
            now: config.start_time_ms,
            start_time: config.start_time_ms,
            next_seq: 0,
            next_front_seq: -1,
            tasks: BTreeMap::new(),
            idle,
            initial_idle: idle,
            shut_down: false,
            running: 0,
        }
    }
}

#[derive(Clone, Copy)]
enum Limit {
    Until(u64),
    Everything,
}

/// Deterministic virtual-time task queue.
///
/// Tasks execute in order of execution time, ties by insertion order, with
/// front posts ahead of their instant. Tasks run without the state lock
/// held, so a running task may post to its own scheduler and other threads
/// may post while the owner drains.
pub struct Scheduler {
    owner: ThreadId,
    state: Mutex<State>,
}

impl Scheduler {
    /// Scheduler owned by the calling thread.
    pub fn new(config: &LooperConfig) -> Self {
        Self::for_thread(thread::current().id(), config)
    }

    pub fn for_thread(owner: ThreadId, config: &LooperConfig) -> Self {
        Self { owner, state: Mutex::new(State::new(config)) }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn current_time(&self) -> u64 {
        self.lock().now
    }

    /// Enqueues `task` to run `delay_ms` after the current time.
    ///
    /// Returns `false` without enqueuing once the scheduler is shut down.
    pub fn post(&self, task: Task, delay_ms: u64) -> bool {
        self.enqueue(task, Some(delay_ms), None)
    }

    pub fn post_tagged(&self, task: Task, delay_ms: u64, tag: TaskTag) -> bool {
        self.enqueue(task, Some(delay_ms), Some(tag))
    }

    /// Enqueues `task` at the current time, ahead of all same-instant tasks.
    pub fn post_at_front(&self, task: Task) -> bool {
        self.enqueue(task, None, None)
    }

    pub fn post_at_front_tagged(&self, task: Task, tag: TaskTag) -> bool {
        self.enqueue(task, None, Some(tag))
    }

    fn enqueue(&self, task: Task, delay_ms: Option<u64>, tag: Option<TaskTag>) -> bool {
        let on_owner = self.is_owner_thread();
        let drain = {
            let mut state = self.lock();
            if state.shut_down {
                warn!(?tag, "post rejected: scheduler is shut down");
                return false;
            }
            let key = match delay_ms {
                Some(delay) => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    TaskKey { at: state.now.saturating_add(delay), seq }
                }
                None => {
                    let seq = state.next_front_seq;
                    state.next_front_seq -= 1;
                    TaskKey { at: state.now, seq }
                }
            };
            trace!(at = key.at, seq = key.seq, ?tag, "task posted");
            state.tasks.insert(key, Entry { task, tag });
            let immediate = delay_ms.is_none_or(|delay| delay == 0);
            match state.idle {
                _ if !on_owner || state.running > 0 => None,
                IdleState::ConstantIdle => Some(Limit::Everything),
                IdleState::Unpaused if immediate => Some(Limit::Until(state.now)),
                IdleState::Unpaused | IdleState::Paused => None,
            }
        };
        if let Some(limit) = drain {
            self.drain(limit);
        }
        true
    }

    /// Runs every task due within `ms` of the current time.
    pub fn advance_by(&self, ms: u64) -> usize {
        let target = self.current_time().saturating_add(ms);
        self.advance_to(target)
    }

    /// Runs every task with execution time `<= target`, then moves the
    /// clock to `target`. The clock never moves backwards.
    pub fn advance_to(&self, target: u64) -> usize {
        self.drain(Limit::Until(target))
    }

    /// Runs all tasks sharing the earliest pending execution time.
    pub fn advance_to_next_posted_runnable(&self) -> usize {
        match self.next_task_time() {
            Some(at) => self.advance_to(at),
            None => 0,
        }
    }

    /// Runs every queued task, moving the clock to the latest execution
    /// time queued when the call started.
    pub fn advance_to_last_posted_runnable(&self) -> usize {
        let last = self.lock().tasks.last_key_value().map(|(key, _)| key.at);
        match last {
            Some(at) => self.advance_to(at),
            None => 0,
        }
    }

    /// Runs exactly the earliest task. Returns `false` when the queue is empty.
    pub fn run_one_task(&self) -> bool {
        let Some(task) = self.pop_due(Limit::Everything) else {
            return false;
        };
        self.run(task);
        true
    }

    pub fn pause(&self) {
        self.lock().idle = IdleState::Paused;
        debug!("scheduler paused");
    }

    /// Leaves paused or constant-idle mode and runs the tasks already due.
    pub fn unpause(&self) {
        let now = {
            let mut state = self.lock();
            state.idle = IdleState::Unpaused;
            state.now
        };
        debug!("scheduler unpaused");
        self.advance_to(now);
    }

    pub fn is_paused(&self) -> bool {
        self.lock().idle == IdleState::Paused
    }

    pub fn idle_state(&self) -> IdleState {
        self.lock().idle
    }

    /// Enabling constant idle drains the whole queue.
    pub fn idle_constantly(&self, enabled: bool) {
        self.lock().idle = if enabled { IdleState::ConstantIdle } else { IdleState::Unpaused };
        if enabled {
            self.drain(Limit::Everything);
        }
    }

    /// Discards every task and restores the configured start state.
    pub fn reset(&self) {
        let discarded = {
            let mut state = self.lock();
            state.now = state.start_time;
            state.next_seq = 0;
            state.next_front_seq = -1;
            state.idle = state.initial_idle;
            state.shut_down = false;
            std::mem::take(&mut state.tasks)
        };
        debug!(discarded = discarded.len(), "scheduler reset");
    }

    /// Discards every task and rejects further posts.
    pub fn shutdown(&self) {
        let discarded = {
            let mut state = self.lock();
            state.shut_down = true;
            std::mem::take(&mut state.tasks)
        };
        debug!(discarded = discarded.len(), "scheduler shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Removes every queued task whose tag matches. Untagged tasks never match.
    pub fn remove_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&TaskTag) -> bool,
    {
        let removed: Vec<Entry> = {
            let mut state = self.lock();
            let keys: Vec<TaskKey> = state
                .tasks
                .iter()
                .filter(|(_, entry)| entry.tag.as_ref().is_some_and(&predicate))
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| state.tasks.remove(key)).collect()
        };
        removed.len()
    }

    pub fn has_matching<P>(&self, predicate: P) -> bool
    where
        P: Fn(&TaskTag) -> bool,
    {
        self.lock().tasks.values().any(|entry| entry.tag.as_ref().is_some_and(&predicate))
    }

    pub fn size(&self) -> usize {
        self.lock().tasks.len()
    }

    /// True if a queued task is due at the current time.
    pub fn are_any_runnable(&self) -> bool {
        let state = self.lock();
        state.tasks.first_key_value().is_some_and(|(key, _)| key.at <= state.now)
    }

    pub fn next_task_time(&self) -> Option<u64> {
        self.lock().tasks.first_key_value().map(|(key, _)| key.at)
    }

    fn drain(&self, limit: Limit) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(limit) {
            self.run(task);
            ran += 1;
        }
        if let Limit::Until(target) = limit {
            let mut state = self.lock();
            state.now = state.now.max(target);
        }
        ran
    }

    fn pop_due(&self, limit: Limit) -> Option<Task> {
        let mut state = self.lock();
        let limit = if state.idle == IdleState::ConstantIdle { Limit::Everything } else { limit };
        let entry = state.tasks.first_entry()?;
        if let Limit::Until(target) = limit
            && entry.key().at > target
        {
            return None;
        }
        let (key, entry) = entry.remove_entry();
        state.now = state.now.max(key.at);
        state.running += 1;
        trace!(at = key.at, seq = key.seq, tag = ?entry.tag, "running task");
        Some(entry.task)
    }

    fn run(&self, task: Task) {
        let _running = RunningGuard(self);
        task();
    }

    fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Scheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Scheduler")
            .field("owner", &self.owner)
            .field("now", &state.now)
            .field("queued", &state.tasks.len())
            .field("idle", &state.idle)
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

/// Decrements the running count when a task finishes, even by panicking.
struct RunningGuard<'a>(&'a Scheduler);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.running = state.running.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    #[fixture]
    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Log, label: &'static str) -> Task {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(label))
    }

    fn taken(log: &Log) -> Vec<&'static str> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    fn paused() -> Scheduler {
        Scheduler::new(&LooperConfig::new().paused(true))
    }

    #[rstest]
    fn advance_runs_due_tasks_in_order(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "b"), 100);
        scheduler.post(record(&log, "a"), 50);
        scheduler.post(record(&log, "c"), 150);

        assert_eq!(scheduler.advance_by(100), 2);
        assert_eq!(taken(&log), vec!["a", "b"]);
        assert_eq!(scheduler.current_time(), 100);
        assert_eq!(scheduler.size(), 1);
    }

    #[rstest]
    fn front_posts_precede_same_instant_posts_most_recent_first(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "normal"), 0);
        scheduler.post_at_front(record(&log, "front-1"));
        scheduler.post_at_front(record(&log, "front-2"));

        scheduler.advance_by(0);
        assert_eq!(taken(&log), vec!["front-2", "front-1", "normal"]);
    }

    #[rstest]
    fn second_zero_advance_runs_nothing(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "due"), 0);
        assert_eq!(scheduler.advance_by(0), 1);
        assert_eq!(scheduler.advance_by(0), 0);
        assert_eq!(taken(&log), vec!["due"]);
    }

    #[rstest]
    fn advance_to_moves_clock_and_never_back(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "first"), 100);
        scheduler.post(record(&log, "second"), 200);

        assert_eq!(scheduler.advance_to(150), 1);
        assert_eq!(scheduler.current_time(), 150);
        assert_eq!(scheduler.advance_to(200), 1);
        assert_eq!(scheduler.advance_to(200), 0);
        assert_eq!(scheduler.advance_to(10), 0);
        assert_eq!(scheduler.current_time(), 200);
        assert_eq!(taken(&log), vec!["first", "second"]);
    }

    #[rstest]
    fn paused_posts_never_run_by_themselves(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "queued"), 0);
        assert!(taken(&log).is_empty());
        assert!(scheduler.are_any_runnable());

        scheduler.unpause();
        assert_eq!(taken(&log), vec!["queued"]);
    }

    #[rstest]
    fn unpaused_zero_delay_post_runs_immediately(log: Log) {
        let scheduler = Scheduler::new(&LooperConfig::new());
        scheduler.post(record(&log, "now"), 0);
        scheduler.post(record(&log, "later"), 10);
        assert_eq!(taken(&log), vec!["now"]);
        assert_eq!(scheduler.next_task_time(), Some(10));
    }

    #[rstest]
    fn nested_posts_run_after_the_running_task(log: Log) {
        let scheduler = Arc::new(Scheduler::new(&LooperConfig::new()));
        let inner = Arc::clone(&scheduler);
        let inner_log = Arc::clone(&log);
        scheduler.post(
            Box::new(move || {
                inner.post(record(&inner_log, "nested"), 0);
                inner_log.lock().unwrap().push("outer");
            }),
            0,
        );
        assert_eq!(taken(&log), vec!["outer", "nested"]);
    }

    #[rstest]
    fn constant_idle_runs_delayed_posts_and_moves_clock(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "queued"), 5);
        scheduler.idle_constantly(true);
        assert_eq!(taken(&log), vec!["queued"]);

        scheduler.post(record(&log, "delayed"), 1_000);
        assert_eq!(taken(&log), vec!["delayed"]);
        assert_eq!(scheduler.current_time(), 1_005);
    }

    #[rstest]
    fn posts_from_other_threads_only_enqueue(log: Log) {
        let scheduler = Arc::new(Scheduler::new(&LooperConfig::new()));
        let remote = Arc::clone(&scheduler);
        let remote_log = Arc::clone(&log);
        thread::spawn(move || remote.post(record(&remote_log, "remote"), 0)).join().unwrap();

        assert!(taken(&log).is_empty());
        scheduler.advance_by(0);
        assert_eq!(taken(&log), vec!["remote"]);
    }

    #[rstest]
    fn shutdown_discards_and_rejects(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "discarded"), 0);
        scheduler.shutdown();

        assert!(!scheduler.are_any_runnable());
        assert!(!scheduler.post(record(&log, "rejected"), 0));
        scheduler.advance_by(1_000);
        assert!(taken(&log).is_empty());

        scheduler.reset();
        assert!(scheduler.post(record(&log, "accepted"), 0));
    }

    #[rstest]
    fn reset_restores_start_time() {
        let scheduler = Scheduler::new(&LooperConfig::new().start_time_ms(100).paused(true));
        scheduler.post(Box::new(|| {}), 10);
        scheduler.advance_by(500);
        scheduler.unpause();
        scheduler.reset();
        assert_eq!(scheduler.current_time(), 100);
        assert!(scheduler.is_paused());
        assert_eq!(scheduler.size(), 0);
    }

    #[rstest]
    fn run_one_task_runs_only_the_earliest(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "late"), 30);
        scheduler.post(record(&log, "early"), 20);
        assert!(scheduler.run_one_task());
        assert_eq!(taken(&log), vec!["early"]);
        assert_eq!(scheduler.current_time(), 20);
        assert!(scheduler.run_one_task());
        assert!(!scheduler.run_one_task());
    }

    #[rstest]
    fn last_posted_runnable_bounds_the_drain(log: Log) {
        let scheduler = Arc::new(paused());
        let inner = Arc::clone(&scheduler);
        let inner_log = Arc::clone(&log);
        scheduler.post(
            Box::new(move || {
                inner.post(record(&inner_log, "within"), 0);
                inner.post(record(&inner_log, "beyond"), 100);
            }),
            10,
        );
        scheduler.post(record(&log, "last"), 20);

        assert_eq!(scheduler.advance_to_last_posted_runnable(), 3);
        assert_eq!(taken(&log), vec!["within", "last"]);
        assert_eq!(scheduler.current_time(), 20);
        assert_eq!(scheduler.next_task_time(), Some(110));
    }

    #[rstest]
    fn next_posted_runnable_runs_one_instant(log: Log) {
        let scheduler = paused();
        scheduler.post(record(&log, "a"), 10);
        scheduler.post(record(&log, "b"), 10);
        scheduler.post(record(&log, "c"), 11);
        assert_eq!(scheduler.advance_to_next_posted_runnable(), 2);
        assert_eq!(taken(&log), vec!["a", "b"]);
    }

    #[rstest]
    fn tagged_tasks_can_be_removed(log: Log) {
        let scheduler = paused();
        let tag = |what, id| TaskTag { owner: 1, what: Some(what), token: None, id };
        scheduler.post_tagged(record(&log, "keep"), 10, tag(1, 1));
        scheduler.post_tagged(record(&log, "drop"), 10, tag(2, 2));
        scheduler.post(record(&log, "untagged"), 10);

        assert!(scheduler.has_matching(|t| t.what == Some(2)));
        assert_eq!(scheduler.remove_matching(|t| t.what == Some(2)), 1);
        assert!(!scheduler.has_matching(|t| t.what == Some(2)));
        scheduler.advance_by(10);
        assert_eq!(taken(&log), vec!["keep", "untagged"]);
    }

    #[rstest]
    fn panicking_task_does_not_wedge_the_scheduler(log: Log) {
        let scheduler = paused();
        scheduler.post(Box::new(|| panic!("boom")), 0);
        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.advance_by(0)));
        assert!(panicked.is_err());

        scheduler.unpause();
        scheduler.post(record(&log, "after"), 0);
        assert_eq!(taken(&log), vec!["after"]);
    }
}
