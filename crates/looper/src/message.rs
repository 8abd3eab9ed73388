use crate::handler::Handler;
use crate::scheduler::{Scheduler, Task, TaskTag};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{trace, warn};
use umbra_core::Value;

/// A unit of work addressed to a [`Handler`].
///
/// Either carries a callback (posted runnables) or a `what` code and payload
/// the target handler's message callback interprets.
#[derive(Default)]
pub struct Message {
    pub what: i32,
    pub arg1: i32,
    pub arg2: i32,
    pub obj: Option<Value>,
    /// Identifies the message for bulk removal.
    pub token: Option<u64>,
    pub(crate) target: Option<Handler>,
    pub(crate) when: u64,
    pub(crate) callback: Option<Task>,
}

impl Message {
    pub fn new(what: i32) -> Self {
        Self { what, ..Self::default() }
    }

    pub(crate) fn from_callback(callback: Task, token: Option<u64>) -> Self {
        Self { callback: Some(callback), token, ..Self::default() }
    }

    #[must_use]
    pub fn with_args(mut self, arg1: i32, arg2: i32) -> Self {
        self.arg1 = arg1;
        self.arg2 = arg2;
        self
    }

    #[must_use]
    pub fn with_obj(mut self, obj: impl Into<Value>) -> Self {
        self.obj = Some(obj.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: u64) -> Self {
        self.token = Some(token);
        self
    }

    pub fn target(&self) -> Option<&Handler> {
        self.target.as_ref()
    }

    /// Virtual time the message was scheduled for; `0` for front posts.
    pub fn when(&self) -> u64 {
        self.when
    }

    pub fn is_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("what", &self.what)
            .field("arg1", &self.arg1)
            .field("arg2", &self.arg2)
            .field("obj", &self.obj)
            .field("token", &self.token)
            .field("target", &self.target.as_ref().map(Handler::id))
            .field("when", &self.when)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Bookkeeping for a message that has been enqueued but not delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    pub id: u64,
    pub handler: u64,
    /// `None` for posted callbacks.
    pub what: Option<i32>,
    pub token: Option<u64>,
    pub when: u64,
    pub front: bool,
}

impl PendingMessage {
    /// Delivery order: front posts first, most recent first, then by time
    /// and insertion.
    fn delivery_key(&self) -> (u64, i128) {
        let id = i128::from(self.id);
        (self.when, if self.front { -id } else { id })
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Placement {
    Front,
    At(u64),
}

#[derive(Default)]
struct QueueState {
    quitting: bool,
    next_id: u64,
    pending: Vec<PendingMessage>,
}

/// Message bookkeeping on top of a looper's scheduler.
pub struct MessageQueue {
    scheduler: RwLock<Arc<Scheduler>>,
    state: Mutex<QueueState>,
}

impl MessageQueue {
    pub(crate) fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler: RwLock::new(scheduler), state: Mutex::new(QueueState::default()) }
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Installs `scheduler` and returns the one it replaces.
    pub(crate) fn replace_scheduler(&self, scheduler: Arc<Scheduler>) -> Arc<Scheduler> {
        let mut slot = self.scheduler.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, scheduler)
    }

    /// Schedules `msg` for delivery at virtual time `when`; `0` means the
    /// front of the queue.
    ///
    /// Returns `false` once the queue is quitting or when the message has no
    /// target handler.
    pub fn enqueue_message(&self, msg: Message, when: u64) -> bool {
        let placement = if when == 0 { Placement::Front } else { Placement::At(when) };
        self.enqueue(msg, placement)
    }

    pub(crate) fn enqueue(&self, mut msg: Message, placement: Placement) -> bool {
        let Some(target) = msg.target.clone() else {
            warn!(what = msg.what, "message without target handler dropped");
            return false;
        };
        let scheduler = self.scheduler();
        let (id, tag) = {
            let mut state = self.lock();
            if state.quitting {
                warn!(what = msg.what, handler = target.id(), "message rejected: queue is quitting");
                return false;
            }
            state.next_id += 1;
            let id = state.next_id;
            let (when, front) = match placement {
                Placement::Front => (0, true),
                Placement::At(when) => (when, false),
            };
            msg.when = when;
            let what = if msg.is_callback() { None } else { Some(msg.what) };
            state.pending.push(PendingMessage { id, handler: target.id(), what, token: msg.token, when, front });
            (id, TaskTag { owner: target.id(), what, token: msg.token, id })
        };
        trace!(id, ?placement, "message enqueued");

        let task: Task = Box::new(move || {
            if target.looper().queue().complete(id) {
                target.dispatch_message(msg);
            }
        });
        let posted = match placement {
            Placement::Front => scheduler.post_at_front_tagged(task, tag),
            Placement::At(when) => {
                let delay = when.saturating_sub(scheduler.current_time());
                scheduler.post_tagged(task, delay, tag)
            }
        };
        if !posted {
            self.lock().pending.retain(|pending| pending.id != id);
        }
        posted
    }

    /// Drops the bookkeeping for `id`. Returns `false` when the message was
    /// already removed, in which case it must not be delivered.
    pub(crate) fn complete(&self, id: u64) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|pending| pending.id != id);
        state.pending.len() != before
    }

    /// Removes every pending message matching `predicate` from the queue.
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&PendingMessage) -> bool,
    {
        let ids: Vec<u64> = {
            let mut state = self.lock();
            let ids = state.pending.iter().filter(|pending| predicate(pending)).map(|pending| pending.id).collect();
            state.pending.retain(|pending| !predicate(pending));
            ids
        };
        if !ids.is_empty() {
            self.scheduler().remove_matching(|tag| ids.contains(&tag.id));
        }
        ids.len()
    }

    pub fn remove_messages(&self, handler: &Handler, what: i32, token: Option<u64>) -> usize {
        self.remove_where(|pending| matches_message(pending, handler.id(), what, token))
    }

    pub fn has_messages(&self, handler: &Handler, what: i32, token: Option<u64>) -> bool {
        self.lock().pending.iter().any(|pending| matches_message(pending, handler.id(), what, token))
    }

    /// The message that will be delivered next.
    pub fn head(&self) -> Option<PendingMessage> {
        self.lock().pending.iter().min_by_key(|pending| pending.delivery_key()).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn is_quitting(&self) -> bool {
        self.lock().quitting
    }

    /// Rejects further messages and forgets pending ones.
    pub(crate) fn quit(&self) {
        let mut state = self.lock();
        state.quitting = true;
        state.pending.clear();
    }

    /// Forgets every pending message and accepts new ones again.
    pub fn reset(&self) {
        let ids: Vec<u64> = {
            let mut state = self.lock();
            state.quitting = false;
            state.pending.drain(..).map(|pending| pending.id).collect()
        };
        if !ids.is_empty() {
            self.scheduler().remove_matching(|tag| ids.contains(&tag.id));
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for MessageQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MessageQueue")
            .field("quitting", &state.quitting)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

fn matches_message(pending: &PendingMessage, handler: u64, what: i32, token: Option<u64>) -> bool {
    pending.handler == handler
        && pending.what == Some(what)
        && token.is_none_or(|token| pending.token == Some(token))
}
