use crate::looper::Looper;
use crate::message::{Message, PendingMessage, Placement};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Receives messages that carry no callback of their own.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Posts work and messages to one looper.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    id: u64,
    looper: Arc<Looper>,
    callback: Option<MessageCallback>,
}

impl Handler {
    pub fn new(looper: Arc<Looper>) -> Self {
        Self::build(looper, None)
    }

    pub fn with_callback<F>(looper: Arc<Looper>, callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self::build(looper, Some(Arc::new(callback)))
    }

    fn build(looper: Arc<Looper>, callback: Option<MessageCallback>) -> Self {
        let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed);
        Self { inner: Arc::new(HandlerInner { id, looper, callback }) }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn looper(&self) -> &Arc<Looper> {
        &self.inner.looper
    }

    /// A fresh message targeting this handler.
    pub fn obtain_message(&self, what: i32) -> Message {
        let mut msg = Message::new(what);
        msg.target = Some(self.clone());
        msg
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
        self.send_message_delayed(Message::from_callback(Box::new(task), None), delay_ms)
    }

    /// Posts a callback that [`Handler::remove_callbacks`] can find by `token`.
    pub fn post_delayed_with_token<F>(&self, task: F, token: u64, delay_ms: u64) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_message_delayed(Message::from_callback(Box::new(task), Some(token)), delay_ms)
    }

    pub fn post_at_front_of_queue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_message_at_front_of_queue(Message::from_callback(Box::new(task), None))
    }

    pub fn send_message(&self, msg: Message) -> bool {
        self.send_message_delayed(msg, 0)
    }

    pub fn send_empty_message(&self, what: i32) -> bool {
        self.send_message(Message::new(what))
    }

    pub fn send_message_delayed(&self, msg: Message, delay_ms: u64) -> bool {
        let when = self.looper().scheduler().current_time().saturating_add(delay_ms);
        self.enqueue(msg, Placement::At(when))
    }

    /// Delivers `msg` once the virtual clock reaches `when`.
    pub fn send_message_at_time(&self, msg: Message, when: u64) -> bool {
        self.enqueue(msg, Placement::At(when))
    }

    pub fn send_message_at_front_of_queue(&self, msg: Message) -> bool {
        self.enqueue(msg, Placement::Front)
    }

    fn enqueue(&self, mut msg: Message, placement: Placement) -> bool {
        msg.target = Some(self.clone());
        self.looper().queue().enqueue(msg, placement)
    }

    pub fn has_messages(&self, what: i32) -> bool {
        self.looper().queue().has_messages(self, what, None)
    }

    pub fn has_messages_with_token(&self, what: i32, token: u64) -> bool {
        self.looper().queue().has_messages(self, what, Some(token))
    }

    pub fn remove_messages(&self, what: i32) -> usize {
        self.looper().queue().remove_messages(self, what, None)
    }

    pub fn remove_messages_with_token(&self, what: i32, token: u64) -> usize {
        self.looper().queue().remove_messages(self, what, Some(token))
    }

    /// Removes posted callbacks, all of them when `token` is `None`.
    pub fn remove_callbacks(&self, token: Option<u64>) -> usize {
        let id = self.id();
        self.looper().queue().remove_where(|pending| {
            pending.handler == id && pending.what.is_none() && token_matches(pending, token)
        })
    }

    /// Removes callbacks and messages, all of them when `token` is `None`.
    pub fn remove_callbacks_and_messages(&self, token: Option<u64>) -> usize {
        let id = self.id();
        self.looper().queue().remove_where(|pending| pending.handler == id && token_matches(pending, token))
    }

    /// Runs the message's callback, or hands it to this handler's message callback.
    pub fn dispatch_message(&self, mut msg: Message) {
        if let Some(callback) = msg.callback.take() {
            callback();
        } else if let Some(callback) = &self.inner.callback {
            callback(&msg);
        }
    }
}

fn token_matches(pending: &PendingMessage, token: Option<u64>) -> bool {
    token.is_none_or(|token| pending.token == Some(token))
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Handler {}

impl Debug for Handler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.inner.id)
            .field("looper", &self.inner.looper.id())
            .field("callback", &self.inner.callback.is_some())
            .finish()
    }
}
