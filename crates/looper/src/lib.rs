//! Virtual-time message loop for Umbra.
//!
//! Every [`Looper`] defers its work to a deterministic [`Scheduler`] whose
//! clock only moves when a test advances it. [`LooperEnvironment`] holds the
//! per-test thread model: the main looper and the loopers of other threads.

mod config;
mod environment;
mod error;
mod handler;
mod handler_thread;
mod looper;
mod message;
mod scheduler;

pub use config::{IdleState, LooperConfig};
pub use environment::LooperEnvironment;
pub use error::LooperError;
pub use handler::{Handler, MessageCallback};
pub use handler_thread::HandlerThread;
pub use looper::{Looper, LooperState};
pub use message::{Message, MessageQueue, PendingMessage};
pub use scheduler::{Scheduler, Task, TaskTag};
