use std::thread;
use thiserror::Error;
use umbra_core::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LooperError {
    #[error("the main looper is not allowed to quit")]
    QuitMainLooper,

    #[error("loopers can only be reset from the main thread (called from {thread})")]
    ResetOffMainThread { thread: String },

    #[error("thread {thread} already has a looper")]
    AlreadyPrepared { thread: String },

    #[error("failed to start handler thread: {0}")]
    Spawn(String),
}

impl LooperError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::State
    }
}

/// Name of the current thread for diagnostics, falling back to its id.
pub(crate) fn current_thread_label() -> String {
    let current = thread::current();
    current.name().map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LooperError::QuitMainLooper)]
    #[case(LooperError::ResetOffMainThread { thread: "worker".into() })]
    #[case(LooperError::AlreadyPrepared { thread: "worker".into() })]
    fn looper_errors_are_state_errors(#[case] err: LooperError) {
        assert_eq!(err.kind(), ErrorKind::State);
    }
}
