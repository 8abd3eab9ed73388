/// Initial scheduling behaviour of newly created loopers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LooperConfig {
    /// Virtual time every scheduler starts at, and returns to on reset.
    pub start_time_ms: u64,
    /// Start the main looper paused.
    pub paused: bool,
    /// Run every post synchronously, regardless of delay.
    pub idle_constantly: bool,
}

impl LooperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_time_ms(mut self, start_time_ms: u64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn idle_constantly(mut self, idle_constantly: bool) -> Self {
        self.idle_constantly = idle_constantly;
        self
    }

    pub(crate) fn initial_idle_state(&self) -> IdleState {
        if self.idle_constantly {
            IdleState::ConstantIdle
        } else if self.paused {
            IdleState::Paused
        } else {
            IdleState::Unpaused
        }
    }
}

/// How a scheduler reacts to posts made on its owning thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IdleState {
    /// Zero-delay posts run immediately; delayed ones wait for the clock.
    #[default]
    Unpaused,
    /// Posts only enqueue.
    Paused,
    /// Every post runs at once and moves the clock to its execution time.
    ConstantIdle,
}
