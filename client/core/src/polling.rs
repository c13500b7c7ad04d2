//! Response Polling Scheduler
//!
//! Bounded, evenly spaced re-fetches while an assistant reply is outstanding.
//!
//! The scheduler owns a single deadline rather than a spawned timer task, so
//! there is never more than one poll chain and cancelling it is just clearing
//! a field. The surface loop waits on [`PollScheduler::deadline`] (see
//! [`sleep_until_deadline`]) and hands control back to the session controller
//! when it elapses.
//!
//! ```text
//!   start()            tick(): attempts < max      tick(): attempts == max
//!  IDLE ──────▶ AWAITING ─────────────▶ fetch ──┐  AWAITING ─────▶ EXHAUSTED
//!   ▲              │  ▲                         │
//!   └── cancel() ──┘  └──── reschedule() ◀──────┘
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Default spacing between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default number of polls before giving up
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Polling configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Spacing between polls
    pub interval: Duration,
    /// Polls per await cycle
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Scheduler phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollPhase {
    /// No reply outstanding
    Idle,
    /// Polling for a reply
    Awaiting,
    /// Gave up after the attempt budget ran out
    Exhausted,
}

/// What the controller should do for an elapsed tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    /// Nothing: the cycle was superseded or no tick was due
    Skip,
    /// Re-fetch messages, then call [`PollScheduler::reschedule`]
    Fetch {
        /// Attempt number of this fetch, starting at 1
        attempt: u32,
    },
    /// Attempt budget exhausted: withdraw the placeholder
    GiveUp {
        /// Attempts made in the cycle
        attempts: u32,
    },
}

/// Single-chain poll scheduler
#[derive(Debug)]
pub struct PollScheduler {
    config: PollConfig,
    phase: PollPhase,
    attempts: u32,
    deadline: Option<Instant>,
}

impl PollScheduler {
    /// Create an idle scheduler
    #[must_use]
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            phase: PollPhase::Idle,
            attempts: 0,
            deadline: None,
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Polls made in the current cycle
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configured budget
    #[must_use]
    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// When the next tick is due, if one is scheduled
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a tick is due now
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Start a new await cycle, replacing any previous one
    pub fn start(&mut self) {
        self.phase = PollPhase::Awaiting;
        self.attempts = 0;
        self.deadline = Some(Instant::now() + self.config.interval);
        tracing::debug!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_attempts = self.config.max_attempts,
            "Polling scheduled"
        );
    }

    /// Cancel any pending tick and return to idle
    pub fn cancel(&mut self) {
        if self.deadline.is_some() || self.phase == PollPhase::Awaiting {
            tracing::trace!(attempts = self.attempts, "Polling cancelled");
        }
        self.phase = PollPhase::Idle;
        self.attempts = 0;
        self.deadline = None;
    }

    /// Consume an elapsed tick
    ///
    /// `awaiting` is the controller's awaiting flag, checked immediately
    /// before any fetch; a cleared flag turns the tick into a no-op.
    pub fn tick(&mut self, awaiting: bool) -> TickAction {
        if self.phase != PollPhase::Awaiting {
            self.deadline = None;
            return TickAction::Skip;
        }

        if !awaiting {
            self.cancel();
            return TickAction::Skip;
        }

        self.deadline = None;

        if self.attempts >= self.config.max_attempts {
            self.phase = PollPhase::Exhausted;
            tracing::info!(attempts = self.attempts, "Gave up waiting for assistant reply");
            return TickAction::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        TickAction::Fetch {
            attempt: self.attempts,
        }
    }

    /// Schedule the next tick after a fetch completed
    ///
    /// Does nothing unless the cycle is still awaiting.
    pub fn reschedule(&mut self, awaiting: bool) {
        if self.phase != PollPhase::Awaiting {
            return;
        }
        if !awaiting {
            self.cancel();
            return;
        }
        self.deadline = Some(Instant::now() + self.config.interval);
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

/// Sleep until `deadline`, or forever when there is none
///
/// Meant for a `tokio::select!` branch next to user input.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
