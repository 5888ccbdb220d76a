//! Startup wait for the manifest written by a concurrently running build.
//!
//! # Responsibility
//! - Poll for the manifest file at a fixed interval.
//! - Run the completion exactly once, on the first poll that sees the file.
//!
//! # Invariants
//! - Polls never overlap; the next one is scheduled after the previous
//!   returned negative.
//! - No poll runs after the cancel token is set.

use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAITING_NOTICE_EVERY: u32 = 10;

/// Shared teardown flag observed before every poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    Waiting,
    Found,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    Cancelled { polls: u32 },
    Exhausted { polls: u32 },
}

impl Display for WaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled { polls } => {
                write!(f, "manifest wait cancelled after {polls} polls")
            }
            Self::Exhausted { polls } => {
                write!(f, "manifest did not appear after {polls} polls")
            }
        }
    }
}

impl Error for WaitError {}

#[derive(Debug)]
pub struct ManifestWaiter {
    path: PathBuf,
    interval: Duration,
    max_polls: Option<u32>,
    polls: u32,
    state: WaiterState,
    cancel: CancelToken,
}

impl ManifestWaiter {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, cancel: CancelToken) -> Self {
        Self {
            path: path.into(),
            interval,
            max_polls: None,
            polls: 0,
            state: WaiterState::Waiting,
            cancel,
        }
    }

    pub fn with_max_polls(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn state(&self) -> WaiterState {
        self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Runs one existence check and advances the state machine.
    pub fn poll(&mut self) -> Result<WaiterState, WaitError> {
        if self.state != WaiterState::Waiting {
            return Ok(self.state);
        }
        if self.cancel.is_cancelled() {
            return Err(WaitError::Cancelled { polls: self.polls });
        }

        self.polls += 1;
        if self.path.exists() {
            info!(
                "event=manifest_wait module=waiter status=found polls={} path={}",
                self.polls,
                self.path.display()
            );
            self.state = WaiterState::Found;
            return Ok(self.state);
        }

        if self.max_polls.is_some_and(|max| self.polls >= max) {
            return Err(WaitError::Exhausted { polls: self.polls });
        }
        if self.polls == 1 || self.polls % WAITING_NOTICE_EVERY == 0 {
            info!(
                "event=manifest_wait module=waiter status=waiting polls={} path={}",
                self.polls,
                self.path.display()
            );
        } else {
            debug!("event=manifest_wait module=waiter status=waiting polls={}", self.polls);
        }
        Ok(self.state)
    }

    /// Moves `Found` to `Done`, running `on_ready`. No-op in any other state.
    pub fn complete(&mut self, on_ready: impl FnOnce()) -> bool {
        if self.state != WaiterState::Found {
            return false;
        }
        self.state = WaiterState::Done;
        on_ready();
        true
    }

    /// Polls on the calling thread until the manifest exists, then completes.
    pub fn wait(mut self, on_ready: impl FnOnce()) -> Result<(), WaitError> {
        loop {
            match self.poll()? {
                WaiterState::Waiting => std::thread::sleep(self.interval),
                WaiterState::Found => {
                    self.complete(on_ready);
                    return Ok(());
                }
                WaiterState::Done => return Ok(()),
            }
        }
    }
}
