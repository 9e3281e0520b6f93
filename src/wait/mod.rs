//! Blocking readiness checks against a running container.
//!
//! Every strategy polls on the calling thread until its condition holds or
//! its timeout elapses. There is no cancellation other than the timeout, and
//! an unbounded timeout may block forever.

mod http;
mod port;
mod process;

pub use http::http;
pub use port::port;
pub use process::process;

use crate::domain::Timeout;
use crate::error::{HookError, Result};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const PORT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const HTTP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Point in time at which a wait gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    pub fn new(timeout: Timeout) -> Self {
        let end = match timeout {
            // A duration too large to represent as an instant never expires.
            Timeout::After(d) => Instant::now().checked_add(d),
            Timeout::Unbounded => None,
        };
        Self { end }
    }

    pub fn expired(&self) -> bool {
        self.end.is_some_and(|end| Instant::now() >= end)
    }

    /// Time left, `None` when the deadline never expires
    pub fn remaining(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_duration_since(Instant::now()))
    }

    /// Shorten `wanted` so it does not run past the deadline
    pub fn cap(&self, wanted: Duration) -> Duration {
        match self.remaining() {
            Some(left) => wanted.min(left),
            None => wanted,
        }
    }
}

/// Result of a single probe
pub(crate) enum Probe<T> {
    Ready(T),
    /// Not ready yet; keep polling
    Pending,
    /// The probe itself failed; keep polling, but report it if time runs out
    Failed(String),
}

/// Run `probe` every `interval` until it is ready or `timeout` elapses.
pub(crate) fn poll<T>(
    target: &str,
    timeout: Timeout,
    interval: Duration,
    mut probe: impl FnMut(&Deadline) -> Probe<T>,
) -> Result<T> {
    let deadline = Deadline::new(timeout);
    let mut attempts = 0u32;

    loop {
        attempts = attempts.saturating_add(1);
        let failure = match probe(&deadline) {
            Probe::Ready(value) => {
                debug!("{target} ready after {attempts} attempt(s)");
                return Ok(value);
            }
            Probe::Pending => None,
            Probe::Failed(reason) => {
                debug!("probe of {target} failed: {reason}");
                Some(reason)
            }
        };

        if deadline.expired() {
            return Err(match failure {
                Some(reason) => HookError::RequestFailed {
                    target: target.to_string(),
                    reason,
                },
                None => HookError::WaitTimeout {
                    target: target.to_string(),
                    timeout,
                },
            });
        }

        thread::sleep(deadline.cap(interval));
    }
}
