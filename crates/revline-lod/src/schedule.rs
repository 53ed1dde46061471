//! Cancellable deferred work polled by the frame loop.

use std::time::{Duration, Instant};

/// A payload that becomes due at a deadline and can be replaced or cancelled
/// before it fires. Holds at most one pending payload.
#[derive(Debug)]
pub struct ScheduledTask<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for ScheduledTask<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> ScheduledTask<T> {
    /// Create an idle task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `payload` to fire `delay` after `now`.
    ///
    /// Any payload already pending is superseded and returned.
    pub fn schedule(&mut self, now: Instant, delay: Duration, payload: T) -> Option<T> {
        self.pending
            .replace((now + delay, payload))
            .map(|(_, previous)| previous)
    }

    /// Cancel the pending payload without firing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    /// Whether a payload is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending payload, if any.
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, payload)| payload)
    }

    /// When the pending payload fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the payload if its deadline has been reached.
    pub fn take_if_due(&mut self, now: Instant) -> Option<T> {
        match self.pending {
            Some((deadline, _)) if now >= deadline => self.cancel(),
            _ => None,
        }
    }
}
