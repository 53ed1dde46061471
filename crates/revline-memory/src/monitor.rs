//! Background sampler thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

/// A running sampler. Dropping the handle disconnects the stop channel, which
/// ends the thread after its current tick without waiting for it.
pub(crate) struct MonitorHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
    interval: Duration,
}

impl MonitorHandle {
    /// Spawn a thread that calls `tick` every `interval` until stopped or
    /// until `tick` returns `false`.
    pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("memory-monitor".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !tick() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!("Memory monitor thread exiting");
            })?;

        Ok(Self {
            stop_tx,
            thread,
            interval,
        })
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Signal the thread and wait for an in-progress tick to finish.
    ///
    /// Called from the monitor thread itself (a pressure callback stopping
    /// monitoring), the thread is signalled but not joined.
    pub(crate) fn stop(self) {
        let _ = self.stop_tx.try_send(());
        if self.thread.thread().id() == thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            tracing::warn!("Memory monitor thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = MonitorHandle::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();
        assert_eq!(handle.interval(), Duration::from_millis(5));

        assert!(wait_for(|| ticks.load(Ordering::SeqCst) >= 3));
        handle.stop();

        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_tick_returning_false_ends_thread() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = MonitorHandle::spawn(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        })
        .unwrap();

        assert!(wait_for(|| handle.thread.is_finished()));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        handle.stop();
    }
}
