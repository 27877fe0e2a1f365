use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SignalState {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// A one-way run/stop flag shared by every task of a stress run.
///
/// The signal starts out running. [`stop`](Self::stop) flips it to stopped
/// and wakes anyone blocked in [`wait`](Self::wait); it can be called from
/// any number of threads at once and never flips back. Clones share the
/// same flag, so the harness hands one clone to each task at spawn time.
///
/// Tasks poll [`is_stopped`](Self::is_stopped) once per loop iteration and
/// exit on their own. Nothing is ever terminated from outside.
///
/// # Examples
///
/// ```
/// use lockrace_core::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let task = signal.clone();
/// assert!(!task.is_stopped());
///
/// assert!(signal.stop());
/// assert!(!signal.stop()); // already stopped
/// assert!(task.is_stopped());
/// task.wait(); // returns immediately
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    state: Arc<SignalState>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Sets the signal to stopped.
    ///
    /// Returns true if this call performed the transition, false if the
    /// signal was already stopped.
    pub fn stop(&self) -> bool {
        let _guard = self.state.lock.lock();
        let first = !self.state.stopped.swap(true, Ordering::SeqCst);
        if first {
            self.state.cond.notify_all();
        }
        first
    }

    /// Blocks the calling thread until the signal is stopped.
    pub fn wait(&self) {
        let mut guard = self.state.lock.lock();
        while !self.is_stopped() {
            self.state.cond.wait(&mut guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_starts_running() {
        assert!(!ShutdownSignal::new().is_stopped());
    }

    #[test]
    fn test_only_one_stop_wins() {
        let signal = ShutdownSignal::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.stop())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(signal.is_stopped());
    }

    #[test]
    fn test_wait_wakes_on_stop() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || {
                signal.wait();
                signal.is_stopped()
            })
        };
        thread::sleep(Duration::from_millis(20));
        signal.stop();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_independent_signals() {
        let a = ShutdownSignal::new();
        let b = ShutdownSignal::new();
        a.stop();
        assert!(!b.is_stopped());
    }
}
