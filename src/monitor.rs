//! Monitor: a mutex and the condition variable bound to it, in one handle.
//!
//! `wait` does not test any predicate. Callers re-check their condition in a
//! loop around every wait, since a wake-up may be spurious or may have been
//! consumed by another waiter first.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// How a timed wait ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WaitOutcome {
    /// Woken by `signal`, `broadcast` or spuriously, before the deadline.
    Signaled,
    /// The deadline passed.
    TimedOut,
}

impl WaitOutcome {
    #[inline]
    pub fn timed_out(self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// Mutual exclusion over `T` plus a condition variable for waiting on
/// changes to it.
#[derive(Debug, Default)]
pub struct Monitor<T> {
    state: Mutex<T>,
    cond: Condvar,
    waiters: AtomicUsize,
}

/// Lock held on a `Monitor`. Dropping it unlocks.
pub struct MonitorGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Monitor<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(value),
            cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) -> MonitorGuard<'_, T> {
        MonitorGuard {
            guard: self.state.lock(),
        }
    }

    pub fn try_lock(&self) -> Option<MonitorGuard<'_, T>> {
        self.state.try_lock().map(|guard| MonitorGuard { guard })
    }

    /// Release the lock, block until woken, then re-acquire it.
    pub fn wait(&self, guard: &mut MonitorGuard<'_, T>) {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        self.cond.wait(&mut guard.guard);
        self.waiters.fetch_sub(1, Ordering::Relaxed);
    }

    /// Like `wait`, but gives up once `deadline` has passed. The lock is
    /// held again on return either way.
    pub fn wait_until(&self, guard: &mut MonitorGuard<'_, T>, deadline: Instant) -> WaitOutcome {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        let res = self.cond.wait_until(&mut guard.guard, deadline);
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        if res.timed_out() {
            tracing::trace!("monitor wait reached its deadline");
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Signaled
        }
    }

    pub fn wait_for(&self, guard: &mut MonitorGuard<'_, T>, timeout: Duration) -> WaitOutcome {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(guard, deadline),
            None => {
                self.wait(guard);
                WaitOutcome::Signaled
            }
        }
    }

    /// Wake at most one blocked waiter. Returns whether one was woken.
    pub fn signal(&self) -> bool {
        self.cond.notify_one()
    }

    /// Wake every blocked waiter. Returns how many were woken.
    pub fn broadcast(&self) -> usize {
        self.cond.notify_all()
    }

    /// Threads currently blocked in a wait on this monitor. Diagnostic only:
    /// the value may be stale by the time it is read.
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.state.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}

impl<'a, T> MonitorGuard<'a, T> {
    /// Explicit unlock; equivalent to dropping the guard.
    pub fn unlock(self) {
        drop(self);
    }
}

impl<T> Deref for MonitorGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for MonitorGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
