//! RingQueue: an unbounded, blocking FIFO over a circular chain of slots.
//!
//! Slots live in a `Vec` and are linked by index into a cycle. `tail` is
//! the next slot to fill and `head` the next to drain; one slot always
//! stays empty, so `count == capacity - 1` means the cycle is full. A push
//! into a full cycle splices a fresh batch of slots in after `tail`. No
//! value ever moves between slots and slots are never removed.
//!
//! One `Monitor` guards the whole structure; every mutation happens with
//! it held.

use crate::error::RingError;
use crate::monitor::Monitor;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::Dispatch;

/// Slots allocated up front.
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;
/// Slots added each time the ring fills.
pub const DEFAULT_GROW_BY: usize = 32;

/// Construction options for `RingQueue`.
#[derive(Clone, Debug)]
pub struct RingConfig {
    /// Initial slot count; at least 2.
    pub initial_capacity: usize,
    /// Slots spliced in per growth step; at least 1.
    pub grow_by: usize,
    dispatch: Option<Dispatch>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            grow_by: DEFAULT_GROW_BY,
            dispatch: None,
        }
    }
}

impl RingConfig {
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_grow_by(mut self, grow_by: usize) -> Self {
        self.grow_by = grow_by;
        self
    }

    /// Route this queue's diagnostics to `dispatch` instead of the
    /// thread's current default subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }
}

struct Slot<T> {
    value: Option<T>,
    next: usize,
}

struct RingState<T> {
    slots: Vec<Slot<T>>,
    head: usize,
    tail: usize,
    count: usize,
    // Poppers currently blocked on an empty ring.
    waiters: usize,
}

// `capacity` empty slots, each linked to the next and the last back to 0.
fn cycle<T>(capacity: usize) -> impl Iterator<Item = Slot<T>> {
    (0..capacity).map(move |i| Slot {
        value: None,
        next: (i + 1) % capacity,
    })
}

impl<T> RingState<T> {
    fn from_slots(slots: Vec<Slot<T>>) -> Self {
        Self {
            slots,
            head: 0,
            tail: 0,
            count: 0,
            waiters: 0,
        }
    }

    fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| RingError::OutOfMemory { capacity: 0 })?;
        slots.extend(cycle(capacity));
        Ok(Self::from_slots(slots))
    }

    fn is_full(&self) -> bool {
        self.count == self.slots.len() - 1
    }

    // Splice `by` empty slots in right after `tail`. The allocation happens
    // before any link changes, so failure leaves the cycle intact.
    fn grow(&mut self, by: usize) -> Result<(), RingError> {
        let capacity = self.slots.len();
        // Amortized reservation; only `by` slots are linked in.
        self.slots
            .try_reserve(by)
            .map_err(|_| RingError::OutOfMemory { capacity })?;
        let first = capacity;
        let after_tail = self.slots[self.tail].next;
        self.slots.extend((0..by).map(|i| Slot {
            value: None,
            next: if i + 1 == by { after_tail } else { first + i + 1 },
        }));
        self.slots[self.tail].next = first;
        Ok(())
    }

    fn take_head(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let slot = &mut self.slots[self.head];
        let value = slot.value.take();
        self.head = slot.next;
        self.count -= 1;
        value
    }
}

/// Thread-safe unbounded FIFO. Share it behind an `Arc`.
pub struct RingQueue<T> {
    monitor: Monitor<RingState<T>>,
    grow_by: usize,
    dispatch: Option<Dispatch>,
}

impl<T> RingQueue<T> {
    /// A queue with the default capacity and growth step.
    pub fn new() -> Self {
        Self {
            monitor: Monitor::new(RingState::from_slots(
                cycle(DEFAULT_INITIAL_CAPACITY).collect(),
            )),
            grow_by: DEFAULT_GROW_BY,
            dispatch: None,
        }
    }

    pub fn with_config(config: RingConfig) -> Result<Self, RingError> {
        let state = RingState::with_capacity(config.initial_capacity.max(2))?;
        Ok(Self {
            monitor: Monitor::new(state),
            grow_by: config.grow_by.max(1),
            dispatch: config.dispatch,
        })
    }

    fn emit(&self, f: impl FnOnce()) {
        match &self.dispatch {
            Some(d) => tracing::dispatcher::with_default(d, f),
            None => f(),
        }
    }

    /// Append `value`. Never blocks on a full ring: the ring grows instead.
    /// Wakes one blocked popper.
    pub fn push(&self, value: T) -> Result<(), RingError> {
        let mut state = self.monitor.lock();
        if state.is_full() {
            let capacity = state.slots.len();
            let count = state.count;
            self.emit(|| {
                tracing::warn!(capacity, count, grow_by = self.grow_by, "ring is full, adding slots")
            });
            state.grow(self.grow_by)?;
        }
        let tail = state.tail;
        state.slots[tail].value = Some(value);
        state.tail = state.slots[tail].next;
        state.count += 1;
        self.monitor.signal();
        Ok(())
    }

    /// Remove the oldest value, blocking while the ring is empty.
    pub fn pop(&self) -> T {
        let mut state = self.monitor.lock();
        loop {
            if let Some(value) = state.take_head() {
                return value;
            }
            state.waiters += 1;
            self.monitor.wait(&mut state);
            state.waiters -= 1;
        }
    }

    /// Like `pop`, but gives up after `timeout`. The deadline is fixed on
    /// entry; returns `None` if it passes while the ring is still empty.
    pub fn pop_timed(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.pop());
        };
        let mut state = self.monitor.lock();
        loop {
            if let Some(value) = state.take_head() {
                return Some(value);
            }
            state.waiters += 1;
            let outcome = self.monitor.wait_until(&mut state, deadline);
            state.waiters -= 1;
            if outcome.timed_out() && state.count == 0 {
                self.emit(|| tracing::trace!(?timeout, "ring pop timed out"));
                return None;
            }
        }
    }

    /// Remove the oldest value if there is one, without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.monitor.lock().take_head()
    }

    pub fn len(&self) -> usize {
        self.monitor.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots, including the one kept empty.
    pub fn capacity(&self) -> usize {
        self.monitor.lock().slots.len()
    }

    /// Poppers currently blocked waiting for a value.
    pub fn waiters(&self) -> usize {
        self.monitor.lock().waiters
    }
}

impl<T> Default for RingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.monitor.lock();
        f.debug_struct("RingQueue")
            .field("len", &state.count)
            .field("capacity", &state.slots.len())
            .field("waiters", &state.waiters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ring_is_empty_with_default_capacity() {
        let q: RingQueue<u32> = RingQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.capacity(), DEFAULT_INITIAL_CAPACITY);
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn fifo_order() {
        let q = RingQueue::new();
        for i in 1..=3 {
            q.push(i).unwrap();
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
        assert!(q.is_empty());
    }

    /// Invariant: growth triggers at `count == capacity - 1` and keeps FIFO
    /// order across the splice, even when head is not at slot 0.
    #[test]
    fn growth_splices_after_tail() {
        let q = RingQueue::with_config(
            RingConfig::default()
                .with_initial_capacity(4)
                .with_grow_by(2),
        )
        .unwrap();
        // Rotate head/tail away from slot 0 first.
        q.push(100).unwrap();
        q.push(101).unwrap();
        assert_eq!(q.pop(), 100);
        assert_eq!(q.pop(), 101);

        for i in 0..3 {
            q.push(i).unwrap();
        }
        assert_eq!(q.capacity(), 4);
        q.push(3).unwrap();
        assert_eq!(q.capacity(), 6);
        for i in 4..20 {
            q.push(i).unwrap();
        }
        assert!(q.capacity() > 20);
        for i in 0..20 {
            assert_eq!(q.pop(), i);
        }
        assert!(q.is_empty());
    }

    /// Invariant: each growth step links in exactly `by` slots while the
    /// backing storage is reallocated only a logarithmic number of times.
    #[test]
    fn growth_reallocates_geometrically() {
        let mut state: RingState<u32> = RingState::with_capacity(2).unwrap();
        let mut reallocations = 0;
        let mut reserved = state.slots.capacity();
        for step in 1..=1000 {
            state.grow(1).unwrap();
            assert_eq!(state.slots.len(), 2 + step);
            if state.slots.capacity() != reserved {
                reserved = state.slots.capacity();
                reallocations += 1;
            }
        }
        assert!(reallocations <= 12, "{reallocations} reallocations");

        // The cycle still visits every slot exactly once.
        let mut cur = state.slots[state.head].next;
        let mut visited = 1;
        while cur != state.head {
            cur = state.slots[cur].next;
            visited += 1;
        }
        assert_eq!(visited, state.slots.len());
    }

    #[test]
    fn interleaved_push_pop_across_growth() {
        let q = RingQueue::with_config(RingConfig::default().with_initial_capacity(2).with_grow_by(1))
            .unwrap();
        let mut expected = 0;
        let mut next = 0;
        for round in 0..50 {
            for _ in 0..(round % 5 + 1) {
                q.push(next).unwrap();
                next += 1;
            }
            for _ in 0..(round % 3) {
                if let Some(v) = q.try_pop() {
                    assert_eq!(v, expected);
                    expected += 1;
                }
            }
        }
        while let Some(v) = q.try_pop() {
            assert_eq!(v, expected);
            expected += 1;
        }
        assert_eq!(expected, next);
    }

    #[test]
    fn config_minimums_are_enforced() {
        let q: RingQueue<u8> =
            RingQueue::with_config(RingConfig::default().with_initial_capacity(0).with_grow_by(0))
                .unwrap();
        assert_eq!(q.capacity(), 2);
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.capacity(), 3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
    }

    #[test]
    fn pop_timed_on_empty_ring_times_out() {
        let q: RingQueue<u32> = RingQueue::new();
        let start = Instant::now();
        assert_eq!(q.pop_timed(Duration::from_millis(50)), None);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50), "returned after {waited:?}");
        assert!(waited < Duration::from_secs(5), "returned after {waited:?}");
        assert!(q.is_empty());
        assert_eq!(q.waiters(), 0);
        assert_eq!(q.capacity(), DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn pop_timed_returns_queued_value_immediately() {
        let q = RingQueue::new();
        q.push("v").unwrap();
        assert_eq!(q.pop_timed(Duration::ZERO), Some("v"));
    }

    #[test]
    fn drop_releases_queued_values() {
        let tracker = std::sync::Arc::new(());
        let q = RingQueue::new();
        for _ in 0..300 {
            q.push(tracker.clone()).unwrap();
        }
        assert_eq!(std::sync::Arc::strong_count(&tracker), 301);
        drop(q);
        assert_eq!(std::sync::Arc::strong_count(&tracker), 1);
    }

    #[test]
    fn debug_reports_counts() {
        let q = RingQueue::new();
        q.push(1).unwrap();
        let s = format!("{q:?}");
        assert!(s.contains("len: 1"), "{s}");
        assert!(s.contains("capacity: 256"), "{s}");
    }
}
