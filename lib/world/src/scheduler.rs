//! Deferred callback scheduling, backed by a min-heap keyed on the tick a
//! callback is due. Used for respawn timers, despawn timers and the
//! repeating gather action loop.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DeferredId(u64);

struct Entry<T> {
    due_tick: u64,
    repeat_every: Option<u64>,
    id: DeferredId,
    payload: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap (a max-heap) pops the earliest due tick first.
        other.due_tick.cmp(&self.due_tick)
    }
}

/// Schedules one-shot and repeating callbacks measured in ticks. The
/// scheduler itself never invokes anything; `drain_due` hands back the
/// payloads whose due tick has arrived so the caller can dispatch them and
/// stays the single place that knows what a callback actually does.
pub struct DeferredScheduler<T> {
    heap: BinaryHeap<Entry<T>>,
    cancelled: HashSet<DeferredId>,
    next_id: u64,
}

impl<T: Clone> DeferredScheduler<T> {
    pub fn new() -> DeferredScheduler<T> {
        DeferredScheduler {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> DeferredId {
        let id = DeferredId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Schedules `payload` to fire once, `delay_ticks` ticks from `current_tick`.
    pub fn schedule_once(&mut self, current_tick: u64, delay_ticks: u64, payload: T) -> DeferredId {
        let id = self.alloc_id();
        self.heap.push(Entry {
            due_tick: current_tick + delay_ticks,
            repeat_every: None,
            id,
            payload,
        });
        id
    }

    /// Schedules `payload` to fire every `interval_ticks` ticks, starting
    /// `interval_ticks` from `current_tick`.
    pub fn schedule_repeating(&mut self, current_tick: u64, interval_ticks: u64, payload: T) -> DeferredId {
        let id = self.alloc_id();
        self.heap.push(Entry {
            due_tick: current_tick + interval_ticks,
            repeat_every: Some(interval_ticks),
            id,
            payload,
        });
        id
    }

    /// Cancels a previously scheduled callback. Safe to call with an id
    /// that has already fired or doesn't exist.
    pub fn cancel(&mut self, id: DeferredId) {
        self.cancelled.insert(id);
    }

    /// Pops every entry due at or before `current_tick`, re-enqueuing
    /// repeating entries for their next occurrence. Cancelled entries are
    /// dropped silently.
    pub fn drain_due(&mut self, current_tick: u64) -> Vec<(DeferredId, T)> {
        let mut fired = Vec::new();

        while let Some(entry) = self.heap.peek() {
            if entry.due_tick > current_tick {
                break;
            }

            let entry = self.heap.pop().expect("peek just confirmed an entry exists");

            if self.cancelled.remove(&entry.id) {
                continue;
            }

            if let Some(interval) = entry.repeat_every {
                self.heap.push(Entry {
                    due_tick: entry.due_tick + interval,
                    repeat_every: Some(interval),
                    id: entry.id,
                    payload: entry.payload.clone(),
                });
            }

            fired.push((entry.id, entry.payload));
        }

        fired
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T: Clone> Default for DeferredScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_due_order() {
        let mut sched = DeferredScheduler::new();
        sched.schedule_once(0, 5, "later");
        sched.schedule_once(0, 1, "sooner");

        let fired = sched.drain_due(1);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, "sooner");

        assert!(sched.drain_due(4).is_empty());

        let fired = sched.drain_due(5);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, "later");
    }

    #[test]
    fn test_repeating_reenqueues() {
        let mut sched = DeferredScheduler::new();
        sched.schedule_repeating(0, 10, "tick");

        assert!(sched.drain_due(9).is_empty());
        assert_eq!(sched.drain_due(10).len(), 1);
        assert!(sched.drain_due(19).is_empty());
        assert_eq!(sched.drain_due(20).len(), 1);
    }

    #[test]
    fn test_cancel_skips_firing() {
        let mut sched = DeferredScheduler::new();
        let id = sched.schedule_once(0, 3, "cancel me");
        sched.cancel(id);

        assert!(sched.drain_due(3).is_empty());
    }

    #[test]
    fn test_cancel_repeating_stops_future_fires() {
        let mut sched = DeferredScheduler::new();
        let id = sched.schedule_repeating(0, 2, "loop");

        assert_eq!(sched.drain_due(2).len(), 1);
        sched.cancel(id);
        assert!(sched.drain_due(4).is_empty());
    }
}
