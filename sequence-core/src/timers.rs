//! One-shot delayed actions driven by the frame clock.
//!
//! Nothing here reads wall time: the owner advances the queue with each
//! frame's delta and receives the actions whose deadline has passed.

use alloc::vec::Vec;
use core::time::Duration;

/// Handle returned by [`DelayQueue::schedule`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

#[derive(Debug)]
struct Pending<A> {
    id: TimerId,
    deadline: Duration,
    action: A,
}

/// Queue of actions scheduled to fire once after a delay.
#[derive(Debug)]
pub struct DelayQueue<A> {
    now: Duration,
    next_id: u32,
    pending: Vec<Pending<A>>,
}

impl<A> Default for DelayQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> DelayQueue<A> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Schedules `action` to fire once `delay` has elapsed.
    ///
    /// A zero delay fires on the next [`advance`](Self::advance), even one
    /// with a zero delta.
    pub fn schedule(&mut self, delay: Duration, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let deadline = self.now.saturating_add(delay);
        // Keep deadline order; equal deadlines stay in scheduling order.
        let slot = self
            .pending
            .partition_point(|pending| pending.deadline <= deadline);
        self.pending.insert(
            slot,
            Pending {
                id,
                deadline,
                action,
            },
        );
        id
    }

    /// Cancels a pending action, returning it if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<A> {
        let position = self.pending.iter().position(|pending| pending.id == id)?;
        Some(self.pending.remove(position).action)
    }

    /// Moves time forward and returns every action now due, earliest first.
    pub fn advance(&mut self, delta: Duration) -> Vec<A> {
        self.now = self.now.saturating_add(delta);
        let due = self
            .pending
            .partition_point(|pending| pending.deadline <= self.now);
        self.pending
            .drain(..due)
            .map(|pending| pending.action)
            .collect()
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|pending| pending.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time remaining until the earliest pending action.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending
            .first()
            .map(|pending| pending.deadline.saturating_sub(self.now))
    }

    /// Drops every pending action.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
