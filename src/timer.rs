//! One-shot timers

use std::collections::BTreeMap;

use crate::time::Instant;

/// Source of unique identifiers
///
/// Owned by whatever needs the identifiers; `reset` starts the sequence over.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    next: u64,
}

impl Counter {
    /// Creates a counter that starts at zero
    pub fn new() -> Self {
        Counter::default()
    }

    /// Returns the next identifier
    pub fn next(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Starts the sequence over
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Handle to a scheduled timer; used to cancel it
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Token {
    deadline: Instant,
    id: u64,
}

impl Token {
    /// Instant at which the timer fires
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Queue of one-shot timers, each one carrying a value of type `K`
///
/// Timers don't fire on their own: the owner drains the expired ones with `pop_expired`. A canceled
/// timer is gone from the queue so it can never fire.
#[derive(Debug)]
pub struct Queue<K> {
    timers: BTreeMap<Token, K>,
    ids: Counter,
}

impl<K> Default for Queue<K> {
    fn default() -> Self {
        Queue {
            timers: BTreeMap::new(),
            ids: Counter::new(),
        }
    }
}

impl<K> Queue<K> {
    /// Creates an empty queue
    pub fn new() -> Self {
        Queue::default()
    }

    /// Schedules a timer that fires at `deadline`
    pub fn schedule(&mut self, deadline: Instant, key: K) -> Token {
        let token = Token {
            deadline,
            id: self.ids.next(),
        };

        self.timers.insert(token, key);
        token
    }

    /// Cancels a timer; returns its value if it was still pending
    pub fn cancel(&mut self, token: Token) -> Option<K> {
        self.timers.remove(&token)
    }

    /// Removes and returns the earliest timer whose deadline is not after `now`
    pub fn pop_expired(&mut self, now: Instant) -> Option<(Token, K)> {
        let token = *self.timers.keys().next()?;

        if token.deadline > now {
            return None;
        }

        self.timers.remove(&token).map(|key| (token, key))
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().map(|token| token.deadline)
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if no timer is pending
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Cancels all timers and starts the token sequence over
    pub fn clear(&mut self) {
        self.timers.clear();
        self.ids.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, Queue};
    use crate::time::Instant;

    #[test]
    fn counter() {
        let mut c = Counter::new();
        assert_eq!(c.next(), 0);
        assert_eq!(c.next(), 1);

        c.reset();
        assert_eq!(c.next(), 0);
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut q = Queue::new();
        q.schedule(Instant::from_secs(2), 'b');
        q.schedule(Instant::from_secs(1), 'a');
        q.schedule(Instant::from_secs(3), 'c');

        assert_eq!(q.next_deadline(), Some(Instant::from_secs(1)));
        assert_eq!(q.pop_expired(Instant::from_millis(500)), None);

        let now = Instant::from_secs(2);
        assert_eq!(q.pop_expired(now).map(|(_, k)| k), Some('a'));
        assert_eq!(q.pop_expired(now).map(|(_, k)| k), Some('b'));
        assert_eq!(q.pop_expired(now), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn canceled_timer_never_fires() {
        let mut q = Queue::new();
        let t = q.schedule(Instant::from_secs(1), "x");
        q.schedule(Instant::from_secs(1), "y");

        assert_eq!(q.cancel(t), Some("x"));
        // second cancellation is a no-op
        assert_eq!(q.cancel(t), None);

        let fired: Vec<_> = std::iter::from_fn(|| q.pop_expired(Instant::from_secs(10)))
            .map(|(_, k)| k)
            .collect();
        assert_eq!(fired, ["y"]);
        assert!(q.is_empty());
    }
}
