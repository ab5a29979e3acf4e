//! Cancel-and-reschedule debouncing for the search input.
//!
//! The debouncer owns a single pending slot. Every [`Debouncer::schedule`]
//! replaces whatever was pending, so only the last value inside a burst is
//! ever delivered. It can be driven two ways:
//!
//! - clock polling: call [`Debouncer::due`] with the current time;
//! - timer callbacks: hand the returned [`DebounceTicket`] to a timer and
//!   call [`Debouncer::fire`] when it elapses. Stale tickets yield nothing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket(u64);

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline_ms: u64,
    ticket: DebounceTicket,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet_period_ms: u64,
    next_ticket: u64,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub const fn new(quiet_period_ms: u64) -> Self {
        Self {
            quiet_period_ms,
            next_ticket: 0,
            pending: None,
        }
    }

    #[must_use]
    pub const fn quiet_period_ms(&self) -> u64 {
        self.quiet_period_ms
    }

    /// Replace any pending value and restart the quiet period from `now_ms`.
    pub fn schedule(&mut self, value: T, now_ms: u64) -> DebounceTicket {
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let ticket = DebounceTicket(self.next_ticket);
        self.pending = Some(Pending {
            value,
            deadline_ms: now_ms.saturating_add(self.quiet_period_ms),
            ticket,
        });
        ticket
    }

    /// Drop the pending value, if any.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn deadline_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.deadline_ms)
    }

    /// Take the pending value once the quiet period has elapsed.
    pub fn due(&mut self, now_ms: u64) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|pending| now_ms >= pending.deadline_ms);
        if ready { self.cancel() } else { None }
    }

    /// Take the pending value if `ticket` is still the latest one scheduled.
    pub fn fire(&mut self, ticket: DebounceTicket) -> Option<T> {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == ticket);
        if current { self.cancel() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_after_quiet_period() {
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule("a", 1_000);
        assert_eq!(debouncer.deadline_ms(), Some(1_300));
        assert_eq!(debouncer.due(1_299), None);
        assert_eq!(debouncer.due(1_300), Some("a"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.due(5_000), None);
    }

    #[test]
    fn new_input_restarts_the_timer() {
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule("an", 0);
        debouncer.schedule("ani", 200);
        debouncer.schedule("anim", 400);
        assert_eq!(debouncer.due(600), None);
        assert_eq!(debouncer.due(700), Some("anim"));
    }

    #[test]
    fn stale_tickets_are_ignored() {
        let mut debouncer = Debouncer::new(300);
        let first = debouncer.schedule("a", 0);
        let second = debouncer.schedule("an", 10);
        assert_eq!(debouncer.fire(first), None);
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.fire(second), Some("an"));
        assert_eq!(debouncer.fire(second), None);
    }

    #[test]
    fn cancel_clears_pending_value() {
        let mut debouncer = Debouncer::new(300);
        let ticket = debouncer.schedule("x", 0);
        assert_eq!(debouncer.cancel(), Some("x"));
        assert_eq!(debouncer.fire(ticket), None);
        assert_eq!(debouncer.due(1_000), None);
    }
}
