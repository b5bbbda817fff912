//! Selection-change coalescing
//!
//! Browsers fire `selectionchange` for every caret movement while a user
//! drags. The debouncer keeps only the latest pending value and releases it
//! once no new value has arrived for `delay_ms`. Time is supplied by the
//! caller in milliseconds, so the core never reads a clock.

#[derive(Debug, Clone)]
pub struct SelectionDebouncer<T> {
    delay_ms: f64,
    pending: Option<(T, f64)>,
}

impl<T> SelectionDebouncer<T> {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms: delay_ms.max(0.0),
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    /// Record a new value at `now_ms`, replacing any pending one
    pub fn push(&mut self, value: T, now_ms: f64) {
        self.pending = Some((value, now_ms));
    }

    /// Drop the pending value
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time at which the pending value becomes ready
    pub fn ready_at(&self) -> Option<f64> {
        self.pending.as_ref().map(|(_, at)| at + self.delay_ms)
    }

    /// Take the pending value if it has been quiet for the full delay
    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        match self.ready_at() {
            Some(ready) if now_ms >= ready => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_value_is_released() {
        let mut debouncer = SelectionDebouncer::new(300.0);
        debouncer.push("a", 0.0);
        debouncer.push("b", 100.0);
        assert_eq!(debouncer.poll(350.0), None);
        assert_eq!(debouncer.poll(400.0), Some("b"));
        assert_eq!(debouncer.poll(1000.0), None);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut debouncer = SelectionDebouncer::new(300.0);
        debouncer.push(1, 0.0);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(500.0), None);
    }

    #[test]
    fn test_zero_delay_releases_immediately() {
        let mut debouncer = SelectionDebouncer::new(0.0);
        debouncer.push(7, 10.0);
        assert_eq!(debouncer.ready_at(), Some(10.0));
        assert_eq!(debouncer.poll(10.0), Some(7));
    }
}
