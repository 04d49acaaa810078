use crate::foundation::core::Millis;
use std::{cell::Cell, rc::Rc, time::Instant};

/// Source of "now" for the scheduler and runtime.
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Virtual clock advanced explicitly by the caller.
///
/// Clones share the same time cell, so a test can keep one handle while the runtime owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(t: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(t.0)),
        }
    }

    pub fn advance(&self, span: Millis) {
        self.now.set(self.now.get().saturating_add(span.0));
    }

    /// Move to `t`. Time never runs backwards, so earlier values are ignored.
    pub fn set(&self, t: Millis) {
        if t.0 > self.now.get() {
            self.now.set(t.0);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.now.get())
    }
}

/// Monotonic wall clock measured from construction.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        let ms = self.origin.elapsed().as_millis();
        Millis(u64::try_from(ms).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(Millis(40));
        assert_eq!(b.now(), Millis(40));
        b.set(Millis(10));
        assert_eq!(a.now(), Millis(40));
        b.set(Millis(100));
        assert_eq!(a.now(), Millis(100));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let c = SystemClock::new();
        let t0 = c.now();
        let t1 = c.now();
        assert!(t1 >= t0);
    }
}
