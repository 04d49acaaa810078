use crate::foundation::error::{CurtainError, CurtainResult};

/// Point or span on the virtual timeline, in whole milliseconds.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    /// Saturating addition of a span.
    pub fn after(self, span: Millis) -> Self {
        Self(self.0.saturating_add(span.0))
    }

    /// Time elapsed since `earlier`, zero if `earlier` lies in the future.
    pub fn elapsed_since(self, earlier: Millis) -> Millis {
        Self(self.0.saturating_sub(earlier.0))
    }

    /// Scale a span by an integer factor (stagger offsets).
    pub fn times(self, n: u64) -> Self {
        Self(self.0.saturating_mul(n))
    }

    pub fn as_secs_f64(self) -> f64 {
        (self.0 as f64) / 1000.0
    }
}

impl std::ops::Add for Millis {
    type Output = Millis;

    fn add(self, rhs: Millis) -> Millis {
        self.after(rhs)
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Cadence of rendering-frame boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FrameInterval(Millis);

impl FrameInterval {
    /// Create a validated interval; a zero interval would never advance time.
    pub fn new(ms: u64) -> CurtainResult<Self> {
        if ms == 0 {
            return Err(CurtainError::validation("FrameInterval must be > 0 ms"));
        }
        Ok(Self(Millis(ms)))
    }

    pub fn span(self) -> Millis {
        self.0
    }

    /// Round `t` up to the next frame boundary (boundaries are multiples of the interval).
    pub fn next_boundary(self, t: Millis) -> Millis {
        let step = self.0.0;
        Millis(t.0.div_ceil(step).saturating_mul(step))
    }
}

impl Default for FrameInterval {
    fn default() -> Self {
        Self(Millis(16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_arithmetic_saturates() {
        assert_eq!(Millis(5).elapsed_since(Millis(9)), Millis::ZERO);
        assert_eq!(Millis(u64::MAX).after(Millis(1)), Millis(u64::MAX));
        assert_eq!(Millis(120).times(3), Millis(360));
        assert_eq!(Millis(100) + Millis(20), Millis(120));
    }

    #[test]
    fn frame_interval_rejects_zero() {
        assert!(FrameInterval::new(0).is_err());
        assert_eq!(FrameInterval::default().span(), Millis(16));
    }

    #[test]
    fn next_boundary_rounds_up() {
        let fi = FrameInterval::new(16).unwrap();
        assert_eq!(fi.next_boundary(Millis(0)), Millis(0));
        assert_eq!(fi.next_boundary(Millis(1)), Millis(16));
        assert_eq!(fi.next_boundary(Millis(16)), Millis(16));
        assert_eq!(fi.next_boundary(Millis(440)), Millis(448));
    }

    #[test]
    fn millis_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Millis(440)).unwrap(), "440");
    }
}
