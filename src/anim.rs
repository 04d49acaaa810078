use crate::{
    anim_ease::Ease,
    foundation::core::Millis,
    foundation::error::{CurtainError, CurtainResult},
};
use kurbo::Affine;

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

/// Visual state of an animated element: opacity plus a vertical offset and uniform scale.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub opacity: f64,
    pub translate_y: f64, // px
    pub scale: f64,
}

impl Pose {
    /// Fully opaque and untransformed.
    pub const REST: Self = Self {
        opacity: 1.0,
        translate_y: 0.0,
        scale: 1.0,
    };

    pub fn transform(self) -> Affine {
        Affine::translate((0.0, self.translate_y)) * Affine::scale(self.scale)
    }

    /// Whether this is the terminal entrance state (opacity 1, identity transform).
    pub fn is_terminal(self) -> bool {
        self.opacity == 1.0 && self.transform() == Affine::IDENTITY
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::REST
    }
}

impl Lerp for Pose {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Self {
            opacity: f64::lerp(&a.opacity, &b.opacity, t),
            translate_y: f64::lerp(&a.translate_y, &b.translate_y, t),
            scale: f64::lerp(&a.scale, &b.scale, t),
        }
    }
}

/// Two-keyframe animation between poses, like a `from`/`to` Web Animation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyframeAnimation {
    pub from: Pose,
    pub to: Pose,
    pub duration: Millis,
    pub ease: Ease,
    /// Hold the final pose after completion.
    pub fill_forwards: bool,
}

impl KeyframeAnimation {
    /// The focal graphic's entrance: fade up from slightly below and smaller.
    pub fn entrance() -> Self {
        Self {
            from: Pose {
                opacity: 0.0,
                translate_y: 20.0,
                scale: 0.85,
            },
            to: Pose::REST,
            duration: Millis(5000),
            ease: Ease::ENTRANCE,
            fill_forwards: true,
        }
    }

    pub fn validate(&self) -> CurtainResult<()> {
        if self.duration == Millis::ZERO {
            return Err(CurtainError::validation(
                "KeyframeAnimation duration must be > 0",
            ));
        }
        for p in [self.from, self.to] {
            if !(0.0..=1.0).contains(&p.opacity) {
                return Err(CurtainError::validation(
                    "KeyframeAnimation opacity must be within [0, 1]",
                ));
            }
            if !p.translate_y.is_finite() || !p.scale.is_finite() {
                return Err(CurtainError::validation(
                    "KeyframeAnimation transform values must be finite",
                ));
            }
        }
        self.ease.validate()
    }

    pub fn is_finished(&self, elapsed: Millis) -> bool {
        elapsed >= self.duration
    }

    /// Pose at `elapsed` since start. Without `fill_forwards` the element snaps back to rest.
    pub fn sample(&self, elapsed: Millis) -> Pose {
        if self.is_finished(elapsed) {
            return if self.fill_forwards {
                self.to
            } else {
                Pose::REST
            };
        }
        let t = (elapsed.0 as f64) / (self.duration.0 as f64);
        Pose::lerp(&self.from, &self.to, self.ease.apply(t))
    }
}
