pub mod memory;

use crate::{anim::KeyframeAnimation, foundation::core::Millis, foundation::error::CurtainResult};

/// CSS-style state classes toggled on targets.
pub mod class {
    pub const SHOW: &str = "show";
    pub const FADE: &str = "fade";
    pub const FADE_OUT: &str = "fade-out";
    pub const FULLSCREEN: &str = "fullscreen";
    pub const VISIBLE: &str = "visible";
}

/// Unique key of a visual target.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ElementKey {
    Audio,
    PlayButton,
    IntroText,
    Logo,
    Video,
    ScrollArrow,
    Details,
    DetailItem(usize),
    CardCollection,
    Card(usize),
    MainContent,
    EndBackdrop,
    EndImage,
    EndText,
    LogoGrid,
}

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::PlayButton => f.write_str("play_button"),
            Self::IntroText => f.write_str("intro_text"),
            Self::Logo => f.write_str("logo"),
            Self::Video => f.write_str("video"),
            Self::ScrollArrow => f.write_str("scroll_arrow"),
            Self::Details => f.write_str("details"),
            Self::DetailItem(i) => write!(f, "detail_item[{i}]"),
            Self::CardCollection => f.write_str("card_collection"),
            Self::Card(i) => write!(f, "card[{i}]"),
            Self::MainContent => f.write_str("main_content"),
            Self::EndBackdrop => f.write_str("end_backdrop"),
            Self::EndImage => f.write_str("end_image"),
            Self::EndText => f.write_str("end_text"),
            Self::LogoGrid => f.write_str("logo_grid"),
        }
    }
}

/// Ordered collections of targets revealed as a cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    DetailItems,
    Cards,
}

impl Group {
    pub fn key(self, index: usize) -> ElementKey {
        match self {
            Self::DetailItems => ElementKey::DetailItem(index),
            Self::Cards => ElementKey::Card(index),
        }
    }
}

/// External event delivered to the director.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    AnimationFinished(ElementKey),
    VideoCanPlay,
    VideoError,
    VideoEnded,
}

/// Visual targets. Operations on an absent target return `CurtainError::Element`.
pub trait Page {
    fn contains(&self, key: ElementKey) -> bool;

    /// Number of members of `group`; members are keyed `0..count`.
    fn count(&self, group: Group) -> usize;

    fn add_class(&mut self, key: ElementKey, class: &str) -> CurtainResult<()>;

    fn remove_class(&mut self, key: ElementKey, class: &str) -> CurtainResult<()>;

    /// Include in (`true`) or remove from (`false`) layout.
    fn set_display(&mut self, key: ElementKey, shown: bool) -> CurtainResult<()>;

    fn set_aria_hidden(&mut self, key: ElementKey, hidden: bool) -> CurtainResult<()>;

    fn set_disabled(&mut self, key: ElementKey, disabled: bool) -> CurtainResult<()>;

    /// Start a keyframe animation; completion is reported as `Signal::AnimationFinished`.
    fn animate(
        &mut self,
        key: ElementKey,
        anim: &KeyframeAnimation,
        now: Millis,
    ) -> CurtainResult<()>;

    /// Smooth-scroll so `key` sits `offset_px` below the viewport top.
    fn scroll_to(&mut self, key: ElementKey, offset_px: f64) -> CurtainResult<()>;

    /// Drain events that occurred up to `now`.
    fn poll_signals(&mut self, now: Millis) -> Vec<Signal>;
}

/// The ambient audio element. `play` fails when playback is rejected.
pub trait AudioSink {
    fn play(&mut self) -> CurtainResult<()>;

    fn pause(&mut self);

    fn seek_start(&mut self);

    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);
}

/// The video element's media side (presentation classes go through `Page`).
pub trait VideoSink {
    /// Force a reload of the resource.
    fn load(&mut self, now: Millis);

    fn play(&mut self, now: Millis) -> CurtainResult<()>;

    /// Whether any data is buffered.
    fn has_buffered(&self) -> bool;

    /// Drain readiness, error and completion events up to `now`.
    fn poll_signals(&mut self, now: Millis) -> Vec<Signal>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_keys_display_with_index() {
        assert_eq!(ElementKey::DetailItem(3).to_string(), "detail_item[3]");
        assert_eq!(ElementKey::Card(0).to_string(), "card[0]");
        assert_eq!(ElementKey::PlayButton.to_string(), "play_button");
    }

    #[test]
    fn group_keys_map_to_members() {
        assert_eq!(Group::DetailItems.key(2), ElementKey::DetailItem(2));
        assert_eq!(Group::Cards.key(1), ElementKey::Card(1));
    }

    #[test]
    fn element_key_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ElementKey::ScrollArrow).unwrap(),
            r#""scroll_arrow""#
        );
        assert_eq!(
            serde_json::to_string(&ElementKey::Card(2)).unwrap(),
            r#"{"card":2}"#
        );
    }
}
