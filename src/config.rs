use crate::{
    anim::KeyframeAnimation,
    foundation::core::{FrameInterval, Millis},
    foundation::error::{CurtainError, CurtainResult},
};

/// What follows the video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    /// Scroll cue, scroll to details, cascade details and cards.
    #[default]
    ScrollReveal,
    /// Hide the page and play the closing image/text/logo sequence.
    EndSequence,
}

/// Offsets of the scroll-reveal continuation, measured from the video's end.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealTimings {
    pub arrow_delay: Millis,
    pub scroll_delay: Millis,
    /// Extra px between viewport top and the details section (negative scrolls less).
    pub scroll_offset_px: f64,
    /// Delay from the scroll to the start of the cascades.
    pub cascade_delay: Millis,
    pub detail_stagger: Millis,
    /// Card cascade start, relative to the detail cascade start.
    pub card_offset: Millis,
    pub card_stagger: Millis,
}

impl Default for RevealTimings {
    fn default() -> Self {
        Self {
            arrow_delay: Millis(200),
            scroll_delay: Millis(1200),
            scroll_offset_px: -24.0,
            cascade_delay: Millis(700),
            detail_stagger: Millis(120),
            card_offset: Millis(600),
            card_stagger: Millis(160),
        }
    }
}

/// Absolute offsets of the closing sequence, measured from the video's end.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndSequenceTimings {
    pub image_in: Millis,
    pub image_out: Millis,
    pub text_in: Millis,
    pub text_out: Millis,
    pub logos: Millis,
    /// Ambient volume the music fades back up to with the logo grid.
    pub music_volume: f64,
    pub music_fade_in: Millis,
}

impl Default for EndSequenceTimings {
    fn default() -> Self {
        Self {
            image_in: Millis(300),
            image_out: Millis(3300),
            text_in: Millis(4500),
            text_out: Millis(7500),
            logos: Millis(8700),
            music_volume: 0.3,
            music_fade_in: Millis(1500),
        }
    }
}

impl EndSequenceTimings {
    fn offsets(&self) -> [Millis; 5] {
        [
            self.image_in,
            self.image_out,
            self.text_in,
            self.text_out,
            self.logos,
        ]
    }
}

/// Timings and options of one show. Every field has a default, so a JSON file only needs the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShowConfig {
    pub frame_interval: FrameInterval,
    pub ending: Ending,
    /// Unlock audio during the begin gesture (play + pause), as iOS requires.
    pub ios_audio_unlock: bool,
    /// Reload and wait for readiness before playing the video.
    pub video_buffering: bool,

    pub button_fade: Millis,
    pub intro_visible: Millis,
    pub intro_fade: Millis,
    pub logo_animation: KeyframeAnimation,
    pub audio_fade: Millis,
    pub audio_fade_steps: u32,
    pub video_delay: Millis,
    pub video_retry: Millis,
    /// Playback is forced this long after fullscreen presentation, ready or not.
    pub video_failsafe: Millis,
    /// Upper bound on reload attempts after errors; `None` leaves only the failsafe.
    pub video_max_retries: Option<u32>,

    pub reveal: RevealTimings,
    pub end_sequence: EndSequenceTimings,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            frame_interval: FrameInterval::default(),
            ending: Ending::ScrollReveal,
            ios_audio_unlock: false,
            video_buffering: true,
            button_fade: Millis(440),
            intro_visible: Millis(2000),
            intro_fade: Millis(900),
            logo_animation: KeyframeAnimation::entrance(),
            audio_fade: Millis(2000),
            audio_fade_steps: 20,
            video_delay: Millis(2000),
            video_retry: Millis(1000),
            video_failsafe: Millis(3000),
            video_max_retries: None,
            reveal: RevealTimings::default(),
            end_sequence: EndSequenceTimings::default(),
        }
    }
}

impl ShowConfig {
    pub fn from_json_str(s: &str) -> CurtainResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| CurtainError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_pretty(&self) -> CurtainResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CurtainError::serde(e.to_string()))
    }

    pub fn validate(&self) -> CurtainResult<()> {
        if self.frame_interval.span() == Millis::ZERO {
            return Err(CurtainError::config("frame_interval must be > 0"));
        }
        if self.audio_fade_steps == 0 {
            return Err(CurtainError::config("audio_fade_steps must be > 0"));
        }
        if self.video_failsafe == Millis::ZERO {
            return Err(CurtainError::config("video_failsafe must be > 0"));
        }
        let vol = self.end_sequence.music_volume;
        if !(0.0..=1.0).contains(&vol) {
            return Err(CurtainError::config(
                "end_sequence.music_volume must be within [0, 1]",
            ));
        }
        if !self.reveal.scroll_offset_px.is_finite() {
            return Err(CurtainError::config("reveal.scroll_offset_px must be finite"));
        }
        if !self
            .end_sequence
            .offsets()
            .windows(2)
            .all(|w| w[0] <= w[1])
        {
            return Err(CurtainError::config(
                "end_sequence offsets must be non-decreasing (image_in..logos)",
            ));
        }
        self.logo_animation
            .validate()
            .map_err(|e| CurtainError::config(format!("logo_animation: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ShowConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ShowConfig::from_json_str(
            r#"{ "ending": "end_sequence", "intro_visible": 1500, "reveal": { "card_stagger": 90 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.ending, Ending::EndSequence);
        assert_eq!(cfg.intro_visible, Millis(1500));
        assert_eq!(cfg.reveal.card_stagger, Millis(90));
        assert_eq!(cfg.reveal.detail_stagger, Millis(120));
        assert_eq!(cfg.button_fade, Millis(440));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ShowConfig::from_json_str(r#"{ "intro_visibel": 10 }"#).unwrap_err();
        assert!(matches!(err, CurtainError::Serde(_)));
    }

    #[test]
    fn zero_frame_interval_is_rejected() {
        let err = ShowConfig::from_json_str(r#"{ "frame_interval": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("frame_interval"));
    }

    #[test]
    fn unordered_end_sequence_is_rejected() {
        let mut cfg = ShowConfig::default();
        cfg.end_sequence.text_in = Millis(100);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_defaults() {
        let s = ShowConfig::default().to_json_pretty().unwrap();
        assert_eq!(ShowConfig::from_json_str(&s).unwrap(), ShowConfig::default());
    }
}
