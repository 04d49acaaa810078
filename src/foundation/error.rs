use crate::{foundation::core::Millis, page::ElementKey};

pub type CurtainResult<T> = Result<T, CurtainError>;

#[derive(thiserror::Error, Debug)]
pub enum CurtainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("element error: {0} is not present")]
    Element(ElementKey),

    #[error("media error: {0}")]
    Media(String),

    #[error("transition error: {0}")]
    Transition(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("action panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CurtainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn element(key: ElementKey) -> Self {
        Self::Element(key)
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn transition(msg: impl Into<String>) -> Self {
        Self::Transition(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn panicked(msg: impl Into<String>) -> Self {
        Self::Panicked(msg.into())
    }
}

/// Which media element a playback fault refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

/// A failure the timeline absorbed instead of aborting.
///
/// Faults never stop the sequence; they are recorded in the journal so callers can observe a
/// degraded run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// An optional target was absent; the stage action became a no-op.
    ElementMissing { element: ElementKey },
    /// `play()` was rejected (autoplay policy or similar).
    PlaybackDenied { media: MediaKind },
    /// The video never signalled readiness before the failsafe deadline.
    ReadinessTimeout { after: Millis },
    /// A scheduled action returned an error.
    ActionFailed { task: String, message: String },
}

impl Fault {
    /// Short stable name, used for counting and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElementMissing { .. } => "element_missing",
            Self::PlaybackDenied { .. } => "playback_denied",
            Self::ReadinessTimeout { .. } => "readiness_timeout",
            Self::ActionFailed { .. } => "action_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CurtainError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(CurtainError::config("x").to_string().contains("config error:"));
        assert!(CurtainError::media("x").to_string().contains("media error:"));
        assert!(
            CurtainError::transition("x")
                .to_string()
                .contains("transition error:")
        );
        assert!(
            CurtainError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert!(
            CurtainError::panicked("x")
                .to_string()
                .contains("action panicked:")
        );
        assert_eq!(
            CurtainError::element(ElementKey::Logo).to_string(),
            "element error: logo is not present"
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CurtainError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn faults_serialize_with_kind_tag() {
        let f = Fault::PlaybackDenied {
            media: MediaKind::Audio,
        };
        let s = serde_json::to_string(&f).unwrap();
        assert_eq!(s, r#"{"kind":"playback_denied","media":"audio"}"#);
        assert_eq!(f.kind(), "playback_denied");
    }
}
