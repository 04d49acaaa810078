use crate::foundation::error::{CurtainError, CurtainResult};

/// Named states of the reveal timeline, in the only order they can be entered.
///
/// `Revealing` and `EndSequence` are alternative continuations after the video; a run enters
/// at most one of them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ButtonFading,
    IntroShowing,
    IntroFading,
    LogoAnimating,
    AudioFadingOut,
    VideoBuffering,
    VideoPlaying,
    Revealing,
    EndSequence,
    Done,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }

    /// Check that `self -> to` moves the timeline forward.
    pub fn check_transition(self, to: Stage) -> CurtainResult<()> {
        if to <= self {
            return Err(CurtainError::transition(format!(
                "{self:?} -> {to:?} does not move forward"
            )));
        }
        if self == Self::Revealing && to == Self::EndSequence {
            return Err(CurtainError::transition(
                "Revealing and EndSequence are exclusive continuations",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Stage::Idle.check_transition(Stage::ButtonFading).is_ok());
        assert!(Stage::VideoPlaying.check_transition(Stage::EndSequence).is_ok());
        assert!(Stage::VideoBuffering.check_transition(Stage::Revealing).is_ok());
        assert!(Stage::EndSequence.check_transition(Stage::Done).is_ok());
    }

    #[test]
    fn backward_and_repeated_transitions_are_rejected() {
        assert!(Stage::IntroFading.check_transition(Stage::IntroShowing).is_err());
        assert!(Stage::Done.check_transition(Stage::Done).is_err());
        assert!(Stage::Revealing.check_transition(Stage::EndSequence).is_err());
    }

    #[test]
    fn only_done_is_terminal() {
        assert!(Stage::Done.is_terminal());
        assert!(!Stage::EndSequence.is_terminal());
    }
}
