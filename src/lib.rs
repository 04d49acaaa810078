//! Curtain sequences a one-shot multimedia reveal: a begin gesture starts a hand-authored
//! timeline of audio, a logo entrance, a fullscreen video and a cascading page reveal.
//!
//! - [`Scheduler`] defers actions to frame boundaries with per-item delays.
//! - [`Director`] is the timeline as an explicit state machine over [`Stage`].
//! - [`Runtime`] drives both from a [`Clock`], delivering signals from the [`Page`] and media
//!   collaborators.
#![forbid(unsafe_code)]

pub mod anim;
pub mod anim_ease;
pub mod config;
pub mod director;
mod foundation;
pub mod journal;
pub mod media;
pub mod page;
pub mod schedule;
pub mod session;
pub mod stage;

pub use anim::{KeyframeAnimation, Lerp, Pose};
pub use anim_ease::Ease;
pub use config::{EndSequenceTimings, Ending, RevealTimings, ShowConfig};
pub use director::{Activation, Director};
pub use foundation::clock::{Clock, ManualClock, SystemClock};
pub use foundation::core::{FrameInterval, Millis};
pub use foundation::error::{CurtainError, CurtainResult, Fault, MediaKind};
pub use journal::{Journal, JournalEntry};
pub use media::{AudioController, AudioHost, VideoController};
pub use page::memory::{MemoryAudio, MemoryPage, MemoryVideo, VideoScript};
pub use page::{AudioSink, ElementKey, Group, Page, Signal, VideoSink};
pub use schedule::{Scheduler, TaskHandle, TickReport};
pub use session::Runtime;
pub use stage::Stage;
