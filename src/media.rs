pub mod audio;
pub mod video;

pub use audio::{AudioController, AudioHost};
pub use video::VideoController;
