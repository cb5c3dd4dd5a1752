//! Audio device access and encoding

#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod wav;

#[cfg(feature = "audio-io")]
pub use input::{input_available, AudioInput};
#[cfg(feature = "audio-io")]
pub use output::{play_encoded, AudioPlayback};
pub use wav::encode_wav;
