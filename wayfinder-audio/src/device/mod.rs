//! Output devices
//!
//! The registry talks to hardware through two traits: an [`OutputDevice`]
//! opens one [`Voice`] per channel at startup, and each voice plays one
//! prepared buffer at a time, once or looped.
//!
//! - [`cpal_output::CpalDevice`] plays through the host's default output
//! - [`memory::MemoryDevice`] records submissions in memory (tests, dry runs)

use crate::channel::ChannelId;
use crate::error::{AudioInitError, SubmitError};

pub mod cpal_output;
pub mod memory;

pub use cpal_output::CpalDevice;
pub use memory::MemoryDevice;

/// A host audio device able to open independent voices.
pub trait OutputDevice {
    /// Human-readable device name for logs
    fn name(&self) -> String;

    /// Open the voice backing `channel`, able to hold `capacity` interleaved samples.
    fn open_voice(
        &self,
        channel: ChannelId,
        capacity: usize,
    ) -> Result<Box<dyn Voice>, AudioInitError>;
}

/// One native playback handle.
///
/// Callers (the channel) always run `stop` and `unprepare` before preparing
/// the next buffer, and hold the channel lock for the whole sequence.
pub trait Voice: Send {
    /// Copy interleaved stereo `samples` into the device-side buffer.
    fn prepare(&mut self, samples: &[i16]) -> Result<(), SubmitError>;

    /// Start the prepared buffer, replaying it until stopped if `looping`.
    fn submit(&mut self, looping: bool) -> Result<(), SubmitError>;

    /// Silence the voice. Safe on an idle voice.
    fn stop(&mut self);

    /// Release the prepared buffer. Safe when nothing is prepared.
    fn unprepare(&mut self);

    /// Whether the device is still producing sound from this voice
    fn is_active(&self) -> bool;
}
