//! Channel registry
//!
//! Owns every [`Channel`]: opened together at startup, closed together at
//! shutdown. Dropping the registry (normal exit, early return or panic)
//! silences every channel before the voices and scratch buffers are freed.

use tracing::{debug, info};

use crate::buffer::{CHANNELS, SampleBuffer};
use crate::channel::{Channel, ChannelId, ChannelState, ChannelStats};
use crate::config::ChannelConfig;
use crate::device::OutputDevice;
use crate::error::{AudioInitError, SubmitError};

/// The fixed set of playback channels.
#[derive(Debug)]
pub struct ChannelRegistry {
    /// Indexed by [`ChannelId::index`]
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    /// Open one voice per channel on `device`.
    ///
    /// Fails if any voice can't be opened; voices opened before the failure
    /// are released.
    pub fn open(device: &dyn OutputDevice, config: &ChannelConfig) -> Result<Self, AudioInitError> {
        let mut channels = Vec::with_capacity(ChannelId::ALL.len());

        for id in ChannelId::ALL {
            let frames = config.capacity_frames(id);
            let voice = device.open_voice(id, frames * CHANNELS)?;
            debug!("{}: opened voice on '{}' ({} frames)", id, device.name(), frames);
            channels.push(Channel::new(id, voice, frames));
        }

        Ok(Self { channels })
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn play(&self, id: ChannelId, buffer: &SampleBuffer, looping: bool) -> Result<(), SubmitError> {
        self.channel(id).play(buffer, looping)
    }

    pub fn stop(&self, id: ChannelId) {
        self.channel(id).stop();
    }

    pub fn is_playing(&self, id: ChannelId) -> bool {
        self.channel(id).is_playing()
    }

    pub fn state(&self, id: ChannelId) -> ChannelState {
        self.channel(id).state()
    }

    pub fn stats(&self, id: ChannelId) -> ChannelStats {
        self.channel(id).stats()
    }

    /// Stop every channel
    pub fn stop_all(&self) {
        for channel in &self.channels {
            channel.stop();
        }
    }

    /// Stop everything, log per-channel counters and release the voices.
    pub fn close(self) {
        for channel in &self.channels {
            let stats = channel.stats();
            info!(
                "{}: {} submissions, {} preemptions, {} failures",
                channel.id(),
                stats.submissions,
                stats.preemptions,
                stats.failures
            );
        }
        // Drop does the teardown
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.stop_all();
        debug!("Channel registry closed");
    }
}
