//! In-memory output device
//!
//! Records every submission instead of producing sound. Clones share state,
//! so a test can keep one handle while the engine owns the voices. Failure
//! injection covers voice limits, refused submissions and disconnects.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use super::{OutputDevice, Voice};
use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::error::{AudioInitError, SubmitError};

/// One accepted submission, in device order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub channel: ChannelId,
    pub frames: usize,
    pub looping: bool,
}

#[derive(Debug, Default)]
struct VoiceRecord {
    open: bool,
    live: Option<Vec<i16>>,
    active: bool,
    looping: bool,
    submissions: u64,
    stops: u64,
    refuse_next: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    voices: [VoiceRecord; CHANNEL_COUNT],
    history: Vec<Submission>,
    disconnected: bool,
}

/// Output device that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
    voice_limit: Option<usize>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that refuses to open more than `limit` voices
    pub fn with_voice_limit(limit: usize) -> Self {
        Self {
            voice_limit: Some(limit),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    /// Make the next submission on `channel` fail with [`SubmitError::Rejected`].
    pub fn refuse_next_submit(&self, channel: ChannelId) {
        self.lock().voices[channel.index()].refuse_next = true;
    }

    /// Simulate the device going away: every later submission fails.
    pub fn disconnect(&self) {
        self.lock().disconnected = true;
    }

    /// Simulate the device reaching the end of a one-shot on `channel`.
    ///
    /// Looping voices keep playing.
    pub fn finish(&self, channel: ChannelId) {
        let mut state = self.lock();
        let voice = &mut state.voices[channel.index()];
        if !voice.looping {
            voice.active = false;
        }
    }

    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.lock().voices[channel.index()].active
    }

    /// Whether the last submission on `channel` was looped
    pub fn is_looping(&self, channel: ChannelId) -> bool {
        self.lock().voices[channel.index()].looping
    }

    pub fn submissions(&self, channel: ChannelId) -> u64 {
        self.lock().voices[channel.index()].submissions
    }

    pub fn stops(&self, channel: ChannelId) -> u64 {
        self.lock().voices[channel.index()].stops
    }

    /// Samples currently prepared on `channel`, if any
    pub fn live_samples(&self, channel: ChannelId) -> Option<Vec<i16>> {
        self.lock().voices[channel.index()].live.clone()
    }

    /// Every accepted submission across all channels
    pub fn history(&self) -> Vec<Submission> {
        self.lock().history.clone()
    }

    /// Number of voices currently open
    pub fn open_voices(&self) -> usize {
        self.lock().voices.iter().filter(|v| v.open).count()
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|e| {
        warn!("Memory device mutex poisoned; continuing");
        e.into_inner()
    })
}

impl OutputDevice for MemoryDevice {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn open_voice(
        &self,
        channel: ChannelId,
        capacity: usize,
    ) -> Result<Box<dyn Voice>, AudioInitError> {
        let mut state = self.lock();
        let opened = state.voices.iter().filter(|v| v.open).count();
        let already_open = state.voices[channel.index()].open;
        if already_open || self.voice_limit.is_some_and(|limit| opened >= limit) {
            return Err(AudioInitError::VoiceLimit { channel, opened });
        }
        state.voices[channel.index()] = VoiceRecord {
            open: true,
            ..VoiceRecord::default()
        };

        Ok(Box::new(MemoryVoice {
            channel,
            capacity,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryVoice {
    channel: ChannelId,
    capacity: usize,
    state: Arc<Mutex<MemoryState>>,
}

impl Voice for MemoryVoice {
    fn prepare(&mut self, samples: &[i16]) -> Result<(), SubmitError> {
        if samples.len() > self.capacity {
            return Err(SubmitError::BufferTooLarge {
                channel: self.channel,
                samples: samples.len(),
                capacity: self.capacity,
            });
        }
        lock_state(&self.state).voices[self.channel.index()].live = Some(samples.to_vec());
        Ok(())
    }

    fn submit(&mut self, looping: bool) -> Result<(), SubmitError> {
        let mut state = lock_state(&self.state);
        if state.disconnected {
            return Err(SubmitError::Disconnected(self.channel));
        }

        let voice = &mut state.voices[self.channel.index()];
        if voice.refuse_next {
            voice.refuse_next = false;
            return Err(SubmitError::Rejected(self.channel));
        }
        let Some(frames) = voice.live.as_ref().map(|live| live.len() / 2) else {
            return Err(SubmitError::Rejected(self.channel));
        };

        voice.active = true;
        voice.looping = looping;
        voice.submissions += 1;
        state.history.push(Submission {
            channel: self.channel,
            frames,
            looping,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = lock_state(&self.state);
        let voice = &mut state.voices[self.channel.index()];
        voice.active = false;
        voice.stops += 1;
    }

    fn unprepare(&mut self) {
        lock_state(&self.state).voices[self.channel.index()].live = None;
    }

    fn is_active(&self) -> bool {
        lock_state(&self.state).voices[self.channel.index()].active
    }
}

impl Drop for MemoryVoice {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        let voice = &mut state.voices[self.channel.index()];
        voice.open = false;
        voice.active = false;
        voice.live = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_limit() {
        let device = MemoryDevice::with_voice_limit(1);
        let _first = device.open_voice(ChannelId::Movement, 8).unwrap();
        let err = device.open_voice(ChannelId::Beacon, 8).err().unwrap();
        assert!(matches!(err, AudioInitError::VoiceLimit { opened: 1, .. }));
    }

    #[test]
    fn test_channel_opens_once() {
        let device = MemoryDevice::new();
        let voice = device.open_voice(ChannelId::Beacon, 8).unwrap();
        assert!(device.open_voice(ChannelId::Beacon, 8).is_err());
        drop(voice);
        assert_eq!(device.open_voices(), 0);
        assert!(device.open_voice(ChannelId::Beacon, 8).is_ok());
    }

    #[test]
    fn test_submit_requires_prepared_buffer() {
        let device = MemoryDevice::new();
        let mut voice = device.open_voice(ChannelId::WallTone, 8).unwrap();
        assert_eq!(voice.submit(true), Err(SubmitError::Rejected(ChannelId::WallTone)));

        voice.prepare(&[1, 2, 3, 4]).unwrap();
        voice.submit(true).unwrap();
        assert_eq!(
            device.history(),
            vec![Submission {
                channel: ChannelId::WallTone,
                frames: 2,
                looping: true
            }]
        );
    }

    #[test]
    fn test_disconnect() {
        let device = MemoryDevice::new();
        let mut voice = device.open_voice(ChannelId::Movement, 8).unwrap();
        voice.prepare(&[0, 0]).unwrap();
        device.disconnect();
        assert_eq!(voice.submit(false), Err(SubmitError::Disconnected(ChannelId::Movement)));
        assert!(!device.is_active(ChannelId::Movement));
    }
}
