//! Playback channels
//!
//! A channel is one serially reused lane: a voice on the output device, a
//! scratch buffer allocated once at open, and a small state machine. Every
//! play preempts whatever the channel was doing, so at most one sound is
//! live per channel and memory never grows past the scratch buffer.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::buffer::{CHANNELS, SampleBuffer};
use crate::device::Voice;
use crate::error::SubmitError;

/// Number of playback channels
pub const CHANNEL_COUNT: usize = 4;

/// Logical playback lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Footsteps
    Movement,
    /// Wall collision thuds
    WallBump,
    /// Looping wall-proximity tones
    WallTone,
    /// Locator pings
    Beacon,
}

impl ChannelId {
    /// Every channel, in registry order
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::Movement,
        ChannelId::WallBump,
        ChannelId::WallTone,
        ChannelId::Beacon,
    ];

    /// Slot index in the registry
    pub const fn index(self) -> usize {
        match self {
            ChannelId::Movement => 0,
            ChannelId::WallBump => 1,
            ChannelId::WallTone => 2,
            ChannelId::Beacon => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChannelId::Movement => "movement",
            ChannelId::WallBump => "wall-bump",
            ChannelId::WallTone => "wall-tone",
            ChannelId::Beacon => "beacon",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel lifecycle.
///
/// `Prepared` only exists while the channel lock is held during a play;
/// outside callers observe `Idle`, `Playing` or `Looping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Prepared,
    Playing,
    Looping,
}

/// Per-channel counters for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    /// Buffers accepted by the device
    pub submissions: u64,
    /// Plays that cut off a sound still in progress
    pub preemptions: u64,
    /// Plays rejected by the device or by the size check
    pub failures: u64,
}

struct ChannelInner {
    voice: Box<dyn Voice>,
    /// Persistent copy of the live sound (capacity fixed at open)
    scratch: Vec<i16>,
    state: ChannelState,
    stats: ChannelStats,
}

impl ChannelInner {
    /// Stop and release whatever is live. Returns true if a sound was cut off.
    fn teardown(&mut self) -> bool {
        let was_sounding = match self.state {
            ChannelState::Idle => return false,
            ChannelState::Prepared => false,
            ChannelState::Playing => self.voice.is_active(),
            ChannelState::Looping => true,
        };
        self.voice.stop();
        self.voice.unprepare();
        self.state = ChannelState::Idle;
        was_sounding
    }

    /// Release a one-shot the device has finished and return the state.
    fn refresh(&mut self) -> ChannelState {
        if self.state == ChannelState::Playing && !self.voice.is_active() {
            self.voice.unprepare();
            self.state = ChannelState::Idle;
        }
        self.state
    }
}

/// One playback lane with its own lock.
pub struct Channel {
    id: ChannelId,
    capacity: usize,
    inner: Mutex<ChannelInner>,
}

impl Channel {
    /// Wrap an opened voice. Allocates the scratch buffer (`capacity_frames` frames).
    pub fn new(id: ChannelId, voice: Box<dyn Voice>, capacity_frames: usize) -> Self {
        let capacity = capacity_frames * CHANNELS;
        Self {
            id,
            capacity,
            inner: Mutex::new(ChannelInner {
                voice,
                scratch: Vec::with_capacity(capacity),
                state: ChannelState::Idle,
                stats: ChannelStats::default(),
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Longest sound this channel accepts, in frames
    pub fn capacity_frames(&self) -> usize {
        self.capacity / CHANNELS
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(|e| {
            warn!("{}: channel mutex poisoned; continuing", self.id);
            e.into_inner()
        })
    }

    fn check_fits(&self, inner: &mut ChannelInner, frames: usize) -> Result<(), SubmitError> {
        if frames <= self.capacity_frames() {
            return Ok(());
        }
        inner.stats.failures += 1;
        warn!(
            "{}: {} frame buffer exceeds {} frame scratch buffer",
            self.id,
            frames,
            self.capacity_frames()
        );
        Err(SubmitError::BufferTooLarge {
            channel: self.id,
            samples: frames.saturating_mul(CHANNELS),
            capacity: self.capacity,
        })
    }

    /// Reject a sound of `frames` frames before it is generated.
    ///
    /// Counts as a failure exactly like an oversized [`play`](Self::play);
    /// whatever the channel is playing keeps playing.
    pub fn reserve(&self, frames: usize) -> Result<(), SubmitError> {
        let mut inner = self.lock();
        self.check_fits(&mut inner, frames)
    }

    /// Play `buffer` once or looped, preempting anything live.
    ///
    /// The lock is held from teardown through submission so the device never
    /// sees a half-written scratch buffer. On refusal the channel is left
    /// idle; nothing is retried.
    pub fn play(&self, buffer: &SampleBuffer, looping: bool) -> Result<(), SubmitError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        self.check_fits(inner, buffer.frames())?;

        if inner.teardown() {
            inner.stats.preemptions += 1;
            trace!("{}: preempted live sound", self.id);
        }

        if buffer.is_empty() {
            return Ok(());
        }

        // Within capacity, so this never reallocates
        inner.scratch.clear();
        inner.scratch.extend_from_slice(buffer.as_slice());

        if let Err(e) = inner.voice.prepare(&inner.scratch) {
            inner.stats.failures += 1;
            warn!("{}: prepare failed: {}", self.id, e);
            return Err(e);
        }
        inner.state = ChannelState::Prepared;

        if let Err(e) = inner.voice.submit(looping) {
            inner.voice.unprepare();
            inner.state = ChannelState::Idle;
            inner.stats.failures += 1;
            warn!("{}: submit failed: {}", self.id, e);
            return Err(e);
        }

        inner.state = if looping {
            ChannelState::Looping
        } else {
            ChannelState::Playing
        };
        inner.stats.submissions += 1;
        trace!(
            "{}: submitted {} frames (looping: {})",
            self.id,
            buffer.frames(),
            looping
        );
        Ok(())
    }

    /// Stop playback. No-op on an idle channel.
    pub fn stop(&self) {
        if self.lock().teardown() {
            trace!("{}: stopped", self.id);
        }
    }

    /// Whether a sound is audible on this channel.
    ///
    /// A one-shot the device has finished is released here and the channel
    /// drops back to idle.
    pub fn is_playing(&self) -> bool {
        matches!(
            self.lock().refresh(),
            ChannelState::Playing | ChannelState::Looping
        )
    }

    /// Current state (refreshing a finished one-shot to `Idle`)
    pub fn state(&self) -> ChannelState {
        self.lock().refresh()
    }

    pub fn stats(&self) -> ChannelStats {
        self.lock().stats
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        // The voice must be silent before it and the scratch buffer are freed
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        inner.teardown();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("capacity_frames", &self.capacity_frames())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OutputDevice;
    use crate::device::memory::MemoryDevice;

    fn channel(device: &MemoryDevice, frames: usize) -> Channel {
        let voice = device.open_voice(ChannelId::Beacon, frames * CHANNELS).unwrap();
        Channel::new(ChannelId::Beacon, voice, frames)
    }

    fn buffer(frames: usize, value: i16) -> SampleBuffer {
        SampleBuffer::from_interleaved(vec![value; frames * CHANNELS]).unwrap()
    }

    #[test]
    fn test_channel_ids_are_dense() {
        for (i, id) in ChannelId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
        assert_eq!(ChannelId::WallTone.to_string(), "wall-tone");
    }

    #[test]
    fn test_one_shot_lifecycle() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 100);

        assert_eq!(ch.state(), ChannelState::Idle);
        ch.play(&buffer(10, 7), false).unwrap();
        assert_eq!(ch.state(), ChannelState::Playing);
        assert!(ch.is_playing());

        device.finish(ChannelId::Beacon);
        assert!(!ch.is_playing());
        assert_eq!(ch.state(), ChannelState::Idle);
    }

    #[test]
    fn test_loop_lifecycle() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 100);

        ch.play(&buffer(10, 7), true).unwrap();
        assert_eq!(ch.state(), ChannelState::Looping);
        // Natural completion doesn't apply to loops
        device.finish(ChannelId::Beacon);
        assert!(ch.is_playing());

        ch.stop();
        assert_eq!(ch.state(), ChannelState::Idle);
        assert!(!device.is_active(ChannelId::Beacon));
    }

    #[test]
    fn test_play_preempts() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 100);

        ch.play(&buffer(10, 1), false).unwrap();
        ch.play(&buffer(20, 2), false).unwrap();

        assert_eq!(device.submissions(ChannelId::Beacon), 2);
        let live = device.live_samples(ChannelId::Beacon).unwrap();
        assert_eq!(live.len(), 40);
        assert!(live.iter().all(|&s| s == 2));
        assert_eq!(ch.stats().preemptions, 1);
        assert_eq!(ch.stats().submissions, 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 100);
        ch.stop();
        ch.stop();
        assert_eq!(ch.state(), ChannelState::Idle);
        assert_eq!(device.stops(ChannelId::Beacon), 0);
    }

    #[test]
    fn test_oversized_buffer_rejected_without_teardown() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 10);

        ch.play(&buffer(5, 1), true).unwrap();
        let err = ch.play(&buffer(11, 1), false).unwrap_err();
        assert!(matches!(err, SubmitError::BufferTooLarge { samples: 22, capacity: 20, .. }));

        // The loop keeps running
        assert_eq!(ch.state(), ChannelState::Looping);
        assert_eq!(ch.stats().failures, 1);
    }

    #[test]
    fn test_reserve_checks_capacity_up_front() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 10);

        ch.play(&buffer(5, 1), false).unwrap();
        assert!(ch.reserve(10).is_ok());
        let err = ch.reserve(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            SubmitError::BufferTooLarge {
                channel: ChannelId::Beacon,
                samples: usize::MAX,
                capacity: 20
            }
        );

        assert_eq!(ch.state(), ChannelState::Playing);
        assert_eq!(ch.stats().failures, 1);
        assert_eq!(device.submissions(ChannelId::Beacon), 1);
    }

    #[test]
    fn test_state_reads_finished_one_shot_as_idle() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 10);

        ch.play(&buffer(5, 1), false).unwrap();
        device.finish(ChannelId::Beacon);
        // No is_playing poll in between
        assert_eq!(ch.state(), ChannelState::Idle);
        assert!(device.live_samples(ChannelId::Beacon).is_none());
    }

    #[test]
    fn test_refused_submit_falls_back_to_idle() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 100);

        ch.play(&buffer(10, 1), true).unwrap();
        device.refuse_next_submit(ChannelId::Beacon);
        let err = ch.play(&buffer(10, 2), true).unwrap_err();

        assert_eq!(err, SubmitError::Rejected(ChannelId::Beacon));
        assert_eq!(ch.state(), ChannelState::Idle);
        assert!(!device.is_active(ChannelId::Beacon));
        assert!(device.live_samples(ChannelId::Beacon).is_none());

        // Next play is a fresh attempt
        ch.play(&buffer(10, 3), false).unwrap();
        assert_eq!(ch.state(), ChannelState::Playing);
    }

    #[test]
    fn test_scratch_never_reallocates() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 64);
        let before = ch.lock().scratch.capacity();
        for frames in [64, 1, 32, 64] {
            ch.play(&buffer(frames, 9), false).unwrap();
        }
        assert_eq!(ch.lock().scratch.capacity(), before);
    }

    #[test]
    fn test_drop_silences_voice() {
        let device = MemoryDevice::new();
        let ch = channel(&device, 16);
        ch.play(&buffer(8, 1), true).unwrap();
        drop(ch);
        assert!(!device.is_active(ChannelId::Beacon));
    }
}
