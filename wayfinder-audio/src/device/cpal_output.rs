//! Audio output using cpal
//!
//! One output stream carries every channel. `cpal::Stream` is not `Send`,
//! so it lives on a dedicated thread for as long as the device (or any of
//! its voices) is alive. Each voice is a slot the stream callback renders:
//!
//! ```text
//! Caller thread               Stream thread            cpal callback
//!     │                            │                        │
//! [Channel.play]                [park]                      │
//!     │                                                     │
//! [lock slot, fill, submit]──────(slot)───────────────►[try_lock slots]
//!                                                      [resample + sum]
//!                                                      [write device]
//! ```
//!
//! Whether a voice is sounding is an atomic flag, so polling and stopping
//! never touch the slot lock. The callback only ever `try_lock`s a sounding
//! slot; a channel in the middle of a play is skipped for that callback
//! rather than blocking the device. The flag is only raised, and cleared on
//! completion, with the slot lock held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{debug, error, warn};

use super::{OutputDevice, Voice};
use crate::buffer::{CHANNELS, SAMPLE_RATE};
use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::error::{AudioInitError, SubmitError};

/// Initial size of the callback's mix buffer (grown on first larger callback)
const MIX_BUFFER_SIZE: usize = 4096;

/// Device-side buffer and playhead of one voice
#[derive(Debug, Default)]
struct VoiceSlot {
    samples: Vec<i16>,
    prepared: bool,
    looping: bool,
    /// Playhead in source frames
    position: f64,
}

impl VoiceSlot {
    /// Mix this voice into `mix` (interleaved stereo f32), resampling by `ratio`
    /// source frames per output frame with linear interpolation.
    ///
    /// Returns false once a one-shot has run out.
    fn render_into(&mut self, mix: &mut [f32], ratio: f64) -> bool {
        let frames = self.samples.len() / CHANNELS;
        if frames == 0 {
            return false;
        }

        for out in mix.chunks_exact_mut(CHANNELS) {
            if self.position >= frames as f64 {
                if self.looping {
                    self.position %= frames as f64;
                } else {
                    // Sound finished
                    self.position = 0.0;
                    return false;
                }
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = if index + 1 < frames {
                index + 1
            } else if self.looping {
                0
            } else {
                index
            };

            for (c, sample) in out.iter_mut().enumerate() {
                let a = self.samples[index * CHANNELS + c] as f32 / 32768.0;
                let b = self.samples[next * CHANNELS + c] as f32 / 32768.0;
                *sample += a + (b - a) * frac;
            }

            self.position += ratio;
        }
        true
    }
}

/// One voice as the stream callback sees it
#[derive(Debug, Default)]
struct Slot {
    active: AtomicBool,
    voice: Mutex<VoiceSlot>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, VoiceSlot> {
        self.voice.lock().unwrap_or_else(|e| {
            warn!("Voice slot mutex poisoned; continuing");
            e.into_inner()
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Callback side: mix the voice if it is sounding and free.
    fn render(&self, mix: &mut [f32], ratio: f64) {
        if !self.is_active() {
            return;
        }
        if let Ok(mut voice) = self.voice.try_lock() {
            if !voice.render_into(mix, ratio) {
                self.active.store(false, Ordering::Release);
            }
        }
    }
}

type Slots = [Slot; CHANNEL_COUNT];

/// Owns the stream thread. Dropped when the device and all voices are gone.
struct StreamHost {
    slots: Arc<Slots>,
    opened: Mutex<[bool; CHANNEL_COUNT]>,
    /// Set by the stream error callback (device unplugged, etc.)
    failed: Arc<AtomicBool>,
    sample_rate: u32,
    name: String,
    /// Dropping the sender wakes the stream thread so it can exit
    shutdown: Option<SyncSender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for StreamHost {
    fn drop(&mut self) {
        // Drop the sender FIRST, otherwise join() waits forever
        drop(self.shutdown.take());

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Output device backed by the host's default cpal output.
#[derive(Clone)]
pub struct CpalDevice {
    host: Arc<StreamHost>,
}

impl CpalDevice {
    /// Open the default output device and start its stream.
    pub fn open() -> Result<Self, AudioInitError> {
        let slots: Arc<Slots> = Arc::new(std::array::from_fn(|_| Slot::default()));
        let failed = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(u32, String), AudioInitError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel::<()>(1);

        let thread_slots = Arc::clone(&slots);
        let thread_failed = Arc::clone(&failed);
        let thread = thread::Builder::new()
            .name("wayfinder-audio-out".into())
            .spawn(move || {
                let stream = match start_stream(thread_slots, thread_failed) {
                    Ok((stream, sample_rate, name)) => {
                        let _ = ready_tx.send(Ok((sample_rate, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until the host is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output thread finished");
            })
            .map_err(|e| AudioInitError::Stream(format!("failed to spawn output thread: {e}")))?;

        let (sample_rate, name) = match ready_rx.recv() {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AudioInitError::Stream("output thread exited during startup".into()));
            }
        };

        debug!("Audio stream started on '{}' at {}Hz", name, sample_rate);

        Ok(Self {
            host: Arc::new(StreamHost {
                slots,
                opened: Mutex::new([false; CHANNEL_COUNT]),
                failed,
                sample_rate,
                name,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            }),
        })
    }

    /// Device output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.host.sample_rate
    }
}

/// Build and start the output stream. Runs on the stream thread.
fn start_stream(
    slots: Arc<Slots>,
    failed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, u32, String), AudioInitError> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or(AudioInitError::NoDevice)?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let config = device
        .default_output_config()
        .map_err(|e| AudioInitError::Stream(format!("failed to get default output config: {e}")))?;

    let sample_rate = config.sample_rate().0;
    let stream_config: cpal::StreamConfig = config.config();

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, slots, failed)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, slots, failed)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, slots, failed)?,
        other => return Err(AudioInitError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream
        .play()
        .map_err(|e| AudioInitError::Stream(format!("failed to play audio stream: {e}")))?;

    Ok((stream, sample_rate, name))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    slots: Arc<Slots>,
    failed: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioInitError>
where
    T: SizedSample + FromSample<f32>,
{
    let device_channels = config.channels as usize;
    let ratio = SAMPLE_RATE as f64 / config.sample_rate.0 as f64;
    let mut mix: Vec<f32> = vec![0.0; MIX_BUFFER_SIZE];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / device_channels.max(1);
                if mix.len() < frames * CHANNELS {
                    mix.resize(frames * CHANNELS, 0.0);
                }
                let mix = &mut mix[..frames * CHANNELS];
                mix.fill(0.0);

                for slot in slots.iter() {
                    slot.render(mix, ratio);
                }

                for (out, pair) in data
                    .chunks_mut(device_channels.max(1))
                    .zip(mix.chunks_exact(CHANNELS))
                {
                    let left = pair[0].clamp(-1.0, 1.0);
                    let right = pair[1].clamp(-1.0, 1.0);
                    if out.len() == 1 {
                        out[0] = T::from_sample(0.5 * (left + right));
                        continue;
                    }
                    for (c, sample) in out.iter_mut().enumerate() {
                        let value = match c {
                            0 => left,
                            1 => right,
                            _ => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| AudioInitError::Stream(format!("failed to build audio stream: {e}")))
}

impl OutputDevice for CpalDevice {
    fn name(&self) -> String {
        self.host.name.clone()
    }

    fn open_voice(
        &self,
        channel: ChannelId,
        capacity: usize,
    ) -> Result<Box<dyn Voice>, AudioInitError> {
        {
            let mut opened = self.host.opened.lock().unwrap_or_else(|e| e.into_inner());
            if opened[channel.index()] {
                let count = opened.iter().filter(|&&o| o).count();
                return Err(AudioInitError::VoiceLimit {
                    channel,
                    opened: count,
                });
            }
            opened[channel.index()] = true;
        }

        // Reserve the device-side buffer once; prepare() never grows it
        let slot = &self.host.slots[channel.index()];
        slot.active.store(false, Ordering::Release);
        let mut voice = slot.lock();
        *voice = VoiceSlot::default();
        voice.samples.reserve_exact(capacity);
        drop(voice);

        Ok(Box::new(CpalVoice {
            channel,
            host: Arc::clone(&self.host),
        }))
    }
}

struct CpalVoice {
    channel: ChannelId,
    host: Arc<StreamHost>,
}

impl CpalVoice {
    fn slot(&self) -> &Slot {
        &self.host.slots[self.channel.index()]
    }
}

impl Voice for CpalVoice {
    fn prepare(&mut self, samples: &[i16]) -> Result<(), SubmitError> {
        let channel = self.channel;
        let mut slot = self.slot().lock();
        if samples.len() > slot.samples.capacity() {
            return Err(SubmitError::BufferTooLarge {
                channel,
                samples: samples.len(),
                capacity: slot.samples.capacity(),
            });
        }
        slot.samples.clear();
        slot.samples.extend_from_slice(samples);
        slot.position = 0.0;
        slot.prepared = true;
        Ok(())
    }

    fn submit(&mut self, looping: bool) -> Result<(), SubmitError> {
        if self.host.failed.load(Ordering::Acquire) {
            return Err(SubmitError::Disconnected(self.channel));
        }
        let channel = self.channel;
        let slot = self.slot();
        let mut voice = slot.lock();
        if !voice.prepared {
            return Err(SubmitError::Rejected(channel));
        }
        voice.looping = looping;
        voice.position = 0.0;
        slot.active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot().active.store(false, Ordering::Release);
    }

    fn unprepare(&mut self) {
        let mut voice = self.slot().lock();
        voice.prepared = false;
        voice.samples.clear();
        voice.position = 0.0;
    }

    fn is_active(&self) -> bool {
        self.slot().is_active()
    }
}

impl Drop for CpalVoice {
    fn drop(&mut self) {
        {
            let slot = self.slot();
            slot.active.store(false, Ordering::Release);
            let mut voice = slot.lock();
            voice.prepared = false;
            voice.samples.clear();
        }
        let mut opened = self.host.opened.lock().unwrap_or_else(|e| e.into_inner());
        opened[self.channel.index()] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(samples: &[i16], looping: bool) -> VoiceSlot {
        VoiceSlot {
            samples: samples.to_vec(),
            prepared: true,
            looping,
            position: 0.0,
        }
    }

    fn sounding(voice: VoiceSlot) -> Slot {
        Slot {
            active: AtomicBool::new(true),
            voice: Mutex::new(voice),
        }
    }

    #[test]
    fn test_render_one_shot_finishes() {
        let mut voice = slot(&[16384, -16384, 16384, -16384], false);
        let mut mix = vec![0.0f32; 8];
        assert!(!voice.render_into(&mut mix, 1.0));

        assert_eq!(&mix[..4], &[0.5, -0.5, 0.5, -0.5]);
        assert_eq!(&mix[4..], &[0.0; 4]);
    }

    #[test]
    fn test_render_loop_wraps() {
        let mut voice = slot(&[16384, 0, 0, 16384], true);
        let mut mix = vec![0.0f32; 12];
        assert!(voice.render_into(&mut mix, 1.0));

        assert_eq!(mix, vec![0.5, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_render_upsamples_with_interpolation() {
        // Half ratio: 22.05kHz source into a 44.1kHz device
        let mut voice = slot(&[0, 0, 16384, 16384], false);
        let mut mix = vec![0.0f32; 8];
        voice.render_into(&mut mix, 0.5);

        assert_eq!(mix[0], 0.0);
        assert!((mix[2] - 0.25).abs() < 1e-6);
        assert!((mix[4] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_render_sums_into_mix() {
        let a = sounding(slot(&[8192, 8192], true));
        let b = sounding(slot(&[8192, 8192], true));
        let mut mix = vec![0.0f32; 2];
        a.render(&mut mix, 1.0);
        b.render(&mut mix, 1.0);
        assert_eq!(mix, vec![0.5, 0.5]);
    }

    #[test]
    fn test_inactive_slot_is_silent() {
        let voice = sounding(slot(&[16384, 16384], true));
        voice.active.store(false, Ordering::Release);
        let mut mix = vec![0.0f32; 4];
        voice.render(&mut mix, 1.0);
        assert_eq!(mix, vec![0.0; 4]);
    }

    #[test]
    fn test_finished_one_shot_clears_flag() {
        let voice = sounding(slot(&[16384, 16384], false));
        let mut mix = vec![0.0f32; 4];
        voice.render(&mut mix, 1.0);
        assert!(!voice.is_active());
        assert_eq!(mix, vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_polling_does_not_block_render() {
        let voice = sounding(slot(&[16384, 16384, 16384, 16384], true));
        let mut mix = vec![0.0f32; 2];

        // A poll in flight must not cost the callback this period
        let polled = voice.is_active();
        voice.render(&mut mix, 1.0);
        assert!(polled);
        assert_eq!(mix, vec![0.5, 0.5]);

        // While the slot lock is held (a play in progress) the voice is skipped
        let held = voice.lock();
        let mut skipped = vec![0.0f32; 2];
        voice.render(&mut skipped, 1.0);
        drop(held);
        assert_eq!(skipped, vec![0.0, 0.0]);
        assert!(voice.is_active());
    }
}
