//! Waveform synthesis for the four cue shapes

use std::f32::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::ToneParams;
use super::pan::{constant_power, unity};
use crate::buffer::{MAX_SAMPLE, SAMPLE_RATE, SampleBuffer, frames_for_ms, quantize};

/// Fixed noise seed so thud/click output is reproducible
const NOISE_SEED: u64 = 0x5eed_a11d;

/// One-pole low-pass coefficient applied to raw noise
const NOISE_SMOOTHING: f32 = 0.9;

/// Makeup gain for low-passed noise (the filter drops its level ~8x)
const NOISE_GAIN: f32 = 3.0;

/// Thud: share of the sine body vs. noise texture
const THUD_TONE_MIX: f32 = 0.7;
const THUD_NOISE_MIX: f32 = 0.3;

/// Thud attack length as a fraction of the buffer
const THUD_ATTACK_FRACTION: f32 = 0.05;

/// Click decay rate (envelope = exp(-rate * i / N))
const CLICK_DECAY_RATE: f32 = 10.0;

/// One-shot sine attack length as a fraction of the buffer
const SINE_ATTACK_FRACTION: f32 = 0.1;

/// One-pole filtered white noise, deterministic per call.
struct FilteredNoise {
    rng: Pcg32,
    state: f32,
}

impl FilteredNoise {
    fn new() -> Self {
        Self {
            rng: Pcg32::seed_from_u64(NOISE_SEED),
            state: 0.0,
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let raw: f32 = self.rng.random_range(-1.0..1.0);
        self.state = self.state * NOISE_SMOOTHING + raw * (1.0 - NOISE_SMOOTHING);
        self.state * NOISE_GAIN
    }
}

#[inline]
fn push_scaled(buffer: &mut SampleBuffer, value: f32, (left, right): (f32, f32)) {
    buffer.push_frame(
        quantize(value * left * MAX_SAMPLE),
        quantize(value * right * MAX_SAMPLE),
    );
}

/// Wall bump: low sine with a noise texture, squared attack and linear decay.
///
/// Mono, duplicated to both channels at unity gain; `pan` is not used.
pub fn thud(params: &ToneParams) -> SampleBuffer {
    let frames = frames_for_ms(params.duration_ms).max(1);
    let attack_frames = (frames as f32 * THUD_ATTACK_FRACTION).max(1.0);
    let gains = unity(params.volume);
    let step = 2.0 * PI * params.frequency / SAMPLE_RATE as f32;

    let mut noise = FilteredNoise::new();
    let mut buffer = SampleBuffer::with_capacity(frames);

    for i in 0..frames {
        let attack = (i as f32 / attack_frames).min(1.0);
        let decay = 1.0 - i as f32 / frames as f32;
        let envelope = attack * attack * decay;

        let body = (step * i as f32).sin();
        let value = (body * THUD_TONE_MIX + noise.next() * THUD_NOISE_MIX) * envelope;
        push_scaled(&mut buffer, value, gains);
    }

    buffer
}

/// Footstep: filtered noise under an exponential decay.
///
/// Mono, duplicated to both channels at unity gain; `frequency` and `pan`
/// are not used.
pub fn click(params: &ToneParams) -> SampleBuffer {
    let frames = frames_for_ms(params.duration_ms).max(1);
    let gains = unity(params.volume);

    let mut noise = FilteredNoise::new();
    let mut buffer = SampleBuffer::with_capacity(frames);

    for i in 0..frames {
        let envelope = (-CLICK_DECAY_RATE * i as f32 / frames as f32).exp();
        push_scaled(&mut buffer, noise.next() * envelope, gains);
    }

    buffer
}

/// Single enveloped sine (wall tone, beacon ping).
///
/// Linear attack over the first 10% and linear decay over the whole buffer.
pub fn one_shot_sine(params: &ToneParams) -> SampleBuffer {
    let frames = frames_for_ms(params.duration_ms).max(1);
    let attack_frames = (frames as f32 * SINE_ATTACK_FRACTION).max(1.0);
    let gains = constant_power(params.pan, params.volume);
    let step = 2.0 * PI * params.frequency / SAMPLE_RATE as f32;

    let mut buffer = SampleBuffer::with_capacity(frames);

    for i in 0..frames {
        let attack = (i as f32 / attack_frames).min(1.0);
        let decay = 1.0 - i as f32 / frames as f32;
        let value = (step * i as f32).sin() * attack * decay;
        push_scaled(&mut buffer, value, gains);
    }

    buffer
}

/// Frame count and whole cycle count of a sustain tone.
///
/// The requested duration is rounded to the nearest whole number of
/// periods (at least one) so a looping device never wraps mid-cycle.
pub fn sustain_frames(frequency: f32, duration_ms: f32) -> (usize, u32) {
    let samples_per_cycle = SAMPLE_RATE as f32 / frequency;
    let target = frames_for_ms(duration_ms) as f32;
    let cycles = (target / samples_per_cycle).round().max(1.0);
    let frames = (cycles * samples_per_cycle).round().max(1.0) as usize;
    (frames, cycles as u32)
}

/// Flat, cycle-aligned sine for hardware looping.
///
/// The phase step is derived from the rounded frame count so the buffer
/// holds exactly `cycles` periods: sample `frames` would equal sample 0.
/// The pitch error this introduces is below half a sample per buffer.
pub fn sustain_sine(params: &ToneParams) -> SampleBuffer {
    let (frames, cycles) = sustain_frames(params.frequency, params.duration_ms);
    let gains = constant_power(params.pan, params.volume);
    let step = 2.0 * PI / frames as f32;

    let mut buffer = SampleBuffer::with_capacity(frames);

    for i in 0..frames {
        // Integer phase index keeps the period exact on long buffers
        let index = (cycles as u64 * i as u64) % frames as u64;
        let phase = step * index as f32;
        push_scaled(&mut buffer, phase.sin(), gains);
    }

    buffer
}
