//! Mixing of simultaneous tones into one buffer
//!
//! Used when wall tones in several directions must sound as one chord on a
//! single channel rather than as separate overlapping plays.

use crate::buffer::{MAX_SAMPLE, SampleBuffer};

/// Mix same-format buffers sample by sample.
///
/// - Output is as long as the longest input; shorter inputs are silent
///   past their end.
/// - Where more than one input contributes, the sum is scaled by
///   `1/sqrt(contributors)` before clamping to the 16-bit range.
/// - A single input is returned as-is, bit for bit.
pub fn mix(mut buffers: Vec<SampleBuffer>) -> SampleBuffer {
    match buffers.len() {
        0 => return SampleBuffer::default(),
        1 => return buffers.swap_remove(0),
        _ => {}
    }

    let len = buffers.iter().map(SampleBuffer::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(len);

    for i in 0..len {
        let mut sum = 0i32;
        let mut contributors = 0u32;
        for buffer in &buffers {
            if let Some(&s) = buffer.as_slice().get(i) {
                sum += s as i32;
                contributors += 1;
            }
        }
        out.push(scale(sum, contributors));
    }

    // Every input holds whole frames, so the longest one does too
    SampleBuffer::from_interleaved(out).unwrap_or_default()
}

#[inline]
fn scale(sum: i32, contributors: u32) -> i16 {
    let value = if contributors > 1 {
        sum as f32 / (contributors as f32).sqrt()
    } else {
        sum as f32
    };
    value.round().clamp(-MAX_SAMPLE, MAX_SAMPLE) as i16
}
