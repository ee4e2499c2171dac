//! Interleaved stereo PCM buffers

/// Source sample rate for every generated sound (22.05 kHz)
pub const SAMPLE_RATE: u32 = 22_050;

/// Output channels per frame (interleaved left, right)
pub const CHANNELS: usize = 2;

/// Bytes per stereo frame (2 channels * 2 bytes)
pub const FRAME_BYTES: usize = CHANNELS * std::mem::size_of::<i16>();

/// Largest sample magnitude the engine writes.
///
/// Synthesis and mixing both clamp to `[-MAX_SAMPLE, MAX_SAMPLE]`, leaving
/// `i16::MIN` unused so the range stays symmetric.
pub const MAX_SAMPLE: f32 = 32767.0;

/// Number of frames covering `duration_ms` at [`SAMPLE_RATE`].
#[inline]
pub fn frames_for_ms(duration_ms: f32) -> usize {
    (SAMPLE_RATE as f32 * duration_ms / 1000.0).round() as usize
}

/// Quantize a float sample (already in i16 scale) to PCM.
#[inline]
pub fn quantize(value: f32) -> i16 {
    value.round().clamp(-MAX_SAMPLE, MAX_SAMPLE) as i16
}

/// Owned interleaved stereo 16-bit PCM.
///
/// Always holds a whole number of frames: every constructor either builds
/// complete frames or rejects the input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i16>,
}

impl SampleBuffer {
    /// Empty buffer with room for `frames` frames.
    ///
    /// A frame count whose sample count overflows reserves nothing.
    pub fn with_capacity(frames: usize) -> Self {
        Self {
            samples: Vec::with_capacity(frames.checked_mul(CHANNELS).unwrap_or(0)),
        }
    }

    /// Build from interleaved samples. Returns `None` for a dangling half frame.
    pub fn from_interleaved(samples: Vec<i16>) -> Option<Self> {
        if samples.len() % CHANNELS != 0 {
            return None;
        }
        Some(Self { samples })
    }

    /// Duplicate a mono signal into both channels.
    pub fn from_mono(mono: &[i16]) -> Self {
        let mut buffer = Self::with_capacity(mono.len());
        for &s in mono {
            buffer.push_frame(s, s);
        }
        buffer
    }

    /// Append one frame.
    #[inline]
    pub fn push_frame(&mut self, left: i16, right: i16) {
        self.samples.push(left);
        self.samples.push(right);
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    /// Number of individual samples (frames * 2)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size in bytes as the device sees it
    pub fn byte_len(&self) -> usize {
        self.frames() * FRAME_BYTES
    }

    /// Frame `index` as `(left, right)`
    pub fn frame(&self, index: usize) -> Option<(i16, i16)> {
        let base = index * CHANNELS;
        Some((*self.samples.get(base)?, *self.samples.get(base + 1)?))
    }

    /// Interleaved samples
    pub fn as_slice(&self) -> &[i16] {
        &self.samples
    }

    /// Iterator over left-channel samples
    pub fn left(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().step_by(CHANNELS).copied()
    }

    /// Iterator over right-channel samples
    pub fn right(&self) -> impl Iterator<Item = i16> + '_ {
        self.samples.iter().skip(1).step_by(CHANNELS).copied()
    }

    /// Consume into the raw interleaved samples
    pub fn into_inner(self) -> Vec<i16> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_for_ms() {
        assert_eq!(frames_for_ms(1000.0), 22050);
        assert_eq!(frames_for_ms(60.0), 1323);
        assert_eq!(frames_for_ms(0.0), 0);
    }

    #[test]
    fn test_with_capacity_overflow_reserves_nothing() {
        let buffer = SampleBuffer::with_capacity(usize::MAX);
        assert!(buffer.is_empty());
        assert!(SampleBuffer::with_capacity(8).samples.capacity() >= 16);
    }

    #[test]
    fn test_rejects_half_frame() {
        assert!(SampleBuffer::from_interleaved(vec![1, 2, 3]).is_none());
        let buffer = SampleBuffer::from_interleaved(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.byte_len(), 8);
    }

    #[test]
    fn test_from_mono_duplicates() {
        let buffer = SampleBuffer::from_mono(&[5, -7]);
        assert_eq!(buffer.as_slice(), &[5, 5, -7, -7]);
        assert_eq!(buffer.frame(1), Some((-7, -7)));
        assert_eq!(buffer.frame(2), None);
    }

    #[test]
    fn test_channel_iterators() {
        let buffer = SampleBuffer::from_interleaved(vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(buffer.left().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(buffer.right().collect::<Vec<_>>(), vec![2, 4, 6]);
    }

    #[test]
    fn test_quantize_is_symmetric() {
        assert_eq!(quantize(1e9), 32767);
        assert_eq!(quantize(-1e9), -32767);
        assert_eq!(quantize(0.4), 0);
        assert_eq!(quantize(-0.6), -1);
    }
}
