//! Format module: quantize float samples for the configured bit depth.

use crate::config::BitDepth;

/// Largest positive 24-bit sample.
pub const I24_MAX: i32 = 8_388_607;
/// Smallest 24-bit sample.
pub const I24_MIN: i32 = -8_388_608;

/// Quantize to signed 16-bit, saturating outside `[-1, 1]`.
pub fn quantize_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// Quantize to signed 24-bit held in an `i32`, saturating outside `[-1, 1]`.
pub fn quantize_i24(sample: f32) -> i32 {
    let scaled = (f64::from(sample).clamp(-1.0, 1.0) * f64::from(I24_MAX)).round() as i32;
    scaled.clamp(I24_MIN, I24_MAX)
}

/// Turns float blocks into packed little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormatter {
    bit_depth: BitDepth,
}

impl SampleFormatter {
    pub fn new(bit_depth: BitDepth) -> Self {
        Self { bit_depth }
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Encode `block` into `out`, replacing its contents.
    pub fn encode_into(&self, block: &[f32], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(block.len() * self.bit_depth.bytes_per_sample());
        match self.bit_depth {
            BitDepth::Int16 => {
                for &sample in block {
                    out.extend_from_slice(&quantize_i16(sample).to_le_bytes());
                }
            }
            BitDepth::Int24 => {
                for &sample in block {
                    out.extend_from_slice(&quantize_i24(sample).to_le_bytes()[..3]);
                }
            }
            // Float output is passed through untouched.
            BitDepth::Float32 => {
                for &sample in block {
                    out.extend_from_slice(&sample.to_le_bytes());
                }
            }
        }
    }

    /// Encode `block` into a fresh buffer.
    pub fn encode(&self, block: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(block, &mut out);
        out
    }
}
