//! Config module: validated generator parameters and their builder.
//!
//! A [`GeneratorConfig`] can only be obtained through
//! [`GeneratorConfigBuilder::build`] or one of the `with_*` methods, all of
//! which validate. Holding a config therefore means holding a legal one.

use crate::error::{GeneratorError, Result};
use crate::glitch::{GlitchKind, IntervalPolicy};
use crate::invariant_ppt::{assert_invariant, CHANNELS_MATCH_FREQUENCIES, CONFIG_VALIDATED};
use tracing::warn;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
pub const DEFAULT_BLOCK_SIZE: usize = 1024;
pub const MAX_BLOCK_SIZE: usize = 8192;
pub const DEFAULT_AMPLITUDE: f64 = 0.5;
pub const DEFAULT_FREQUENCY: f64 = 440.0;

/// Output sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// Signed 16-bit integer PCM.
    Int16,
    /// Signed 24-bit integer PCM, packed in three bytes.
    Int24,
    /// 32-bit IEEE float.
    #[default]
    Float32,
}

impl BitDepth {
    /// Map a bit count (16, 24 or 32) to a representation.
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Float32),
            other => Err(GeneratorError::invalid(format!(
                "bit depth must be 16, 24 or 32, got {other}"
            ))),
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    /// Packed width of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.bits() / 8)
    }

    pub fn is_float(self) -> bool {
        matches!(self, BitDepth::Float32)
    }
}

/// Immutable, validated generator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    sample_rate: u32,
    frequencies: Vec<f64>,
    amplitude: f64,
    bit_depth: BitDepth,
    block_size: usize,
    glitch: GlitchKind,
    interval: IntervalPolicy,
    glitch_seed: Option<u64>,
}

impl GeneratorConfig {
    /// Start building a config from defaults.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::new()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Always equal to the number of frequencies.
    pub fn channels(&self) -> usize {
        self.frequencies.len()
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn glitch(&self) -> GlitchKind {
        self.glitch
    }

    pub fn interval(&self) -> IntervalPolicy {
        self.interval
    }

    pub fn glitch_seed(&self) -> Option<u64> {
        self.glitch_seed
    }

    /// Nyquist limit in Hz.
    pub fn nyquist(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }

    /// Copy of this config with new frequencies. Channel count follows the list.
    pub fn with_frequencies(&self, frequencies: &[f64]) -> Result<Self> {
        validate_frequencies(frequencies, self.sample_rate)?;
        let config = Self {
            frequencies: frequencies.to_vec(),
            ..self.clone()
        };
        assert_invariant(
            CHANNELS_MATCH_FREQUENCIES,
            config.channels() == frequencies.len(),
            "channel count follows frequency list",
            Some("with_frequencies"),
        );
        Ok(config)
    }

    /// Copy of this config with a new amplitude.
    pub fn with_amplitude(&self, amplitude: f64) -> Result<Self> {
        validate_amplitude(amplitude)?;
        Ok(Self {
            amplitude,
            ..self.clone()
        })
    }

    /// Copy of this config with a new glitch kind and interval policy.
    pub fn with_glitch(&self, glitch: GlitchKind, interval: IntervalPolicy) -> Result<Self> {
        glitch.validate()?;
        interval.validate()?;
        Ok(Self {
            glitch,
            interval,
            ..self.clone()
        })
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frequencies: vec![DEFAULT_FREQUENCY],
            amplitude: DEFAULT_AMPLITUDE,
            bit_depth: BitDepth::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            glitch: GlitchKind::default(),
            interval: IntervalPolicy::default(),
            glitch_seed: None,
        }
    }
}

/// Fluent builder for [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct GeneratorConfigBuilder {
    sample_rate: u32,
    frequencies: Vec<f64>,
    channels: Option<usize>,
    amplitude: f64,
    bits: u16,
    block_size: usize,
    glitch: GlitchKind,
    interval: IntervalPolicy,
    glitch_seed: Option<u64>,
}

impl GeneratorConfigBuilder {
    /// Create a builder holding the default parameters.
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frequencies: vec![DEFAULT_FREQUENCY],
            channels: None,
            amplitude: DEFAULT_AMPLITUDE,
            bits: BitDepth::default().bits(),
            block_size: DEFAULT_BLOCK_SIZE,
            glitch: GlitchKind::None,
            interval: IntervalPolicy::default(),
            glitch_seed: None,
        }
    }

    pub fn sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz;
        self
    }

    /// One frequency per channel, in Hz.
    pub fn frequencies(mut self, frequencies: &[f64]) -> Self {
        self.frequencies = frequencies.to_vec();
        self
    }

    /// Requested channel count. Overridden by the frequency list length on mismatch.
    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Bit depth as a bit count: 16, 24 or 32.
    pub fn bit_depth(mut self, bits: u16) -> Self {
        self.bits = bits;
        self
    }

    pub fn block_size(mut self, frames: usize) -> Self {
        self.block_size = frames;
        self
    }

    pub fn glitch(mut self, glitch: GlitchKind) -> Self {
        self.glitch = glitch;
        self
    }

    pub fn interval(mut self, interval: IntervalPolicy) -> Self {
        self.interval = interval;
        self
    }

    /// Seed for random glitch intervals; entropy is used when unset.
    pub fn glitch_seed(mut self, seed: u64) -> Self {
        self.glitch_seed = Some(seed);
        self
    }

    /// Validate every parameter and produce the config.
    pub fn build(self) -> Result<GeneratorConfig> {
        validate_sample_rate(self.sample_rate)?;
        validate_frequencies(&self.frequencies, self.sample_rate)?;
        validate_amplitude(self.amplitude)?;
        let bit_depth = BitDepth::from_bits(self.bits)?;
        validate_block_size(self.block_size)?;
        self.glitch.validate()?;
        self.interval.validate()?;

        if let Some(channels) = self.channels {
            if channels == 0 {
                return Err(GeneratorError::invalid("channel count must be positive"));
            }
            if channels != self.frequencies.len() {
                warn!(
                    requested = channels,
                    frequencies = self.frequencies.len(),
                    "channel count does not match frequency list, using frequency count"
                );
            }
        }

        let config = GeneratorConfig {
            sample_rate: self.sample_rate,
            frequencies: self.frequencies,
            amplitude: self.amplitude,
            bit_depth,
            block_size: self.block_size,
            glitch: self.glitch,
            interval: self.interval,
            glitch_seed: self.glitch_seed,
        };
        assert_invariant(
            CHANNELS_MATCH_FREQUENCIES,
            config.channels() == config.frequencies.len(),
            "channel count derived from frequency list",
            Some("build"),
        );
        assert_invariant(CONFIG_VALIDATED, true, "config passed validation", Some("build"));
        Ok(config)
    }
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(GeneratorError::invalid(format!(
            "sample rate {sample_rate} Hz is outside {MIN_SAMPLE_RATE}-{MAX_SAMPLE_RATE} Hz"
        )));
    }
    Ok(())
}

/// Every frequency must be finite, positive and at most Nyquist.
pub(crate) fn validate_frequencies(frequencies: &[f64], sample_rate: u32) -> Result<()> {
    if frequencies.is_empty() {
        return Err(GeneratorError::invalid("at least one frequency is required"));
    }
    let nyquist = f64::from(sample_rate) / 2.0;
    for &freq in frequencies {
        if !freq.is_finite() || freq <= 0.0 {
            return Err(GeneratorError::invalid(format!(
                "frequencies must be positive, got {freq}"
            )));
        }
        if freq > nyquist {
            return Err(GeneratorError::invalid(format!(
                "frequency {freq} Hz exceeds Nyquist limit ({nyquist} Hz)"
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_amplitude(amplitude: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&amplitude) {
        return Err(GeneratorError::invalid(format!(
            "amplitude must be between 0.0 and 1.0, got {amplitude}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(GeneratorError::invalid(format!(
            "block size must be in 1..={MAX_BLOCK_SIZE}, got {block_size}"
        )));
    }
    Ok(())
}

/// Durations and interval bounds share this check.
pub(crate) fn validate_seconds(what: &str, seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(GeneratorError::invalid(format!(
            "{what} must be positive, got {seconds}"
        )));
    }
    Ok(())
}
