//! Oscillator module: per-channel phase accumulators producing interleaved sines.

use crate::config::{validate_amplitude, validate_frequencies, GeneratorConfig};
use crate::error::Result;
use crate::invariant_ppt::{assert_invariant, PHASE_RESET_ON_RESHAPE};
use std::f64::consts::TAU;

/// Bank of phase-continuous sine oscillators, one per channel.
///
/// Phases are kept in `[0, 2π)` and advanced once per call, so consecutive
/// calls continue the waveform exactly where the previous call stopped.
#[derive(Debug, Clone)]
pub struct PhaseOscillatorBank {
    sample_rate: u32,
    frequencies: Vec<f64>,
    increments: Vec<f64>,
    phases: Vec<f64>,
    amplitude: f64,
}

impl PhaseOscillatorBank {
    /// Create a bank with all phases at zero.
    pub fn new(sample_rate: u32, frequencies: &[f64], amplitude: f64) -> Result<Self> {
        validate_frequencies(frequencies, sample_rate)?;
        validate_amplitude(amplitude)?;
        Ok(Self::unchecked(sample_rate, frequencies, amplitude))
    }

    /// Create a bank from an already validated config.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::unchecked(config.sample_rate(), config.frequencies(), config.amplitude())
    }

    fn unchecked(sample_rate: u32, frequencies: &[f64], amplitude: f64) -> Self {
        let increments = phase_increments(frequencies, sample_rate);
        Self {
            sample_rate,
            frequencies: frequencies.to_vec(),
            increments,
            phases: vec![0.0; frequencies.len()],
            amplitude,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.frequencies.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Current phase of each channel in radians.
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Generate `num_samples` frames of interleaved samples.
    pub fn generate(&mut self, num_samples: usize) -> Vec<f32> {
        let mut out = vec![0.0; num_samples * self.channel_count()];
        self.fill(&mut out);
        out
    }

    /// Fill `out` with interleaved frames; `out.len()` must be a multiple of the channel count.
    pub fn fill(&mut self, out: &mut [f32]) {
        let channels = self.channel_count();
        debug_assert_eq!(out.len() % channels, 0, "partial frame requested");
        let frames = out.len() / channels;

        for (n, frame) in out.chunks_exact_mut(channels).enumerate() {
            let n = n as f64;
            for ((sample, &theta), &delta) in frame.iter_mut().zip(&self.phases).zip(&self.increments) {
                *sample = (self.amplitude * (theta + n * delta).sin()) as f32;
            }
        }

        let advance = frames as f64;
        for (theta, &delta) in self.phases.iter_mut().zip(&self.increments) {
            *theta = (*theta + advance * delta).rem_euclid(TAU);
        }
    }

    /// Retune the bank. A different channel count resets every phase to zero.
    pub fn set_frequencies(&mut self, frequencies: &[f64]) -> Result<()> {
        validate_frequencies(frequencies, self.sample_rate)?;
        let reshaped = frequencies.len() != self.frequencies.len();
        self.frequencies = frequencies.to_vec();
        self.increments = phase_increments(frequencies, self.sample_rate);
        if reshaped {
            self.phases = vec![0.0; frequencies.len()];
            assert_invariant(
                PHASE_RESET_ON_RESHAPE,
                self.phases.iter().all(|&p| p == 0.0),
                "phases restart at zero when channel count changes",
                Some("set_frequencies"),
            );
        }
        Ok(())
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<()> {
        validate_amplitude(amplitude)?;
        self.amplitude = amplitude;
        Ok(())
    }
}

fn phase_increments(frequencies: &[f64], sample_rate: u32) -> Vec<f64> {
    let rate = f64::from(sample_rate);
    frequencies.iter().map(|f| TAU * f / rate).collect()
}
