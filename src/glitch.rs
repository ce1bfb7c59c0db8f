//! Glitch module: periodic artifact injection into generated blocks.
//!
//! The scheduler keeps a countdown of blocks until the next glitch. When it
//! reaches zero the configured transform is applied to the current block and
//! the countdown is redrawn from the interval policy.

use crate::config::{validate_seconds, GeneratorConfig};
use crate::error::{GeneratorError, Result};
use crate::oscillator::PhaseOscillatorBank;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Magnitude written by [`GlitchKind::Fullscale`].
pub const FULL_SCALE: f32 = 1.0;
/// Interval between glitches when none is configured.
pub const DEFAULT_GLITCH_INTERVAL: f64 = 1.0;
/// Default bounds for random intervals, in seconds.
pub const DEFAULT_RANDOM_RANGE: (f64, f64) = (0.5, 2.0);

/// Artifact applied to a glitch block. `size` is counted in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlitchKind {
    /// No artifacts.
    #[default]
    None,
    /// Silence the first `size` frames.
    Dropout {
        /// Frames silenced.
        size: usize,
    },
    /// Jump `size` frames ahead in time while keeping block length.
    Skip {
        /// Frames skipped.
        size: usize,
    },
    /// Force the first `size` frames to full scale.
    Fullscale {
        /// Frames clipped.
        size: usize,
    },
}

impl GlitchKind {
    /// Frames affected per glitch (0 for `None`).
    pub fn size(&self) -> usize {
        match *self {
            GlitchKind::None => 0,
            GlitchKind::Dropout { size } | GlitchKind::Skip { size } | GlitchKind::Fullscale { size } => size,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, GlitchKind::None)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.is_none() && self.size() == 0 {
            return Err(GeneratorError::invalid(format!(
                "glitch size must be positive for {self:?}"
            )));
        }
        Ok(())
    }
}

/// How far apart glitches are, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalPolicy {
    /// Constant interval.
    Fixed {
        /// Seconds between glitches.
        seconds: f64,
    },
    /// Interval drawn uniformly from `[min_seconds, max_seconds]` after every glitch.
    Random {
        /// Lower bound in seconds.
        min_seconds: f64,
        /// Upper bound in seconds.
        max_seconds: f64,
    },
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        IntervalPolicy::Fixed {
            seconds: DEFAULT_GLITCH_INTERVAL,
        }
    }
}

impl IntervalPolicy {
    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            IntervalPolicy::Fixed { seconds } => validate_seconds("glitch interval", seconds),
            IntervalPolicy::Random {
                min_seconds,
                max_seconds,
            } => {
                validate_seconds("glitch interval minimum", min_seconds)?;
                validate_seconds("glitch interval maximum", max_seconds)?;
                if min_seconds > max_seconds {
                    return Err(GeneratorError::invalid(format!(
                        "glitch interval minimum {min_seconds} exceeds maximum {max_seconds}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Decides which blocks receive a glitch and applies it.
#[derive(Debug, Clone)]
pub struct GlitchScheduler {
    kind: GlitchKind,
    policy: IntervalPolicy,
    blocks_per_second: f64,
    countdown: usize,
    fired: u64,
    rng: StdRng,
}

impl GlitchScheduler {
    /// Scheduler drawing random intervals from OS entropy.
    pub fn new(kind: GlitchKind, policy: IntervalPolicy, sample_rate: u32, block_size: usize) -> Result<Self> {
        Self::with_rng(kind, policy, sample_rate, block_size, StdRng::from_entropy())
    }

    /// Scheduler with reproducible random intervals.
    pub fn with_seed(
        kind: GlitchKind,
        policy: IntervalPolicy,
        sample_rate: u32,
        block_size: usize,
        seed: u64,
    ) -> Result<Self> {
        Self::with_rng(kind, policy, sample_rate, block_size, StdRng::seed_from_u64(seed))
    }

    /// Scheduler for an already validated config.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        let rng = match config.glitch_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::unchecked(
            config.glitch(),
            config.interval(),
            config.sample_rate(),
            config.block_size(),
            rng,
        )
    }

    fn with_rng(
        kind: GlitchKind,
        policy: IntervalPolicy,
        sample_rate: u32,
        block_size: usize,
        rng: StdRng,
    ) -> Result<Self> {
        kind.validate()?;
        policy.validate()?;
        if block_size == 0 {
            return Err(GeneratorError::invalid("block size must be positive"));
        }
        Ok(Self::unchecked(kind, policy, sample_rate, block_size, rng))
    }

    fn unchecked(kind: GlitchKind, policy: IntervalPolicy, sample_rate: u32, block_size: usize, rng: StdRng) -> Self {
        let mut scheduler = Self {
            kind,
            policy,
            blocks_per_second: f64::from(sample_rate) / block_size as f64,
            countdown: 0,
            fired: 0,
            rng,
        };
        scheduler.countdown = scheduler.next_interval();
        scheduler
    }

    pub fn kind(&self) -> GlitchKind {
        self.kind
    }

    pub fn policy(&self) -> IntervalPolicy {
        self.policy
    }

    /// Blocks remaining before the next glitch block.
    pub fn countdown(&self) -> usize {
        self.countdown
    }

    /// Number of glitches applied so far.
    pub fn glitches_fired(&self) -> u64 {
        self.fired
    }

    /// Replace kind and policy; the countdown restarts.
    pub fn reconfigure(&mut self, kind: GlitchKind, policy: IntervalPolicy) -> Result<()> {
        kind.validate()?;
        policy.validate()?;
        self.kind = kind;
        self.policy = policy;
        self.countdown = self.next_interval();
        Ok(())
    }

    /// Draw the next interval and convert it to whole blocks.
    fn next_interval(&mut self) -> usize {
        let seconds = match self.policy {
            IntervalPolicy::Fixed { seconds } => seconds,
            IntervalPolicy::Random {
                min_seconds,
                max_seconds,
            } => self.rng.gen_range(min_seconds..=max_seconds),
        };
        (seconds * self.blocks_per_second) as usize
    }

    /// Advance the schedule by one block, glitching it if due.
    ///
    /// Returns the glitch applied to `block`, if any.
    pub fn process(&mut self, block: &mut [f32], bank: &mut PhaseOscillatorBank) -> Option<GlitchKind> {
        if self.kind.is_none() {
            return None;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return None;
        }
        self.countdown = self.next_interval();
        self.fired += 1;
        apply_glitch(self.kind, block, bank);
        debug!(kind = ?self.kind, next_in_blocks = self.countdown, "glitch applied");
        Some(self.kind)
    }
}

/// Apply `kind` to the front of `block` in place.
///
/// The affected span is clamped to the block. Skip refills the tail from
/// `bank`, which advances its phase by the skipped frames.
pub fn apply_glitch(kind: GlitchKind, block: &mut [f32], bank: &mut PhaseOscillatorBank) {
    let channels = bank.channel_count();
    let frames_in_block = block.len() / channels;
    let frames = kind.size().min(frames_in_block);
    let span = frames * channels;
    debug_assert!(span <= block.len(), "glitch span exceeds block");

    match kind {
        GlitchKind::None => {}
        GlitchKind::Dropout { .. } => block[..span].fill(0.0),
        GlitchKind::Skip { .. } => {
            let len = block.len();
            block.copy_within(span.., 0);
            bank.fill(&mut block[len - span..]);
        }
        GlitchKind::Fullscale { .. } => {
            let level = match block.first() {
                Some(&first) if first >= 0.0 => -FULL_SCALE,
                _ => FULL_SCALE,
            };
            block[..span].fill(level);
        }
    }
}
