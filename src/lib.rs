//! sinegen: phase-continuous multi-channel sine generation with injectable glitches.
//!
//! Blocks flow from [`oscillator::PhaseOscillatorBank`] through
//! [`glitch::GlitchScheduler`] and [`format::SampleFormatter`] into a sink.
//! [`generator::SineGenerator`] drives that pipeline either as a streaming
//! run (live device or raw writer) or as a bounded render written to a file.

pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod generator;
pub mod glitch;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod oscillator;
pub mod rt;
pub mod sink;
pub mod states;

pub use config::{BitDepth, GeneratorConfig, GeneratorConfigBuilder};
pub use error::{GeneratorError, Result};
pub use generator::{SineGenerator, StartMode};
pub use glitch::{GlitchKind, GlitchScheduler, IntervalPolicy};
pub use oscillator::PhaseOscillatorBank;
pub use sink::{FileSink, OutputSink, StreamSpec};
pub use states::{CancelToken, RunState};
