//! RT module: the block engine and the two generation loops.

// IMPORTANT: Do not call assert_invariant inside the streaming block loop to avoid locks.

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::format::SampleFormatter;
use crate::glitch::{GlitchKind, GlitchScheduler, IntervalPolicy};
use crate::invariant_ppt::{
    assert_invariant, BLOCK_LENGTH_PRESERVED, BOUNDED_SAMPLE_COUNT, GLITCH_CLAMPED, PHASE_WRAPPED, SINK_RELEASED,
};
use crate::oscillator::PhaseOscillatorBank;
use crate::sink::{OutputSink, StreamSpec};
use crate::states::CancelToken;
use tracing::{debug, warn};

/// Oscillators, glitch schedule and formatter for one generator.
///
/// Owned by exactly one activity at a time; nothing in here is shared.
#[derive(Debug, Clone)]
pub struct Engine {
    bank: PhaseOscillatorBank,
    scheduler: GlitchScheduler,
    formatter: SampleFormatter,
    block_size: usize,
    sample_rate: u32,
    block: Vec<f32>,
    bytes: Vec<u8>,
}

impl Engine {
    /// Build an engine with fresh phases and countdown.
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            bank: PhaseOscillatorBank::from_config(config),
            scheduler: GlitchScheduler::from_config(config),
            formatter: SampleFormatter::new(config.bit_depth()),
            block_size: config.block_size(),
            sample_rate: config.sample_rate(),
            block: Vec::with_capacity(config.block_size() * config.channels()),
            bytes: Vec::new(),
        }
    }

    pub fn bank(&self) -> &PhaseOscillatorBank {
        &self.bank
    }

    pub fn scheduler(&self) -> &GlitchScheduler {
        &self.scheduler
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }

    /// Parameters a sink needs to accept this engine's blocks.
    pub fn stream_spec(&self) -> StreamSpec {
        StreamSpec {
            sample_rate: self.sample_rate,
            channels: self.channel_count(),
            bit_depth: self.formatter.bit_depth(),
            block_size: self.block_size,
        }
    }

    pub fn set_frequencies(&mut self, frequencies: &[f64]) -> Result<()> {
        self.bank.set_frequencies(frequencies)
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<()> {
        self.bank.set_amplitude(amplitude)
    }

    pub fn set_glitch(&mut self, kind: GlitchKind, policy: IntervalPolicy) -> Result<()> {
        self.scheduler.reconfigure(kind, policy)
    }

    /// Generate `out.len() / channels` frames into `out` and run the glitch schedule on them.
    ///
    /// A short `out` acts as a one-off smaller block.
    pub fn process_block(&mut self, out: &mut [f32]) -> Option<GlitchKind> {
        self.bank.fill(out);
        self.scheduler.process(out, &mut self.bank)
    }

    /// Produce the next full block, formatted for the sink.
    pub fn next_formatted_block(&mut self) -> &[u8] {
        let len = self.block_size * self.bank.channel_count();
        let mut block = std::mem::take(&mut self.block);
        block.resize(len, 0.0);
        self.process_block(&mut block);
        self.formatter.encode_into(&block, &mut self.bytes);
        self.block = block;
        &self.bytes
    }
}

/// Render `frames` frames: whole blocks followed by one partial block.
pub fn render_offline(engine: &mut Engine, frames: usize) -> Vec<f32> {
    let channels = engine.channel_count();
    let block_len = engine.block_size() * channels;
    let mut output = vec![0.0; frames * channels];
    for block in output.chunks_mut(block_len) {
        let len = block.len();
        if let Some(kind) = engine.process_block(block) {
            assert_invariant(
                GLITCH_CLAMPED,
                kind.size().min(len / channels) * channels <= len,
                "glitch span fits the block",
                Some("render_offline"),
            );
            assert_invariant(
                BLOCK_LENGTH_PRESERVED,
                block.len() == len,
                "glitched block keeps its length",
                Some("render_offline"),
            );
        }
    }
    assert_invariant(
        BOUNDED_SAMPLE_COUNT,
        output.len() == frames * channels,
        "bounded render produces exactly the requested frames",
        Some("render_offline"),
    );
    assert_invariant(
        PHASE_WRAPPED,
        engine.bank.phases().iter().all(|p| (0.0..std::f64::consts::TAU).contains(p)),
        "phases wrapped into [0, 2π)",
        Some("render_offline"),
    );
    output
}

/// Stream blocks into `sink` until `cancel` is observed or the sink fails.
///
/// The sink is closed on every exit path. Returns the number of blocks written.
pub fn run_streaming<S: OutputSink + ?Sized>(engine: &mut Engine, sink: &mut S, cancel: &CancelToken) -> Result<u64> {
    let spec = engine.stream_spec();
    let outcome = match sink.open(&spec) {
        Ok(()) => stream_blocks(engine, sink, cancel),
        Err(e) => Err(e),
    };
    let closed = sink.close();
    if let Err(e) = &closed {
        warn!("sink close failed: {}", e);
    }
    assert_invariant(SINK_RELEASED, true, "sink closed after run", Some("run_streaming"));
    let blocks = outcome?;
    closed?;
    debug!(blocks, glitches = engine.scheduler.glitches_fired(), "streaming run finished");
    Ok(blocks)
}

fn stream_blocks<S: OutputSink + ?Sized>(engine: &mut Engine, sink: &mut S, cancel: &CancelToken) -> Result<u64> {
    let mut blocks = 0;
    while !cancel.is_cancelled() {
        sink.write(engine.next_formatted_block())?;
        blocks += 1;
    }
    Ok(blocks)
}
