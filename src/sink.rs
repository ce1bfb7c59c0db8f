//! Sink module: where generated audio goes.
//!
//! Streaming runs write formatted blocks to an [`OutputSink`]; bounded runs
//! hand the whole interleaved sequence to a [`FileSink`] once.

use crate::config::BitDepth;
use crate::error::{GeneratorError, Result};
use crate::format::{quantize_i16, quantize_i24};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stream parameters passed to [`OutputSink::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: usize,
    pub bit_depth: BitDepth,
    /// Frames per block.
    pub block_size: usize,
}

impl StreamSpec {
    /// Bytes in one full formatted block.
    pub fn block_bytes(&self) -> usize {
        self.block_size * self.channels * self.bit_depth.bytes_per_sample()
    }
}

/// Live destination for formatted blocks.
///
/// `close` is called on every exit path of a run, including after a failed
/// `open`, and must tolerate being called on a sink that never opened.
pub trait OutputSink {
    fn open(&mut self, spec: &StreamSpec) -> Result<()>;
    /// Write one block of packed little-endian samples.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn open(&mut self, spec: &StreamSpec) -> Result<()> {
        (**self).open(spec)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Destination for a complete bounded render.
pub trait FileSink {
    fn write(&mut self, sample_rate: u32, channels: usize, bit_depth: BitDepth, samples: &[f32]) -> Result<()>;
}

/// Writes packed samples straight to any writer, e.g. stdout.
#[derive(Debug)]
pub struct RawSink<W: Write> {
    writer: W,
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for RawSink<W> {
    fn open(&mut self, spec: &StreamSpec) -> Result<()> {
        debug!(?spec, "raw sink opened");
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Canonical WAV file written with `hound`.
#[derive(Debug, Clone)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileSink for WavFileSink {
    fn write(&mut self, sample_rate: u32, channels: usize, bit_depth: BitDepth, samples: &[f32]) -> Result<()> {
        let spec = wav_spec(sample_rate, channels, bit_depth)?;
        let writer = hound::WavWriter::create(&self.path, spec)?;
        write_samples(writer, bit_depth, samples)?;
        debug!(path = %self.path.display(), samples = samples.len(), "wav file written");
        Ok(())
    }
}

/// Write a complete WAV stream to an arbitrary seekable writer.
pub fn write_wav<W: Write + Seek>(
    writer: W,
    sample_rate: u32,
    channels: usize,
    bit_depth: BitDepth,
    samples: &[f32],
) -> Result<()> {
    let spec = wav_spec(sample_rate, channels, bit_depth)?;
    let writer = hound::WavWriter::new(writer, spec)?;
    write_samples(writer, bit_depth, samples)
}

fn wav_spec(sample_rate: u32, channels: usize, bit_depth: BitDepth) -> Result<hound::WavSpec> {
    let channels = u16::try_from(channels)
        .map_err(|_| GeneratorError::invalid(format!("{channels} channels cannot be stored in a wav file")))?;
    let sample_format = if bit_depth.is_float() {
        hound::SampleFormat::Float
    } else {
        hound::SampleFormat::Int
    };
    Ok(hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bit_depth.bits(),
        sample_format,
    })
}

fn write_samples<W: Write + Seek>(mut writer: hound::WavWriter<W>, bit_depth: BitDepth, samples: &[f32]) -> Result<()> {
    match bit_depth {
        BitDepth::Int16 => {
            for &sample in samples {
                writer.write_sample(quantize_i16(sample))?;
            }
        }
        BitDepth::Int24 => {
            for &sample in samples {
                writer.write_sample(quantize_i24(sample))?;
            }
        }
        BitDepth::Float32 => {
            for &sample in samples {
                writer.write_sample(sample)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}
