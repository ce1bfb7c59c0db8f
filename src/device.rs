//! Audio output using cpal and a byte ring buffer.
//!
//! `write` blocks until the ring has room, so a streaming run is paced by
//! the device clock. The cpal callback decodes packed samples back into the
//! device sample type and fills any shortfall with silence.

use crate::config::BitDepth;
use crate::error::{GeneratorError, Result};
use crate::sink::{OutputSink, StreamSpec};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Ring capacity in blocks.
const RING_BLOCKS: usize = 4;
/// A write that makes no progress for this long fails the run.
const DEVICE_STALL_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on waiting for queued audio to play out on close.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// State shared between the writer and the cpal callbacks.
#[derive(Clone)]
struct Shared {
    /// Notified each time the callback drains the ring.
    wake: Arc<(Mutex<bool>, Condvar)>,
    /// First error reported by the stream.
    fault: Arc<Mutex<Option<String>>>,
}

/// Byte layout of packed samples in the ring.
#[derive(Debug, Clone, Copy)]
struct PackedLayout {
    width: usize,
    frame_bytes: usize,
}

/// Default cpal output device as an [`OutputSink`].
///
/// Must be opened on the thread that will write to it.
pub struct DeviceSink {
    stream: Option<cpal::Stream>,
    producer: Option<HeapProd<u8>>,
    shared: Shared,
}

impl DeviceSink {
    pub fn new() -> Self {
        Self {
            stream: None,
            producer: None,
            shared: Shared {
                wake: Arc::new((Mutex::new(false), Condvar::new())),
                fault: Arc::new(Mutex::new(None)),
            },
        }
    }

    fn check_fault(&self) -> Result<()> {
        let fault = self.shared.fault.lock().unwrap_or_else(|e| e.into_inner());
        match fault.as_ref() {
            Some(message) => Err(GeneratorError::sink(format!("audio stream error: {message}"))),
            None => Ok(()),
        }
    }

    /// Sleep until the callback consumes data, or 1ms passes.
    fn wait_for_space(&self) {
        let (lock, cvar) = &*self.shared.wake;
        let guard = lock.lock().unwrap_or_else(|e| {
            warn!("device sink wake mutex poisoned; continuing");
            e.into_inner()
        });
        let _ = cvar
            .wait_timeout(guard, Duration::from_millis(1))
            .unwrap_or_else(|e| e.into_inner());
    }
}

impl Default for DeviceSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for DeviceSink {
    fn open(&mut self, spec: &StreamSpec) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| GeneratorError::sink("no audio output device available"))?;
        debug!(device = %device.name().unwrap_or_default(), "opening output device");

        let channels = u16::try_from(spec.channels)
            .map_err(|_| GeneratorError::invalid(format!("{} channels exceed device limits", spec.channels)))?;
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = HeapRb::<u8>::new(spec.block_bytes() * RING_BLOCKS);
        let (producer, consumer) = ring.split();
        let width = spec.bit_depth.bytes_per_sample();
        let layout = PackedLayout {
            width,
            frame_bytes: width * spec.channels,
        };
        let shared = self.shared.clone();

        let stream = match spec.bit_depth {
            BitDepth::Int16 => build_stream(&device, &config, consumer, layout, decode_i16, shared)?,
            BitDepth::Int24 => build_stream(&device, &config, consumer, layout, decode_i24, shared)?,
            BitDepth::Float32 => build_stream(&device, &config, consumer, layout, decode_f32, shared)?,
        };
        stream
            .play()
            .map_err(|e| GeneratorError::sink(format!("failed to play audio stream: {e}")))?;

        debug!(?spec, "audio stream started");
        self.stream = Some(stream);
        self.producer = Some(producer);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0;
        let mut last_progress = Instant::now();
        while offset < bytes.len() {
            self.check_fault()?;
            let producer = self
                .producer
                .as_mut()
                .ok_or_else(|| GeneratorError::sink("device sink is not open"))?;
            let pushed = producer.push_slice(&bytes[offset..]);
            if pushed > 0 {
                offset += pushed;
                last_progress = Instant::now();
                continue;
            }
            if last_progress.elapsed() > DEVICE_STALL_TIMEOUT {
                return Err(GeneratorError::sink("output device stopped consuming audio"));
            }
            self.wait_for_space();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let started = Instant::now();
        while let Some(producer) = self.producer.as_ref() {
            if producer.occupied_len() == 0 || started.elapsed() > DRAIN_TIMEOUT || self.check_fault().is_err() {
                break;
            }
            self.wait_for_space();
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause audio stream: {}", e);
            }
            debug!("audio stream closed");
        }
        self.producer = None;
        Ok(())
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<u8>,
    layout: PackedLayout,
    decode: fn(&[u8]) -> T,
    shared: Shared,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let PackedLayout { width, frame_bytes } = layout;
    let Shared { wake, fault } = shared;
    let mut scratch: Vec<u8> = Vec::with_capacity(8192);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let wanted = data.len() * width;
                let occupied = consumer.occupied_len();
                let available = occupied - occupied % frame_bytes;
                let take = wanted.min(available);
                if scratch.len() < take {
                    scratch.resize(take, 0);
                }
                let popped = consumer.pop_slice(&mut scratch[..take]);
                let mut filled = 0;
                for (slot, bytes) in data.iter_mut().zip(scratch[..popped].chunks_exact(width)) {
                    *slot = decode(bytes);
                    filled += 1;
                }
                data[filled..].fill(T::EQUILIBRIUM);
                wake.1.notify_one();
            },
            move |err| {
                error!("Audio stream error: {}", err);
                *fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| GeneratorError::sink(format!("failed to build audio stream: {e}")))
}

fn decode_i16(bytes: &[u8]) -> i16 {
    i16::from_le_bytes([bytes[0], bytes[1]])
}

/// Packed 24-bit sample widened to the top of an `i32`.
fn decode_i24(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]])
}

fn decode_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleFormatter;

    #[test]
    fn decoders_invert_the_formatter() {
        let block = [0.5f32, -1.0, 0.0];

        let bytes = SampleFormatter::new(BitDepth::Int16).encode(&block);
        let decoded: Vec<i16> = bytes.chunks_exact(2).map(decode_i16).collect();
        assert_eq!(decoded, vec![16384, -32767, 0]);

        let bytes = SampleFormatter::new(BitDepth::Int24).encode(&block);
        let decoded: Vec<i32> = bytes.chunks_exact(3).map(decode_i24).collect();
        assert_eq!(decoded, vec![4_194_304 << 8, -8_388_607 << 8, 0]);

        let bytes = SampleFormatter::new(BitDepth::Float32).encode(&block);
        let decoded: Vec<f32> = bytes.chunks_exact(4).map(decode_f32).collect();
        assert_eq!(decoded, block.to_vec());
    }

    #[test]
    fn write_before_open_is_a_sink_error() {
        let mut sink = DeviceSink::new();
        let err = sink.write(&[0, 0]).unwrap_err();
        assert!(matches!(err, GeneratorError::Sink(_)));
        assert!(sink.close().is_ok());
    }
}
