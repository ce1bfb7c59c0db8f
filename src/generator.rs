//! Generator module: start/stop lifecycle and bounded export.
//!
//! A [`SineGenerator`] owns one [`Engine`]. A background run moves the
//! engine onto a worker thread and gets it back when the worker finishes,
//! so phase and glitch state are never touched by two threads at once. The
//! only thing shared with the worker is its [`CancelToken`].

use crate::config::{validate_seconds, GeneratorConfig};
use crate::error::{GeneratorError, Result};
use crate::glitch::{GlitchKind, IntervalPolicy};
use crate::invariant_ppt::{assert_invariant, LIFECYCLE_EXCLUSIVE};
use crate::rt::{render_offline, run_streaming, Engine};
use crate::sink::{FileSink, OutputSink, WavFileSink};
use crate::states::{CancelToken, RunState};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long `stop` waits for the worker before giving up.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How `start` runs the generation loop.
#[derive(Debug, Clone)]
pub enum StartMode {
    /// Run on the caller's thread until the token is cancelled or the sink fails.
    Blocking(CancelToken),
    /// Run on a worker thread until [`SineGenerator::stop`] is called.
    Background,
}

/// What the worker hands back when it exits.
type WorkerOutcome = (Engine, Result<u64>);

struct Worker {
    cancel: CancelToken,
    /// Set by the worker right before it hands its outcome back.
    finished: Arc<AtomicBool>,
    done: Receiver<WorkerOutcome>,
    handle: JoinHandle<()>,
}

/// Multi-channel sine generator with optional glitches.
pub struct SineGenerator {
    config: GeneratorConfig,
    engine: Option<Engine>,
    state: RunState,
    worker: Option<Worker>,
    /// Error of a run that ended on its own and was collected without `stop`.
    last_error: Option<GeneratorError>,
    stop_timeout: Duration,
}

impl SineGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let engine = Engine::new(&config);
        Self {
            config,
            engine: Some(engine),
            state: RunState::Idle,
            worker: None,
            last_error: None,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Current lifecycle state. A background run that already exited
    /// (e.g. on a sink error) reports `Stopped`.
    pub fn state(&self) -> RunState {
        match &self.worker {
            Some(worker) if worker.finished.load(Ordering::Acquire) => RunState::Stopped,
            _ => self.state,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), RunState::Running | RunState::Stopping)
    }

    /// Engine state, unavailable while a background run owns it.
    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    pub fn set_stop_timeout(&mut self, timeout: Duration) {
        self.stop_timeout = timeout;
    }

    /// Start streaming into the sink built by `make_sink`.
    ///
    /// The sink is constructed on the thread that drives it, so device
    /// handles never cross threads. Fails with `AlreadyRunning` while a
    /// previous background run is still active.
    pub fn start<F, S>(&mut self, make_sink: F, mode: StartMode) -> Result<()>
    where
        F: FnOnce() -> S + Send + 'static,
        S: OutputSink,
    {
        self.reap_finished();
        if !self.state.accepts_start() {
            return Err(GeneratorError::AlreadyRunning);
        }
        if let Some(stale) = self.last_error.take() {
            debug!("discarding error of previous run: {}", stale);
        }
        let mut engine = self.take_engine();
        assert_invariant(
            LIFECYCLE_EXCLUSIVE,
            self.worker.is_none(),
            "no worker exists when a run starts",
            Some("start"),
        );

        match mode {
            StartMode::Blocking(cancel) => {
                self.state = RunState::Running;
                info!("generation started (blocking)");
                let mut sink = make_sink();
                let outcome = run_streaming(&mut engine, &mut sink, &cancel);
                self.engine = Some(engine);
                self.state = RunState::Stopped;
                info!("generation stopped");
                outcome.map(|_| ())
            }
            StartMode::Background => {
                let cancel = CancelToken::new();
                let token = cancel.clone();
                let finished = Arc::new(AtomicBool::new(false));
                let exited = Arc::clone(&finished);
                let (tx, done) = mpsc::sync_channel::<WorkerOutcome>(1);
                let handle = thread::Builder::new()
                    .name("sine-gen".into())
                    .spawn(move || {
                        let mut sink = make_sink();
                        let outcome = run_streaming(&mut engine, &mut sink, &token);
                        drop(sink);
                        exited.store(true, Ordering::Release);
                        let _ = tx.send((engine, outcome));
                    })
                    .map_err(|e| GeneratorError::sink(format!("failed to spawn generation thread: {e}")))?;
                self.worker = Some(Worker {
                    cancel,
                    finished,
                    done,
                    handle,
                });
                self.state = RunState::Running;
                info!("generation started (background)");
                Ok(())
            }
        }
    }

    /// Cancel a background run and wait for it to release its sink.
    ///
    /// Returns the run's sink error if it failed, or `StopTimeout` if the
    /// worker did not exit in time. Either way the generator can be started
    /// again afterwards. A failed run already collected by another call
    /// reports its error here once.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return match self.last_error.take() {
                Some(e) => Err(e),
                None => Ok(()),
            };
        };
        self.state = RunState::Stopping;
        worker.cancel.cancel();

        let result = match worker.done.recv_timeout(self.stop_timeout) {
            Ok((engine, outcome)) => {
                if worker.handle.join().is_err() {
                    warn!("generation thread panicked after finishing");
                }
                self.engine = Some(engine);
                outcome.map(|blocks| debug!(blocks, "background run joined"))
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.stop_timeout, "generation thread did not stop gracefully");
                self.engine = Some(Engine::new(&self.config));
                Err(GeneratorError::StopTimeout(self.stop_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                warn!("generation thread exited without returning its state");
                self.engine = Some(Engine::new(&self.config));
                Err(GeneratorError::sink("generation thread panicked"))
            }
        };
        self.state = RunState::Stopped;
        info!("generation stopped");
        result
    }

    /// Retune. Changing the channel count restarts every phase at zero.
    pub fn set_frequencies(&mut self, frequencies: &[f64]) -> Result<()> {
        let config = self.config.with_frequencies(frequencies)?;
        self.idle_engine()?.set_frequencies(frequencies)?;
        self.config = config;
        Ok(())
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> Result<()> {
        let config = self.config.with_amplitude(amplitude)?;
        self.idle_engine()?.set_amplitude(amplitude)?;
        self.config = config;
        Ok(())
    }

    /// Replace the glitch kind and interval policy before the next run.
    pub fn set_glitch(&mut self, kind: GlitchKind, policy: IntervalPolicy) -> Result<()> {
        let config = self.config.with_glitch(kind, policy)?;
        self.idle_engine()?.set_glitch(kind, policy)?;
        self.config = config;
        Ok(())
    }

    /// Generate `duration_secs` of audio synchronously and return it interleaved.
    pub fn render(&mut self, duration_secs: f64) -> Result<Vec<f32>> {
        let frames = bounded_frame_count(self.config.sample_rate(), self.config.channels(), duration_secs)?;
        let engine = self.idle_engine()?;
        Ok(render_offline(engine, frames))
    }

    /// Render `duration_secs` and deliver it to `sink` in a single write.
    ///
    /// Returns the number of frames written.
    pub fn export<F: FileSink + ?Sized>(&mut self, duration_secs: f64, sink: &mut F) -> Result<usize> {
        let samples = self.render(duration_secs)?;
        let channels = self.config.channels();
        sink.write(self.config.sample_rate(), channels, self.config.bit_depth(), &samples)?;
        Ok(samples.len() / channels)
    }

    /// Render `duration_secs` into a WAV file at `path`.
    pub fn save_to_wav(&mut self, duration_secs: f64, path: impl AsRef<Path>) -> Result<()> {
        let mut sink = WavFileSink::new(path);
        let frames = self.export(duration_secs, &mut sink)?;
        info!(path = %sink.path().display(), frames, "wav file saved");
        Ok(())
    }

    /// Collect a worker that already exited on its own (e.g. a sink error).
    fn reap_finished(&mut self) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        match worker.done.try_recv() {
            Ok((engine, outcome)) => {
                if let Err(e) = outcome {
                    warn!("previous run ended with error: {}", e);
                    self.last_error = Some(e);
                }
                if let Some(worker) = self.worker.take() {
                    let _ = worker.handle.join();
                }
                self.engine = Some(engine);
                self.state = RunState::Stopped;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                if let Some(worker) = self.worker.take() {
                    let _ = worker.handle.join();
                }
                self.engine = Some(Engine::new(&self.config));
                self.last_error = Some(GeneratorError::sink("generation thread panicked"));
                self.state = RunState::Stopped;
            }
        }
    }

    fn take_engine(&mut self) -> Engine {
        self.engine.take().unwrap_or_else(|| Engine::new(&self.config))
    }

    fn idle_engine(&mut self) -> Result<&mut Engine> {
        self.reap_finished();
        if self.worker.is_some() {
            return Err(GeneratorError::AlreadyRunning);
        }
        let config = &self.config;
        Ok(self.engine.get_or_insert_with(|| Engine::new(config)))
    }
}

/// Frames in `duration_secs`, rejecting durations whose sample buffer cannot exist.
fn bounded_frame_count(sample_rate: u32, channels: usize, duration_secs: f64) -> Result<usize> {
    validate_seconds("duration", duration_secs)?;
    let max_samples = isize::MAX as usize / std::mem::size_of::<f32>();
    let frames = f64::from(sample_rate) * duration_secs;
    let too_long = || GeneratorError::invalid(format!("duration {duration_secs} s is too long to render"));
    if frames >= max_samples as f64 {
        return Err(too_long());
    }
    let frames = frames as usize;
    match frames.checked_mul(channels) {
        Some(samples) if samples <= max_samples => Ok(frames),
        _ => Err(too_long()),
    }
}

impl Drop for SineGenerator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                warn!("stop on drop: {}", e);
            }
        }
    }
}
