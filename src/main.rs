//! sinegen CLI: play sine tones on the default output device, stream raw PCM
//! to stdout, or save a WAV file, optionally with injected glitches.
//!
//! ```bash
//! sinegen                               # 440 Hz on the default device
//! sinegen -f 1000 -v 0.5                # 1 kHz at half volume
//! sinegen -f 440 880 -c 2               # stereo, 440 Hz left, 880 Hz right
//! sinegen -w -d 5                       # 5 second WAV file
//! sinegen --dropout 50                  # dropouts of 50 samples every second
//! sinegen --skip --random-interval      # skips at random 0.5-2.0 s intervals
//! sinegen --raw -b 16 | aplay -f S16_LE -r 48000
//! ```

use clap::Parser;
use sinegen::config::{DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE};
use sinegen::device::DeviceSink;
use sinegen::glitch::{DEFAULT_GLITCH_INTERVAL, DEFAULT_RANDOM_RANGE};
use sinegen::sink::RawSink;
use sinegen::{CancelToken, GeneratorConfig, GeneratorError, GlitchKind, IntervalPolicy, SineGenerator, StartMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};

const DEFAULT_DROPOUT: usize = 100;
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "sinegen",
    version,
    about = "Generate sine waves as audio streams or WAV files with optional glitch effects"
)]
struct Cli {
    /// Sine frequencies in Hz, one per channel
    #[arg(short, long, num_args = 1.., default_values_t = [DEFAULT_FREQUENCY], value_name = "HZ")]
    frequencies: Vec<f64>,

    /// Volume level 0.0-1.0
    #[arg(short, long, default_value_t = 0.8, value_name = "LEVEL")]
    volume: f64,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value_t = DEFAULT_SAMPLE_RATE, value_name = "HZ")]
    sample_rate: u32,

    /// Number of channels (the frequency count wins on mismatch)
    #[arg(short, long, default_value_t = 1, value_name = "N")]
    channels: usize,

    /// Bit depth: 16, 24 (integer) or 32 (float)
    #[arg(short, long, default_value_t = 32, value_name = "BITS")]
    bitdepth: u16,

    /// Frames per generated block
    #[arg(long, default_value_t = sinegen::config::DEFAULT_BLOCK_SIZE, value_name = "FRAMES")]
    block_size: usize,

    /// Save to a WAV file instead of playing
    #[arg(short, long)]
    wav: bool,

    /// Duration in seconds for WAV output
    #[arg(short, long, default_value_t = 10.0, value_name = "SEC")]
    duration: f64,

    /// WAV output path (default: sine_wave_<freq>[_glitchy].wav)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write packed little-endian PCM to stdout instead of the audio device
    #[arg(long, conflicts_with = "wav")]
    raw: bool,

    /// Stop streaming after this many seconds instead of running until killed
    #[arg(long, value_name = "SEC")]
    play_for: Option<f64>,

    /// Enable glitches (dropout unless a type is given)
    #[arg(short, long)]
    glitch: bool,

    /// Insert silence dropouts
    #[arg(long, num_args = 0..=1, default_missing_value = "100", value_name = "SAMPLES", conflicts_with_all = ["skip", "fullscale"])]
    dropout: Option<usize>,

    /// Skip ahead in the waveform
    #[arg(long, num_args = 0..=1, default_missing_value = "10", value_name = "SAMPLES", conflicts_with = "fullscale")]
    skip: Option<usize>,

    /// Insert full-scale clicks
    #[arg(long, num_args = 0..=1, default_missing_value = "5", value_name = "SAMPLES")]
    fullscale: Option<usize>,

    /// Fixed seconds between glitches
    #[arg(long, default_value_t = DEFAULT_GLITCH_INTERVAL, value_name = "SEC")]
    interval: f64,

    /// Randomize glitch intervals
    #[arg(long)]
    random_interval: bool,

    /// Range for random glitch intervals in seconds
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], default_values_t = [DEFAULT_RANDOM_RANGE.0, DEFAULT_RANDOM_RANGE.1])]
    interval_range: Vec<f64>,

    /// Seed for random glitch intervals
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn glitch_kind(&self) -> GlitchKind {
        if let Some(size) = self.dropout {
            GlitchKind::Dropout { size }
        } else if let Some(size) = self.skip {
            GlitchKind::Skip { size }
        } else if let Some(size) = self.fullscale {
            GlitchKind::Fullscale { size }
        } else if self.glitch {
            GlitchKind::Dropout { size: DEFAULT_DROPOUT }
        } else {
            GlitchKind::None
        }
    }

    fn interval_policy(&self) -> IntervalPolicy {
        if self.random_interval {
            IntervalPolicy::Random {
                min_seconds: self.interval_range[0],
                max_seconds: self.interval_range[1],
            }
        } else {
            IntervalPolicy::Fixed {
                seconds: self.interval,
            }
        }
    }

    fn wav_path(&self, glitchy: bool) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let suffix = if glitchy { "_glitchy" } else { "" };
            PathBuf::from(format!("sine_wave_{}{}.wav", self.frequencies[0] as u64, suffix))
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> sinegen::Result<()> {
    let glitch = cli.glitch_kind();
    let mut builder = GeneratorConfig::builder()
        .sample_rate(cli.sample_rate)
        .frequencies(&cli.frequencies)
        .channels(cli.channels)
        .amplitude(cli.volume)
        .bit_depth(cli.bitdepth)
        .block_size(cli.block_size)
        .glitch(glitch)
        .interval(cli.interval_policy());
    if let Some(seed) = cli.seed {
        builder = builder.glitch_seed(seed);
    }
    let config = builder.build()?;

    if !glitch.is_none() {
        info!(kind = ?glitch, interval = ?config.interval(), "glitches enabled");
    }

    let mut generator = SineGenerator::new(config);

    if cli.wav {
        let path = cli.wav_path(!glitch.is_none());
        return generator.save_to_wav(cli.duration, &path);
    }

    if let Some(seconds) = cli.play_for {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(GeneratorError::InvalidParameter(format!(
                "play duration must be positive, got {seconds}"
            )));
        }
    }

    let interrupt = CancelToken::new();
    let handler_token = interrupt.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| GeneratorError::Sink(format!("failed to install Ctrl+C handler: {e}")))?;

    info!(frequencies = ?cli.frequencies, "playing sine wave(s)");
    let result = match (cli.raw, cli.play_for) {
        (true, None) => generator.start(|| RawSink::new(std::io::stdout()), StartMode::Blocking(interrupt.clone())),
        (false, None) => {
            info!("press Ctrl+C to stop");
            generator.start(DeviceSink::new, StartMode::Blocking(interrupt.clone()))
        }
        (raw, Some(seconds)) => {
            if raw {
                generator.start(|| RawSink::new(std::io::stdout()), StartMode::Background)?;
            } else {
                generator.start(DeviceSink::new, StartMode::Background)?;
            }
            wait_or_interrupt(&interrupt, Duration::from_secs_f64(seconds));
            generator.stop()
        }
    };
    if interrupt.is_cancelled() {
        info!("interrupted");
    }
    result
}

/// Sleep until `limit` elapses or `interrupt` fires. Returns true when interrupted.
fn wait_or_interrupt(interrupt: &CancelToken, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !interrupt.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep((deadline - now).min(INTERRUPT_POLL));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_early_on_interrupt() {
        let interrupt = CancelToken::new();
        let remote = interrupt.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });
        let started = Instant::now();
        assert!(wait_or_interrupt(&interrupt, Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn wait_runs_to_the_limit_without_interrupt() {
        assert!(!wait_or_interrupt(&CancelToken::new(), Duration::from_millis(20)));
    }
}
