use sinegen::sink::WavFileSink;
use sinegen::{BitDepth, FileSink, GeneratorConfig, GlitchKind, IntervalPolicy, SineGenerator};

/// Collects whatever a bounded render delivers.
#[derive(Default)]
struct CollectingSink {
    calls: usize,
    sample_rate: u32,
    channels: usize,
    samples: Vec<f32>,
}

impl FileSink for CollectingSink {
    fn write(&mut self, sample_rate: u32, channels: usize, _bit_depth: BitDepth, samples: &[f32]) -> sinegen::Result<()> {
        self.calls += 1;
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.samples = samples.to_vec();
        Ok(())
    }
}

#[test]
fn one_second_of_440_delivers_48000_samples_once() {
    let config = GeneratorConfig::builder()
        .sample_rate(48_000)
        .frequencies(&[440.0])
        .channels(1)
        .amplitude(1.0)
        .build()
        .unwrap();
    let mut generator = SineGenerator::new(config);
    let mut sink = CollectingSink::default();

    let frames = generator.export(1.0, &mut sink).unwrap();
    assert_eq!(frames, 48_000);
    assert_eq!(sink.calls, 1);
    assert_eq!(sink.samples.len(), 48_000);
    assert!(sink.samples[0].abs() < 1e-6);
    let period = 48_000 / 440;
    assert!(sink.samples[period].abs() < 0.01);
    assert!(sink.samples[period + 1] > sink.samples[period]);
}

#[test]
fn wav_round_trip_reports_spec_and_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let config = GeneratorConfig::builder()
        .sample_rate(44_100)
        .frequencies(&[440.0, 552.0])
        .bit_depth(16)
        .build()
        .unwrap();
    let mut generator = SineGenerator::new(config);
    generator.save_to_wav(2.5, &path).unwrap();

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 44_100);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    let expected = (44_100.0 * 2.5) as u32;
    assert!(reader.duration().abs_diff(expected) <= 1);
}

#[test]
fn wav_24_bit_samples_stay_within_amplitude() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep.wav");
    let config = GeneratorConfig::builder()
        .frequencies(&[1000.0])
        .amplitude(0.5)
        .bit_depth(24)
        .build()
        .unwrap();
    SineGenerator::new(config).save_to_wav(0.1, &path).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().bits_per_sample, 24);
    assert_eq!(reader.len(), 4_800);
    let peak = reader.samples::<i32>().map(|s| s.unwrap().abs()).max().unwrap();
    assert!(peak <= 4_194_304);
    assert!(peak > 4_000_000);
}

#[test]
fn float_wav_with_glitches_carries_dropouts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("glitchy.wav");
    let config = GeneratorConfig::builder()
        .frequencies(&[440.0])
        .block_size(480)
        .glitch(GlitchKind::Dropout { size: 48 })
        .interval(IntervalPolicy::Fixed { seconds: 0.1 })
        .build()
        .unwrap();
    SineGenerator::new(config).save_to_wav(1.0, &path).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 48_000);
    // 0.1 s at 48 kHz / 480 is a countdown of 10, so every 11th block is glitched.
    let glitch_start = 10 * 480;
    assert!(samples[glitch_start..glitch_start + 48].iter().all(|&s| s == 0.0));
    assert!(samples[glitch_start + 48] != 0.0);
}

#[test]
fn wav_sink_reports_bad_path_as_sink_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = WavFileSink::new(dir.path().join("missing").join("out.wav"));
    let err = sink.write(48_000, 1, BitDepth::Int16, &[0.0; 16]).unwrap_err();
    assert!(matches!(err, sinegen::GeneratorError::Sink(_)));
}

#[test]
fn partial_final_block_keeps_exact_length() {
    let config = GeneratorConfig::builder()
        .sample_rate(8_000)
        .frequencies(&[100.0, 200.0, 300.0])
        .block_size(1000)
        .build()
        .unwrap();
    let mut generator = SineGenerator::new(config);
    let samples = generator.render(0.3333).unwrap();
    assert_eq!(samples.len(), 2_666 * 3);
}
