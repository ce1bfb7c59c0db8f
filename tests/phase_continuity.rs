use proptest::prelude::*;
use sinegen::PhaseOscillatorBank;

const TOLERANCE: f32 = 1e-4;

proptest! {
    #[test]
    fn split_generation_matches_single_call(
        n1 in 1usize..2048,
        n2 in 1usize..2048,
        freq in 20.0f64..20_000.0,
        amplitude in 0.0f64..=1.0,
    ) {
        let mut split = PhaseOscillatorBank::new(48_000, &[freq, freq / 2.0], amplitude).unwrap();
        let mut whole = split.clone();

        let mut joined = split.generate(n1);
        joined.extend(split.generate(n2));
        let reference = whole.generate(n1 + n2);

        prop_assert_eq!(joined.len(), reference.len());
        for (i, (a, b)) in joined.iter().zip(&reference).enumerate() {
            prop_assert!((a - b).abs() < TOLERANCE, "sample {} differs: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn output_never_exceeds_amplitude(
        freqs in prop::collection::vec(1.0f64..24_000.0, 1..6),
        amplitude in 0.0f64..=1.0,
        blocks in 1usize..8,
    ) {
        let mut bank = PhaseOscillatorBank::new(48_000, &freqs, amplitude).unwrap();
        let limit = amplitude as f32;
        for _ in 0..blocks {
            let block = bank.generate(512);
            prop_assert_eq!(block.len(), 512 * freqs.len());
            prop_assert!(block.iter().all(|s| s.abs() <= limit));
        }
    }
}

#[test]
fn equal_block_sizes_stay_continuous_over_long_runs() {
    let mut blocked = PhaseOscillatorBank::new(44_100, &[997.0], 1.0).unwrap();
    let mut reference = blocked.clone();
    let mut samples = Vec::new();
    for _ in 0..200 {
        samples.extend(blocked.generate(441));
    }
    let expected = reference.generate(200 * 441);
    let worst = samples
        .iter()
        .zip(&expected)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(worst < 1e-3, "drift after 200 blocks: {worst}");
}

#[test]
fn one_cycle_of_440_at_48k() {
    let mut bank = PhaseOscillatorBank::new(48_000, &[440.0], 1.0).unwrap();
    let samples = bank.generate(48_000);
    assert_eq!(samples.len(), 48_000);
    assert!(samples[0].abs() < 1e-6);

    // 48000 / 440 = 109.09 samples per cycle.
    let period = 48_000 / 440;
    assert!(samples[period].abs() < 0.01, "got {}", samples[period]);
    assert!(samples[1] > samples[0]);
    assert!(samples[period + 1] > samples[period]);
}
