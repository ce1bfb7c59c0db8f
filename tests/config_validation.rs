use proptest::prelude::*;
use sinegen::config::{MAX_BLOCK_SIZE, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use sinegen::{GeneratorConfig, GeneratorError, GlitchKind, IntervalPolicy};

fn is_invalid<T: std::fmt::Debug>(result: sinegen::Result<T>) -> bool {
    matches!(result, Err(GeneratorError::InvalidParameter(_)))
}

#[test]
fn nyquist_scenarios() {
    let ok = GeneratorConfig::builder().sample_rate(8_000).frequencies(&[440.0]).build();
    assert!(ok.is_ok());
    let too_high = GeneratorConfig::builder().sample_rate(8_000).frequencies(&[5_000.0]).build();
    assert!(is_invalid(too_high));
}

#[test]
fn sample_rate_bounds() {
    assert!(is_invalid(GeneratorConfig::builder().sample_rate(MIN_SAMPLE_RATE - 1).build()));
    assert!(is_invalid(GeneratorConfig::builder().sample_rate(MAX_SAMPLE_RATE + 1).build()));
    assert!(GeneratorConfig::builder().sample_rate(MAX_SAMPLE_RATE).build().is_ok());
}

#[test]
fn amplitude_bounds_are_inclusive() {
    assert!(GeneratorConfig::builder().amplitude(0.0).build().is_ok());
    assert!(GeneratorConfig::builder().amplitude(1.0).build().is_ok());
    assert!(is_invalid(GeneratorConfig::builder().amplitude(1.5).build()));
    assert!(is_invalid(GeneratorConfig::builder().amplitude(f64::NAN).build()));
}

#[test]
fn bit_depth_and_block_size() {
    assert!(is_invalid(GeneratorConfig::builder().bit_depth(20).build()));
    assert!(is_invalid(GeneratorConfig::builder().block_size(0).build()));
    assert!(is_invalid(GeneratorConfig::builder().block_size(MAX_BLOCK_SIZE + 1).build()));
    assert!(GeneratorConfig::builder().block_size(MAX_BLOCK_SIZE).build().is_ok());
}

#[test]
fn glitch_parameters() {
    let zero_interval = GeneratorConfig::builder()
        .glitch(GlitchKind::Dropout { size: 10 })
        .interval(IntervalPolicy::Fixed { seconds: 0.0 })
        .build();
    assert!(is_invalid(zero_interval));

    let negative_min = GeneratorConfig::builder().interval(IntervalPolicy::Random {
        min_seconds: -1.0,
        max_seconds: 1.0,
    });
    assert!(is_invalid(negative_min.build()));

    assert!(is_invalid(
        GeneratorConfig::builder().glitch(GlitchKind::Fullscale { size: 0 }).build()
    ));
}

#[test]
fn empty_frequency_list_rejected() {
    assert!(is_invalid(GeneratorConfig::builder().frequencies(&[]).build()));
}

proptest! {
    #[test]
    fn channels_always_match_frequencies(
        freqs in prop::collection::vec(1.0f64..4_000.0, 1..8),
        requested in 1usize..8,
    ) {
        let config = GeneratorConfig::builder()
            .sample_rate(8_000)
            .frequencies(&freqs)
            .channels(requested)
            .build()
            .unwrap();
        prop_assert_eq!(config.channels(), freqs.len());
        prop_assert_eq!(config.frequencies(), &freqs[..]);
    }
}
