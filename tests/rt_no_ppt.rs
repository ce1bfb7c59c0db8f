use sinegen::invariant_ppt::{clear_invariant_log, contract_test, BLOCK_LENGTH_PRESERVED, GLITCH_CLAMPED};
use sinegen::rt::{run_streaming, Engine};
use sinegen::{CancelToken, GeneratorConfig, GlitchKind, IntervalPolicy, OutputSink, StreamSpec};
use std::fs;
use std::path::Path;

/// Glitches are applied on the streaming thread, so the glitch code must not take the invariant log lock.
#[test]
fn glitch_module_does_not_call_assert_invariant() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join("glitch.rs");
    let src = fs::read_to_string(path).expect("failed to read glitch.rs");
    assert!(
        !src.contains("assert_invariant("),
        "glitch transforms run per block while streaming and must not call assert_invariant (acquires Mutex)"
    );
}

struct CancelAfter {
    remaining: usize,
    token: CancelToken,
}

impl OutputSink for CancelAfter {
    fn open(&mut self, _spec: &StreamSpec) -> sinegen::Result<()> {
        Ok(())
    }

    fn write(&mut self, _bytes: &[u8]) -> sinegen::Result<()> {
        self.remaining -= 1;
        if self.remaining == 0 {
            self.token.cancel();
        }
        Ok(())
    }

    fn close(&mut self) -> sinegen::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "ppt")]
#[test]
fn streaming_glitches_leave_invariant_log_untouched() {
    clear_invariant_log();

    let config = GeneratorConfig::builder()
        .frequencies(&[440.0, 880.0])
        .block_size(64)
        .glitch(GlitchKind::Skip { size: 8 })
        .interval(IntervalPolicy::Fixed { seconds: 0.001 })
        .build()
        .unwrap();
    let mut engine = Engine::new(&config);
    let token = CancelToken::new();
    let mut sink = CancelAfter {
        remaining: 20,
        token: token.clone(),
    };
    run_streaming(&mut engine, &mut sink, &token).unwrap();
    assert_eq!(engine.scheduler().glitches_fired(), 20);

    let recorded = std::panic::catch_unwind(|| contract_test("streaming glitches", &[GLITCH_CLAMPED]));
    assert!(recorded.is_err(), "streaming path recorded GLITCH_CLAMPED");
    let recorded = std::panic::catch_unwind(|| contract_test("streaming glitches", &[BLOCK_LENGTH_PRESERVED]));
    assert!(recorded.is_err(), "streaming path recorded BLOCK_LENGTH_PRESERVED");
}
