//! PPT Invariant System: Runtime invariant enforcement with contract tracking.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

// Invariant ids for contract tracking. Never asserted per sample.
pub const CONFIG_VALIDATED: u32 = 1;
pub const CHANNELS_MATCH_FREQUENCIES: u32 = 2;
pub const PHASE_WRAPPED: u32 = 3;
pub const PHASE_RESET_ON_RESHAPE: u32 = 4;
pub const GLITCH_CLAMPED: u32 = 5;
pub const BLOCK_LENGTH_PRESERVED: u32 = 6;
pub const LIFECYCLE_EXCLUSIVE: u32 = 7;
pub const BOUNDED_SAMPLE_COUNT: u32 = 8;
pub const SINK_RELEASED: u32 = 9;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        tracing::error!("{}", full_message);
        panic!("{}", full_message);
    }
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock().unwrap_or_else(|e| e.into_inner());
    let missing: Vec<u32> = required_invariants
        .iter()
        .copied()
        .filter(|inv| !log.contains(inv))
        .collect();
    drop(log); // Drop the lock before panicking
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "ppt")]
/// Clear invariant log (for between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

#[cfg(not(feature = "ppt"))]
/// Clear invariant log: no-op when PPT feature is disabled.
pub fn clear_invariant_log() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holding_invariant_does_not_panic() {
        assert_invariant(PHASE_WRAPPED, 0.5_f64 < std::f64::consts::TAU, "phase in range", Some("unit"));
    }

    #[test]
    #[should_panic]
    fn broken_invariant_panics() {
        assert_invariant(GLITCH_CLAMPED, 300 <= 256, "span exceeds block", None);
    }

    #[test]
    fn contract_sees_recorded_invariant() {
        assert_invariant(SINK_RELEASED, true, "sink closed", None);
        contract_test("sink release recorded", &[SINK_RELEASED]);
    }
}
