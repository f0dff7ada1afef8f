use crate::protocol::sync::SyncSample;

#[test]
fn test_reference_round() {
    // client sends at 900, owner receives at 1000, replies at 1100,
    // client receives at 1200.
    let sample = SyncSample::from_round(900, 1200, 1000, 1100);

    // lag = ((1200 - 900) - (1100 - 1000)) / 2 = 100
    assert_eq!(sample.lag, 100);
    // offset = 1000 - 900 - 100 = 0
    assert_eq!(sample.offset, 0);
}

#[test]
fn test_symmetric_round_zero_offset() {
    // Equal one-way delays, clocks aligned.
    let sample = SyncSample::from_round(0, 200, 100, 100);
    assert_eq!(sample.lag, 100);
    assert_eq!(sample.offset, 0);
}

#[test]
fn test_server_clock_ahead() {
    // Owner's clock is 5_000 ahead; 100ns each way.
    let sample = SyncSample::from_round(0, 200, 5_100, 5_100);
    assert_eq!(sample.lag, 100);
    assert_eq!(sample.offset, 5_000);
}

#[test]
fn test_server_clock_behind() {
    // Owner's clock is 3_000 behind; 50ns each way.
    let sample = SyncSample::from_round(1_000, 1_100, -1_950, -1_950);
    assert_eq!(sample.lag, 50);
    assert_eq!(sample.offset, -3_000);
}

#[test]
fn test_asymmetric_processing_time() {
    // Owner sits on the ping for 300ns before replying.
    let sample = SyncSample::from_round(0, 500, 100, 400);
    // lag = ((500 - 0) - (400 - 100)) / 2 = 100
    assert_eq!(sample.lag, 100);
    assert_eq!(sample.offset, 0);
}

#[test]
fn test_partial_round_yields_no_sample() {
    let err = SyncSample::try_from_parts(2, 5, Some(900), None, Some(1000), Some(1100));
    assert!(err.is_err());

    let err = SyncSample::try_from_parts(2, 5, None, Some(1200), Some(1000), Some(1100));
    assert!(err.is_err());
}

#[test]
fn test_complete_round_matches_direct_construction() {
    let via_parts =
        SyncSample::try_from_parts(0, 0, Some(900), Some(1200), Some(1000), Some(1100)).unwrap();
    let direct = SyncSample::from_round(900, 1200, 1000, 1100);
    assert_eq!(via_parts, direct);
}
