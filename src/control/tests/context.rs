use crate::control::SessionContext;

#[test]
fn test_new_context_empty() {
    let context = SessionContext::new();
    assert_eq!(context.clock_offset(), None);
    assert_eq!(context.phase_delay(), None);
    assert_eq!(context.angle_degrees(), None);
}

#[test]
fn test_offset_roundtrip() {
    let context = SessionContext::new();
    context.set_clock_offset(-123_456);
    assert_eq!(context.clock_offset(), Some(-123_456));

    context.set_clock_offset(42);
    assert_eq!(context.clock_offset(), Some(42));
}

#[test]
fn test_phase_delay_roundtrip() {
    let context = SessionContext::new();
    context.set_phase_delay(750_000);
    assert_eq!(context.phase_delay(), Some(750_000));
}

#[test]
fn test_angle_roundtrip() {
    let context = SessionContext::new();
    context.set_angle_degrees(45.5);
    assert_eq!(context.angle_degrees(), Some(45.5));
}

#[test]
fn test_reset_forgets_everything() {
    let context = SessionContext::new();
    context.set_clock_offset(1);
    context.set_phase_delay(2);
    context.set_angle_degrees(3.0);

    context.reset();
    assert_eq!(context.clock_offset(), None);
    assert_eq!(context.phase_delay(), None);
    assert_eq!(context.angle_degrees(), None);
}
