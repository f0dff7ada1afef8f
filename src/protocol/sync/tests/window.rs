use crate::protocol::sync::{SampleWindow, SyncSample};

fn sample(offset: i64) -> SyncSample {
    // lag 0, offset as given.
    SyncSample::from_round(0, 0, offset, offset)
}

#[test]
fn test_new_window_empty() {
    let window = SampleWindow::new(10);
    assert!(window.is_empty());
    assert_eq!(window.capacity(), 10);
    assert_eq!(window.slot(), 0);
    assert!(window.latest().is_none());
    assert_eq!(window.completed_windows(), 0);
}

#[test]
fn test_record_advances_slot() {
    let mut window = SampleWindow::new(10);
    assert!(!window.record(sample(1)));
    assert_eq!(window.slot(), 1);
    assert_eq!(window.len(), 1);
    assert_eq!(window.latest().unwrap().offset, 1);
}

#[test]
fn test_window_fills_and_restarts() {
    let mut window = SampleWindow::new(3);
    assert!(!window.record(sample(1)));
    assert!(!window.record(sample(2)));
    assert!(window.record(sample(3)));

    // Restarted: slots clear, completion counted, latest preserved.
    assert_eq!(window.slot(), 0);
    assert!(window.is_empty());
    assert_eq!(window.completed_windows(), 1);
    assert_eq!(window.latest().unwrap().offset, 3);
}

#[test]
fn test_transmission_accounting_resets_per_window() {
    let mut window = SampleWindow::new(2);
    window.note_transmission();
    window.note_transmission();
    window.note_transmission();
    assert_eq!(window.transmissions(), 3);

    window.record(sample(1));
    window.record(sample(2));
    assert_eq!(window.transmissions(), 0);
}

#[test]
fn test_multiple_windows() {
    let mut window = SampleWindow::new(2);
    for i in 0..6 {
        window.record(sample(i));
    }
    assert_eq!(window.completed_windows(), 3);
    assert_eq!(window.latest().unwrap().offset, 5);
}

#[test]
fn test_zero_capacity_clamped() {
    let mut window = SampleWindow::new(0);
    assert_eq!(window.capacity(), 1);
    assert!(window.record(sample(1)));
}
