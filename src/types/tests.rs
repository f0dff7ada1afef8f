use std::time::Duration;

use super::config::BeamSyncConfig;
use super::peer::{PeerId, SessionId, SteeringAngle};

// ===== Config =====

#[test]
fn test_config_defaults() {
    let config = BeamSyncConfig::default();
    assert_eq!(config.server_port, 8988);
    assert_eq!(config.max_peers, 5);
    assert_eq!(config.sync_window, 10);
    assert_eq!(config.ping_retry_interval, Duration::from_millis(10));
    assert_eq!(config.play_lead_nanos(), 1_000_000_000);
    assert_eq!(config.steering_coefficient, -0.75);
}

#[test]
fn test_config_builder() {
    let config = BeamSyncConfig::builder()
        .server_port(0)
        .max_peers(3)
        .connect_timeout(Duration::from_secs(1))
        .sync_window(4)
        .play_lead(Duration::from_millis(250))
        .steering_coefficient(-1.0)
        .build();

    assert_eq!(config.server_port, 0);
    assert_eq!(config.max_peers, 3);
    assert_eq!(config.sync_window, 4);
    assert_eq!(config.play_lead_nanos(), 250_000_000);
    assert_eq!(config.steering_coefficient, -1.0);
}

#[test]
fn test_config_builder_clamps_zero_peers() {
    let config = BeamSyncConfig::builder().max_peers(0).build();
    assert_eq!(config.max_peers, 1);
}

// ===== SessionId =====

#[test]
fn test_session_id_unique() {
    let a = SessionId::new();
    let b = SessionId::new();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 32);
}

#[test]
fn test_session_id_from_string() {
    let id = SessionId::from_string("ABC");
    assert_eq!(id.as_str(), "ABC");
}

// ===== PeerId =====

#[test]
fn test_peer_id_display() {
    assert_eq!(PeerId(3).to_string(), "peer3");
    assert_eq!(PeerId(3).index(), 3);
}

// ===== SteeringAngle =====

#[test]
fn test_angle_accepts_range() {
    assert!(SteeringAngle::new(0.0).is_ok());
    assert!(SteeringAngle::new(90.0).is_ok());
    assert!(SteeringAngle::new(180.0).is_ok());
}

#[test]
fn test_angle_rejects_out_of_range() {
    assert!(SteeringAngle::new(-0.1).is_err());
    assert!(SteeringAngle::new(180.1).is_err());
    assert!(SteeringAngle::new(f64::NAN).is_err());
    assert!(SteeringAngle::new(f64::INFINITY).is_err());
}

#[test]
fn test_angle_parse() {
    let angle = SteeringAngle::parse(" 45.5 ").unwrap();
    assert!((angle.degrees() - 45.5).abs() < f64::EPSILON);

    assert!(SteeringAngle::parse("ninety").is_err());
    assert!(SteeringAngle::parse("200").is_err());
}

#[test]
fn test_angle_radians() {
    let angle = SteeringAngle::new(180.0).unwrap();
    assert!((angle.radians() - std::f64::consts::PI).abs() < 1e-12);
}
