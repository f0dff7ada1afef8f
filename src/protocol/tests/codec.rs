use byteorder::{BigEndian, ByteOrder};

use crate::protocol::codec::WireMessage;

// ===== Tagged text messages =====

#[test]
fn test_decode_synch() {
    assert_eq!(WireMessage::decode(b"synch"), WireMessage::Synch);
}

#[test]
fn test_decode_stop() {
    assert_eq!(WireMessage::decode(b"stop"), WireMessage::Stop);
}

#[test]
fn test_decode_ping() {
    assert_eq!(
        WireMessage::decode(b"pingpingy0X0"),
        WireMessage::Ping { window: 0, round: 0 }
    );
    assert_eq!(
        WireMessage::decode(b"pingpingy9X41"),
        WireMessage::Ping { window: 9, round: 41 }
    );
}

#[test]
fn test_decode_play() {
    assert_eq!(
        WireMessage::decode(b"play1234567890"),
        WireMessage::Play {
            timestamp: 1_234_567_890
        }
    );
}

#[test]
fn test_decode_phase() {
    assert_eq!(
        WireMessage::decode(b"phase750000"),
        WireMessage::Phase { delay: 750_000 }
    );
    assert_eq!(
        WireMessage::decode(b"phase-750000"),
        WireMessage::Phase { delay: -750_000 }
    );
}

#[test]
fn test_decode_respects_explicit_length() {
    // A reused 32-byte read buffer leaves stale bytes past the read length;
    // the codec must only ever see the slice actually read.
    let mut buf = [0u8; 32];
    buf[..9].copy_from_slice(b"play12345");
    buf[9..].fill(b'7');

    assert_eq!(
        WireMessage::decode(&buf[..9]),
        WireMessage::Play { timestamp: 12_345 }
    );
}

// ===== Binary ping reply =====

#[test]
fn test_decode_ping_reply() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1000i64.to_be_bytes());
    buf.extend_from_slice(&1100i64.to_be_bytes());
    buf.extend_from_slice(b"X0X0");

    assert_eq!(
        WireMessage::decode(&buf),
        WireMessage::PingReply {
            server_received: 1000,
            server_sent: 1100,
            window: 0,
            round: 0,
        }
    );
}

#[test]
fn test_decode_ping_reply_large_values() {
    let recv: i64 = 987_654_321_987_654_321;
    let sent: i64 = 987_654_321_987_700_000;
    let mut buf = Vec::new();
    buf.extend_from_slice(&recv.to_be_bytes());
    buf.extend_from_slice(&sent.to_be_bytes());
    buf.extend_from_slice(b"X7X12");

    assert_eq!(
        WireMessage::decode(&buf),
        WireMessage::PingReply {
            server_received: recv,
            server_sent: sent,
            window: 7,
            round: 12,
        }
    );
}

#[test]
fn test_decode_reply_with_bad_marker_is_unrecognized() {
    let mut buf = vec![0u8; 16];
    buf.extend_from_slice(b"Xnope");
    assert_eq!(WireMessage::decode(&buf), WireMessage::Unrecognized);
}

// ===== Unrecognized input =====

#[test]
fn test_decode_garbage() {
    assert_eq!(WireMessage::decode(b""), WireMessage::Unrecognized);
    assert_eq!(WireMessage::decode(b"hello"), WireMessage::Unrecognized);
    assert_eq!(WireMessage::decode(b"synchx"), WireMessage::Unrecognized);
    assert_eq!(WireMessage::decode(b"playnow"), WireMessage::Unrecognized);
    assert_eq!(WireMessage::decode(b"phase"), WireMessage::Unrecognized);
    assert_eq!(WireMessage::decode(b"pingpingyXX"), WireMessage::Unrecognized);
    assert_eq!(
        WireMessage::decode(b"play99999999999999999999999"),
        WireMessage::Unrecognized
    );
}

#[test]
fn test_encode_unrecognized_fails() {
    assert!(WireMessage::Unrecognized.encode().is_err());
}

// ===== Round trips =====

#[test]
fn test_text_round_trips() {
    let messages = [
        WireMessage::Synch,
        WireMessage::Stop,
        WireMessage::Ping { window: 3, round: 17 },
        WireMessage::Play {
            timestamp: 5_000_000_000,
        },
        WireMessage::Phase { delay: -250_000 },
    ];

    for msg in messages {
        let encoded = msg.encode().unwrap();
        assert_eq!(WireMessage::decode(&encoded), msg, "round trip of {msg:?}");
    }
}

#[test]
fn test_reply_encode_layout() {
    let msg = WireMessage::PingReply {
        server_received: 42,
        server_sent: 43,
        window: 1,
        round: 2,
    };
    let encoded = msg.encode().unwrap();

    assert_eq!(BigEndian::read_i64(&encoded[0..8]), 42);
    assert_eq!(BigEndian::read_i64(&encoded[8..16]), 43);
    assert_eq!(&encoded[16..], b"X1X2");
    assert_eq!(WireMessage::decode(&encoded), msg);
}

#[test]
fn test_ping_wire_form_matches_marker() {
    // The marker a ping carries is the marker its reply must echo.
    let ping = WireMessage::Ping { window: 4, round: 9 }.encode().unwrap();
    assert_eq!(&ping[..], b"pingpingy4X9");
}
