//! Unit tests for the wire codec.

use crate::message::{
    codec::{self, WireFormat},
    domain::{Address, Message, MessageContent, MessageId, ParticipantId},
    error::DecodeError,
};
use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};

#[fixture]
fn message() -> Message {
    let created_at = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid timestamp");
    Message::from_persisted(
        MessageId::new(1_700_000_000_000_000),
        created_at,
        ParticipantId::new("alice").expect("valid identity"),
        Address::participant(ParticipantId::new("bob").expect("valid identity")),
        MessageContent::new("hello"),
    )
}

// ============================================================================
// Broker payload tests
// ============================================================================

#[rstest]
fn encoded_message_decodes_to_the_same_value(message: Message) {
    let payload = codec::encode_message(&message).expect("encodable");

    let decoded = codec::decode_message(&payload).expect("decodable");

    assert_eq!(decoded, message);
}

#[rstest]
fn decoding_accepts_time_as_the_timestamp_field() {
    let payload = br#"{"id":9,"time":"2024-01-01T00:00:00Z","from":"1","to":"2","content":"hi"}"#;

    let decoded = codec::decode_message(payload).expect("decodable");

    assert_eq!(decoded.id(), MessageId::new(9));
    assert_eq!(decoded.created_at().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    assert_eq!(decoded.to().to_string(), "2");
}

#[rstest]
fn decoding_normalises_content_newlines() {
    let payload = br#"{"id":1,"created_at":"2024-01-01T00:00:00Z","from":"1","to":"g:room","content":"a\nb"}"#;

    let decoded = codec::decode_message(payload).expect("decodable");

    assert_eq!(decoded.content().as_str(), "a b");
    assert!(decoded.to().is_group());
}

#[rstest]
#[case(b"not json".as_slice())]
#[case(br#"{"id":1,"created_at":"2024-01-01T00:00:00Z","from":" ","to":"2","content":"x"}"#.as_slice())]
#[case(br#"{"id":1,"from":"1","to":"2","content":"x"}"#.as_slice())]
fn malformed_payloads_fail_to_decode(#[case] payload: &[u8]) {
    assert!(matches!(
        codec::decode_message(payload),
        Err(DecodeError::Json(_))
    ));
}

// ============================================================================
// Inbound envelope tests
// ============================================================================

#[rstest]
fn inbound_envelope_uses_explicit_recipient() {
    let envelope = codec::decode_inbound(r#"{"to":"7","content":"hey"}"#).expect("valid");
    let fallback: Address = "9".parse().expect("valid address");

    let recipient = envelope.recipient_or(Some(&fallback)).expect("recipient");

    assert_eq!(recipient.to_string(), "7");
}

#[rstest]
fn inbound_envelope_falls_back_to_connection_default() {
    let envelope = codec::decode_inbound(r#"{"content":"hey"}"#).expect("valid");
    let fallback: Address = "9".parse().expect("valid address");

    let recipient = envelope.recipient_or(Some(&fallback)).expect("recipient");

    assert_eq!(recipient, fallback);
}

#[rstest]
fn inbound_envelope_without_any_recipient_is_rejected() {
    let envelope = codec::decode_inbound(r#"{"content":"hey"}"#).expect("valid");

    assert!(matches!(
        envelope.recipient_or(None),
        Err(DecodeError::MissingRecipient)
    ));
}

#[rstest]
fn inbound_envelope_ignores_server_assigned_fields() {
    let envelope =
        codec::decode_inbound(r#"{"id":1,"from":"mallory","to":"2","content":"x"}"#)
            .expect("valid");

    assert_eq!(envelope.content, "x");
}

#[rstest]
#[case("")]
#[case("plain text")]
#[case(r#"{"to":"2"}"#)]
fn malformed_inbound_frames_are_rejected(#[case] text: &str) {
    assert!(codec::decode_inbound(text).is_err());
}

// ============================================================================
// Rendering tests
// ============================================================================

#[rstest]
fn delimited_rendering_joins_sender_and_content(message: Message) {
    let frame = codec::render(&message, WireFormat::Delimited).expect("rendered");

    assert_eq!(frame, "alice:hello");
}

#[rstest]
fn json_rendering_carries_every_field(message: Message) {
    let frame = codec::render(&message, WireFormat::Json).expect("rendered");
    let value: serde_json::Value = serde_json::from_str(&frame).expect("json");

    assert_eq!(value["id"], 1_700_000_000_000_000_i64);
    assert_eq!(value["from"], "alice");
    assert_eq!(value["to"], "bob");
    assert_eq!(value["content"], "hello");
    assert!(value.get("created_at").is_some());
}
