use base64::Engine;
use casecall::stt::messages::{ClientMessage, ServerMessage, StreamingConfig};
use casecall::stt::{TranscriptEvent, TranscriptKind};
use casecall::ws::{messages::ErrorType, ClientEvent};

#[test]
fn test_audio_data_round_trip() {
    let pcm: Vec<u8> = vec![0x10, 0x00, 0xf0, 0xff, 0x42, 0x01];
    let json = serde_json::to_string(&ClientMessage::audio(&pcm)).unwrap();

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["message_type"], "AudioData");

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value["audio_data"].as_str().unwrap())
        .unwrap();
    assert_eq!(decoded, pcm);
}

#[test]
fn test_update_configuration_uses_provider_field_names() {
    let config = StreamingConfig {
        sample_rate: 8000,
        encoding: Some("pcm_mulaw".into()),
        format_turns: true,
        end_of_turn_confidence_threshold: Some(0.8),
        min_end_of_turn_silence_when_confident: Some(800),
        max_turn_silence: Some(2500),
    };
    let json = serde_json::to_value(ClientMessage::UpdateConfiguration { config }).unwrap();

    let inner = &json["config"];
    assert_eq!(inner["sample_rate"], 8000);
    assert_eq!(inner["encoding"], "pcm_mulaw");
    assert_eq!(inner["end_of_turn_confidence_threshold"], 0.8);
    assert_eq!(inner["min_end_of_turn_silence_when_confident"], 800);
    assert_eq!(inner["max_turn_silence"], 2500);
}

#[test]
fn test_server_error_preserves_provider_code() {
    let raw = r#"{"message_type":"Error","error":"rate_limited","message":"slow down"}"#;
    match serde_json::from_str::<ServerMessage>(raw).unwrap() {
        ServerMessage::Error { error, message } => {
            assert_eq!(error, "rate_limited");
            assert_eq!(message, "slow down");
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_transcript_frame_matches_client_contract() {
    let mut event = TranscriptEvent::new(TranscriptKind::Partial, "so the client".into(), 0.41);
    event.session_id = Some("ext-9".into());

    let json = serde_json::to_value(ClientEvent::transcript(&event)).unwrap();
    let object = json.as_object().unwrap();

    // The browser client depends on exactly these keys.
    for key in [
        "type",
        "message_type",
        "text",
        "confidence",
        "is_final",
        "timestamp",
        "session_id",
    ] {
        assert!(object.contains_key(key), "missing key {}", key);
    }
    assert_eq!(json["type"], "transcript");
    assert_eq!(json["message_type"], "PartialTranscript");
    assert_eq!(json["is_final"], false);
}

#[test]
fn test_error_frame_types_cover_both_categories() {
    let stt = serde_json::to_value(ClientEvent::error(ErrorType::Stt, "asr failed")).unwrap();
    assert_eq!(stt["type"], "error");
    assert_eq!(stt["error_type"], "STT_ERROR");

    let audio = serde_json::to_value(ClientEvent::error(ErrorType::Audio, "frame too short"))
        .unwrap();
    assert_eq!(audio["error_type"], "AUDIO_ERROR");
    assert_eq!(audio["message"], "frame too short");
}

#[test]
fn test_session_lifecycle_messages() {
    for (msg, expected) in [
        (
            serde_json::to_value(ClientMessage::SessionTermination).unwrap(),
            "SessionTermination",
        ),
        (
            serde_json::to_value(ClientMessage::ForceEndpoint).unwrap(),
            "ForceEndpoint",
        ),
    ] {
        assert_eq!(msg["message_type"], expected);
        // No payload beyond the tag.
        assert_eq!(msg.as_object().unwrap().len(), 1);
    }

    let terminated = r#"{"message_type":"SessionTerminated"}"#;
    assert!(matches!(
        serde_json::from_str::<ServerMessage>(terminated).unwrap(),
        ServerMessage::SessionTerminated
    ));
}
