// JSON shapes shared by the server, the SDK and browser clients.

use serde_json::{json, Value};
use themis_core::{
    action::{Action, ActionError, ActionRequest, Envelope, RawRequest},
    chat::Transcript,
    stream::{encode_done_frame, encode_text_frame, Frame, FrameDecoder, StreamPayload},
    types::{ArticleRef, StructuredResult},
};

fn raw(value: Value) -> RawRequest {
    serde_json::from_value(value).unwrap()
}

#[test]
fn analyze_request_round_trips_through_raw_form() {
    let request = ActionRequest::parse(raw(json!({
        "action": "analyzeCase",
        "payload": { "caseDetails": "Κλοπή", "country": "Greece" }
    })))
    .unwrap();
    assert_eq!(request.action(), Action::AnalyzeCase);

    let back = serde_json::to_value(request.to_raw()).unwrap();
    assert_eq!(
        back,
        json!({ "action": "analyzeCase", "payload": { "caseDetails": "Κλοπή", "country": "Greece" } })
    );
}

#[test]
fn unknown_action_is_rejected_before_payload() {
    let err = ActionRequest::parse(raw(json!({ "action": "deleteEverything" }))).unwrap_err();
    assert!(matches!(err, ActionError::InvalidAction(ref a) if a == "deleteEverything"));
}

#[test]
fn missing_payload_fields_are_invalid_payload() {
    let err = ActionRequest::parse(raw(json!({ "action": "formatAsCase", "payload": { "rawText": "x" } })))
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::InvalidPayload {
            action: Action::FormatAsCase,
            ..
        }
    ));
}

#[test]
fn envelopes_have_exactly_one_key() {
    let ok = serde_json::to_value(Envelope::ok(StructuredResult {
        summary: "s".into(),
        supporting_points: vec![ArticleRef {
            label: "ΑΚ 914".into(),
            explanation: "e".into(),
            link: None,
        }],
        opposing_points: vec![],
    }))
    .unwrap();
    assert_eq!(
        ok,
        json!({ "result": {
            "summary": "s",
            "supportingPoints": [{ "label": "ΑΚ 914", "explanation": "e" }],
            "opposingPoints": []
        }})
    );

    let err = serde_json::to_value(Envelope::error("boom")).unwrap();
    assert_eq!(err, json!({ "error": "boom" }));

    let parsed: Envelope = serde_json::from_value(json!({ "error": "boom" })).unwrap();
    assert_eq!(parsed.into_result(), Err("boom".to_string()));
}

#[test]
fn transcript_messages_serialize_flat() {
    let mut t = Transcript::new();
    let turn = t.begin_submit("Γεια");
    t.append_fragment(&turn.ai_id, "Καλημέρα");
    t.complete(&turn.ai_id);

    let v = serde_json::to_value(t.messages()).unwrap();
    assert_eq!(v[0]["role"], "user");
    assert_eq!(v[0]["kind"], "text");
    assert_eq!(v[0]["content"], "Γεια");
    assert_eq!(v[1]["role"], "ai");
    assert_eq!(v[1]["state"], "complete");
    assert!(v[1]["created_at"].is_string());
}

#[test]
fn encoded_frames_decode_back() {
    let wire = format!(
        "{}{}{}",
        encode_text_frame("Άρθρο"),
        encode_text_frame(" 914\n\"quoted\""),
        encode_done_frame()
    );
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(wire.as_bytes());
    assert_eq!(frames.len(), 3);
    assert_eq!(
        StreamPayload::parse(match &frames[1] {
            Frame::Data(d) => d,
            Frame::Done => panic!("unexpected done"),
        })
        .unwrap(),
        StreamPayload::Text {
            text: " 914\n\"quoted\"".into()
        }
    );
    assert_eq!(frames[2], Frame::Done);
    assert!(decoder.is_done());
}
