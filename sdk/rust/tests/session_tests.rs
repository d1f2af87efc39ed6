// Chat session behaviour over a scripted transport.
//
// Covers:
//   - N submits give 2N messages in submission order
//   - streamed fragments concatenate into the AI message
//   - edit truncates and re-streams; regenerate keeps the length
//   - mid-stream failure leaves the fixed error text and the session usable
//   - abort and dropped turns settle the in-progress message
//   - history and context sent with each turn

mod common;

use std::time::Duration;

use common::{ScriptedTransport, StreamScript};
use themis_core::{
    action::ActionRequest,
    chat::{INTERRUPTED_TEXT, STREAM_ERROR_TEXT},
    types::{MessageState, Role, StructuredResult},
};
use themis_sdk::{ChatSession, TurnOutcome};

fn session(transport: &std::sync::Arc<ScriptedTransport>) -> ChatSession {
    ChatSession::new(transport.clone())
}

fn chat_history(request: &ActionRequest) -> Vec<(Role, String)> {
    match request {
        ActionRequest::ChatStream(req) => req
            .history
            .iter()
            .map(|t| (t.role, t.content.clone()))
            .collect(),
        other => panic!("expected chatStream, got {:?}", other.action()),
    }
}

// =============================================================================
// submit
// =============================================================================

#[tokio::test]
async fn n_submits_give_2n_messages_in_order() {
    let transport = ScriptedTransport::new();
    let mut chat = session(&transport);
    for i in 0..5 {
        transport.push_reply(&[&format!("απάντηση {i}")]);
        assert_eq!(chat.submit(&format!("ερώτηση {i}")).await, TurnOutcome::Completed);
    }

    let messages = chat.messages();
    assert_eq!(messages.len(), 10);
    for (i, pair) in messages.chunks(2).enumerate() {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[0].text(), format!("ερώτηση {i}"));
        assert_eq!(pair[1].role, Role::Ai);
        assert_eq!(pair[1].text(), format!("απάντηση {i}"));
        assert_eq!(pair[1].state, MessageState::Complete);
    }
}

#[tokio::test]
async fn article_914_fragments_are_concatenated() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["Άρθρο", " 914", " ..."]);
    let mut chat = session(&transport);

    let mut seen = Vec::new();
    let outcome = chat
        .submit_with("What is article 914?", |m| {
            seen.push((m.text().to_string(), m.state))
        })
        .await;

    assert_eq!(outcome, TurnOutcome::Completed);
    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text(), "What is article 914?");
    assert_eq!(messages[1].text(), "Άρθρο 914 ...");
    assert_eq!(
        seen,
        vec![
            ("Άρθρο".to_string(), MessageState::Streaming),
            ("Άρθρο 914".to_string(), MessageState::Streaming),
            ("Άρθρο 914 ...".to_string(), MessageState::Streaming),
            ("Άρθρο 914 ...".to_string(), MessageState::Complete),
        ]
    );
}

#[tokio::test]
async fn any_fragmentation_yields_the_same_content() {
    let text = "Σύμφωνα με το άρθρο 914 ΑΚ, όποιος ζημιώσει άλλον παράνομα και υπαίτια.";
    let chars: Vec<char> = text.chars().collect();
    for size in [1, 2, 3, 7, 50, chars.len()] {
        let transport = ScriptedTransport::new();
        let fragments: Vec<String> = chars.chunks(size).map(|c| c.iter().collect()).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        transport.push_reply(&refs);
        let mut chat = session(&transport);
        chat.submit("x").await;
        assert_eq!(chat.messages()[1].text(), text, "fragment size {size}");
    }
}

#[tokio::test]
async fn blank_submit_is_ignored() {
    let transport = ScriptedTransport::new();
    let mut chat = session(&transport);
    assert_eq!(chat.submit("   \n").await, TurnOutcome::Ignored);
    assert!(chat.messages().is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn history_includes_new_user_message_and_context() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["α"]);
    transport.push_reply(&["β"]);
    let mut chat = session(&transport);
    chat.set_context(Some(StructuredResult {
        summary: "Μίσθωση".into(),
        supporting_points: vec![],
        opposing_points: vec![],
    }));

    chat.submit("πρώτη").await;
    chat.submit("δεύτερη").await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        chat_history(&requests[1]),
        vec![
            (Role::User, "πρώτη".to_string()),
            (Role::Ai, "α".to_string()),
            (Role::User, "δεύτερη".to_string()),
        ]
    );
    let ActionRequest::ChatStream(req) = &requests[1] else {
        panic!("expected chatStream");
    };
    assert_eq!(req.context.as_ref().unwrap().summary, "Μίσθωση");
}

#[tokio::test]
async fn submitted_and_edited_text_is_kept_as_typed() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["α"]);
    transport.push_reply(&["β"]);
    let mut chat = session(&transport);

    chat.submit("  Άρθρο 914;\n").await;
    assert_eq!(chat.messages()[0].text(), "  Άρθρο 914;\n");
    assert_eq!(
        chat_history(&transport.requests()[0]),
        vec![(Role::User, "  Άρθρο 914;\n".to_string())]
    );

    let id = chat.messages()[0].id.clone();
    chat.edit(&id, " ΑΚ 914 ").await;
    assert_eq!(chat.messages()[0].text(), " ΑΚ 914 ");
}

// =============================================================================
// edit / regenerate
// =============================================================================

#[tokio::test]
async fn edit_first_message_discards_later_exchange() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["ένα"]);
    transport.push_reply(&["δύο"]);
    transport.push_reply(&["νέα απάντηση"]);
    let mut chat = session(&transport);
    chat.submit("first").await;
    chat.submit("second").await;
    assert_eq!(chat.messages().len(), 4);

    let first_id = chat.messages()[0].id.clone();
    assert_eq!(chat.edit(&first_id, "new text").await, TurnOutcome::Completed);

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, first_id);
    assert_eq!(messages[0].text(), "new text");
    assert_eq!(messages[1].text(), "νέα απάντηση");
    assert_eq!(
        chat_history(&transport.requests()[2]),
        vec![(Role::User, "new text".to_string())]
    );
}

#[tokio::test]
async fn edit_kth_message_gives_length_2k() {
    let transport = ScriptedTransport::new();
    let mut chat = session(&transport);
    for i in 0..4 {
        transport.push_reply(&["r"]);
        chat.submit(&format!("q{i}")).await;
    }
    let third_user = chat.messages()[4].id.clone();
    transport.push_reply(&["r3"]);
    chat.edit(&third_user, "q2'").await;
    assert_eq!(chat.messages().len(), 6);
    assert_eq!(chat.messages()[4].text(), "q2'");
}

#[tokio::test]
async fn edit_of_unknown_or_ai_message_is_ignored() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["α"]);
    let mut chat = session(&transport);
    chat.submit("x").await;
    let ai_id = chat.messages()[1].id.clone();

    assert_eq!(chat.edit("user-999", "y").await, TurnOutcome::Ignored);
    assert_eq!(chat.edit(&ai_id, "y").await, TurnOutcome::Ignored);
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn regenerate_replaces_last_reply() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["παλιά"]);
    transport.push_reply(&["νέα"]);
    let mut chat = session(&transport);
    chat.submit("ερώτηση").await;
    let old_id = chat.messages()[1].id.clone();

    assert_eq!(chat.regenerate().await, TurnOutcome::Completed);
    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_ne!(messages[1].id, old_id);
    assert_eq!(messages[1].text(), "νέα");
    assert_eq!(
        chat_history(&transport.requests()[1]),
        vec![(Role::User, "ερώτηση".to_string())]
    );
}

#[tokio::test]
async fn regenerate_without_a_reply_is_ignored() {
    let transport = ScriptedTransport::new();
    let mut chat = session(&transport);
    assert_eq!(chat.regenerate().await, TurnOutcome::Ignored);
    assert!(chat.messages().is_empty());
}

// =============================================================================
// failures and cancellation
// =============================================================================

#[tokio::test]
async fn mid_stream_error_then_new_submit() {
    let transport = ScriptedTransport::new();
    transport.push_stream(StreamScript::Items(vec![
        Ok("μισή".into()),
        Err("connection reset".into()),
    ]));
    transport.push_reply(&["εντάξει"]);
    let mut chat = session(&transport);

    let outcome = chat.submit("πρώτη").await;
    assert!(matches!(outcome, TurnOutcome::Failed(ref m) if m.contains("connection reset")));
    assert_eq!(chat.messages()[1].text(), STREAM_ERROR_TEXT);
    assert_eq!(chat.messages()[1].state, MessageState::Complete);

    assert_eq!(chat.submit("δεύτερη").await, TurnOutcome::Completed);
    assert_eq!(chat.messages().len(), 4);
    assert_eq!(chat.messages()[3].text(), "εντάξει");
}

#[tokio::test]
async fn refused_stream_fails_the_turn() {
    let transport = ScriptedTransport::new();
    transport.push_stream(StreamScript::Refuse("HTTP 502".into()));
    let mut chat = session(&transport);
    assert!(matches!(chat.submit("x").await, TurnOutcome::Failed(_)));
    assert_eq!(chat.messages()[1].text(), STREAM_ERROR_TEXT);
}

#[tokio::test]
async fn abort_keeps_partial_text_and_closes_stream() {
    let transport = ScriptedTransport::new();
    transport.push_stream(StreamScript::Hang(vec!["Άρθρο".into()]));
    let mut chat = session(&transport);
    let handle = chat.abort_handle();

    let outcome = chat
        .submit_with("x", |m| {
            if m.state == MessageState::Streaming {
                handle.abort();
            }
        })
        .await;

    assert_eq!(outcome, TurnOutcome::Interrupted);
    assert_eq!(chat.messages()[1].text(), "Άρθρο");
    assert_eq!(chat.messages()[1].state, MessageState::Complete);
    assert!(transport.hanging_streams_closed());
}

#[tokio::test]
async fn dropped_turn_is_settled_by_next_submit() {
    let transport = ScriptedTransport::new();
    transport.push_stream(StreamScript::Hang(Vec::new()));
    transport.push_reply(&["ok"]);
    let mut chat = session(&transport);

    let timed_out = tokio::time::timeout(Duration::from_millis(50), chat.submit("πρώτη")).await;
    assert!(timed_out.is_err());
    assert_eq!(chat.messages()[1].state, MessageState::Pending);
    assert!(transport.hanging_streams_closed());

    assert_eq!(chat.submit("δεύτερη").await, TurnOutcome::Completed);
    let messages = chat.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].text(), INTERRUPTED_TEXT);
    assert_eq!(messages[1].state, MessageState::Complete);
    assert_eq!(messages[3].text(), "ok");
}

#[tokio::test]
async fn reset_clears_messages_and_context() {
    let transport = ScriptedTransport::new();
    transport.push_reply(&["α"]);
    let mut chat = session(&transport);
    chat.record_analysis(StructuredResult {
        summary: "s".into(),
        supporting_points: vec![],
        opposing_points: vec![],
    });
    chat.submit("x").await;
    assert_eq!(chat.messages().len(), 3);
    assert!(chat.context().is_some());

    chat.reset();
    assert!(chat.messages().is_empty());
    assert!(chat.context().is_none());
}
