//! Enhancement skip heuristics and anti-drift guards, end to end

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;

fn identity_selector() -> String {
    selector_json("llama-3.1-8b-instant", "question_answering", 70)
}

#[tokio::test]
async fn test_greeting_skips_enhancement() {
    let aux = Arc::new(ScriptedAux::default().with_selector(identity_selector()));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [{"role": "user", "content": "hi"}]
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    // The skip heuristic answers before the enhancer model is consulted.
    assert!(!aux.calls().contains(&"enhancer".to_string()));

    let dispatched = dispatcher.dispatched();
    assert_eq!(dispatched[0]["messages"][0]["content"], "hi");
    assert_eq!(dispatched[0]["metadata"]["slm_enhanced"], false);
}

#[tokio::test]
async fn test_enhancement_rejected_on_topic_drift() {
    let aux = Arc::new(
        ScriptedAux::default()
            .with_selector(identity_selector())
            .with_enhancer(
                r#"{"enhanced_prompt": "write a haiku about the ocean", "should_enhance": true}"#,
            ),
    );
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [{"role": "user", "content": "explain merge sort"}]
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    assert!(aux.calls().contains(&"enhancer".to_string()));

    let dispatched = dispatcher.dispatched();
    assert_eq!(dispatched[0]["messages"][0]["content"], "explain merge sort");
    assert_eq!(dispatched[0]["metadata"]["slm_enhanced"], false);
}

#[tokio::test]
async fn test_accepted_enhancement_rewrites_last_user_message() {
    let aux = Arc::new(
        ScriptedAux::default()
            .with_selector(identity_selector())
            .with_enhancer(
                r#"{
                    "enhanced_prompt": "explain the merge sort algorithm with a worked example",
                    "changes": ["asked for an example"],
                    "should_enhance": true
                }"#,
            ),
    );
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [
            {"role": "user", "content": "unrelated earlier question"},
            {"role": "assistant", "content": "earlier answer"},
            {"role": "user", "content": "explain merge sort algorithm example"}
        ]
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    let dispatched = dispatcher.dispatched();
    let messages = dispatched[0]["messages"].as_array().unwrap();

    // Only the last user message is rewritten.
    assert_eq!(messages[0]["content"], "unrelated earlier question");
    assert_eq!(messages[1]["content"], "earlier answer");
    assert_eq!(
        messages[2]["content"],
        "explain the merge sort algorithm with a worked example"
    );

    let metadata = &dispatched[0]["metadata"];
    assert_eq!(metadata["slm_enhanced"], true);
    assert!(metadata["slm_similarity"].as_f64().unwrap() >= 0.3);
    assert_eq!(metadata["slm_processed"], true);
}

#[tokio::test]
async fn test_enhancer_failure_keeps_original_prompt() {
    let mut aux = ScriptedAux::default().with_selector(identity_selector());
    aux.enhancer = Err(());
    let aux = Arc::new(aux);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [{"role": "user", "content": "explain merge sort in detail"}]
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    let dispatched = dispatcher.dispatched();
    assert_eq!(
        dispatched[0]["messages"][0]["content"],
        "explain merge sort in detail"
    );
    assert_eq!(dispatched[0]["metadata"]["slm_enhanced"], false);
}

#[tokio::test]
async fn test_decision_accept_runs_enhancement_only() {
    // The client accepted a recommendation: the chosen model is kept, the
    // registry is not fetched, and only classifier + enhancer run.
    let aux = Arc::new(ScriptedAux::default().with_enhancer(
        r#"{
            "enhanced_prompt": "explain the merge sort algorithm with a worked example",
            "should_enhance": true
        }"#,
    ));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    // A failing registry proves the registry is never consulted.
    let registry = Arc::new(StaticRegistry(Err(())));
    let state = make_state(aux.clone(), registry, dispatcher.clone());

    let body = json!({
        "model": "llama-3.3-70b-versatile",
        "messages": [{"role": "user", "content": "explain merge sort algorithm example"}],
        "metadata": {"slm_enabled": true, "slm_decision": "accept"}
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    let calls = aux.calls();
    assert!(calls.contains(&"classifier".to_string()));
    assert!(calls.contains(&"enhancer".to_string()));
    assert!(!calls.contains(&"selector".to_string()));

    let dispatched = dispatcher.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0]["model"], "llama-3.3-70b-versatile");
    assert_eq!(dispatched[0]["metadata"]["slm_processed"], true);
}

#[tokio::test]
async fn test_decision_reject_keeps_current_model() {
    let aux = Arc::new(ScriptedAux::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [{"role": "user", "content": "explain merge sort in detail"}],
        "metadata": {"slm_enabled": true, "slm_decision": "reject"}
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    assert!(!aux.calls().contains(&"selector".to_string()));
    assert_eq!(dispatcher.dispatched()[0]["model"], "llama-3.1-8b-instant");
}

#[tokio::test]
async fn test_auto_select_param_is_dropped_before_dispatch() {
    let aux = Arc::new(ScriptedAux::default().with_selector(identity_selector()));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let body = json!({
        "model": "llama-3.1-8b-instant",
        "messages": [{"role": "user", "content": "explain merge sort in detail"}],
        "auto_select": true,
        "temperature": 0.4
    });

    let (status, _) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    let dispatched = dispatcher.dispatched();
    assert!(dispatched[0].get("auto_select").is_none());
    assert_eq!(dispatched[0]["temperature"], 0.4);
}
