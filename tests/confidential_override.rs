//! Confidential override behavior
//!
//! A confidential verdict routes the turn to the configured confidential
//! model unconditionally: the selector is not consulted and no other
//! recommendation can win.

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;

fn confidential_request(slm_enabled: bool) -> serde_json::Value {
    json!({
        "model": "llama-3.1-8b-instant",
        "messages": [
            {"role": "user", "content": "my SSN is 123-45-6789, summarize my taxes"}
        ],
        "metadata": {"slm_enabled": slm_enabled}
    })
}

#[tokio::test]
async fn test_confidential_query_overrides_model_when_toggle_off() {
    let aux = Arc::new(ScriptedAux::default().with_classifier(confidential_json(95)));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let (status, _) = post_chat_json(make_app(state), confidential_request(false)).await;

    assert_eq!(status, 200);

    // The selector must not be consulted for confidential queries.
    let calls = aux.calls();
    assert!(calls.contains(&"classifier".to_string()));
    assert!(!calls.contains(&"selector".to_string()));

    let dispatched = dispatcher.dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0]["model"], CONFIDENTIAL_MODEL);
    assert_eq!(dispatched[0]["metadata"]["slm_intent"], "confidential");
}

#[tokio::test]
async fn test_confidential_query_recommends_override_when_toggle_on() {
    let aux = Arc::new(ScriptedAux::default().with_classifier(confidential_json(95)));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let (status, body) = post_chat_json(make_app(state), confidential_request(true)).await;

    assert_eq!(status, 200);
    assert_eq!(body["type"], "model_recommendation");
    assert_eq!(body["recommended_model"], CONFIDENTIAL_MODEL);
    assert_eq!(body["is_confidential"], true);
    assert_eq!(body["confidence"], 95);
    assert_eq!(body["confidential_info"]["categories"][0], "pii");

    // A recommendation is returned instead of dispatching.
    assert!(dispatcher.dispatched().is_empty());
}

#[tokio::test]
async fn test_confidential_override_beats_selector_recommendation() {
    // Even with a selector scripted to recommend something else, the
    // override wins because the selector never runs.
    let aux = Arc::new(
        ScriptedAux::default()
            .with_classifier(confidential_json(80))
            .with_selector(selector_json("llama-3.3-70b-versatile", "analysis", 99)),
    );
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let (status, _) = post_chat_json(make_app(state), confidential_request(false)).await;

    assert_eq!(status, 200);
    assert!(!aux.calls().contains(&"selector".to_string()));
    assert_eq!(dispatcher.dispatched()[0]["model"], CONFIDENTIAL_MODEL);
}

#[tokio::test]
async fn test_confidential_model_already_selected_forwards_without_recommendation() {
    let aux = Arc::new(ScriptedAux::default().with_classifier(confidential_json(90)));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    // User already chose the confidential model: no switch, so even with
    // the toggle on the request is forwarded.
    let body = json!({
        "model": CONFIDENTIAL_MODEL,
        "messages": [
            {"role": "user", "content": "my SSN is 123-45-6789, summarize my taxes"}
        ],
        "metadata": {"slm_enabled": true}
    });

    let (status, response) = post_chat_json(make_app(state), body).await;

    assert_eq!(status, 200);
    assert!(response.get("type").is_none(), "no recommendation expected");
    assert_eq!(dispatcher.dispatched()[0]["model"], CONFIDENTIAL_MODEL);
}

#[tokio::test]
async fn test_classifier_failure_degrades_to_non_confidential() {
    let mut aux = ScriptedAux::default();
    aux.classifier = Err(());
    let aux = Arc::new(aux.with_selector(selector_json(
        "llama-3.1-8b-instant",
        "question_answering",
        70,
    )));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let state = make_state(aux.clone(), Arc::new(default_registry()), dispatcher.clone());

    let (status, _) = post_chat_json(make_app(state), confidential_request(false)).await;

    assert_eq!(status, 200);
    // Detection never blocks routing: the selector runs and the request is
    // forwarded on the user's model.
    assert!(aux.calls().contains(&"selector".to_string()));
    let dispatched = dispatcher.dispatched();
    assert_eq!(dispatched[0]["model"], "llama-3.1-8b-instant");
}
