//! Concurrency Integration Tests
//!
//! Overlapping submissions are not serialized: whichever attempt resolves
//! last decides the final state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actionform::core::{InlineTransition, TransitionKind};
use actionform::{submit_fn, ActionForm, ValueBundle};
use serde_json::{json, Value};
use tokio::sync::oneshot;

type Gates = Arc<Mutex<HashMap<String, oneshot::Receiver<()>>>>;

/// Submitter that parks each attempt until its id is released
fn gated_form(gates: Gates) -> ActionForm<Value> {
    ActionForm::builder(submit_fn(move |data: ValueBundle| {
        let id = data["id"].as_str().unwrap_or_default().to_string();
        let gate = gates.lock().unwrap().remove(&id);
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(json!({"success": true, "id": id}))
        }
    }))
    .build()
}

fn attempt(id: &str) -> ValueBundle {
    json!({"id": id}).as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_last_resolution_wins() {
    let gates: Gates = Arc::default();
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    gates.lock().unwrap().insert("first".into(), first_rx);
    gates.lock().unwrap().insert("second".into(), second_rx);

    let form = gated_form(gates);

    let a = form.clone();
    let first = tokio::spawn(async move { a.execute_submit(attempt("first")).await });
    let b = form.clone();
    let second = tokio::spawn(async move { b.execute_submit(attempt("second")).await });

    // Let both attempts reach the submit function
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(form.action_state().is_submitting);

    // The later submission resolves first...
    second_tx.send(()).unwrap();
    second.await.unwrap();
    assert_eq!(form.action_state().action_result.unwrap()["id"], "second");

    // ...and the earlier one, resolving last, decides the final state
    first_tx.send(()).unwrap();
    first.await.unwrap();

    let state = form.form_state();
    assert_eq!(state.action_result.unwrap()["id"], "first");
    assert!(state.is_submit_successful);
    assert!(!state.is_submitting);

    let ids: Vec<String> = form
        .history()
        .iter()
        .map(|r| r.payload["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["second", "first"]);
}

#[tokio::test]
async fn test_handle_submit_tracks_pending_transitions() {
    let gates: Gates = Arc::default();
    let (tx, rx) = oneshot::channel();
    gates.lock().unwrap().insert("slow".into(), rx);

    let form = gated_form(gates);
    assert_eq!(form.transition_kind(), TransitionKind::Native);

    form.set_value("id", json!("slow"));
    form.handle_submit().await;

    // Returns immediately; the transition is still running
    assert!(form.form_state().is_pending);

    tx.send(()).unwrap();
    form.settle().await;

    let state = form.form_state();
    assert!(!state.is_pending);
    assert!(state.is_submit_successful);
}

#[tokio::test]
async fn test_inline_transition_completes_in_place() {
    let form = ActionForm::builder(submit_fn(|_data: ValueBundle| async move {
        Ok(json!({"success": true}))
    }))
    .transition(Arc::new(InlineTransition::default()))
    .build();

    assert_eq!(form.transition_kind(), TransitionKind::Inline);
    form.handle_submit().await;

    assert!(form.form_state().is_submit_successful);
    assert!(!form.form_state().is_pending);
}
