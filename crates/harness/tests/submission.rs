use formstate_core::FieldValue;
use formstate_engine::{EngineError, Form, FormOptions, FormSettings, SubmitOutcome, SubmitStatus};
use formstate_harness::{TestForm, require_titles, todo_defaults};
use futures::FutureExt;
use futures::executor::{LocalPool, block_on};
use futures::task::LocalSpawnExt;
use serde_json::json;

// ============================================================================
// Submit outcomes
// ============================================================================

#[test]
fn invalid_todo_is_not_sent() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);

    let outcome = block_on(t.form.submit()?);
    assert!(matches!(outcome, SubmitOutcome::Invalid(ref e) if e.len() == 1));

    let state = t.form.snapshot();
    assert_eq!(state.submit_status, SubmitStatus::Error);
    assert!(state.has_been_submitted);
    assert_eq!(state.submit_count, 1);
    assert!(!state.is_valid);
    assert_eq!(
        t.form.error("todos[0].title")?,
        Some("title is required".to_string())
    );
    assert_eq!(t.transport.calls(), 0);
    assert_eq!(
        t.events.entries(),
        vec!["invalid: 1".to_string(), "focus: todos[0].title".to_string()]
    );
    Ok(())
}

#[test]
fn valid_todo_is_sent_once() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);
    t.form.set_value("todos[0].title", "x")?;

    let handle = t.form.submit()?;
    assert_eq!(t.form.submit_status(), SubmitStatus::Submitting);
    assert!(t.form.snapshot().is_submitting);

    assert_eq!(block_on(handle), SubmitOutcome::Submitted);
    assert_eq!(t.form.submit_status(), SubmitStatus::Success);
    assert_eq!(t.transport.calls(), 1);
    assert_eq!(
        t.transport.payloads(),
        vec![FieldValue::from(json!({"todos": [{"id": "a", "title": "x"}]}))]
    );
    assert_eq!(t.events.entries(), vec!["success".to_string()]);
    Ok(())
}

#[test]
fn focus_callback_can_be_disabled() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::with_options(todo_defaults(""), require_titles, |options| {
        options.settings(FormSettings {
            disable_focus_on_error: true,
            ..Default::default()
        })
    });
    block_on(t.form.submit()?);
    assert_eq!(t.events.count("invalid"), 1);
    assert_eq!(t.events.count("focus"), 0);
    Ok(())
}

#[test]
fn transport_failure_reaches_callback() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    t.transport.fail_with("server down");

    let outcome = block_on(t.form.submit()?);
    assert_eq!(outcome, SubmitOutcome::Failed("server down".to_string()));
    assert_eq!(t.form.submit_status(), SubmitStatus::Error);
    assert_eq!(t.events.entries(), vec!["failure: server down".to_string()]);

    // No automatic retry; the next submit is a fresh attempt.
    assert_eq!(t.transport.calls(), 1);
    block_on(t.form.submit()?);
    assert_eq!(t.transport.calls(), 2);
    assert_eq!(t.form.snapshot().submit_count, 2);
    Ok(())
}

#[test]
fn before_submit_hook_can_cancel() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::with_options(todo_defaults("x"), require_titles, |options| {
        options.on_before_submit(|output: &FieldValue| output.as_object().is_none())
    });

    assert_eq!(block_on(t.form.submit()?), SubmitOutcome::Cancelled);
    assert_eq!(t.form.submit_status(), SubmitStatus::Idle);
    assert!(t.form.snapshot().has_been_submitted);
    assert_eq!(t.transport.calls(), 0);
    Ok(())
}

#[test]
fn submit_without_transport_is_misuse() -> Result<(), Box<dyn std::error::Error>> {
    let form: Form<FieldValue> = Form::new(FormOptions::new(todo_defaults("x"), require_titles));
    assert!(matches!(form.submit(), Err(EngineError::MissingTransport)));
    assert!(!form.snapshot().has_been_submitted);
    Ok(())
}

#[test]
fn reset_after_submit_adopts_submitted_values() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::with_options(todo_defaults(""), require_titles, |options| {
        options.reset_after_submit(true)
    });
    t.form.set_value("todos[0].title", "x")?;
    t.form.set_touched("todos[0].title", true)?;

    assert_eq!(block_on(t.form.submit()?), SubmitOutcome::Submitted);
    assert_eq!(
        t.form.default_value("todos[0].title")?,
        Some(FieldValue::from("x"))
    );
    let state = t.form.snapshot();
    assert!(!state.is_dirty);
    assert!(!state.is_touched);
    assert_eq!(state.submit_status, SubmitStatus::Idle);
    assert_eq!(state.submit_count, 0);
    assert_eq!(t.events.entries(), vec!["success".to_string()]);
    Ok(())
}

#[test]
fn snapshot_serializes_camel_case() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);
    let state = serde_json::to_value(t.form.snapshot())?;
    assert_eq!(state["submitStatus"], json!("idle"));
    assert_eq!(state["hasBeenSubmitted"], json!(false));
    assert_eq!(state["submitCount"], json!(0));
    Ok(())
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn rapid_submits_coalesce() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    let mut pool = LocalPool::new();
    t.transport.hold();

    let first = t.form.submit()?;
    pool.spawner().spawn_local(first.clone().map(|_| ()))?;
    pool.run_until_stalled();
    assert_eq!(t.transport.calls(), 1);
    assert!(t.form.snapshot().is_submitting);

    let second = t.form.submit()?;
    t.transport.release();
    assert_eq!(pool.run_until(second), SubmitOutcome::Submitted);
    assert_eq!(pool.run_until(first), SubmitOutcome::Submitted);

    assert_eq!(t.transport.calls(), 1);
    assert_eq!(t.form.snapshot().submit_count, 1);
    assert_eq!(t.events.count("success"), 1);
    Ok(())
}

#[test]
fn back_to_back_submits_share_one_attempt() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    let a = t.form.submit()?;
    let b = t.form.submit()?;
    let (a, b) = block_on(futures::future::join(a, b));
    assert_eq!(a, SubmitOutcome::Submitted);
    assert_eq!(b, SubmitOutcome::Submitted);
    assert_eq!(t.transport.calls(), 1);
    Ok(())
}

#[test]
fn submitted_values_are_a_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    let mut pool = LocalPool::new();
    t.transport.hold();

    let handle = t.form.submit()?;
    pool.spawner().spawn_local(handle.clone().map(|_| ()))?;
    pool.run_until_stalled();
    t.form.set_value("todos[0].title", "typed during submit")?;
    t.transport.release();
    pool.run_until(handle);

    assert_eq!(
        t.transport.payloads(),
        vec![FieldValue::from(json!({"todos": [{"id": "a", "title": "x"}]}))]
    );
    assert_eq!(
        t.form.value("todos[0].title")?,
        Some(FieldValue::from("typed during submit"))
    );
    Ok(())
}

#[test]
fn reset_supersedes_in_flight_submit() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    let mut pool = LocalPool::new();
    t.transport.hold();

    let handle = t.form.submit()?;
    pool.spawner().spawn_local(handle.clone().map(|_| ()))?;
    pool.run_until_stalled();

    t.form.reset_form(None)?;
    t.transport.release();
    assert_eq!(pool.run_until(handle), SubmitOutcome::Superseded);

    let state = t.form.snapshot();
    assert_eq!(state.submit_status, SubmitStatus::Idle);
    assert!(!state.has_been_submitted);
    assert!(t.events.entries().is_empty());
    Ok(())
}
