use std::task::{Context, Poll};

use formstate_core::FieldValue;
use formstate_engine::{ControlledStatus, EngineError};
use formstate_harness::{TestForm, require_titles, todo_defaults};
use futures::FutureExt;
use futures::executor::block_on;
use futures::task::noop_waker_ref;

// ============================================================================
// Hydration
// ============================================================================

#[test]
fn reads_default_until_hydrated() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    let title = t.form.controlled("todos[0].title")?;

    assert_eq!(title.status()?, ControlledStatus::Unhydrated);
    assert_eq!(title.value()?, Some(FieldValue::from("draft")));
    assert!(matches!(title.set_value("x"), Err(EngineError::NotHydrated(_))));
    assert!(matches!(
        t.form.set_value("todos[0].title", "x"),
        Err(EngineError::NotHydrated(_))
    ));

    t.form.mark_hydrated()?;
    assert!(t.form.is_hydrated());
    assert!(title.is_hydrated()?);
    assert!(title.set_value("x")?.is_none());
    assert_eq!(t.form.value("todos[0].title")?, Some(FieldValue::from("x")));
    Ok(())
}

#[test]
fn hydration_happens_once_per_mount() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    let title = t.form.controlled("todos[0].title")?;
    t.form.mark_hydrated()?;

    t.form.set_value("todos[0].title", "external")?;
    assert_eq!(title.render()?, Some(FieldValue::from("external")));
    t.form.mark_hydrated()?;
    assert_eq!(title.render()?, Some(FieldValue::from("external")));
    assert_eq!(
        t.form.value("todos[0].title")?,
        Some(FieldValue::from("external"))
    );
    Ok(())
}

#[test]
fn remount_keeps_live_value() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    t.form.mark_hydrated()?;
    let title = t.form.controlled("todos[0].title")?;
    assert!(title.is_hydrated()?);
    title.set_value("edited")?;

    title.unmount()?;
    assert_eq!(t.form.value("todos[0].title")?, Some(FieldValue::from("edited")));

    let again = t.form.controlled("todos[0].title")?;
    assert!(again.is_hydrated()?);
    assert_eq!(again.value()?, Some(FieldValue::from("edited")));
    Ok(())
}

#[test]
fn mount_after_reorder_keeps_live_value() -> Result<(), Box<dyn std::error::Error>> {
    let defaults = FieldValue::object([(
        "todos",
        FieldValue::list([
            FieldValue::object([("title", FieldValue::from("a"))]),
            FieldValue::object([("title", FieldValue::from("b"))]),
        ]),
    )]);
    let t = TestForm::new(defaults, require_titles);
    t.form.mark_hydrated()?;
    t.form.array("todos")?.remove(0)?;
    assert_eq!(t.form.value("todos[0].title")?, Some(FieldValue::from("b")));

    let title = t.form.controlled("todos[0].title")?;
    assert!(title.is_hydrated()?);
    assert_eq!(title.value()?, Some(FieldValue::from("b")));
    assert_eq!(t.form.value("todos[0].title")?, Some(FieldValue::from("b")));
    Ok(())
}

#[test]
fn hydration_fills_missing_value_from_default() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    let title = t.form.controlled("todos[0].title")?;
    t.form.set_value(
        "todos",
        FieldValue::list([FieldValue::object([("id", FieldValue::from("a"))])]),
    )?;
    assert_eq!(t.form.value("todos[0].title")?, None);

    t.form.mark_hydrated()?;
    assert_eq!(title.render()?, Some(FieldValue::from("draft")));
    assert_eq!(t.form.value("todos[0].title")?, Some(FieldValue::from("draft")));
    Ok(())
}

#[test]
fn handle_debug_names_its_path() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    let title = t.form.controlled("todos[0].title")?;
    let shown = format!("{title:?}");
    assert!(shown.contains("ControlledField"));
    assert!(shown.contains("todos[0].title"));
    Ok(())
}

#[test]
fn stale_handle_is_not_mounted() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    let first = t.form.controlled("todos[0].title")?;
    let _second = t.form.controlled("todos[0].title")?;
    assert!(matches!(first.status(), Err(EngineError::NotMounted(_))));
    Ok(())
}

#[test]
fn controlled_writes_track_dirty() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("draft"), require_titles);
    t.form.mark_hydrated()?;
    let title = t.form.controlled("todos[0].title")?;

    title.set_value("changed")?;
    assert!(t.form.dirty("todos[0].title")?);
    title.set_value("draft")?;
    assert!(!t.form.dirty("todos[0].title")?);
    assert_eq!(title.default_value()?, Some(FieldValue::from("draft")));
    Ok(())
}

// ============================================================================
// Awaiting values
// ============================================================================

#[test]
fn await_value_resolves_after_render() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);
    t.form.mark_hydrated()?;
    let title = t.form.controlled("todos[0].title")?;

    assert_eq!(block_on(title.await_value())?, Some(FieldValue::from("")));

    title.set_value("typed")?;
    let mut pending = title.await_value();
    let mut cx = Context::from_waker(noop_waker_ref());
    assert!(matches!(pending.poll_unpin(&mut cx), Poll::Pending));

    title.render()?;
    assert_eq!(block_on(pending)?, Some(FieldValue::from("typed")));
    Ok(())
}

#[test]
fn unmount_cancels_waiters() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);
    t.form.mark_hydrated()?;
    let title = t.form.controlled("todos[0].title")?;

    title.set_value("typed")?;
    let pending = title.await_value();
    title.unmount()?;
    assert!(matches!(block_on(pending), Err(EngineError::NotMounted(_))));
    Ok(())
}
