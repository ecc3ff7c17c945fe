use formstate_core::{FieldPath, FieldValue, ValidationBehavior, ValidationBehaviorConfig, ValidationOutcome};
use formstate_engine::FormSettings;
use formstate_harness::{DeferredValidator, TestForm, errors, require_titles, required, todo_defaults};
use futures::executor::block_on;

// ============================================================================
// Trigger timing
// ============================================================================

#[test]
fn when_touched_on_change_starts_after_first_touch() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), required(&["todos[0].title"])?);

    assert!(t.form.change("todos[0].title", "a")?.is_none());
    assert!(t.form.change("todos[0].title", "ab")?.is_none());
    // Judged on the untouched state, so the blur itself does not validate.
    assert!(t.form.blur("todos[0].title")?.is_none());
    assert!(t.form.touched("todos[0].title")?);

    let run = t.form.change("todos[0].title", "")?.ok_or("change after touch must validate")?;
    let report = block_on(run);
    assert!(report.applied);
    assert_eq!(t.form.error("todos[0].title")?, Some("required".to_string()));

    let run = t.form.change("todos[0].title", "abc")?.ok_or("every later change validates")?;
    block_on(run);
    assert_eq!(t.form.error("todos[0].title")?, None);
    Ok(())
}

#[test]
fn on_blur_ignores_changes() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::with_options(todo_defaults(""), require_titles, |options| {
        options.validation_behavior(ValidationBehaviorConfig {
            initial: ValidationBehavior::OnBlur,
            when_touched: ValidationBehavior::OnBlur,
            when_submitted: ValidationBehavior::OnChange,
        })
    });

    assert!(t.form.change("todos[0].title", "")?.is_none());
    let run = t.form.blur("todos[0].title")?.ok_or("blur must validate")?;
    block_on(run);
    assert_eq!(
        t.form.error("todos[0].title")?,
        Some("title is required".to_string())
    );
    assert!(t.form.change("todos[0].title", "x")?.is_none());
    Ok(())
}

#[test]
fn settings_loaded_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let settings = FormSettings::from_json(r#"{"validationBehavior": {"initial": "onChange"}}"#)?;
    let t = TestForm::with_options(todo_defaults(""), require_titles, |options| {
        options.settings(settings)
    });
    assert!(t.form.change("todos[0].title", "x")?.is_some());
    Ok(())
}

#[test]
fn submitted_form_revalidates_on_change() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults(""), require_titles);
    block_on(t.form.submit()?);
    assert!(!t.form.is_valid("")?);

    let run = t.form.change("todos[0].title", "fixed")?.ok_or("when_submitted is onChange")?;
    block_on(run);
    assert!(t.form.is_valid("")?);
    Ok(())
}

// ============================================================================
// Result application
// ============================================================================

#[test]
fn last_started_validation_wins() -> Result<(), Box<dyn std::error::Error>> {
    let validator = DeferredValidator::new();
    let t = TestForm::new(todo_defaults(""), validator.clone());

    let slow = t.form.validate()?;
    let fast = t.form.validate()?;
    assert!(fast.seq() > slow.seq());
    assert_eq!(validator.calls(), 2);

    validator.resolve(1, ValidationOutcome::Invalid(errors(&[("todos[0].title", "second")])?));
    let report = block_on(fast);
    assert!(report.applied);
    assert_eq!(t.form.error("todos[0].title")?, Some("second".to_string()));

    validator.resolve(0, ValidationOutcome::Invalid(errors(&[("todos[0].title", "first")])?));
    let report = block_on(slow);
    assert!(!report.applied);
    assert_eq!(report.errors().and_then(|e| e.first()).map(|(_, m)| m), Some("first"));
    assert_eq!(t.form.error("todos[0].title")?, Some("second".to_string()));
    Ok(())
}

#[test]
fn validator_sees_tree_at_start() -> Result<(), Box<dyn std::error::Error>> {
    let validator = DeferredValidator::new();
    let t = TestForm::new(todo_defaults("before"), validator.clone());

    let run = t.form.validate()?;
    t.form.set_value("todos[0].title", "after")?;
    validator.pass(0);
    block_on(run);

    let seen = validator.input(0).ok_or("validator was called")?;
    let title = seen.get(&FieldPath::parse("todos[0].title")?).cloned();
    assert_eq!(title, Some(FieldValue::from("before")));
    Ok(())
}

#[test]
fn validation_clears_only_covered_paths() -> Result<(), Box<dyn std::error::Error>> {
    let t = TestForm::new(todo_defaults("x"), require_titles);
    t.form.set_error("todos[0].id", "taken")?;
    t.form.set_error("detached", "kept")?;

    let report = block_on(t.form.validate()?);
    assert!(report.outcome.is_valid());
    assert_eq!(t.form.error("todos[0].id")?, None);
    assert_eq!(t.form.error("detached")?, Some("kept".to_string()));
    Ok(())
}

#[test]
fn shrinking_a_list_drops_errors_of_removed_items() -> Result<(), Box<dyn std::error::Error>> {
    let todo = |title: &str| FieldValue::object([("title", FieldValue::from(title))]);
    let defaults = FieldValue::object([("todos", FieldValue::list([todo("a"), todo("")]))]);
    let t = TestForm::new(defaults, require_titles);
    t.form.set_error("detached", "kept")?;

    block_on(t.form.validate()?);
    assert_eq!(
        t.form.error("todos[1].title")?,
        Some("title is required".to_string())
    );

    t.form.set_value("todos", FieldValue::list([todo("a")]))?;
    assert_eq!(t.form.error("todos[1].title")?, None);

    let report = block_on(t.form.validate()?);
    assert!(report.applied);
    assert!(report.outcome.is_valid());
    assert!(t.form.is_valid("todos")?);
    assert_eq!(
        t.form.first_error("")?.map(|(path, _)| path.to_string()),
        Some("detached".to_string())
    );
    Ok(())
}

#[test]
fn server_errors_seeded_until_next_validation() -> Result<(), Box<dyn std::error::Error>> {
    let server = errors(&[("todos[0].title", "already exists")])?;
    let t = TestForm::with_options(todo_defaults("x"), require_titles, |options| {
        options.server_errors(server)
    });
    assert_eq!(
        t.form.error("todos[0].title")?,
        Some("already exists".to_string())
    );
    assert!(!t.form.snapshot().is_valid);

    block_on(t.form.validate()?);
    assert!(t.form.snapshot().is_valid);
    Ok(())
}

#[test]
fn reset_makes_running_validation_stale() -> Result<(), Box<dyn std::error::Error>> {
    let validator = DeferredValidator::new();
    let t = TestForm::new(todo_defaults(""), validator.clone());

    let run = t.form.validate()?;
    t.form.reset_form(None)?;
    validator.resolve(0, ValidationOutcome::Invalid(errors(&[("todos[0].title", "late")])?));
    assert!(!block_on(run).applied);
    assert_eq!(t.form.error("todos[0].title")?, None);
    Ok(())
}
