use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mv_view_types::{Callback, ValidationError, ViewConfig};
use pretty_assertions::assert_eq;

use super::{sum_config, sum_each, sum_post};
use crate::error::ViewError;
use crate::registry::ViewRegistry;
use crate::wrap::{CallbackWrapper, ImmutableWrapper, WrapError, WrapOptions};

#[test]
fn reset_then_define_makes_view_discoverable() {
    let registry = ViewRegistry::new();
    registry.reset();
    assert!(!registry.has("sum"));

    let sum = registry.define(sum_config("sum")).unwrap();
    assert!(registry.has("sum"));
    assert!(Arc::ptr_eq(&registry.get("sum").unwrap(), &sum));

    registry.reset();
    assert!(!registry.has("sum"));
    assert!(registry.is_empty());
}

#[test]
fn get_missing_view_fails() {
    let registry = ViewRegistry::new();
    let err = registry.get("nope").unwrap_err();
    assert!(matches!(err, ViewError::NotFound(name) if name == "nope"));
}

#[test]
fn duplicate_name_without_override_is_rejected() {
    let registry = ViewRegistry::new();
    let first = registry.define(sum_config("sum")).unwrap();

    let other_each = crate::each_fn!(|step| {
        step.context["other"] = serde_json::json!(true);
        Ok(())
    });
    let err = registry
        .define(ViewConfig::collection("sum").each(other_each))
        .unwrap_err();
    assert!(matches!(err, ViewError::AlreadyDefined { ref name } if name == "sum"));

    let kept = registry.get("sum").unwrap();
    assert!(Arc::ptr_eq(&kept, &first));
    assert_eq!(registry.len(), 1);
}

#[test]
fn incoming_override_replaces_entry() {
    let registry = ViewRegistry::new();
    let first = registry.define(sum_config("sum")).unwrap();
    let second = registry
        .define(ViewConfig::collection("sum").each(sum_each()).allow_override(true))
        .unwrap();

    assert_ne!(first.view_id(), second.view_id());
    assert!(Arc::ptr_eq(&registry.get("sum").unwrap(), &second));
}

#[test]
fn existing_override_permits_replacement() {
    let registry = ViewRegistry::new();
    registry
        .define(sum_config("sum").allow_override(true))
        .unwrap();
    let second = registry
        .define(ViewConfig::collection("sum").each(sum_each()))
        .unwrap();
    assert!(Arc::ptr_eq(&registry.get("sum").unwrap(), &second));
}

#[test]
fn unregistered_definition_bypasses_registry() {
    let registry = ViewRegistry::new();
    let local = registry
        .define(sum_config("sum").register(false))
        .unwrap();
    assert!(!registry.has("sum"));
    assert!(!local.options().register);

    // A registered view of the same name is still free to take the slot.
    registry.define(sum_config("sum")).unwrap();
    assert!(registry.has("sum"));
}

#[test]
fn get_all_keeps_registration_order() {
    let registry = ViewRegistry::new();
    for name in ["b", "a", "c"] {
        registry.define(sum_config(name)).unwrap();
    }
    let names: Vec<_> = registry.get_all().keys().cloned().collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    assert_eq!(registry.names(), names);
}

#[test]
fn invalid_config_never_registers() {
    let registry = ViewRegistry::new();
    let err = registry
        .define(ViewConfig::record("upper").each(sum_each()).post(sum_post()))
        .unwrap_err();
    assert!(matches!(
        err,
        ViewError::Validation(ValidationError::PrePostOnRecordView)
    ));
    assert!(!registry.has("upper"));

    let err = registry.define(ViewConfig::collection("")).unwrap_err();
    assert!(matches!(err, ViewError::Validation(ValidationError::MissingName)));
    assert!(registry.is_empty());
}

#[test]
fn sequential_defaults_depend_on_type() {
    let registry = ViewRegistry::new();
    let collection = registry.define(sum_config("sum")).unwrap();
    let record = registry
        .define(ViewConfig::record("upper").each(sum_each()))
        .unwrap();
    assert!(collection.is_sequential());
    assert!(!record.is_sequential());

    let explicit = registry
        .define(ViewConfig::record("ordered").each(sum_each()).sequential(true))
        .unwrap();
    assert!(explicit.is_sequential());
}

struct CountingWrapper {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingWrapper {
    fn new(fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail,
        }
    }
}

impl CallbackWrapper for CountingWrapper {
    fn wrap(
        &self,
        qualified_name: &str,
        callback: Callback,
        options: &WrapOptions,
    ) -> Result<Callback, WrapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WrapError(format!("refusing {qualified_name}")));
        }
        ImmutableWrapper.wrap(qualified_name, callback, options)
    }
}

#[test]
fn collision_is_detected_before_wrapping() {
    let wrapper = Arc::new(CountingWrapper::new(false));
    let registry = ViewRegistry::with_wrapper(wrapper.clone());
    registry.define(sum_config("sum")).unwrap();
    assert_eq!(wrapper.calls.load(Ordering::SeqCst), 3);

    registry.define(sum_config("sum")).unwrap_err();
    assert_eq!(wrapper.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn wrapper_failure_aborts_definition() {
    let wrapper = Arc::new(CountingWrapper::new(true));
    let registry = ViewRegistry::with_wrapper(wrapper.clone());
    let err = registry.define(sum_config("sum")).unwrap_err();
    match err {
        ViewError::Wrap { name, callback, .. } => {
            assert_eq!(name, "sum");
            assert_eq!(callback, "sumModelViewEach");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!registry.has("sum"));
}

#[test]
fn mutable_views_skip_the_wrapper() {
    let wrapper = Arc::new(CountingWrapper::new(true));
    let registry = ViewRegistry::with_wrapper(wrapper.clone());
    let view = registry
        .define(sum_config("sum").immutable(false))
        .unwrap();
    assert_eq!(wrapper.calls.load(Ordering::SeqCst), 0);
    assert_eq!(view.module_name(), None);
    assert!(view.each().meta().is_none());
}
