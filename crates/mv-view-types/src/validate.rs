use thiserror::Error;

use crate::{Callback, CallbackRole, ViewConfig, ViewType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name required")]
    MissingName,
    #[error("invalid type {0}")]
    InvalidType(String),
    #[error("pre and post functions not allowed with record views")]
    PrePostOnRecordView,
    #[error("each function required")]
    MissingEach,
    #[error("{slot} must be a {slot} function, got a {found} function")]
    CallbackRole {
        slot: CallbackRole,
        found: CallbackRole,
    },
}

/// Check a raw config in order, stopping at the first failure.
///
/// Returns the parsed view type so callers do not parse it twice.
pub fn validate_config(config: &ViewConfig) -> Result<ViewType, ValidationError> {
    if config.name.is_empty() {
        return Err(ValidationError::MissingName);
    }
    let view_type: ViewType = config.kind.parse()?;
    if view_type == ViewType::Record && (config.pre.is_some() || config.post.is_some()) {
        return Err(ValidationError::PrePostOnRecordView);
    }
    let each = config.each.as_ref().ok_or(ValidationError::MissingEach)?;
    ensure_role(each, CallbackRole::Each)?;
    if let Some(post) = &config.post {
        ensure_role(post, CallbackRole::Post)?;
    }
    if let Some(pre) = &config.pre {
        ensure_role(pre, CallbackRole::Pre)?;
    }
    Ok(view_type)
}

fn ensure_role(callback: &Callback, slot: CallbackRole) -> Result<(), ValidationError> {
    let found = callback.role();
    if found != slot {
        return Err(ValidationError::CallbackRole { slot, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{each_fn, post_fn, pre_fn};
    use serde_json::json;

    fn sample_config() -> ViewConfig {
        ViewConfig::collection("sum")
            .pre(pre_fn!(|_args| Ok(json!({"sum": 0}))))
            .each(each_fn!(|_step| Ok(())))
            .post(post_fn!(|_args, input| Ok(json!(input.into_contexts().len()))))
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(validate_config(&sample_config()), Ok(ViewType::Collection));
    }

    #[test]
    fn empty_name_fails() {
        let mut config = sample_config();
        config.name.clear();
        assert_eq!(validate_config(&config), Err(ValidationError::MissingName));
    }

    #[test]
    fn name_is_checked_before_type() {
        let config = ViewConfig::new("", "bogus");
        assert_eq!(validate_config(&config), Err(ValidationError::MissingName));
    }

    #[test]
    fn invalid_type_fails() {
        let mut config = sample_config();
        config.kind = "table".into();
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::InvalidType("table".into()))
        );
    }

    #[test]
    fn record_view_rejects_pre_and_post() {
        let with_pre = ViewConfig::record("tag")
            .each(each_fn!(|_step| Ok(())))
            .pre(pre_fn!(|_args| Ok(json!({}))));
        assert_eq!(
            validate_config(&with_pre),
            Err(ValidationError::PrePostOnRecordView)
        );

        let with_post = ViewConfig::record("tag")
            .each(each_fn!(|_step| Ok(())))
            .post(post_fn!(|_args, _input| Ok(json!(null))));
        assert_eq!(
            validate_config(&with_post),
            Err(ValidationError::PrePostOnRecordView)
        );
    }

    #[test]
    fn record_check_precedes_missing_each() {
        let config = ViewConfig::record("tag").post(post_fn!(|_args, _input| Ok(json!(null))));
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::PrePostOnRecordView)
        );
    }

    #[test]
    fn missing_each_fails() {
        let mut config = sample_config();
        config.each = None;
        assert_eq!(validate_config(&config), Err(ValidationError::MissingEach));
    }

    #[test]
    fn misplaced_callbacks_fail() {
        let mut config = sample_config();
        config.each = Some(pre_fn!(|_args| Ok(json!({}))));
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::CallbackRole {
                slot: CallbackRole::Each,
                found: CallbackRole::Pre,
            })
        );

        let mut config = sample_config();
        config.post = Some(each_fn!(|_step| Ok(())));
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::CallbackRole { slot: CallbackRole::Post, .. })
        ));

        let mut config = sample_config();
        config.pre = Some(each_fn!(|_step| Ok(())));
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::CallbackRole { slot: CallbackRole::Pre, .. })
        ));
    }
}
