//! Callback decoration applied to `immutable` views before they are fingerprinted.

use mv_view_types::{Callback, CallbackRole};
use serde_json::json;
use thiserror::Error;

/// Options forwarded to the decoration collaborator alongside each callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapOptions {
    pub allow_override: bool,
    pub synchronous: bool,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct WrapError(pub String);

/// Decorates view callbacks.
///
/// Implementations must keep the callback's role and calling contract. Whatever
/// metadata they attach becomes part of the definition id.
pub trait CallbackWrapper: Send + Sync {
    fn wrap(
        &self,
        qualified_name: &str,
        callback: Callback,
        options: &WrapOptions,
    ) -> Result<Callback, WrapError>;
}

/// Module name a view's wrapped callbacks are grouped under.
pub fn module_name(view_name: &str) -> String {
    format!("{view_name}ModelView")
}

/// Synchronous views wrap as plain functions (`sumModelViewEach`); asynchronous views
/// wrap as methods of the view module (`sumModelView.each`).
pub fn qualified_name(module: &str, role: CallbackRole, synchronous: bool) -> String {
    if synchronous {
        let suffix = match role {
            CallbackRole::Pre => "Pre",
            CallbackRole::Each => "Each",
            CallbackRole::Post => "Post",
        };
        format!("{module}{suffix}")
    } else {
        format!("{module}.{role}")
    }
}

/// Metadata stamped on a wrapped callback.
pub fn wrap_meta(qualified_name: &str, options: &WrapOptions) -> serde_json::Value {
    json!({
        "name": qualified_name,
        "immutable": true,
        "kind": if options.synchronous { "function" } else { "method" },
    })
}

/// Default decorator: marks callbacks as immutable and names them, leaving the
/// callable itself untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmutableWrapper;

impl CallbackWrapper for ImmutableWrapper {
    fn wrap(
        &self,
        qualified_name: &str,
        callback: Callback,
        options: &WrapOptions,
    ) -> Result<Callback, WrapError> {
        Ok(callback.with_meta(wrap_meta(qualified_name, options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mv_view_types::each_fn;

    #[test]
    fn qualified_names_follow_sync_mode() {
        let module = module_name("sum");
        assert_eq!(module, "sumModelView");
        assert_eq!(
            qualified_name(&module, CallbackRole::Each, true),
            "sumModelViewEach"
        );
        assert_eq!(
            qualified_name(&module, CallbackRole::Post, false),
            "sumModelView.post"
        );
    }

    #[test]
    fn immutable_wrapper_keeps_source_and_role() {
        let each = each_fn!(|_step| Ok(()));
        let options = WrapOptions {
            allow_override: false,
            synchronous: true,
        };
        let wrapped = ImmutableWrapper
            .wrap("sumModelViewEach", each.clone(), &options)
            .unwrap();
        assert_eq!(wrapped.source(), each.source());
        assert_eq!(wrapped.role(), CallbackRole::Each);
        assert_eq!(
            wrapped.meta(),
            Some(&json!({"name": "sumModelViewEach", "immutable": true, "kind": "function"}))
        );
    }
}
