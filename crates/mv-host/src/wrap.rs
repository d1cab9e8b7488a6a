use std::sync::Arc;

use mv_kernel::wrap::wrap_meta;
use mv_kernel::{CallbackWrapper, WrapError, WrapOptions};
use mv_view_types::{Callback, CallbackFn, PostInput, Step};
use serde_json::Value;

/// Marks callbacks immutable like [`mv_kernel::ImmutableWrapper`] and runs every
/// invocation inside a span named after the callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWrapper;

impl CallbackWrapper for TracingWrapper {
    fn wrap(
        &self,
        qualified_name: &str,
        callback: Callback,
        options: &WrapOptions,
    ) -> Result<Callback, WrapError> {
        let name: Arc<str> = Arc::from(qualified_name);
        let traced = match callback.func().clone() {
            CallbackFn::Pre(f) => CallbackFn::Pre(Arc::new(move |args: &Value| {
                let _span = tracing::debug_span!("view.pre", callback = %name).entered();
                f(args).inspect_err(|err| tracing::warn!(error = %err, "pre failed"))
            })),
            CallbackFn::Each(f) => CallbackFn::Each(Arc::new(move |step: &mut Step<'_>| {
                let _span =
                    tracing::trace_span!("view.each", callback = %name, index = step.index)
                        .entered();
                f(step).inspect_err(|err| tracing::warn!(error = %err, "each failed"))
            })),
            CallbackFn::Post(f) => CallbackFn::Post(Arc::new(move |args: &Value, input: PostInput| {
                let _span = tracing::debug_span!("view.post", callback = %name).entered();
                f(args, input).inspect_err(|err| tracing::warn!(error = %err, "post failed"))
            })),
        };
        Ok(callback
            .with_fn(traced)
            .with_meta(wrap_meta(qualified_name, options)))
    }
}
