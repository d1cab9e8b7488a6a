use std::sync::Arc;

use mv_view_types::{Callback, ValidationError, ViewConfig, validate_config};

use crate::error::ViewError;
use crate::registry::ViewRegistry;
use crate::view::{DefView, DefViewParts};
use crate::wrap::{CallbackWrapper, WrapOptions, module_name, qualified_name};

/// Validate, normalize, wrap and fingerprint a config, registering it when asked.
///
/// Nothing is registered and no wrapper is invoked unless every check passes.
pub(crate) fn define_view(
    registry: &ViewRegistry,
    wrapper: &dyn CallbackWrapper,
    config: ViewConfig,
) -> Result<Arc<DefView>, ViewError> {
    let view_type = validate_config(&config)?;
    let options = config.settings.resolve(view_type);
    let ViewConfig {
        name,
        each,
        pre,
        post,
        ..
    } = config;
    let each = each.ok_or(ValidationError::MissingEach)?;

    if options.register {
        registry.ensure_available(&name, options.allow_override)?;
    }

    let (each, pre, post, module) = if options.immutable {
        let module = module_name(&name);
        let wrap_options = WrapOptions {
            allow_override: options.allow_override,
            synchronous: options.synchronous,
        };
        let wrap = |cb: Callback| wrap_one(wrapper, &name, &module, cb, &wrap_options);
        let each = wrap(each)?;
        let post = post.map(wrap).transpose()?;
        let pre = pre.map(wrap).transpose()?;
        (each, pre, post, Some(module))
    } else {
        (each, pre, post, None)
    };

    let parts = DefViewParts {
        name,
        view_type,
        options,
        module_name: module,
        each,
        pre,
        post,
    };
    let view = Arc::new(DefView::assemble(parts)?);
    if view.options().register {
        registry.register(Arc::clone(&view))?;
    }
    log::debug!(
        "defined model view {} ({}) as {}",
        view.name(),
        view.view_type(),
        view.view_id()
    );
    Ok(view)
}

fn wrap_one(
    wrapper: &dyn CallbackWrapper,
    view_name: &str,
    module: &str,
    callback: Callback,
    options: &WrapOptions,
) -> Result<Callback, ViewError> {
    let role = callback.role();
    let qualified = qualified_name(module, role, options.synchronous);
    let wrapped = wrapper
        .wrap(&qualified, callback, options)
        .map_err(|err| ViewError::Wrap {
            name: view_name.to_string(),
            callback: qualified.clone(),
            reason: err.0,
        })?;
    if wrapped.role() != role {
        return Err(ViewError::Wrap {
            name: view_name.to_string(),
            callback: qualified,
            reason: format!("wrapper turned a {role} callback into a {}", wrapped.role()),
        });
    }
    Ok(wrapped)
}
