use std::sync::Arc;

use mv_cbor::Hash;
use mv_view_types::{
    CallArg, Callback, CallbackFingerprint, Name, ViewArgs, ViewOptions, ViewType,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::ViewError;

/// A validated, normalized view definition.
///
/// Shared behind `Arc`; the registry and every instance point at the same value.
#[derive(Debug)]
pub struct DefView {
    name: Name,
    view_type: ViewType,
    options: ViewOptions,
    module_name: Option<String>,
    each: Callback,
    pre: Option<Callback>,
    post: Option<Callback>,
    view_id: Hash,
}

/// Normalized fields the definition id is computed from.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionFingerprint<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    view_type: ViewType,
    options: &'a ViewOptions,
    module_name: Option<&'a str>,
    each: CallbackFingerprint<'a>,
    pre: Option<CallbackFingerprint<'a>>,
    post: Option<CallbackFingerprint<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceFingerprint<'a> {
    args: &'a Value,
    name: &'a str,
    view_id: &'a Hash,
}

pub(crate) struct DefViewParts {
    pub name: Name,
    pub view_type: ViewType,
    pub options: ViewOptions,
    pub module_name: Option<String>,
    pub each: Callback,
    pub pre: Option<Callback>,
    pub post: Option<Callback>,
}

impl DefView {
    /// Seal the parts and compute the definition id last.
    pub(crate) fn assemble(parts: DefViewParts) -> Result<Self, ViewError> {
        let fingerprint = DefinitionFingerprint {
            name: &parts.name,
            view_type: parts.view_type,
            options: &parts.options,
            module_name: parts.module_name.as_deref(),
            each: parts.each.fingerprint(),
            pre: parts.pre.as_ref().map(Callback::fingerprint),
            post: parts.post.as_ref().map(Callback::fingerprint),
        };
        let view_id = Hash::of_cbor(&fingerprint).map_err(|err| ViewError::Fingerprint {
            name: parts.name.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            name: parts.name,
            view_type: parts.view_type,
            options: parts.options,
            module_name: parts.module_name,
            each: parts.each,
            pre: parts.pre,
            post: parts.post,
            view_id,
        })
    }

    /// Registry key and module name stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection or record.
    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    /// Options after defaults were applied.
    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Set only when callbacks were wrapped.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// The per-record callback, wrapped when `immutable`.
    pub fn each(&self) -> &Callback {
        &self.each
    }

    /// Context factory; never set on record views.
    pub fn pre(&self) -> Option<&Callback> {
        self.pre.as_ref()
    }

    /// Result reducer; never set on record views.
    pub fn post(&self) -> Option<&Callback> {
        self.post.as_ref()
    }

    /// Fingerprint of the normalized, wrapped definition.
    pub fn view_id(&self) -> Hash {
        self.view_id
    }

    /// Whether one context threads through all records in order.
    pub fn is_sequential(&self) -> bool {
        self.options.sequential
    }

    /// Whether callbacks are marked as never suspending.
    pub fn is_synchronous(&self) -> bool {
        self.options.synchronous
    }

    /// Bind typed arguments into a new instance.
    pub fn instance(self: &Arc<Self>, args: ViewArgs) -> Result<ViewInstance, ViewError> {
        ViewInstance::new(Arc::clone(self), args)
    }

    /// Bind a raw call: nothing, one object, or a list of property names.
    pub fn call<I, A>(self: &Arc<Self>, args: I) -> Result<ViewInstance, ViewError>
    where
        I: IntoIterator<Item = A>,
        A: Into<CallArg>,
    {
        let args = ViewArgs::from_call(args.into_iter().map(Into::into).collect())?;
        self.instance(args)
    }
}

/// A definition with bound arguments, ready to be driven over a record sequence.
#[derive(Debug, Clone)]
pub struct ViewInstance {
    definition: Arc<DefView>,
    args: ViewArgs,
    args_value: Value,
    instance_id: Hash,
}

impl ViewInstance {
    fn new(definition: Arc<DefView>, args: ViewArgs) -> Result<Self, ViewError> {
        let args_value = args.to_value();
        let fingerprint = InstanceFingerprint {
            args: &args_value,
            name: definition.name(),
            view_id: &definition.view_id,
        };
        let instance_id = Hash::of_cbor(&fingerprint).map_err(|err| ViewError::Fingerprint {
            name: definition.name.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            definition,
            args,
            args_value,
            instance_id,
        })
    }

    /// The shared definition this instance binds.
    pub fn definition(&self) -> &Arc<DefView> {
        &self.definition
    }

    /// Arguments as bound at call time.
    pub fn args(&self) -> &ViewArgs {
        &self.args
    }

    /// Arguments as the JSON object callbacks receive.
    pub fn args_value(&self) -> &Value {
        &self.args_value
    }

    /// Fingerprint of `{args, name, viewId}`; equal ids are interchangeable for caching.
    pub fn instance_id(&self) -> Hash {
        self.instance_id
    }

    /// Fingerprint of the definition.
    pub fn view_id(&self) -> Hash {
        self.definition.view_id
    }

    /// Name of the definition.
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Type of the definition.
    pub fn view_type(&self) -> ViewType {
        self.definition.view_type
    }

    /// Options of the definition.
    pub fn options(&self) -> &ViewOptions {
        &self.definition.options
    }

    /// The definition's `each` callback.
    pub fn each(&self) -> &Callback {
        &self.definition.each
    }

    /// The definition's `pre` callback, if any.
    pub fn pre(&self) -> Option<&Callback> {
        self.definition.pre.as_ref()
    }

    /// The definition's `post` callback, if any.
    pub fn post(&self) -> Option<&Callback> {
        self.definition.post.as_ref()
    }
}
