use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub type PreFn = dyn Fn(&Value) -> Result<Value, CallbackError> + Send + Sync;
pub type EachFn = dyn Fn(&mut Step<'_>) -> Result<(), CallbackError> + Send + Sync;
pub type PostFn = dyn Fn(&Value, PostInput) -> Result<Value, CallbackError> + Send + Sync;

/// Which slot of a view a callback is shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackRole {
    Pre,
    Each,
    Post,
}

impl CallbackRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            CallbackRole::Pre => "pre",
            CallbackRole::Each => "each",
            CallbackRole::Post => "post",
        }
    }
}

impl fmt::Display for CallbackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub enum CallbackFn {
    Pre(Arc<PreFn>),
    Each(Arc<EachFn>),
    Post(Arc<PostFn>),
}

impl CallbackFn {
    pub fn role(&self) -> CallbackRole {
        match self {
            CallbackFn::Pre(_) => CallbackRole::Pre,
            CallbackFn::Each(_) => CallbackRole::Each,
            CallbackFn::Post(_) => CallbackRole::Post,
        }
    }
}

/// One invocation of `each`.
///
/// Collection views see the shared context of their run (or partition); record views
/// mutate `record` and get a fresh empty-object context per run.
pub struct Step<'a> {
    pub args: &'a Value,
    pub record: &'a mut Value,
    pub index: usize,
    pub context: &'a mut Value,
}

impl<'a> Step<'a> {
    /// Names passed positionally when the instance was created.
    pub fn properties(&self) -> Vec<&'a str> {
        crate::property_names(self.args)
    }
}

/// What `post` receives: the single context of a sequential run, or the partial
/// contexts of every successful partition in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum PostInput {
    Context(Value),
    Partials(Vec<Value>),
}

impl PostInput {
    pub fn into_contexts(self) -> Vec<Value> {
        match self {
            PostInput::Context(ctx) => vec![ctx],
            PostInput::Partials(partials) => partials,
        }
    }
}

/// Failure raised by user code inside `pre`, `each` or `post`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Identity-bearing projection of a callback: its source text and attached metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackFingerprint<'a> {
    pub function: &'a str,
    pub meta: Option<&'a Value>,
}

/// A role-tagged view callback with the source text it was written as.
///
/// Build these with [`pre_fn!`](crate::pre_fn), [`each_fn!`](crate::each_fn) and
/// [`post_fn!`](crate::post_fn) so the source is captured from the closure itself.
#[derive(Clone)]
pub struct Callback {
    func: CallbackFn,
    source: String,
    meta: Option<Value>,
}

impl Callback {
    pub fn pre<F>(source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        Self::from_fn(source, CallbackFn::Pre(Arc::new(f)))
    }

    pub fn each<F>(source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Step<'_>) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self::from_fn(source, CallbackFn::Each(Arc::new(f)))
    }

    pub fn post<F>(source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, PostInput) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        Self::from_fn(source, CallbackFn::Post(Arc::new(f)))
    }

    pub fn from_fn(source: impl Into<String>, func: CallbackFn) -> Self {
        Self {
            func,
            source: source.into(),
            meta: None,
        }
    }

    pub fn role(&self) -> CallbackRole {
        self.func.role()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn func(&self) -> &CallbackFn {
        &self.func
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Replace the callable while keeping source text and metadata.
    pub fn with_fn(mut self, func: CallbackFn) -> Self {
        self.func = func;
        self
    }

    pub fn fingerprint(&self) -> CallbackFingerprint<'_> {
        CallbackFingerprint {
            function: &self.source,
            meta: self.meta.as_ref(),
        }
    }

    pub fn call_pre(&self, args: &Value) -> Result<Value, CallbackError> {
        match &self.func {
            CallbackFn::Pre(f) => f(args),
            other => Err(role_mismatch(CallbackRole::Pre, other.role())),
        }
    }

    pub fn call_each(&self, step: &mut Step<'_>) -> Result<(), CallbackError> {
        match &self.func {
            CallbackFn::Each(f) => f(step),
            other => Err(role_mismatch(CallbackRole::Each, other.role())),
        }
    }

    pub fn call_post(&self, args: &Value, input: PostInput) -> Result<Value, CallbackError> {
        match &self.func {
            CallbackFn::Post(f) => f(args, input),
            other => Err(role_mismatch(CallbackRole::Post, other.role())),
        }
    }
}

fn role_mismatch(expected: CallbackRole, found: CallbackRole) -> CallbackError {
    CallbackError::new(format!(
        "called as {expected} but callback is a {found} function"
    ))
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("role", &self.role())
            .field("source", &self.source)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Build a `pre` callback, capturing the closure's source text.
#[macro_export]
macro_rules! pre_fn {
    ($($closure:tt)+) => {
        $crate::Callback::pre(stringify!($($closure)+), $($closure)+)
    };
}

/// Build an `each` callback, capturing the closure's source text.
#[macro_export]
macro_rules! each_fn {
    ($($closure:tt)+) => {
        $crate::Callback::each(stringify!($($closure)+), $($closure)+)
    };
}

/// Build a `post` callback, capturing the closure's source text.
#[macro_export]
macro_rules! post_fn {
    ($($closure:tt)+) => {
        $crate::Callback::post(stringify!($($closure)+), $($closure)+)
    };
}
