//! View data model: definition options, role-tagged callbacks, instance arguments and
//! construction-time validation.

mod args;
mod callback;
mod model;
pub mod validate;

pub use args::{ArgsError, CallArg, ViewArgs, property_names};
pub use callback::{
    Callback, CallbackError, CallbackFingerprint, CallbackFn, CallbackRole, EachFn, PostFn,
    PostInput, PreFn, Step,
};
pub use model::*;
pub use validate::{ValidationError, validate_config};
