//! Name -> definition table for globally discoverable views.
//!
//! The registry is an ordinary value owned by the application's composition root
//! and handed to whoever needs lookup. `reset` returns it to its boot state.
//!
//! ```rust,ignore
//! let registry = ViewRegistry::new();
//! let sum = registry.define(
//!     ViewConfig::collection("sum").each(each_fn!(|step| { /* ... */ Ok(()) })),
//! )?;
//! assert!(registry.has("sum"));
//! let instance = registry.get("sum")?.call(["price"])?;
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use mv_view_types::{Name, ViewConfig};
use parking_lot::RwLock;

use crate::define::define_view;
use crate::error::ViewError;
use crate::view::DefView;
use crate::wrap::{CallbackWrapper, ImmutableWrapper};

pub struct ViewRegistry {
    views: RwLock<IndexMap<Name, Arc<DefView>>>,
    wrapper: Arc<dyn CallbackWrapper>,
}

impl ViewRegistry {
    /// Empty registry wrapping `immutable` views with [`ImmutableWrapper`].
    pub fn new() -> Self {
        Self::with_wrapper(Arc::new(ImmutableWrapper))
    }

    pub fn with_wrapper(wrapper: Arc<dyn CallbackWrapper>) -> Self {
        Self {
            views: RwLock::new(IndexMap::new()),
            wrapper,
        }
    }

    /// Construct a definition from `config`, registering it unless `register` is false.
    pub fn define(&self, config: ViewConfig) -> Result<Arc<DefView>, ViewError> {
        define_view(self, self.wrapper.as_ref(), config)
    }

    /// Insert or replace `view` under its name.
    ///
    /// A collision is only allowed when the incoming or the existing definition permits
    /// override. The check and the write happen under one lock, so a failed call leaves
    /// the previous entry untouched. Returns the replaced definition, if any.
    pub fn register(&self, view: Arc<DefView>) -> Result<Option<Arc<DefView>>, ViewError> {
        let mut views = self.views.write();
        if let Some(existing) = views.get(view.name()) {
            if !may_replace(existing, view.options().allow_override) {
                return Err(ViewError::AlreadyDefined {
                    name: view.name().to_string(),
                });
            }
            log::debug!(
                "replacing model view {} ({} -> {})",
                view.name(),
                existing.view_id().short(),
                view.view_id().short()
            );
        }
        Ok(views.insert(view.name().to_string(), view))
    }

    /// Fail early, before any wrapping side effects, if `name` cannot be registered.
    pub(crate) fn ensure_available(&self, name: &str, allow_override: bool) -> Result<(), ViewError> {
        match self.views.read().get(name) {
            Some(existing) if !may_replace(existing, allow_override) => {
                Err(ViewError::AlreadyDefined {
                    name: name.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<DefView>, ViewError> {
        self.views
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ViewError::NotFound(name.to_string()))
    }

    /// Snapshot of every registered definition in registration order.
    pub fn get_all(&self) -> IndexMap<Name, Arc<DefView>> {
        self.views.read().clone()
    }

    pub fn has(&self, name: &str) -> bool {
        self.views.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<Name> {
        self.views.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.views.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.read().is_empty()
    }

    /// Drop every registered definition.
    pub fn reset(&self) {
        self.views.write().clear();
    }
}

fn may_replace(existing: &DefView, incoming_allows_override: bool) -> bool {
    incoming_allows_override || existing.options().allow_override
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("view_count", &self.len())
            .field("names", &self.names())
            .finish()
    }
}
