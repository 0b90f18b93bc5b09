//! Typed, immutable evaluation context.
//!
//! `RuleContext` is a heterogeneous key-value map: keys carry a phantom type
//! so `get::<T>(key)` returns `Option<T>` without any caller-side downcast.
//! Guards are the only readers of context (spec.md §3/§6.5).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A typed key into a [`RuleContext`]. Two keys with the same `name` are
/// considered the same slot; the phantom `T` pins the value type at the
/// type-checker level.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Declare a new context key with a stable name.
    pub const fn new(name: &'static str) -> Self {
        ContextKey {
            name,
            _marker: std::marker::PhantomData,
        }
    }

    /// The key's name, used as the map slot.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Manual impls: `#[derive(Clone, Copy)]` would require `T: Clone`/`T: Copy`,
// but the phantom marker never actually stores a `T`.
impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ContextKey<T> {}

/// An immutable, typed key-value map available to guards.
#[derive(Clone, Default)]
pub struct RuleContext {
    values: Arc<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for RuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuleContext {
    /// The empty context: no keys set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a context with one or more entries.
    pub fn builder() -> RuleContextBuilder {
        RuleContextBuilder {
            values: HashMap::new(),
        }
    }

    /// Look up a key, returning a clone of the stored value if present and
    /// of the expected type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: ContextKey<T>) -> Option<T> {
        self.values
            .get(key.name())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Whether a key has a value set, regardless of type match.
    pub fn contains<T>(&self, key: ContextKey<T>) -> bool {
        self.values.contains_key(key.name())
    }

    /// Look up a key, falling back to `default` when absent.
    pub fn get_or_default<T: Clone + Send + Sync + 'static>(
        &self,
        key: ContextKey<T>,
        default: T,
    ) -> T {
        self.get(key).unwrap_or(default)
    }
}

/// Builder for [`RuleContext`].
pub struct RuleContextBuilder {
    values: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl RuleContextBuilder {
    /// Set a key's value, overwriting any prior value for the same key.
    pub fn set<T: Send + Sync + 'static>(mut self, key: ContextKey<T>, value: T) -> Self {
        self.values.insert(key.name(), Arc::new(value));
        self
    }

    /// Finish building.
    pub fn build(self) -> RuleContext {
        RuleContext {
            values: Arc::new(self.values),
        }
    }
}
