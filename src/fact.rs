//! Type-erased, hashable facts.
//!
//! Working memory stores heterogeneously-typed facts in one collection. A
//! [`Fact`] is any value with structural equality and hashing; [`FactRef`] is
//! the type-erased handle working memory actually stores, generalizing
//! `rust-rule-engine`'s string-tagged `WorkingMemoryFact` (`rete/working_memory.rs`)
//! to a `TypeId`-keyed equivalent.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value that can live in working memory: hashable, equatable, and
/// cloneable behind type erasure.
///
/// Implement this directly only for exotic cases; the blanket impl below
/// covers every `Clone + Eq + Hash + Debug + Send + Sync + 'static` type.
pub trait Fact: Any + fmt::Debug + Send + Sync {
    /// Upcast to `&dyn Any` for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another type-erased fact.
    fn dyn_eq(&self, other: &dyn Fact) -> bool;

    /// Feed this fact's discriminating content into a type-erased hasher.
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Clone this fact into a fresh type-erased box.
    fn dyn_clone(&self) -> Box<dyn Fact>;
}

impl<T> Fact for T
where
    T: Any + Eq + Hash + fmt::Debug + Clone + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Fact) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|o| self == o)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn dyn_clone(&self) -> Box<dyn Fact> {
        Box::new(self.clone())
    }
}

/// A reference-counted, type-erased handle to a fact living in working
/// memory. Cheap to clone; equality and hashing delegate to the wrapped
/// fact's concrete `Eq`/`Hash` impl so de-duplication works across types.
#[derive(Clone)]
pub struct FactRef(Arc<dyn Fact>);

impl FactRef {
    /// Wrap a concrete fact as a type-erased handle.
    pub fn new<T>(fact: T) -> Self
    where
        T: Fact,
    {
        FactRef(Arc::new(fact))
    }

    /// The `TypeId` of the concrete fact this handle wraps.
    pub fn type_id(&self) -> TypeId {
        (*self.0).as_any().type_id()
    }

    /// Downcast to the concrete fact type, if it matches.
    pub fn downcast_ref<T: Fact>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Clone the concrete value out, if the requested type matches.
    pub fn downcast<T: Fact>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for FactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for FactRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for FactRef {}

impl Hash for FactRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct Customer {
        id: String,
        spend: u32,
    }

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct Order(u32);

    #[test]
    fn equal_facts_of_same_type_compare_equal() {
        let a = FactRef::new(Customer { id: "1".into(), spend: 10 });
        let b = FactRef::new(Customer { id: "1".into(), spend: 10 });
        assert_eq!(a, b);
    }

    #[test]
    fn facts_of_different_types_never_compare_equal() {
        let a = FactRef::new(Customer { id: "1".into(), spend: 10 });
        let b = FactRef::new(Order(1));
        assert_ne!(a, b);
    }

    #[test]
    fn downcast_ref_fails_for_mismatched_type() {
        let a = FactRef::new(Customer { id: "1".into(), spend: 10 });
        assert!(a.downcast_ref::<Order>().is_none());
        assert!(a.downcast_ref::<Customer>().is_some());
    }

    #[test]
    fn hash_is_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(FactRef::new(Customer { id: "1".into(), spend: 10 }));
        assert!(!set.insert(FactRef::new(Customer { id: "1".into(), spend: 10 })));
        assert_eq!(set.len(), 1);
    }
}
