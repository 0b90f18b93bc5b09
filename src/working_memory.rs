//! Type-indexed working memory.
//!
//! Generalizes `rust-rule-engine`'s `rete::working_memory::WorkingMemory`
//! (string-tagged `type_index: HashMap<String, HashSet<FactHandle>>`,
//! `rete/working_memory.rs`) to a `TypeId`-keyed store over type-erased
//! facts, giving O(1) exact-type lookup per spec.md §4.1.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use crate::fact::{Fact, FactRef};

/// The set of all facts known at a point in an evaluation, indexed by
/// concrete fact type for O(1) exact-type queries.
#[derive(Default)]
pub struct WorkingMemory {
    all_facts: HashSet<FactRef>,
    type_index: HashMap<TypeId, Vec<FactRef>>,
}

impl WorkingMemory {
    /// An empty working memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact. Returns `true` iff it was not already present.
    pub fn add(&mut self, fact: FactRef) -> bool {
        if !self.all_facts.insert(fact.clone()) {
            return false;
        }
        self.type_index.entry(fact.type_id()).or_default().push(fact);
        true
    }

    /// Whether a fact is already present.
    pub fn contains(&self, fact: &FactRef) -> bool {
        self.all_facts.contains(fact)
    }

    /// All facts currently known.
    pub fn all(&self) -> &HashSet<FactRef> {
        &self.all_facts
    }

    /// Number of facts currently known.
    pub fn size(&self) -> usize {
        self.all_facts.len()
    }

    /// Facts of the exact concrete type `T`, downcast and deduplicated.
    pub fn of_type<T: Fact>(&self) -> std::collections::HashSet<T> {
        self.type_index
            .get(&TypeId::of::<T>())
            .into_iter()
            .flatten()
            .filter_map(|f| f.downcast::<T>())
            .collect()
    }

    /// Facts of the exact concrete type `T`, in insertion order.
    pub fn filter_by_instance<T: Fact>(&self) -> Vec<T> {
        self.type_index
            .get(&TypeId::of::<T>())
            .into_iter()
            .flatten()
            .filter_map(|f| f.downcast::<T>())
            .collect()
    }

    /// The type-erased bucket for a given `TypeId`, used by the network to
    /// push initial/derived facts through alpha nodes.
    pub(crate) fn bucket(&self, type_id: TypeId) -> &[FactRef] {
        self.type_index.get(&type_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
