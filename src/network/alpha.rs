//! Alpha nodes: per-producer type filter, condition test, and per-fact
//! de-duplication memory (spec.md §4.3).

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use crate::fact::FactRef;
use crate::rule::ProducerDescriptor;

/// Compile-time (per-engine) description of an alpha node: which producer
/// it tests, keyed by that producer's declared input type. Shared,
/// immutable, and cheap to clone across sessions.
pub(crate) struct AlphaTemplate {
    pub(crate) input_type: TypeId,
    pub(crate) producer: Arc<dyn ProducerDescriptor>,
}

/// A live alpha node: the template plus this session's de-duplication
/// memory. One alpha node exists per non-async producer (spec.md §4.2 does
/// not materialize shared alpha nodes across producers of the same type).
pub(crate) struct AlphaNode {
    pub(crate) input_type: TypeId,
    pub(crate) producer: Arc<dyn ProducerDescriptor>,
    /// Index into the network's `output_nodes`, this alpha node's sole
    /// successor.
    pub(crate) output_index: usize,
    memory: HashSet<FactRef>,
}

impl AlphaNode {
    pub(crate) fn new(input_type: TypeId, producer: Arc<dyn ProducerDescriptor>, output_index: usize) -> Self {
        AlphaNode {
            input_type,
            producer,
            output_index,
            memory: HashSet::new(),
        }
    }

    /// Whether `fact` is worth testing: right concrete type, not already
    /// remembered. Does not evaluate the condition or mutate memory.
    pub(crate) fn precheck(&self, fact: &FactRef) -> bool {
        fact.type_id() == self.input_type && !self.memory.contains(fact)
    }

    /// Record that `fact` passed its condition test, so it is never
    /// re-tested by this node.
    pub(crate) fn commit(&mut self, fact: &FactRef) {
        self.memory.insert(fact.clone());
    }

    /// Test-and-commit in one step for the fully synchronous path.
    pub(crate) fn try_activate_sync(&mut self, fact: &FactRef) -> bool {
        if !self.precheck(fact) {
            return false;
        }
        if !self.producer.matches_sync(fact) {
            return false;
        }
        self.commit(fact);
        true
    }
}
