//! Output (terminal) nodes: at-most-once activation tracking and the FIFO
//! pending queue drained in priority order (spec.md §4.4).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::fact::FactRef;
use crate::rule::ProducerDescriptor;

/// A terminal node: fires the producer for each distinct input fact exactly
/// once.
pub(crate) struct OutputNode {
    pub(crate) id: usize,
    pub(crate) rule_name: String,
    pub(crate) priority: i32,
    pub(crate) producer: Arc<dyn ProducerDescriptor>,
    fired_for: HashSet<FactRef>,
    pending: VecDeque<FactRef>,
}

impl OutputNode {
    pub(crate) fn new(id: usize, producer: Arc<dyn ProducerDescriptor>) -> Self {
        OutputNode {
            id,
            rule_name: producer.name().to_string(),
            priority: producer.priority(),
            producer,
            fired_for: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Queue `fact` for firing unless this node has already fired (or
    /// already queued) for it.
    pub(crate) fn left_activate(&mut self, fact: FactRef) {
        if self.fired_for.contains(&fact) {
            return;
        }
        self.fired_for.insert(fact.clone());
        self.pending.push_back(fact);
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain pending activations and fire the producer synchronously for
    /// each, pairing the input with its (possibly absent) output fact.
    pub(crate) fn fire_pending_sync(&mut self) -> Vec<(FactRef, Option<FactRef>)> {
        self.pending
            .drain(..)
            .map(|input| {
                let output = self.producer.produce_sync(&input);
                (input, output)
            })
            .collect()
    }

    /// Drain pending activations, discarding the outputs. Used when this
    /// node's rule was guard-skipped: inputs must still be removed from the
    /// queue so the phase can reach fixpoint.
    pub(crate) fn drain_discard(&mut self) {
        self.pending.clear();
    }

    /// Drain pending activations and fire the producer for each, awaiting
    /// async producers and ready-wrapping sync ones.
    pub(crate) async fn fire_pending_async(&mut self) -> Vec<(FactRef, Option<FactRef>)> {
        let inputs: Vec<FactRef> = self.pending.drain(..).collect();
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output = self.producer.produce_async(&input).await;
            results.push((input, output));
        }
        results
    }
}
