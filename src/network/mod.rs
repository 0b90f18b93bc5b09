//! The discrimination network: the compiled alpha/output nodes for one
//! phase, plus the compiler that builds them from a [`Phase`](crate::phase::Phase)'s
//! producers (spec.md §4.2, §4.5).

mod alpha;
mod output;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::fact::FactRef;
use crate::phase::Phase;
use crate::rule::ProducerDescriptor;

use alpha::{AlphaNode, AlphaTemplate};
use output::OutputNode;

/// The immutable, per-engine compiled shape of a phase's network: which
/// producers become alpha/output node pairs, in declaration order. Built
/// once at engine construction (spec.md §3); cheap to `instantiate` fresh
/// per session since only `Arc` clones are taken.
pub(crate) struct NetworkTemplate {
    alpha_templates: Vec<AlphaTemplate>,
}

impl NetworkTemplate {
    pub(crate) fn instantiate(&self) -> Network {
        let mut output_nodes = Vec::with_capacity(self.alpha_templates.len());
        let mut by_type: HashMap<TypeId, Vec<AlphaNode>> = HashMap::new();

        for (id, tmpl) in self.alpha_templates.iter().enumerate() {
            output_nodes.push(OutputNode::new(id, Arc::clone(&tmpl.producer)));
            let alpha = AlphaNode::new(tmpl.input_type, Arc::clone(&tmpl.producer), id);
            by_type.entry(tmpl.input_type).or_default().push(alpha);
        }

        Network {
            alpha_nodes: by_type,
            output_nodes,
        }
    }
}

/// Compile a phase's producers into a network template plus the list of
/// async producers the network cannot execute (spec.md §4.2).
fn compile_phase(phase: &Phase) -> (NetworkTemplate, Vec<Arc<dyn ProducerDescriptor>>) {
    let mut alpha_templates = Vec::new();
    let mut fallback = Vec::new();

    for producer in &phase.producers {
        if producer.is_async() {
            fallback.push(Arc::clone(producer));
        } else {
            alpha_templates.push(AlphaTemplate {
                input_type: producer.input_type(),
                producer: Arc::clone(producer),
            });
        }
    }

    (NetworkTemplate { alpha_templates }, fallback)
}

/// A phase's compiled network template plus whatever async producers fell
/// back out of it, bundled under the phase's name for diagnostics.
pub(crate) struct CompiledPhase {
    pub(crate) name: String,
    template: NetworkTemplate,
    pub(crate) fallback_producers: Vec<Arc<dyn ProducerDescriptor>>,
    output_count: usize,
}

impl CompiledPhase {
    pub(crate) fn compile(phase: &Phase) -> Self {
        let (template, fallback_producers) = compile_phase(phase);
        let output_count = template.alpha_templates.len();
        CompiledPhase {
            name: phase.name.clone(),
            template,
            fallback_producers,
            output_count,
        }
    }

    pub(crate) fn output_count(&self) -> usize {
        self.output_count
    }

    pub(crate) fn instantiate_network(&self) -> Network {
        self.template.instantiate()
    }
}

/// A session's live network state: alpha node memories plus output node
/// `fired_for`/`pending` sets. Disposable — a fresh one is instantiated per
/// session from the engine's [`NetworkTemplate`] rather than reset in place,
/// so no interior mutability or locking is needed (spec.md §5's "clone the
/// network per session" option).
pub(crate) struct Network {
    alpha_nodes: HashMap<TypeId, Vec<AlphaNode>>,
    output_nodes: Vec<OutputNode>,
}

impl Network {
    /// Dispatch `fact` to every alpha node keyed on its exact concrete type.
    /// Returns `true` iff at least one alpha node accepted it.
    pub(crate) fn activate_sync(&mut self, fact: &FactRef) -> bool {
        let mut any = false;
        if let Some(bucket) = self.alpha_nodes.get_mut(&fact.type_id()) {
            for alpha in bucket.iter_mut() {
                if alpha.try_activate_sync(fact) {
                    any = true;
                    self.output_nodes[alpha.output_index].left_activate(fact.clone());
                }
            }
        }
        any
    }

    /// Same as [`Network::activate_sync`] but awaits each candidate
    /// producer's async condition.
    pub(crate) async fn activate_async(&mut self, fact: &FactRef) -> bool {
        let type_id = fact.type_id();
        let candidates: Vec<usize> = match self.alpha_nodes.get(&type_id) {
            Some(bucket) => bucket
                .iter()
                .enumerate()
                .filter(|(_, a)| a.precheck(fact))
                .map(|(i, _)| i)
                .collect(),
            None => return false,
        };

        let mut any = false;
        for idx in candidates {
            let producer = Arc::clone(&self.alpha_nodes.get(&type_id).unwrap()[idx].producer);
            if producer.matches_async(fact).await {
                let bucket = self.alpha_nodes.get_mut(&type_id).unwrap();
                bucket[idx].commit(fact);
                let output_index = bucket[idx].output_index;
                self.output_nodes[output_index].left_activate(fact.clone());
                any = true;
            }
        }
        any
    }

    pub(crate) fn has_pending_activations(&self) -> bool {
        self.output_nodes.iter().any(OutputNode::has_pending)
    }

    pub(crate) fn output_node_rule_name(&self, id: usize) -> &str {
        &self.output_nodes[id].rule_name
    }

    pub(crate) fn output_node_priority(&self, id: usize) -> i32 {
        self.output_nodes[id].priority
    }

    /// The producer descriptor backing an output node, used by the session
    /// driver to check its guard without a name-based lookup back into the
    /// phase.
    pub(crate) fn output_node_producer(&self, id: usize) -> &Arc<dyn ProducerDescriptor> {
        &self.output_nodes[id].producer
    }

    /// Select the highest-priority output node with pending activations
    /// that is not in `excluded`, breaking ties by declaration order
    /// (lowest id), per spec.md §4.6.
    pub(crate) fn select_eligible(&self, excluded: &std::collections::HashSet<usize>) -> Option<usize> {
        self.output_nodes
            .iter()
            .filter(|node| node.has_pending() && !excluded.contains(&node.id))
            .max_by_key(|node| (node.priority, std::cmp::Reverse(node.id)))
            .map(|node| node.id)
    }

    /// All output node ids that currently have pending activations,
    /// regardless of eligibility — used to drain-and-discard skipped
    /// nodes' activations so the phase can still reach fixpoint.
    pub(crate) fn pending_node_ids(&self) -> Vec<usize> {
        self.output_nodes.iter().filter(|n| n.has_pending()).map(|n| n.id).collect()
    }

    pub(crate) fn drain_discard(&mut self, id: usize) {
        self.output_nodes[id].drain_discard();
    }

    pub(crate) fn fire_pending_sync(&mut self, id: usize) -> Vec<(FactRef, Option<FactRef>)> {
        self.output_nodes[id].fire_pending_sync()
    }

    pub(crate) async fn fire_pending_async(&mut self, id: usize) -> Vec<(FactRef, Option<FactRef>)> {
        self.output_nodes[id].fire_pending_async().await
    }
}
