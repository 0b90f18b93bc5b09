//! Structured events emitted synchronously during an evaluation, and the
//! collector interface used to observe them (spec.md §6.4).

use std::sync::Arc;

use crate::fact::FactRef;
use crate::result::EngineResult;
use crate::verdict::Failure;

/// One entry in a trace: a rule firing that produced at least one new fact.
#[derive(Debug, Clone)]
pub struct RuleActivation {
    /// The firing rule's name.
    pub rule_name: String,
    /// The fact that triggered this activation.
    pub input_fact: FactRef,
    /// The facts this activation added to working memory.
    pub output_facts: Vec<FactRef>,
    /// The firing rule's priority at the time it fired.
    pub priority: i32,
}

/// A structured event emitted during evaluation. `Completed` is always last
/// and emitted exactly once per successful evaluation.
#[derive(Debug, Clone)]
pub enum Event {
    /// A fact was added to working memory; `is_derived` distinguishes
    /// caller-supplied initial facts from rule-produced ones.
    FactInserted { fact: FactRef, is_derived: bool },
    /// A producer fired, yielding the listed output facts (possibly empty,
    /// if the output function declined to produce one).
    RuleFired {
        rule_name: String,
        input_fact: FactRef,
        output_facts: Vec<FactRef>,
        priority: i32,
    },
    /// A rule's guard blocked it for the whole evaluation.
    RuleSkipped { rule_name: String, guard_description: String },
    /// A validator's condition held for `fact`.
    ValidationPassed { rule_name: String, fact: FactRef },
    /// A validator's condition failed for `fact`.
    ValidationFailed { rule_name: String, fact: FactRef, failure: Failure },
    /// The terminal event of a successful evaluation.
    Completed { result: Arc<EngineResult> },
}

/// Receiver for evaluation events. Implementors typically hold interior
/// mutability (a `Mutex<Vec<Event>>`, an atomic counter) since `on_event`
/// takes `&self` so a [`CompositeCollector`] can fan out without exclusive
/// access to each sub-collector.
pub trait EventCollector: Send + Sync {
    /// Observe one event. Called synchronously, in emission order.
    fn on_event(&self, event: &Event);
}

/// A collector that fans out to an ordered list of sub-collectors.
#[derive(Clone)]
pub struct CompositeCollector {
    collectors: Vec<Arc<dyn EventCollector>>,
}

impl CompositeCollector {
    /// Build a composite from an ordered list of sub-collectors.
    pub fn new(collectors: Vec<Arc<dyn EventCollector>>) -> Self {
        CompositeCollector { collectors }
    }
}

impl EventCollector for CompositeCollector {
    fn on_event(&self, event: &Event) {
        for collector in &self.collectors {
            collector.on_event(event);
        }
    }
}

/// A collector that records every event it observes, for tests and
/// debugging.
#[derive(Default)]
pub struct RecordingCollector {
    events: std::sync::Mutex<Vec<Event>>,
}

impl RecordingCollector {
    /// A fresh, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every event observed so far, in emission order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("recording collector mutex poisoned").clone()
    }
}

impl EventCollector for RecordingCollector {
    fn on_event(&self, event: &Event) {
        self.events.lock().expect("recording collector mutex poisoned").push(event.clone());
    }
}
