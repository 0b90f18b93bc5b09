//! The immutable outcome of one evaluation (spec.md §6.3).

use std::collections::{HashMap, HashSet};

use crate::events::RuleActivation;
use crate::fact::{Fact, FactRef};
use crate::verdict::{Failure, Verdict};

/// The outcome of one `Engine::evaluate`/`evaluate_async` call.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub(crate) facts: HashSet<FactRef>,
    pub(crate) derived: HashSet<FactRef>,
    /// Pass, or Fail with the ordered list of validator failures.
    pub verdict: Verdict,
    /// Rule name to guard description, for every rule a guard blocked.
    pub skipped: HashMap<String, String>,
    /// Total number of successful rule firings across all phases.
    pub rule_activations: u32,
    /// Total number of driver iterations across all phases and the
    /// fallback-producer loop.
    pub iterations: u32,
    /// Ordered activation trace; empty unless the engine was built with
    /// `enable_tracing`.
    pub trace: Vec<RuleActivation>,
    /// Soft diagnostics accumulated during the evaluation (e.g. the
    /// runaway-execution heuristic).
    pub warnings: Vec<String>,
}

impl EngineResult {
    /// All facts known at the end of the evaluation — both the caller's
    /// initial facts and everything derived.
    pub fn facts(&self) -> &HashSet<FactRef> {
        &self.facts
    }

    /// The strict subset of `facts` that rules produced.
    pub fn derived(&self) -> &HashSet<FactRef> {
        &self.derived
    }

    /// Derived facts of the exact concrete type `T`.
    pub fn derived_of_type<T: Fact>(&self) -> HashSet<T> {
        self.derived.iter().filter_map(|f| f.downcast::<T>()).collect()
    }

    /// All facts (initial or derived) of the exact concrete type `T`.
    pub fn facts_of_type<T: Fact>(&self) -> HashSet<T> {
        self.facts.iter().filter_map(|f| f.downcast::<T>()).collect()
    }

    /// Validation failures whose `Cause` downcasts to `T`, in collection
    /// order.
    pub fn failures_of_type<T: 'static>(&self) -> Vec<&Failure> {
        self.verdict.failures().iter().filter(|f| f.reason::<T>().is_some()).collect()
    }

    /// `true` iff the verdict is `Pass`.
    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }

    /// `true` iff the verdict is `Fail`.
    pub fn failed(&self) -> bool {
        !self.passed()
    }
}
