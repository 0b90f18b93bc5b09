//! The session driver: drives one phase's network to fixpoint, then its
//! fallback producers if any, interleaving priority-ordered firing with
//! immediate propagation of newly derived facts (spec.md §4.6).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::context::RuleContext;
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventCollector, RuleActivation};
use crate::fact::FactRef;
use crate::network::CompiledPhase;
use crate::rule::ProducerDescriptor;
use crate::working_memory::WorkingMemory;

/// Mutable state threaded through one evaluation: working memory, counters,
/// and the diagnostics an `EngineResult` is eventually built from. Lives for
/// exactly one `evaluate`/`evaluate_async` call and is never shared.
pub(crate) struct SessionState<'a> {
    pub(crate) working_memory: WorkingMemory,
    pub(crate) derived: HashSet<FactRef>,
    context: &'a RuleContext,
    config: &'a crate::config::EngineConfig,
    collector: &'a dyn EventCollector,
    pub(crate) skipped: HashMap<String, String>,
    pub(crate) trace: Vec<RuleActivation>,
    pub(crate) warnings: Vec<String>,
    pub(crate) iterations: u32,
    pub(crate) rule_activations: u32,
    runaway_warned: bool,
}

impl<'a> SessionState<'a> {
    pub(crate) fn new(
        context: &'a RuleContext,
        config: &'a crate::config::EngineConfig,
        collector: &'a dyn EventCollector,
    ) -> Self {
        SessionState {
            working_memory: WorkingMemory::new(),
            derived: HashSet::new(),
            context,
            config,
            collector,
            skipped: HashMap::new(),
            trace: Vec::new(),
            warnings: Vec::new(),
            iterations: 0,
            rule_activations: 0,
            runaway_warned: false,
        }
    }

    /// Insert a caller-supplied initial fact, emitting `FactInserted` only
    /// if it was not already present.
    pub(crate) fn insert_initial(&mut self, fact: FactRef) {
        if self.working_memory.add(fact.clone()) {
            self.collector.on_event(&Event::FactInserted { fact, is_derived: false });
        }
    }

    fn bump_iterations(&mut self) -> Result<()> {
        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            return Err(EngineError::MaxIterationsExceeded {
                iterations: self.iterations,
                max_iterations: self.config.max_iterations,
            });
        }
        Ok(())
    }

    /// Insert a rule-derived fact. Returns `true` iff it was new.
    fn insert_derived(&mut self, fact: FactRef) -> bool {
        if !self.working_memory.add(fact.clone()) {
            return false;
        }
        self.derived.insert(fact.clone());
        self.rule_activations += 1;
        self.collector.on_event(&Event::FactInserted { fact, is_derived: true });
        true
    }

    fn record_firing(&mut self, rule_name: &str, input_fact: FactRef, output_facts: Vec<FactRef>, priority: i32) {
        if self.config.enable_tracing {
            self.trace.push(RuleActivation {
                rule_name: rule_name.to_string(),
                input_fact: input_fact.clone(),
                output_facts: output_facts.clone(),
                priority,
            });
        }
        self.collector.on_event(&Event::RuleFired {
            rule_name: rule_name.to_string(),
            input_fact,
            output_facts,
            priority,
        });
    }

    /// Run one phase's compiled network to fixpoint, synchronously, then its
    /// fallback producers (which must be empty in sync mode — the engine
    /// facade refuses `evaluate` on any engine with async producers before
    /// this is ever called).
    pub(crate) fn run_phase_sync(&mut self, phase: &CompiledPhase) -> Result<()> {
        debug_assert!(
            phase.fallback_producers.is_empty(),
            "sync evaluation must never reach a phase with async producers"
        );
        log::debug!("running phase '{}' (sync)", phase.name);

        let mut network = phase.instantiate_network();
        let skipped_output_ids = self.apply_guards(&network, phase.output_count());

        let snapshot: Vec<FactRef> = self.working_memory.all().iter().cloned().collect();
        for fact in &snapshot {
            network.activate_sync(fact);
        }

        while network.has_pending_activations() {
            self.bump_iterations()?;

            let target = match network.select_eligible(&skipped_output_ids) {
                Some(id) => id,
                None => {
                    for id in network.pending_node_ids() {
                        network.drain_discard(id);
                    }
                    break;
                }
            };

            let rule_name = network.output_node_rule_name(target).to_string();
            let priority = network.output_node_priority(target);

            for (input_fact, output) in network.fire_pending_sync(target) {
                let mut added = Vec::new();
                if let Some(out) = output {
                    if self.insert_derived(out.clone()) {
                        added.push(out.clone());
                        network.activate_sync(&out);
                    }
                }
                if !added.is_empty() {
                    self.record_firing(&rule_name, input_fact, added, priority);
                }
            }
        }

        Ok(())
    }

    /// Async counterpart of [`SessionState::run_phase_sync`]: awaits the
    /// network's async condition/output path, then runs this phase's
    /// fallback producers (the async-only producers the compiler could not
    /// place in the network).
    pub(crate) async fn run_phase_async(&mut self, phase: &CompiledPhase) -> Result<()> {
        log::debug!("running phase '{}' (async)", phase.name);
        let mut network = phase.instantiate_network();
        let skipped_output_ids = self.apply_guards(&network, phase.output_count());

        let snapshot: Vec<FactRef> = self.working_memory.all().iter().cloned().collect();
        for fact in &snapshot {
            network.activate_async(fact).await;
        }

        while network.has_pending_activations() {
            self.bump_iterations()?;

            let target = match network.select_eligible(&skipped_output_ids) {
                Some(id) => id,
                None => {
                    for id in network.pending_node_ids() {
                        network.drain_discard(id);
                    }
                    break;
                }
            };

            let rule_name = network.output_node_rule_name(target).to_string();
            let priority = network.output_node_priority(target);

            for (input_fact, output) in network.fire_pending_async(target).await {
                let mut added = Vec::new();
                if let Some(out) = output {
                    if self.insert_derived(out.clone()) {
                        added.push(out.clone());
                        network.activate_async(&out).await;
                    }
                }
                if !added.is_empty() {
                    self.record_firing(&rule_name, input_fact, added, priority);
                }
            }
        }

        if !phase.fallback_producers.is_empty() {
            self.run_fallback(&phase.fallback_producers).await?;
        }

        Ok(())
    }

    /// Guard-check every output node up front, recording skips and returning
    /// the set of output node ids whose activations must be drained and
    /// discarded rather than fired.
    fn apply_guards(&mut self, network: &crate::network::Network, output_count: usize) -> HashSet<usize> {
        let mut skipped_output_ids = HashSet::new();
        for id in 0..output_count {
            let producer = network.output_node_producer(id);
            if let Some(guard) = producer.guard() {
                if !guard.allows(self.context) {
                    let rule_name = producer.name().to_string();
                    let description = guard.description().to_string();
                    self.skipped.insert(rule_name.clone(), description.clone());
                    skipped_output_ids.insert(id);
                    self.collector.on_event(&Event::RuleSkipped {
                        rule_name,
                        guard_description: description,
                    });
                }
            }
        }
        skipped_output_ids
    }

    /// The naive do/while loop for async-only producers that the network
    /// cannot execute (spec.md §4.6's "fallback-producer loop").
    async fn run_fallback(&mut self, producers: &[Arc<dyn ProducerDescriptor>]) -> Result<()> {
        let mut skipped_names = HashSet::new();
        for producer in producers {
            if let Some(guard) = producer.guard() {
                if !guard.allows(self.context) {
                    let rule_name = producer.name().to_string();
                    let description = guard.description().to_string();
                    self.skipped.insert(rule_name.clone(), description.clone());
                    skipped_names.insert(rule_name.clone());
                    self.collector.on_event(&Event::RuleSkipped {
                        rule_name,
                        guard_description: description,
                    });
                }
            }
        }

        let mut processed: HashMap<String, HashSet<FactRef>> = HashMap::new();

        loop {
            self.bump_iterations()?;
            let mut any_new = false;

            for producer in producers {
                if skipped_names.contains(producer.name()) {
                    continue;
                }

                let candidates: Vec<FactRef> = self.working_memory.bucket(producer.input_type()).to_vec();
                let seen = processed.entry(producer.name().to_string()).or_default();
                let unprocessed: Vec<FactRef> = candidates.into_iter().filter(|f| !seen.contains(f)).collect();

                for fact in unprocessed {
                    seen.insert(fact.clone());
                    if !producer.matches_async(&fact).await {
                        continue;
                    }
                    if let Some(out) = producer.produce_async(&fact).await {
                        if self.insert_derived(out.clone()) {
                            any_new = true;
                            self.record_firing(producer.name(), fact.clone(), vec![out], producer.priority());
                        }
                    }
                }
            }

            self.check_runaway(producers.len());

            if !any_new {
                break;
            }
        }

        Ok(())
    }

    /// After 100 iterations, warn at most once if activations vastly outpace
    /// iterations times producer count — a cheap signal of a diverging rule
    /// chain (spec.md §4.6, §7).
    fn check_runaway(&mut self, producer_count: usize) {
        if self.runaway_warned || self.iterations <= 100 {
            return;
        }
        let threshold = self.iterations as u64 * producer_count as u64 * 2;
        if self.rule_activations as u64 > threshold {
            let message = format!(
                "runaway execution suspected: {} rule activations after {} iterations across {} producers; tighten rule conditions",
                self.rule_activations, self.iterations, producer_count
            );
            log::warn!("{message}");
            self.warnings.push(message);
            self.runaway_warned = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::RecordingCollector;
    use crate::phase::Phase;
    use crate::rule::Producer;

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct Customer {
        id: String,
        spend: u32,
    }

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct VipStatus {
        id: String,
        tier: String,
    }

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct Discount {
        id: String,
        percent: u32,
    }

    fn chain_phase() -> Phase {
        Phase::builder("default")
            .with_producer(Producer::new(
                "vip-check",
                |c: &Customer| c.spend > 10_000,
                |c: &Customer| VipStatus { id: c.id.clone(), tier: "gold".to_string() },
            ))
            .with_producer(Producer::new(
                "vip-discount",
                |v: &VipStatus| v.tier == "gold",
                |v: &VipStatus| Discount { id: v.id.clone(), percent: 20 },
            ))
            .build()
    }

    #[test]
    fn chained_producers_propagate_across_two_iterations() {
        let compiled = CompiledPhase::compile(&chain_phase());
        let config = EngineConfig::default();
        let context = RuleContext::empty();
        let collector = RecordingCollector::new();
        let mut state = SessionState::new(&context, &config, &collector);

        state.insert_initial(FactRef::new(Customer { id: "123".to_string(), spend: 15_000 }));
        state.run_phase_sync(&compiled).unwrap();

        assert!(state.iterations >= 2);
        assert_eq!(state.rule_activations, 2);
        assert!(state.derived.contains(&FactRef::new(VipStatus { id: "123".to_string(), tier: "gold".to_string() })));
        assert!(state.derived.contains(&FactRef::new(Discount { id: "123".to_string(), percent: 20 })));
    }

    #[test]
    fn guard_skip_records_rule_and_blocks_derivation() {
        let phase = Phase::builder("default")
            .with_producer(
                Producer::new(
                    "vip-only-discount",
                    |c: &Customer| c.spend > 0,
                    |c: &Customer| Discount { id: c.id.clone(), percent: 10 },
                )
                .with_guard(crate::rule::Guard::new("must be VIP", |_ctx| false)),
            )
            .build();
        let compiled = CompiledPhase::compile(&phase);
        let config = EngineConfig::default();
        let context = RuleContext::empty();
        let collector = RecordingCollector::new();
        let mut state = SessionState::new(&context, &config, &collector);

        state.insert_initial(FactRef::new(Customer { id: "1".to_string(), spend: 5_000 }));
        state.run_phase_sync(&compiled).unwrap();

        assert!(state.derived.is_empty());
        assert_eq!(state.skipped.get("vip-only-discount"), Some(&"must be VIP".to_string()));
    }

    #[test]
    fn priority_ordering_fires_high_before_low() {
        let phase = Phase::builder("default")
            .with_producer(Producer::new("low", |_: &String| true, |s: &String| format!("{s}-low")).with_priority(1))
            .with_producer(Producer::new("high", |_: &String| true, |s: &String| format!("{s}-high")).with_priority(100))
            .build();
        let compiled = CompiledPhase::compile(&phase);
        let config = EngineConfig::default();
        let context = RuleContext::empty();
        let collector = RecordingCollector::new();
        let mut state = SessionState::new(&context, &config, &collector);

        state.insert_initial(FactRef::new("x".to_string()));
        state.run_phase_sync(&compiled).unwrap();

        let fired: Vec<String> = collector
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::RuleFired { rule_name, .. } => Some(rule_name),
                _ => None,
            })
            .collect();
        let high_pos = fired.iter().position(|r| r == "high").unwrap();
        let low_pos = fired.iter().position(|r| r == "low").unwrap();
        assert!(high_pos < low_pos);
    }

    #[test]
    fn iteration_ceiling_raises_max_iterations_exceeded() {
        let phase = chain_phase();
        let compiled = CompiledPhase::compile(&phase);
        let config = EngineConfig { max_iterations: 1, enable_tracing: false };
        let context = RuleContext::empty();
        let collector = RecordingCollector::new();
        let mut state = SessionState::new(&context, &config, &collector);

        state.insert_initial(FactRef::new(Customer { id: "1".to_string(), spend: 20_000 }));
        let err = state.run_phase_sync(&compiled).unwrap_err();
        assert!(matches!(err, EngineError::MaxIterationsExceeded { .. }));
    }
}
