//! The public façade: `Engine` and its builder (spec.md §4.8, §6.1, §6.2).

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::context::RuleContext;
use crate::errors::{EngineError, Result};
use crate::events::{Event, EventCollector};
use crate::fact::FactRef;
use crate::network::CompiledPhase;
use crate::phase::{Phase, PhaseBuilder};
use crate::result::EngineResult;
use crate::rule::{Producer, ProducerDescriptor, Validator, ValidatorDescriptor};
use crate::session::SessionState;
use crate::validation;

/// A no-op collector used when the caller passes none.
struct NullCollector;

impl EventCollector for NullCollector {
    fn on_event(&self, _event: &Event) {}
}

/// An immutable, compiled rules engine. Construct one with [`Engine::builder`];
/// the compiled network is built once and shared (via `Arc`) across every
/// session an `evaluate`/`evaluate_async` call spawns.
pub struct Engine {
    config: EngineConfig,
    compiled_phases: Vec<CompiledPhase>,
    phases: Vec<Phase>,
    phase_producer_names: Vec<Vec<String>>,
    validators: Vec<Arc<dyn ValidatorDescriptor>>,
    validation_rule_names: Vec<String>,
    has_async_rules: bool,
}

impl Engine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            phases: Vec::new(),
            default_phase: Phase::builder("default"),
            default_phase_used: false,
        }
    }

    /// The engine's phases, in evaluation order (including the synthesized
    /// "default" phase, if one was used).
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Producer names, flattened across phases in declaration order.
    pub fn fact_producer_names(&self) -> Vec<&str> {
        self.phase_producer_names.iter().flatten().map(String::as_str).collect()
    }

    /// Validator names, in declaration order across all phases.
    pub fn validation_rule_names(&self) -> &[String] {
        &self.validation_rule_names
    }

    /// Total number of rules (producers plus validators) across all phases.
    pub fn size(&self) -> usize {
        self.phase_producer_names.iter().map(Vec::len).sum::<usize>() + self.validators.len()
    }

    /// `true` iff any producer or validator is async, in which case
    /// [`Engine::evaluate`] refuses and [`Engine::evaluate_async`] must be
    /// used instead.
    pub fn has_async_rules(&self) -> bool {
        self.has_async_rules
    }

    /// Evaluate synchronously. Errors with [`EngineError::AsyncModeMismatch`]
    /// if this engine contains any async producer or validator.
    pub fn evaluate(
        &self,
        facts: impl IntoIterator<Item = FactRef>,
        context: Option<RuleContext>,
        collector: Option<Arc<dyn EventCollector>>,
    ) -> Result<EngineResult> {
        if self.has_async_rules {
            return Err(EngineError::AsyncModeMismatch);
        }

        let context = context.unwrap_or_else(RuleContext::empty);
        let null = NullCollector;
        let collector: &dyn EventCollector = match &collector {
            Some(c) => c.as_ref(),
            None => &null,
        };

        let mut state = SessionState::new(&context, &self.config, collector);
        for fact in facts {
            state.insert_initial(fact);
        }

        for phase in &self.compiled_phases {
            state.run_phase_sync(phase)?;
        }

        let verdict = validation::run_sync(
            &self.validators,
            &state.working_memory,
            &context,
            &mut state.skipped,
            collector,
        );

        Ok(self.finish(state, verdict, collector))
    }

    /// Evaluate asynchronously, awaiting any async condition/output/
    /// validator functions. Producers and validators without async variants
    /// behave exactly as in [`Engine::evaluate`].
    pub async fn evaluate_async(
        &self,
        facts: impl IntoIterator<Item = FactRef>,
        context: Option<RuleContext>,
        collector: Option<Arc<dyn EventCollector>>,
    ) -> Result<EngineResult> {
        let context = context.unwrap_or_else(RuleContext::empty);
        let null = NullCollector;
        let collector: &dyn EventCollector = match &collector {
            Some(c) => c.as_ref(),
            None => &null,
        };

        let mut state = SessionState::new(&context, &self.config, collector);
        for fact in facts {
            state.insert_initial(fact);
        }

        for phase in &self.compiled_phases {
            state.run_phase_async(phase).await?;
        }

        let verdict = validation::run_async(
            &self.validators,
            &state.working_memory,
            &context,
            &mut state.skipped,
            collector,
        )
        .await;

        Ok(self.finish(state, verdict, collector))
    }

    fn finish(
        &self,
        state: SessionState<'_>,
        verdict: crate::verdict::Verdict,
        collector: &dyn EventCollector,
    ) -> EngineResult {
        let facts = state.working_memory.all().clone();
        let result = EngineResult {
            facts,
            derived: state.derived,
            verdict,
            skipped: state.skipped,
            rule_activations: state.rule_activations,
            iterations: state.iterations,
            trace: state.trace,
            warnings: state.warnings,
        };
        let result = Arc::new(result);
        collector.on_event(&Event::Completed { result: Arc::clone(&result) });
        Arc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    phases: Vec<Phase>,
    default_phase: PhaseBuilder,
    default_phase_used: bool,
}

impl EngineBuilder {
    /// Override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a fully-built phase.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Add a producer to the implicit "default" phase, prepended ahead of
    /// any explicit phases iff it (or a validator) is ever used (spec.md
    /// §6.1).
    pub fn with_producer<In: crate::fact::Fact, Out: crate::fact::Fact>(mut self, producer: Producer<In, Out>) -> Self {
        self.default_phase = self.default_phase.with_producer(producer);
        self.default_phase_used = true;
        self
    }

    /// Add a validator to the implicit "default" phase.
    pub fn with_validator<F: crate::fact::Fact, Cause>(mut self, validator: Validator<F, Cause>) -> Self
    where
        Cause: std::fmt::Debug + Send + Sync + 'static,
    {
        self.default_phase = self.default_phase.with_validator(validator);
        self.default_phase_used = true;
        self
    }

    /// Finish building. Validates the configuration and compiles every
    /// phase's network.
    pub fn build(self) -> Result<Engine> {
        if self.config.max_iterations == 0 {
            return Err(EngineError::Configuration {
                message: "max_iterations must be greater than zero".to_string(),
            });
        }

        let mut phases = self.phases;
        if self.default_phase_used {
            phases.insert(0, self.default_phase.build());
        }

        let mut validators = Vec::new();
        let mut validation_rule_names = Vec::new();
        let mut phase_producer_names = Vec::new();
        let mut has_async_rules = false;

        let mut compiled_phases = Vec::with_capacity(phases.len());
        for phase in &phases {
            phase_producer_names.push(phase.producer_names().map(str::to_string).collect());
            validation_rule_names.extend(phase.validator_names().map(str::to_string));
            for producer in &phase.producers {
                has_async_rules = has_async_rules || producer.is_async();
            }
            for validator in &phase.validators {
                has_async_rules = has_async_rules || validator.is_async();
                validators.push(Arc::clone(validator));
            }
            compiled_phases.push(CompiledPhase::compile(phase));
        }

        Ok(Engine {
            config: self.config,
            compiled_phases,
            phases,
            phase_producer_names,
            validators,
            validation_rule_names,
            has_async_rules,
        })
    }
}
