//! Phases — ordered groups of producers (run to fixpoint) plus validators
//! (collected globally, run once after all phases settle).

use std::sync::Arc;

use crate::fact::Fact;
use crate::rule::{Producer, ProducerDescriptor, Validator, ValidatorDescriptor};

/// An ordered, named bundle of producers and validators (spec.md §3).
pub struct Phase {
    /// The phase's name, used only for diagnostics and event correlation.
    pub name: String,
    pub(crate) producers: Vec<Arc<dyn ProducerDescriptor>>,
    pub(crate) validators: Vec<Arc<dyn ValidatorDescriptor>>,
}

impl Phase {
    /// Start building a named phase.
    pub fn builder(name: impl Into<String>) -> PhaseBuilder {
        PhaseBuilder {
            name: name.into(),
            producers: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Producer names in declaration order.
    pub fn producer_names(&self) -> impl Iterator<Item = &str> {
        self.producers.iter().map(|p| p.name())
    }

    /// Validator names in declaration order.
    pub fn validator_names(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(|v| v.name())
    }
}

/// Builder for [`Phase`].
pub struct PhaseBuilder {
    name: String,
    producers: Vec<Arc<dyn ProducerDescriptor>>,
    validators: Vec<Arc<dyn ValidatorDescriptor>>,
}

impl PhaseBuilder {
    /// Append a producer, keeping declaration order (used as the priority
    /// tie-break per spec.md §4.6).
    pub fn with_producer<In: Fact, Out: Fact>(mut self, producer: Producer<In, Out>) -> Self {
        self.producers.push(producer.into_descriptor());
        self
    }

    /// Append a validator, keeping declaration order.
    pub fn with_validator<F: Fact, Cause>(mut self, validator: Validator<F, Cause>) -> Self
    where
        Cause: std::fmt::Debug + Send + Sync + 'static,
    {
        self.validators.push(validator.into_descriptor());
        self
    }

    /// Finish building the phase.
    pub fn build(self) -> Phase {
        Phase {
            name: self.name,
            producers: self.producers,
            validators: self.validators,
        }
    }
}
