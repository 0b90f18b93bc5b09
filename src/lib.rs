//! A forward-chaining production rules engine built around a Rete-style
//! discrimination network: heterogeneously-typed facts, priority-ordered
//! firing to a per-phase fixpoint, context-gated guards, and a validation
//! pass that runs once all phases have settled.
//!
//! ```
//! use rulecraft::{Engine, FactRef, Producer};
//!
//! #[derive(Clone, Eq, PartialEq, Hash, Debug)]
//! struct Customer { id: String, spend: u32 }
//!
//! #[derive(Clone, Eq, PartialEq, Hash, Debug)]
//! struct VipStatus { id: String, tier: String }
//!
//! let engine = Engine::builder()
//!     .with_producer(Producer::new(
//!         "vip-check",
//!         |c: &Customer| c.spend > 10_000,
//!         |c: &Customer| VipStatus { id: c.id.clone(), tier: "gold".to_string() },
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let result = engine
//!     .evaluate(vec![FactRef::new(Customer { id: "1".into(), spend: 15_000 })], None, None)
//!     .unwrap();
//! assert!(result.passed());
//! assert_eq!(result.derived_of_type::<VipStatus>().len(), 1);
//! ```

mod config;
mod context;
mod engine;
mod errors;
mod events;
mod fact;
mod network;
mod phase;
mod result;
mod rule;
mod session;
mod validation;
mod verdict;
mod working_memory;

pub use config::EngineConfig;
pub use context::{ContextKey, RuleContext};
pub use engine::{Engine, EngineBuilder};
pub use errors::{EngineError, Result};
pub use events::{CompositeCollector, Event, EventCollector, RecordingCollector, RuleActivation};
pub use fact::{Fact, FactRef};
pub use phase::{Phase, PhaseBuilder};
pub use result::EngineResult;
pub use rule::{Guard, Producer, ProducerDescriptor, Validator, ValidatorDescriptor};
pub use verdict::{Failure, Verdict};
pub use working_memory::WorkingMemory;
