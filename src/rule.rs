//! Rule descriptors: guards, producers, and validators.
//!
//! A [`Producer`] declares `In -> Out`; a [`Validator`] declares a predicate
//! plus a failure-reason function over a single fact type. Both are
//! polymorphic over sync/async condition and output functions, modeled as
//! the tagged-variant shape spec.md §9 recommends rather than a trait
//! hierarchy — mirroring how `rust-rule-engine`'s `engine::rule::Rule`
//! carries an enum-shaped `ConditionGroup` instead of subclassing.
//!
//! [`ProducerDescriptor`]/[`ValidatorDescriptor`] are the type-erased facade
//! the network compiler and validation pass operate on, since a [`Phase`]
//! holds producers/validators over many different `In`/`Out` types.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::RuleContext;
use crate::fact::{Fact, FactRef};
use crate::verdict::Failure;

/// A context-only predicate evaluated before any fact is examined. If it
/// returns `false` the rule is skipped for the entire evaluation.
pub struct Guard {
    description: String,
    predicate: Arc<dyn Fn(&RuleContext) -> bool + Send + Sync>,
}

impl Guard {
    /// Build a guard from a description and predicate.
    pub fn new(
        description: impl Into<String>,
        predicate: impl Fn(&RuleContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Guard {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// The human-readable description recorded in `skipped` when this guard
    /// blocks a rule.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Evaluate the guard against a context.
    pub fn allows(&self, context: &RuleContext) -> bool {
        (self.predicate)(context)
    }
}

impl Clone for Guard {
    fn clone(&self) -> Self {
        Guard {
            description: self.description.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("description", &self.description).finish()
    }
}

enum ConditionFn<In> {
    Sync(Arc<dyn Fn(&In) -> bool + Send + Sync>),
    Async(Arc<dyn Fn(In) -> BoxFuture<'static, bool> + Send + Sync>),
}

impl<In> Clone for ConditionFn<In> {
    fn clone(&self) -> Self {
        match self {
            ConditionFn::Sync(f) => ConditionFn::Sync(Arc::clone(f)),
            ConditionFn::Async(f) => ConditionFn::Async(Arc::clone(f)),
        }
    }
}

enum OutputFn<In, Out> {
    Sync(Arc<dyn Fn(&In) -> Option<Out> + Send + Sync>),
    Async(Arc<dyn Fn(In) -> BoxFuture<'static, Option<Out>> + Send + Sync>),
}

impl<In, Out> Clone for OutputFn<In, Out> {
    fn clone(&self) -> Self {
        match self {
            OutputFn::Sync(f) => OutputFn::Sync(Arc::clone(f)),
            OutputFn::Async(f) => OutputFn::Async(Arc::clone(f)),
        }
    }
}

/// A producer rule: `In -> Out`.
///
/// Built via [`Producer::new`] (always produces) or
/// [`Producer::new_filter_map`] (may produce nothing for a given input, per
/// spec.md §9's "output function returning no fact" open question).
pub struct Producer<In, Out> {
    name: String,
    description: Option<String>,
    priority: i32,
    guard: Option<Guard>,
    condition: ConditionFn<In>,
    output: OutputFn<In, Out>,
}

impl<In: Fact, Out: Fact> Producer<In, Out> {
    /// A producer whose output function always yields a fact.
    pub fn new(
        name: impl Into<String>,
        condition: impl Fn(&In) -> bool + Send + Sync + 'static,
        output: impl Fn(&In) -> Out + Send + Sync + 'static,
    ) -> Self {
        Producer {
            name: name.into(),
            description: None,
            priority: 0,
            guard: None,
            condition: ConditionFn::Sync(Arc::new(condition)),
            output: OutputFn::Sync(Arc::new(move |input| Some(output(input)))),
        }
    }

    /// A producer whose output function may decline to produce a fact for a
    /// given match.
    pub fn new_filter_map(
        name: impl Into<String>,
        condition: impl Fn(&In) -> bool + Send + Sync + 'static,
        output: impl Fn(&In) -> Option<Out> + Send + Sync + 'static,
    ) -> Self {
        Producer {
            name: name.into(),
            description: None,
            priority: 0,
            guard: None,
            condition: ConditionFn::Sync(Arc::new(condition)),
            output: OutputFn::Sync(Arc::new(output)),
        }
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set firing priority (higher fires first). Default 0.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a guard.
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Replace the condition with an async variant. `In` must be cheap to
    /// clone since the future is `'static` and cannot borrow it.
    pub fn with_async_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(In) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        self.condition = ConditionFn::Async(Arc::new(condition));
        self
    }

    /// Replace the output function with an async variant.
    pub fn with_async_output<F>(mut self, output: F) -> Self
    where
        F: Fn(In) -> BoxFuture<'static, Option<Out>> + Send + Sync + 'static,
    {
        self.output = OutputFn::Async(Arc::new(output));
        self
    }

    /// Erase `In`/`Out` into the type-erased descriptor used by the network
    /// compiler.
    pub fn into_descriptor(self) -> Arc<dyn ProducerDescriptor> {
        Arc::new(self)
    }
}

/// Type-erased facade over a [`Producer<In, Out>`] for storage in a
/// [`Phase`](crate::phase::Phase) alongside producers of other `In`/`Out`
/// types, and for the network compiler to build alpha/output nodes against.
pub trait ProducerDescriptor: Send + Sync {
    /// The rule's correlation key.
    fn name(&self) -> &str;
    /// Optional human-readable description.
    fn description(&self) -> Option<&str>;
    /// Firing priority; higher fires first.
    fn priority(&self) -> i32;
    /// The context-only gate, if any.
    fn guard(&self) -> Option<&Guard>;
    /// The concrete `In` type this producer's alpha node is keyed on.
    fn input_type(&self) -> TypeId;
    /// `true` iff either the condition or the output function is async.
    fn is_async(&self) -> bool;
    /// Evaluate the condition synchronously. Only called when `!is_async()`.
    fn matches_sync(&self, fact: &FactRef) -> bool;
    /// Evaluate the output function synchronously. Only called when
    /// `!is_async()`.
    fn produce_sync(&self, fact: &FactRef) -> Option<FactRef>;
    /// Evaluate the condition, awaiting if async; ready-wraps sync results.
    fn matches_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, bool>;
    /// Evaluate the output function, awaiting if async; ready-wraps sync
    /// results.
    fn produce_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, Option<FactRef>>;
}

impl<In: Fact, Out: Fact> ProducerDescriptor for Producer<In, Out> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    fn input_type(&self) -> TypeId {
        TypeId::of::<In>()
    }

    fn is_async(&self) -> bool {
        matches!(self.condition, ConditionFn::Async(_)) || matches!(self.output, OutputFn::Async(_))
    }

    fn matches_sync(&self, fact: &FactRef) -> bool {
        let input = fact
            .downcast_ref::<In>()
            .expect("alpha node dispatched a fact of the wrong concrete type");
        match &self.condition {
            ConditionFn::Sync(f) => f(input),
            ConditionFn::Async(_) => {
                unreachable!("sync evaluation never calls matches_sync on an async producer")
            }
        }
    }

    fn produce_sync(&self, fact: &FactRef) -> Option<FactRef> {
        let input = fact
            .downcast_ref::<In>()
            .expect("output node fired for a fact of the wrong concrete type");
        match &self.output {
            OutputFn::Sync(f) => f(input).map(FactRef::new),
            OutputFn::Async(_) => {
                unreachable!("sync evaluation never calls produce_sync on an async producer")
            }
        }
    }

    fn matches_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, bool> {
        let input = fact
            .downcast_ref::<In>()
            .expect("alpha node dispatched a fact of the wrong concrete type")
            .clone();
        match &self.condition {
            ConditionFn::Sync(f) => futures::future::ready(f(&input)).boxed(),
            ConditionFn::Async(f) => f(input),
        }
    }

    fn produce_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, Option<FactRef>> {
        let input = fact
            .downcast_ref::<In>()
            .expect("output node fired for a fact of the wrong concrete type")
            .clone();
        match &self.output {
            OutputFn::Sync(f) => futures::future::ready(f(&input).map(FactRef::new)).boxed(),
            OutputFn::Async(f) => {
                let fut = f(input);
                async move { fut.await.map(FactRef::new) }.boxed()
            }
        }
    }
}

/// A validator rule: inspects facts of one type and either passes or
/// contributes a `Failure` with a typed `Cause`.
pub struct Validator<F, Cause> {
    name: String,
    description: Option<String>,
    priority: i32,
    guard: Option<Guard>,
    condition: ConditionFn<F>,
    failure_reason: Arc<dyn Fn(&F) -> Cause + Send + Sync>,
}

impl<F: Fact, Cause: fmt::Debug + Send + Sync + 'static> Validator<F, Cause> {
    /// Build a validator from a sync condition and failure-reason function.
    pub fn new(
        name: impl Into<String>,
        condition: impl Fn(&F) -> bool + Send + Sync + 'static,
        failure_reason: impl Fn(&F) -> Cause + Send + Sync + 'static,
    ) -> Self {
        Validator {
            name: name.into(),
            description: None,
            priority: 0,
            guard: None,
            condition: ConditionFn::Sync(Arc::new(condition)),
            failure_reason: Arc::new(failure_reason),
        }
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set evaluation priority. Validators run in declaration order
    /// regardless (spec.md §4.7); priority is kept for symmetry with
    /// producers and future conflict-resolution extensions.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a guard.
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Replace the condition with an async variant.
    pub fn with_async_condition<C>(mut self, condition: C) -> Self
    where
        C: Fn(F) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        self.condition = ConditionFn::Async(Arc::new(condition));
        self
    }

    /// Erase `F`/`Cause` into the type-erased descriptor the validation
    /// pass operates on.
    pub fn into_descriptor(self) -> Arc<dyn ValidatorDescriptor> {
        Arc::new(self)
    }
}

/// Type-erased facade over a [`Validator<F, Cause>`].
pub trait ValidatorDescriptor: Send + Sync {
    /// The rule's correlation key.
    fn name(&self) -> &str;
    /// Optional human-readable description.
    fn description(&self) -> Option<&str>;
    /// The context-only gate, if any.
    fn guard(&self) -> Option<&Guard>;
    /// The concrete fact type this validator inspects.
    fn input_type(&self) -> TypeId;
    /// `true` iff the condition is async.
    fn is_async(&self) -> bool;
    /// Evaluate the condition synchronously. Only called when `!is_async()`.
    fn check_sync(&self, fact: &FactRef) -> bool;
    /// Evaluate the condition, awaiting if async.
    fn check_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, bool>;
    /// Build a type-erased `Failure` for a fact that failed this
    /// validator's condition.
    fn failure_for(&self, fact: &FactRef) -> Failure;
}

impl<F: Fact, Cause: fmt::Debug + Send + Sync + 'static> ValidatorDescriptor for Validator<F, Cause> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    fn input_type(&self) -> TypeId {
        TypeId::of::<F>()
    }

    fn is_async(&self) -> bool {
        matches!(self.condition, ConditionFn::Async(_))
    }

    fn check_sync(&self, fact: &FactRef) -> bool {
        let input = fact
            .downcast_ref::<F>()
            .expect("validator dispatched a fact of the wrong concrete type");
        match &self.condition {
            ConditionFn::Sync(f) => f(input),
            ConditionFn::Async(_) => {
                unreachable!("sync evaluation never calls check_sync on an async validator")
            }
        }
    }

    fn check_async<'a>(&'a self, fact: &'a FactRef) -> BoxFuture<'a, bool> {
        let input = fact
            .downcast_ref::<F>()
            .expect("validator dispatched a fact of the wrong concrete type")
            .clone();
        match &self.condition {
            ConditionFn::Sync(f) => futures::future::ready(f(&input)).boxed(),
            ConditionFn::Async(f) => f(input),
        }
    }

    fn failure_for(&self, fact: &FactRef) -> Failure {
        let input = fact
            .downcast_ref::<F>()
            .expect("validator dispatched a fact of the wrong concrete type");
        Failure::new(self.name.clone(), (self.failure_reason)(input))
    }
}
