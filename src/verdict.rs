//! `Verdict` and `Failure` — the data types shared with the (out-of-scope)
//! validation-only rule-set layer described in spec.md §1.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A validation failure: which rule rejected a fact, and why.
///
/// `reason` is type-erased because validators across a phase list may each
/// carry a different `Cause` type (spec.md §3: "`Cause` is an arbitrary
/// typed value"). Use [`Failure::reason`] to downcast.
pub struct Failure {
    /// The validator's rule name.
    pub rule_name: String,
    reason: Arc<dyn Any + Send + Sync>,
    reason_display: String,
}

impl Failure {
    pub(crate) fn new<C: fmt::Debug + Send + Sync + 'static>(rule_name: String, reason: C) -> Self {
        let reason_display = format!("{reason:?}");
        Failure {
            rule_name,
            reason: Arc::new(reason),
            reason_display,
        }
    }

    /// Downcast the failure reason to its concrete type.
    pub fn reason<C: 'static>(&self) -> Option<&C> {
        self.reason.downcast_ref::<C>()
    }
}

impl PartialEq for Failure {
    /// Compares by rule name and the reason's debug rendering, since the
    /// type-erased reason has no general `PartialEq`.
    fn eq(&self, other: &Self) -> bool {
        self.rule_name == other.rule_name && self.reason_display == other.reason_display
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("rule_name", &self.rule_name)
            .field("reason", &self.reason_display)
            .finish()
    }
}

impl Clone for Failure {
    fn clone(&self) -> Self {
        Failure {
            rule_name: self.rule_name.clone(),
            reason: Arc::clone(&self.reason),
            reason_display: self.reason_display.clone(),
        }
    }
}

/// The aggregate outcome of a validation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No validator failed.
    Pass,
    /// At least one validator failed, in collection order.
    Fail(Vec<Failure>),
}

impl Verdict {
    /// `true` iff this is `Verdict::Pass`.
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// All recorded failures, empty for `Pass`.
    pub fn failures(&self) -> &[Failure] {
        match self {
            Verdict::Pass => &[],
            Verdict::Fail(failures) => failures,
        }
    }
}
