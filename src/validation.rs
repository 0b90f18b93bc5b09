//! The validation pass: runs after every phase reaches fixpoint, against
//! `all_facts` (spec.md §4.7).

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::RuleContext;
use crate::events::{Event, EventCollector};
use crate::rule::ValidatorDescriptor;
use crate::verdict::Verdict;
use crate::working_memory::WorkingMemory;

pub(crate) fn run_sync(
    validators: &[Arc<dyn ValidatorDescriptor>],
    working_memory: &WorkingMemory,
    context: &RuleContext,
    skipped: &mut HashMap<String, String>,
    collector: &dyn EventCollector,
) -> Verdict {
    let mut failures = Vec::new();

    for validator in validators {
        if let Some(guard) = validator.guard() {
            if !guard.allows(context) {
                skipped.insert(validator.name().to_string(), guard.description().to_string());
                collector.on_event(&Event::RuleSkipped {
                    rule_name: validator.name().to_string(),
                    guard_description: guard.description().to_string(),
                });
                continue;
            }
        }

        for fact in working_memory.bucket(validator.input_type()) {
            if validator.check_sync(fact) {
                collector.on_event(&Event::ValidationPassed {
                    rule_name: validator.name().to_string(),
                    fact: fact.clone(),
                });
            } else {
                let failure = validator.failure_for(fact);
                collector.on_event(&Event::ValidationFailed {
                    rule_name: validator.name().to_string(),
                    fact: fact.clone(),
                    failure: failure.clone(),
                });
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail(failures)
    }
}

pub(crate) async fn run_async(
    validators: &[Arc<dyn ValidatorDescriptor>],
    working_memory: &WorkingMemory,
    context: &RuleContext,
    skipped: &mut HashMap<String, String>,
    collector: &dyn EventCollector,
) -> Verdict {
    let mut failures = Vec::new();

    for validator in validators {
        if let Some(guard) = validator.guard() {
            if !guard.allows(context) {
                skipped.insert(validator.name().to_string(), guard.description().to_string());
                collector.on_event(&Event::RuleSkipped {
                    rule_name: validator.name().to_string(),
                    guard_description: guard.description().to_string(),
                });
                continue;
            }
        }

        for fact in working_memory.bucket(validator.input_type()) {
            if validator.check_async(fact).await {
                collector.on_event(&Event::ValidationPassed {
                    rule_name: validator.name().to_string(),
                    fact: fact.clone(),
                });
            } else {
                let failure = validator.failure_for(fact);
                collector.on_event(&Event::ValidationFailed {
                    rule_name: validator.name().to_string(),
                    fact: fact.clone(),
                    failure: failure.clone(),
                });
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail(failures)
    }
}
