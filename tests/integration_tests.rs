//! End-to-end evaluations exercising the concrete scenarios from spec.md §8.

use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use rulecraft::{ContextKey, Engine, EngineConfig, Event, FactRef, Guard, Producer, RecordingCollector, RuleContext, Validator};

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

fn vip_check() -> Producer<Customer, VipStatus> {
    Producer::new(
        "vip-check",
        |c: &Customer| c.spend > 10_000,
        |c: &Customer| VipStatus { id: c.id.clone(), tier: "gold".to_string() },
    )
}

// S1 — single producer.
#[test]
fn s1_single_producer_derives_only_matching_customers() {
    let engine = Engine::builder().with_producer(vip_check()).build().unwrap();

    let facts = vec![
        FactRef::new(Customer { id: "1".to_string(), spend: 15_000 }),
        FactRef::new(Customer { id: "2".to_string(), spend: 5_000 }),
        FactRef::new(Customer { id: "3".to_string(), spend: 20_000 }),
    ];

    let result = engine.evaluate(facts, None, None).unwrap();

    assert_eq!(
        result.derived_of_type::<VipStatus>(),
        HashSet::from([
            VipStatus { id: "1".to_string(), tier: "gold".to_string() },
            VipStatus { id: "3".to_string(), tier: "gold".to_string() },
        ])
    );
    assert!(result.passed());
}

// S2 — chain.
#[test]
fn s2_chained_producers_derive_through_two_iterations_in_order() {
    let engine = Engine::builder()
        .with_config(EngineConfig { max_iterations: 1_000, enable_tracing: true })
        .with_producer(vip_check())
        .with_producer(Producer::new(
            "vip-discount",
            |v: &VipStatus| v.tier == "gold",
            |v: &VipStatus| Discount { id: v.id.clone(), percent: 20 },
        ))
        .build()
        .unwrap();

    let facts = vec![FactRef::new(Customer { id: "123".to_string(), spend: 15_000 })];
    let result = engine.evaluate(facts, None, None).unwrap();

    assert_eq!(
        result.derived_of_type::<VipStatus>(),
        HashSet::from([VipStatus { id: "123".to_string(), tier: "gold".to_string() }])
    );
    assert_eq!(
        result.derived_of_type::<Discount>(),
        HashSet::from([Discount { id: "123".to_string(), percent: 20 }])
    );
    assert!(result.iterations >= 2);
    assert_eq!(result.trace.len(), 2);
    assert_eq!(result.trace[0].rule_name, "vip-check");
    assert_eq!(result.trace[1].rule_name, "vip-discount");
}

// S3 — duplicate suppression.
#[test]
fn s3_constant_producer_derives_its_output_exactly_once() {
    let engine = Engine::builder()
        .with_producer(Producer::new("always-42", |_: &String| true, |_: &String| 42_i32))
        .build()
        .unwrap();

    let facts = vec!["a", "b", "c"].into_iter().map(|s| FactRef::new(s.to_string()));
    let result = engine.evaluate(facts, None, None).unwrap();

    assert_eq!(result.derived_of_type::<i32>(), HashSet::from([42]));
    assert_eq!(result.rule_activations, 1);
}

// S4 — guard skip.
#[test]
fn s4_guard_blocks_without_context_and_allows_with_it() {
    static TIER: ContextKey<String> = ContextKey::new("customer_tier");

    let engine = Engine::builder()
        .with_producer(
            Producer::new(
                "vip-only-discount",
                |c: &Customer| c.spend > 0,
                |c: &Customer| Discount { id: c.id.clone(), percent: 10 },
            )
            .with_guard(Guard::new("must be VIP", |ctx: &RuleContext| {
                ctx.get(TIER).as_deref() == Some("vip")
            })),
        )
        .build()
        .unwrap();

    let facts = vec![FactRef::new(Customer { id: "1".to_string(), spend: 5_000 })];

    let blocked = engine.evaluate(facts.clone(), None, None).unwrap();
    assert!(blocked.derived().is_empty());
    assert_eq!(blocked.skipped.get("vip-only-discount"), Some(&"must be VIP".to_string()));

    let context = RuleContext::builder().set(TIER, "vip".to_string()).build();
    let allowed = engine.evaluate(facts, Some(context), None).unwrap();
    assert_eq!(
        allowed.derived_of_type::<Discount>(),
        HashSet::from([Discount { id: "1".to_string(), percent: 10 }])
    );
}

// S5 — validation after fixpoint.
#[test]
fn s5_validation_runs_after_producers_reach_fixpoint() {
    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct CartItem {
        name: String,
        quantity: u32,
    }

    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    struct CartTotal {
        name: String,
        total: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OverLimit(u32);

    let engine = Engine::builder()
        .with_producer(Producer::new(
            "cart-total",
            |_: &CartItem| true,
            |item: &CartItem| CartTotal { name: item.name.clone(), total: item.quantity * 10 },
        ))
        .with_validator(Validator::new(
            "max-order",
            |total: &CartTotal| total.total <= 100,
            |total: &CartTotal| OverLimit(total.total),
        ))
        .build()
        .unwrap();

    let facts = vec![FactRef::new(CartItem { name: "Widget".to_string(), quantity: 15 })];
    let result = engine.evaluate(facts, None, None).unwrap();

    assert_eq!(
        result.derived_of_type::<CartTotal>(),
        HashSet::from([CartTotal { name: "Widget".to_string(), total: 150 }])
    );
    assert!(result.failed());
    let failures = result.failures_of_type::<OverLimit>();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason::<OverLimit>(), Some(&OverLimit(150)));
    assert!(format!("{:?}", failures[0]).contains("150"));
}

// S6 — priority ordering.
#[test]
fn s6_higher_priority_producer_fires_before_lower_priority_one() {
    let engine = Engine::builder()
        .with_producer(Producer::new("low", |_: &String| true, |s: &String| format!("{s}-low")).with_priority(1))
        .with_producer(Producer::new("high", |_: &String| true, |s: &String| format!("{s}-high")).with_priority(100))
        .build()
        .unwrap();

    let recorder = Arc::new(RecordingCollector::new());
    let result = engine
        .evaluate(vec![FactRef::new("x".to_string())], None, Some(recorder.clone() as Arc<dyn rulecraft::EventCollector>))
        .unwrap();
    assert!(result.passed());

    let fired: Vec<String> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::RuleFired { rule_name, .. } => Some(rule_name),
            _ => None,
        })
        .collect();

    let high_pos = fired.iter().position(|r| r == "high").expect("high must fire");
    let low_pos = fired.iter().position(|r| r == "low").expect("low must fire");
    assert!(high_pos < low_pos);
}

// S6 (ordering, equal-priority tie-break) — declaration order wins when
// priority is tied.
#[test]
fn equal_priority_producers_fire_in_declaration_order() {
    let engine = Engine::builder()
        .with_producer(Producer::new("first", |_: &String| true, |s: &String| format!("{s}-first")))
        .with_producer(Producer::new("second", |_: &String| true, |s: &String| format!("{s}-second")))
        .build()
        .unwrap();

    let recorder = Arc::new(RecordingCollector::new());
    let result = engine
        .evaluate(vec![FactRef::new("x".to_string())], None, Some(recorder.clone() as Arc<dyn rulecraft::EventCollector>))
        .unwrap();
    assert!(result.passed());

    let fired: Vec<String> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::RuleFired { rule_name, .. } => Some(rule_name),
            _ => None,
        })
        .collect();

    let first_pos = fired.iter().position(|r| r == "first").expect("first must fire");
    let second_pos = fired.iter().position(|r| r == "second").expect("second must fire");
    assert!(first_pos < second_pos);
}

// Universal invariants (spec.md §8).
#[test]
fn completed_is_emitted_exactly_once_and_last() {
    let engine = Engine::builder().with_producer(vip_check()).build().unwrap();
    let recorder = Arc::new(RecordingCollector::new());

    engine
        .evaluate(
            vec![FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })],
            None,
            Some(recorder.clone() as Arc<dyn rulecraft::EventCollector>),
        )
        .unwrap();

    let events = recorder.events();
    let completed_count = events.iter().filter(|e| matches!(e, Event::Completed { .. })).count();
    assert_eq!(completed_count, 1);
    assert!(matches!(events.last(), Some(Event::Completed { .. })));
}

#[test]
fn trace_is_empty_when_tracing_disabled() {
    let engine = Engine::builder()
        .with_config(EngineConfig { max_iterations: 1_000, enable_tracing: false })
        .with_producer(vip_check())
        .build()
        .unwrap();

    let result = engine
        .evaluate(vec![FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })], None, None)
        .unwrap();
    assert!(result.trace.is_empty());
}

#[test]
fn repeated_evaluations_on_the_same_engine_are_independent() {
    let engine = Engine::builder().with_producer(vip_check()).build().unwrap();

    let first = engine
        .evaluate(vec![FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })], None, None)
        .unwrap();
    let second = engine
        .evaluate(vec![FactRef::new(Customer { id: "2".to_string(), spend: 20_000 })], None, None)
        .unwrap();

    assert!(!first.facts().contains(&FactRef::new(Customer { id: "2".to_string(), spend: 20_000 })));
    assert!(!second.facts().contains(&FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })));
}

#[test]
fn evaluating_the_same_inputs_twice_yields_equal_results() {
    let engine = Engine::builder()
        .with_producer(vip_check())
        .with_producer(Producer::new(
            "vip-discount",
            |v: &VipStatus| v.tier == "gold",
            |v: &VipStatus| Discount { id: v.id.clone(), percent: 20 },
        ))
        .build()
        .unwrap();

    let facts = vec![FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })];

    let first = engine.evaluate(facts.clone(), None, None).unwrap();
    let second = engine.evaluate(facts, None, None).unwrap();

    assert_eq!(first.facts(), second.facts());
    assert_eq!(first.derived(), second.derived());
    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.rule_activations, second.rule_activations);
    assert_eq!(first.iterations, second.iterations);
}

#[tokio::test]
async fn sync_and_async_evaluation_agree_for_engines_without_async_rules() {
    let engine = Engine::builder().with_producer(vip_check()).build().unwrap();
    let facts = vec![
        FactRef::new(Customer { id: "1".to_string(), spend: 15_000 }),
        FactRef::new(Customer { id: "2".to_string(), spend: 5_000 }),
    ];

    let sync_result = engine.evaluate(facts.clone(), None, None).unwrap();
    let async_result = engine.evaluate_async(facts, None, None).await.unwrap();

    assert_eq!(sync_result.facts(), async_result.facts());
    assert_eq!(sync_result.derived(), async_result.derived());
    assert_eq!(sync_result.verdict, async_result.verdict);
}

#[tokio::test]
async fn async_producer_falls_back_to_the_naive_loop() {
    let engine = Engine::builder()
        .with_producer(
            Producer::new("vip-check-async", |_: &Customer| true, |c: &Customer| {
                VipStatus { id: c.id.clone(), tier: "gold".to_string() }
            })
            .with_async_condition(|c: Customer| async move { c.spend > 10_000 }.boxed()),
        )
        .build()
        .unwrap();

    assert!(engine.has_async_rules());
    let facts = vec![FactRef::new(Customer { id: "1".to_string(), spend: 15_000 })];
    let result = engine.evaluate_async(facts, None, None).await.unwrap();

    assert_eq!(
        result.derived_of_type::<VipStatus>(),
        HashSet::from([VipStatus { id: "1".to_string(), tier: "gold".to_string() }])
    );
}
