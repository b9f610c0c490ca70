//! Property tests for the combo modifier and the meta store.

use std::collections::HashMap;

use harrow_combat::prelude::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Multiplier curve properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn linear_ramp_is_monotonic_and_capped(
        per_hit in 0.01f32..1.0,
        cap in 1.0f32..4.0,
        max_hits in 1u32..64,
    ) {
        let calc = LinearRampCalculator { per_hit, cap };
        let mut last = 0.0f32;
        for hits in 0..max_hits {
            let m = calc.multiplier(hits);
            prop_assert!(m >= last, "multiplier decreased at {hits}: {m} < {last}");
            prop_assert!(m <= cap + 1e-6, "multiplier exceeded cap at {hits}");
            last = m;
        }
        prop_assert!((calc.multiplier(0) - 1.0).abs() < 1e-6, "first hit is always x1.0");
    }
}

// ---------------------------------------------------------------------------
// Streak lifecycle against a model
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Drive the full pipeline with one combo hit per batch at randomized
    /// tick gaps and compare the persistent streak against a simple model:
    /// the streak resets whenever the idle gap exceeds the window.
    #[test]
    fn streak_matches_model_across_gaps(gaps in prop::collection::vec(1u64..100, 1..30)) {
        let window = ComboConfig::default().window_ticks;

        let mut world = World::new();
        register_combat_components(&mut world);
        let attacker = world.spawn();
        let target = world.spawn();
        // Large enough to never die, small enough that f32 subtraction of
        // multiplier-sized amounts stays exact.
        world.insert(target, Health::full(1.0e6)).unwrap();

        let mut pipeline = PipelineBuilder::new()
            .add_system(Box::new(SequenceModifier::with_defaults()))
            .build()
            .unwrap();

        let calc = LinearRampCalculator::default();
        let mut model_count: u32 = 0;
        let mut last_tick: u64 = 0;
        let mut tick: u64 = 0;
        let mut first = true;

        for gap in gaps {
            tick = if first { 0 } else { tick + gap };
            if !first && tick - last_tick > window {
                model_count = 0;
            }
            let expected_multiplier = calc.multiplier(model_count);
            model_count += 1;
            last_tick = tick;
            first = false;

            pipeline.set_tick(tick);
            let mut event =
                DamageEvent::new(Source::Entity { attacker }, "physical", 1.0, target);
            event.meta_mut().set(&COMBO_HIT, ComboHit { attacker });
            let receipt = pipeline.submit(&mut world, vec![event]).unwrap();

            prop_assert!(
                (receipt.total_applied - expected_multiplier).abs() < 1e-5,
                "tick {tick}: applied {} but model expects multiplier {expected_multiplier}",
                receipt.total_applied
            );
            let seq = world.get::<DamageSequence>(attacker).unwrap();
            prop_assert_eq!(seq.hit_count, model_count);
            prop_assert_eq!(seq.last_hit_tick, tick);
        }
    }
}

// ---------------------------------------------------------------------------
// MetaStore against a model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MetaOp {
    Set(usize, u64),
    Remove(usize),
}

fn meta_op_strategy() -> impl Strategy<Value = MetaOp> {
    prop_oneof![
        (0..4usize, any::<u64>()).prop_map(|(k, v)| MetaOp::Set(k, v)),
        (0..4usize).prop_map(MetaOp::Remove),
    ]
}

proptest! {
    #[test]
    fn meta_store_matches_model(ops in prop::collection::vec(meta_op_strategy(), 1..80)) {
        let keys: Vec<MetaKey<u64>> = (0..4)
            .map(|_| MetaKey::new("proptest_slot"))
            .collect();
        let mut store = MetaStore::new();
        let mut model: HashMap<usize, u64> = HashMap::new();

        for op in ops {
            match op {
                MetaOp::Set(k, v) => {
                    store.set(&keys[k], v);
                    model.insert(k, v);
                }
                MetaOp::Remove(k) => {
                    let removed = store.remove(&keys[k]);
                    prop_assert_eq!(removed, model.remove(&k));
                }
            }
            for (i, key) in keys.iter().enumerate() {
                prop_assert_eq!(store.get(key), model.get(&i));
                prop_assert_eq!(store.has(key), model.contains_key(&i));
            }
            prop_assert_eq!(store.len(), model.len());
        }
    }
}
