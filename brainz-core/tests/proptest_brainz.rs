//! Property-Based Tests for BRAINZ Core
//!
//! Uses `proptest` to check the engine's structural invariants under random
//! inputs: influence never overshoots, stats never leave their range, memory
//! stores never exceed capacity, interactables never overbook, and a fixed
//! seed reproduces a simulation exactly.

use proptest::prelude::*;

use brainz_core::config::{BrainzConfig, GeneralConfig, MemoryConfig};
use brainz_core::memory::{Memory, MemoryStore};
use brainz_core::{
    AgentArchetype, AgentId, BehaviorSpec, Influencer, InfluencerTemplate, InstantHost, Interactable, InteractableId,
    InteractableSpec, Location, SimTime, SourceId, Stat, World,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_memory() -> impl Strategy<Value = (u32, usize, f32, f64, f32)> {
    (
        0..4u32,        // subject
        0..3usize,      // stat
        -50.0..50.0f32, // influence
        0.0..5.0f64,    // time advance
        0.0..10.0f32,   // cooldown
    )
}

const STATS: [&str; 3] = ["hunger", "energy", "mood"];

// ---------------------------------------------------------------------------
// Property: an influencer never applies more than its max change, and lands
// all of it once its duration has passed
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn influence_is_bounded(
        max_change in -100.0..100.0f32,
        duration in 0.0..20.0f32,
        steps in prop::collection::vec(0.0..3.0f64, 0..40),
    ) {
        let template = InfluencerTemplate::ramped("hunger", max_change, duration);
        let mut influencer = Influencer::from_template(
            &template,
            "eat",
            SourceId::Interactable(InteractableId(0)),
            SimTime::ZERO,
        );

        let mut now = 0.0;
        for dt in steps {
            now += dt;
            influencer.step(SimTime::from_secs(now));
            prop_assert!(influencer.applied().abs() <= max_change.abs() + 1e-4);
        }

        influencer.step(SimTime::from_secs(now + f64::from(duration) + 1.0));
        prop_assert!((influencer.applied() - max_change).abs() <= 1e-3);
        prop_assert!(influencer.is_exhausted());
    }
}

// ---------------------------------------------------------------------------
// Property: stat values stay inside [min, max]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn stat_values_stay_in_range(
        min in -100.0..0.0f32,
        span in 1.0..200.0f32,
        initial in -500.0..500.0f32,
        deltas in prop::collection::vec(-500.0..500.0f32, 0..30),
    ) {
        let max = min + span;
        let mut stat = Stat::new("energy", min, max, initial).expect("min below max");
        prop_assert!(stat.value() >= min && stat.value() <= max);
        for delta in deltas {
            stat.apply(delta);
            prop_assert!(stat.value() >= min && stat.value() <= max);
            prop_assert!((0.0..=1.0).contains(&stat.normalized()));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: memory stores never exceed their capacities
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn memory_store_respects_capacity(
        short_term_capacity in 0..8usize,
        long_term_capacity in 0..4usize,
        promotion_threshold in 20.0..200.0f32,
        seed in any::<u64>(),
        inserts in prop::collection::vec(arb_memory(), 1..60),
    ) {
        let config = MemoryConfig {
            short_term_capacity,
            long_term_capacity,
            promotion_threshold,
            ..MemoryConfig::default()
        };
        let mut store = MemoryStore::new(config, seed);
        let mut now = 0.0;
        for (subject, stat, influence, dt, cooldown) in inserts {
            now += dt;
            store.add_memory(Memory::new(
                Some(SourceId::Agent(AgentId(subject))),
                Location::default(),
                STATS[stat],
                influence,
                influence < 0.0,
                SimTime::from_secs(now),
                cooldown,
            ));
            prop_assert!(store.short_term().len() <= short_term_capacity);
            prop_assert!(store.long_term().len() <= long_term_capacity);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: reservations plus users never exceed capacity
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reservations_never_overbook(
        capacity in 1..5usize,
        ops in prop::collection::vec((0..8u32, any::<bool>()), 0..50),
    ) {
        let spec = InteractableSpec {
            max_concurrent_users: capacity,
            ..InteractableSpec::named("bench")
        };
        let mut bench = Interactable::new(InteractableId(0), spec, Location::default()).expect("valid");
        for (agent, reserve) in ops {
            let agent = AgentId(agent);
            if reserve {
                let expected = bench.is_reserved_by(agent) || bench.has_space();
                prop_assert_eq!(bench.reserve_for(agent), expected);
            } else {
                bench.clear_reservation(agent);
            }
            prop_assert!(bench.occupancy() <= capacity);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the same seed reproduces the same decisions
// ---------------------------------------------------------------------------

fn noisy_world(seed: u64) -> World {
    let config = BrainzConfig {
        general: GeneralConfig {
            seed,
            ..GeneralConfig::default()
        },
        ..BrainzConfig::default()
    };
    let specs: Vec<BehaviorSpec> = ["dig", "nap", "roam"]
        .iter()
        .map(|name| {
            let mut spec = BehaviorSpec::solitary(*name);
            spec.variation = 0.5;
            spec.maximum_execution_time = 1.0;
            spec
        })
        .collect();
    let archetype = AgentArchetype {
        name: "mole".into(),
        behaviors: vec!["dig".into(), "nap".into(), "roam".into()],
        ..AgentArchetype::default()
    };
    let mut world = World::new(config);
    for n in 0..3u8 {
        world
            .add_agent(format!("mole{n}"), &archetype, &specs, Location::new(f32::from(n), 0.0, 0.0))
            .expect("valid");
    }
    world
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn fixed_seed_reproduces_decisions(seed in any::<u64>()) {
        let mut first = noisy_world(seed);
        let mut second = noisy_world(seed);
        for step in 0..40u32 {
            let now = SimTime::from_secs(f64::from(step) * 0.25);
            let a = first.tick(now, &mut InstantHost);
            let b = second.tick(now, &mut InstantHost);
            prop_assert_eq!(a, b);
        }
    }
}
