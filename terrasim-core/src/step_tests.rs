//! Cross-system pipeline tests: the full year tick, replay determinism, and
//! the end-to-end scenarios the engine is specified against.

use crate::config::SimConfig;
use crate::grid::{CellPos, ResourceKind, Terrain};
use crate::snapshot::Snapshot;
use crate::state::{PolityType, WarGoal, World};
use crate::step::advance_year;
use crate::systems::knowledge::run_knowledge_tick;
use crate::systems::war;
use crate::tech::tech_id;
use crate::testing::WorldBuilder;

/// Terrain whose biome supports plant and herd domestication everywhere.
fn fertile_terrain(size: i32, food: f32) -> Terrain {
    let cells = (size * size) as usize;
    Terrain::new(
        size,
        size,
        vec![true; cells],
        vec![food; cells],
        vec![ResourceKind::None; cells],
        vec![4; cells],
    )
}

fn no_plague(config: &mut SimConfig) {
    config.disease.plague_interval_min = 1_000_000;
    config.disease.plague_interval_max = 1_000_001;
}

#[test]
fn replay_from_scratch_is_bit_identical() {
    let build = || {
        WorldBuilder::flat(24, 3.0)
            .seed(7)
            .configure(no_plague)
            .with_polity("Alpha", PolityType::Trader, 4, 4, 8_000)
            .with_polity("Beta", PolityType::Warmonger, 18, 18, 8_000)
            .with_polity("Gamma", PolityType::Pacifist, 4, 18, 8_000)
            .build()
    };

    let mut split_run = build();
    for _ in 0..10 {
        advance_year(&mut split_run);
    }
    // Taking a snapshot must not perturb the run.
    let _mid = Snapshot::capture(&split_run);
    for _ in 0..10 {
        advance_year(&mut split_run);
    }

    let mut straight_run = build();
    for _ in 0..20 {
        advance_year(&mut straight_run);
    }

    let a = Snapshot::capture(&split_run);
    let b = Snapshot::capture(&straight_run);
    assert!(a.matches(&b).unwrap(), "replay diverged");
    assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
}

#[test]
fn invariants_hold_through_a_long_mixed_run() {
    let mut world = WorldBuilder::flat(28, 4.0)
        .seed(99)
        .with_polity("Alpha", PolityType::Warmonger, 5, 5, 60_000)
        .with_polity("Beta", PolityType::Trader, 22, 5, 20_000)
        .with_polity("Gamma", PolityType::Pacifist, 5, 22, 20_000)
        .with_polity("Delta", PolityType::Trader, 22, 22, 20_000)
        .build();
    for _ in 0..300 {
        advance_year(&mut world);
        world.check_invariants().unwrap();
    }
    assert!(world.grid.verify_adjacency());
    // Something actually happened in three centuries.
    assert!(world.polities.iter().any(|p| p.territory_len() > 10));
    assert!(world
        .polities
        .iter()
        .any(|p| p.knowledge.iter().sum::<f64>() > 0.0));
}

/// A capable society with deep domain knowledge discovers the earliest
/// craft technology almost immediately.
#[test]
fn discovery_triggers_once_knowledge_clears_the_threshold() {
    let mut world = WorldBuilder::flat(12, 3.0)
        .seed(29)
        .configure(no_plague)
        .with_polity("Workshop", PolityType::Trader, 5, 5, 100_000)
        .build();
    {
        let polity = &mut world.polities[0];
        polity.knowledge[1] = 1_000.0; // materials domain, far past tech 100
        polity.macros.specialization = 0.5;
        polity.macros.institution_capacity = 0.7;
        polity.stability = 0.7;
        polity.legitimacy = 0.7;
        polity.macros.connectivity = 0.6;
        polity.traits[crate::state::TRAIT_OPENNESS] = 0.8;
        polity.macros.idea_market_integration = 0.5;
        polity.macros.media_throughput = 0.5;
        polity.macros.credible_commitment = 0.5;
    }
    for _ in 0..50 {
        run_knowledge_tick(&mut world, 1);
        world.year += 1;
    }
    let polity = &world.polities[0];
    assert!(world.tech.knows(&polity.tech, 100), "Cordage never discovered");
    assert!(world.tech.adoption(&polity.tech, 100) > 0.0);
}

/// Scenario: two pacifists on an open map partition all the land between
/// them and end up as border neighbors.
#[test]
fn two_pacifists_partition_the_map() {
    let mut world = WorldBuilder::flat(40, 5.0)
        .seed(11)
        .configure(|config| {
            no_plague(config);
            config.war.max_concurrent_wars = 0; // wars disabled outright
        })
        .with_polity("West", PolityType::Pacifist, 5, 5, 20_000)
        .with_polity("East", PolityType::Pacifist, 35, 35, 20_000)
        .build();
    for polity in &mut world.polities {
        polity.admin_capacity = 0.5;
        polity.logistics_reach = 0.5;
    }

    for _ in 0..500 {
        advance_year(&mut world);
    }

    let total: usize = world.polities.iter().map(|p| p.territory_len()).sum();
    assert_eq!(total, 40 * 40, "map not fully partitioned");
    for y in 0..40 {
        for x in 0..40 {
            assert!(world.grid.owner(CellPos::new(x, y)) >= 0);
        }
    }
    assert!(world.polities[0].territory_len() > 0);
    assert!(world.polities[1].territory_len() > 0);
    assert!(world.grid.border_contacts(0, 1) >= 1);
    assert!(!world.polities[0].war.is_at_war && !world.polities[1].war.is_at_war);
    world.check_invariants().unwrap();
}

/// Scenario: logistic recovery to carrying capacity on a small island.
#[test]
#[ignore = "long-running scenario; exercised in CI's slow suite"]
fn logistic_population_approaches_island_capacity() {
    let mut world = WorldBuilder::flat(10, 5.0)
        .seed(3)
        .configure(|config| {
            no_plague(config);
            config.tech.discovery_base = 0.0; // keep r and K fixed
        })
        .with_polity("Island", PolityType::Pacifist, 5, 5, 10_000)
        .build();

    for _ in 0..35_000 {
        advance_year(&mut world);
    }
    let polity = &world.polities[0];
    assert_eq!(polity.territory_len(), 100);
    let k = crate::systems::demography::carrying_capacity(
        polity,
        &world.tech,
        world.config.tech.adoption_threshold,
    );
    let gap = (polity.population as f64 - k).abs() / k;
    assert!(gap < 0.02, "population {} vs capacity {k}", polity.population);
}

/// Scenario: a war of conquest dismantles a much weaker neighbor, with
/// bilateral enemy links symmetric throughout.
#[test]
fn war_of_conquest_captures_the_weak() {
    let mut world = WorldBuilder::flat(30, 3.0)
        .seed(23)
        .configure(no_plague)
        .with_polity("Hammer", PolityType::Warmonger, 10, 10, 100_000)
        .with_polity("Anvil", PolityType::Pacifist, 19, 10, 10_000)
        .build();
    for (polity, center) in [(0usize, CellPos::new(10, 10)), (1, CellPos::new(19, 10))] {
        let painted = world.grid.paint_cells(polity, center, 4, false, false);
        world.sync_territories(&painted.changed);
    }
    world.check_invariants().unwrap();
    let attacker_initial = world.polities[0].territory_len();
    let defender_initial = world.polities[1].territory_len();
    assert!(world.grid.are_neighbors(0, 1));

    assert!(war::start_war(&mut world, 0, 1, Some(WarGoal::BorderShift)));
    for _ in 0..20 {
        advance_year(&mut world);
        let a_knows_b = world.polities[0].war.enemies.contains(&1);
        let b_knows_a = world.polities[1].war.enemies.contains(&0);
        assert_eq!(a_knows_b, b_knows_a, "enemy links must stay symmetric");
    }

    let defender = &world.polities[1];
    assert!(
        defender.dead || defender.territory_len() < defender_initial / 2,
        "defender survived with {} of {defender_initial} cells",
        defender.territory_len()
    );
    assert!(world.polities[0].territory_len() > attacker_initial);
    world.check_invariants().unwrap();
}

/// Scenario: a fully adopted technology crosses a long land border and
/// reaches unlock in the neighbor within a century.
#[test]
fn tech_diffusion_across_border() {
    let mut world = World::new(
        {
            let mut config = SimConfig::default();
            no_plague(&mut config);
            config
        },
        fertile_terrain(20, 5.0),
        51,
    );
    world.spawn_polity("Mentor".into(), PolityType::Trader, CellPos::new(4, 5), 50_000);
    world.spawn_polity("Student".into(), PolityType::Trader, CellPos::new(4, 6), 50_000);
    for x in 0..10 {
        for (polity, y) in [(0usize, 5), (1usize, 6)] {
            let pos = CellPos::new(x, y);
            if world.grid.set_owner(pos, polity as i32).is_some() {
                world.polities[polity].add_cell(pos);
            }
        }
    }
    assert!(world.grid.border_contacts(0, 1) >= 10);

    let threshold = world.config.tech.adoption_threshold;
    let mentor_bonus =
        world
            .tech
            .set_unlocked(&mut world.polities[0].tech, &[tech_id::AGRICULTURE], true, threshold);
    world.polities[0].bonuses = mentor_bonus;
    let student_bonus =
        world
            .tech
            .set_unlocked(&mut world.polities[1].tech, &[112, 113], true, threshold);
    world.polities[1].bonuses = student_bonus;

    let traits = world.polities[0].traits;
    for polity in &mut world.polities {
        polity.traits = traits;
        polity.traits[crate::state::TRAIT_OPENNESS] = 0.8;
        polity.macros.idea_market_integration = 0.5;
        polity.macros.media_throughput = 0.5;
        polity.macros.connectivity = 0.5;
        polity.macros.institution_capacity = 0.6;
        polity.macros.specialization = 0.3;
        polity.macros.market_access = 0.6;
        polity.macros.credible_commitment = 0.5;
    }

    for _ in 0..100 {
        run_knowledge_tick(&mut world, 1);
        world.year += 1;
    }

    let student = &world.polities[1];
    let adoption = world.tech.adoption(&student.tech, tech_id::AGRICULTURE);
    assert!(
        adoption >= 0.65,
        "student adoption of Agriculture stuck at {adoption}"
    );
    let unlocked = world.tech.unlocked_ids(&student.tech, threshold);
    assert!(unlocked.contains(&tech_id::AGRICULTURE));
}

/// Scenario: a tiny isolated society with a dead practice usually forgets
/// it outright within a century.
#[test]
fn rare_forgetting_clears_dead_knowledge() {
    let mut kept = 0;
    let runs = 16;
    for seed in 0..runs {
        let mut world = WorldBuilder::flat(8, 1.0)
            .seed(1000 + seed)
            .configure(|config| {
                no_plague(config);
                config.tech.discovery_base = 0.0;
                config.tech.known_diffusion_base = 0.0;
            })
            .with_polity("Hamlet", PolityType::Pacifist, 4, 4, 400)
            .build();
        let dense = world.tech.dense_index(tech_id::POTTERY).unwrap();
        {
            let polity = &mut world.polities[0];
            polity.tech.ensure_size(world.tech.count());
            polity.tech.known.set(dense, true);
            polity.macros.connectivity = 0.05;
        }
        for _ in 0..100 {
            run_knowledge_tick(&mut world, 1);
            world.year += 1;
        }
        if world.polities[0].tech.known.get(dense) {
            kept += 1;
        }
    }
    // Keep probability per run is under 5%; 4+ keeps of 16 would be wild.
    assert!(kept <= 3, "{kept} of {runs} runs still knew the tech");
}

/// Scenario: an annihilation war ends in full absorption of the loser.
#[test]
fn annihilation_absorbs_the_target() {
    let mut world = WorldBuilder::flat(40, 3.0)
        .seed(67)
        .configure(no_plague)
        .with_polity("Colossus", PolityType::Warmonger, 10, 10, 500_000)
        .with_polity("Remnant", PolityType::Pacifist, 30, 10, 40_000)
        .build();
    let painted = world.grid.paint_cells(0, CellPos::new(10, 10), 12, false, false);
    world.sync_territories(&painted.changed);
    let painted = world.grid.paint_cells(1, CellPos::new(30, 10), 5, false, false);
    world.sync_territories(&painted.changed);
    world.polities[1].gold = 2_500.0;
    let defender_cells: Vec<CellPos> = world.polities[1].territory_vec.clone();
    let loot = world.polities[1].gold * 0.80;
    let attacker_gold_before = world.polities[0].gold;

    assert!(war::start_war(&mut world, 0, 1, Some(WarGoal::Annihilation)));
    let mut absorbed_at = None;
    for tick in 0..40 {
        advance_year(&mut world);
        if world.polities[1].dead {
            absorbed_at = Some(tick);
            break;
        }
    }
    assert!(absorbed_at.is_some(), "war never resolved in absorption");

    let loser = &world.polities[1];
    assert_eq!(loser.population, 0);
    assert_eq!(loser.territory_len(), 0);
    assert!(loser.war.enemies.is_empty());
    for pos in defender_cells {
        assert_eq!(world.grid.owner(pos), 0);
        assert!(world.polities[0].territory_set.contains(&pos));
    }
    assert!(
        world.polities[0].gold >= attacker_gold_before + loot * 0.99,
        "attacker gold {} missing the seized {loot}",
        world.polities[0].gold
    );
    world.check_invariants().unwrap();
}

/// Boundary: yearly territorial growth in peacetime respects the cap.
#[test]
fn peacetime_growth_respects_the_cap() {
    let mut world = WorldBuilder::flat(40, 8.0)
        .seed(5)
        .configure(no_plague)
        .with_polity("Sprawl", PolityType::Pacifist, 20, 20, 200_000)
        .build();
    world.polities[0].admin_capacity = 0.9;
    world.polities[0].logistics_reach = 0.9;
    let cap = world.config.polity.expansion_cell_cap;
    for _ in 0..30 {
        let before = world.polities[0].territory_len();
        advance_year(&mut world);
        let gained = world.polities[0].territory_len() - before;
        assert!(gained <= cap, "gained {gained} cells in one year");
    }
}

/// Fast-forward keeps invariants and stays silent in the news feed.
#[test]
fn fast_forward_holds_invariants_quietly() {
    let mut world = WorldBuilder::flat(20, 3.0)
        .seed(13)
        .with_polity("Alpha", PolityType::Trader, 4, 4, 10_000)
        .with_polity("Beta", PolityType::Pacifist, 15, 15, 10_000)
        .build();
    let logged_before = world.news.len();
    crate::step::fast_forward(&mut world, 100);
    assert_eq!(world.news.len(), logged_before);
    assert!(!world.news.suppressed);
    world.check_invariants().unwrap();
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any seed and spawn layout keeps the universal invariants through
        /// a few decades of simulation.
        #[test]
        fn short_runs_keep_invariants(
            seed in 0u64..5_000,
            ax in 1i32..7, ay in 1i32..7,
            bx in 9i32..15, by in 9i32..15,
        ) {
            let mut world = WorldBuilder::flat(16, 3.0)
                .seed(seed)
                .with_polity("A", PolityType::Warmonger, ax, ay, 30_000)
                .with_polity("B", PolityType::Trader, bx, by, 12_000)
                .build();
            for _ in 0..40 {
                advance_year(&mut world);
            }
            prop_assert!(world.check_invariants().is_ok());
            prop_assert!(world.grid.verify_adjacency());
        }

        /// Painting and erasing the same disk restores the contact matrix.
        #[test]
        fn paint_erase_round_trips(
            seed in 0u64..1_000,
            cx in 4i32..12, cy in 4i32..12,
            radius in 1i32..4,
        ) {
            let world = WorldBuilder::flat(16, 3.0)
                .seed(seed)
                .with_polity("A", PolityType::Trader, 1, 1, 5_000)
                .with_polity("B", PolityType::Trader, 14, 14, 5_000)
                .build();
            let before = Snapshot::capture(&world).contacts;
            let painted = world.grid.paint_cells(0, CellPos::new(cx, cy), radius, false, false);
            let erased = world.grid.paint_cells(0, CellPos::new(cx, cy), radius, true, false);
            prop_assert_eq!(painted.changed.len(), erased.changed.len());
            let after = Snapshot::capture(&world).contacts;
            prop_assert_eq!(before, after);
            prop_assert!(world.grid.verify_adjacency());
        }
    }
}
