//! Plague scheduling.
//!
//! A plague starts when the year reaches `next_plague_year`, fixes its
//! affected set (a contiguous cluster seeded at a populous polity and grown
//! across the adjacency graph), and ends after the configured duration,
//! scheduling the next outbreak 600-700 years out.

use crate::events::WorldEvent;
use crate::state::World;
use std::collections::BTreeSet;

pub fn run_plague_phase(world: &mut World) {
    let year = world.year;
    if world.plague.active {
        let duration = world.config.disease.plague_duration_years;
        if year - world.plague.start_year >= duration {
            end_plague(world);
        } else if world.config.disease.recompute_membership_yearly {
            world.plague.affected = affected_cluster(world);
        }
        return;
    }
    if year >= world.plague.next_plague_year {
        start_plague(world);
    }
}

fn start_plague(world: &mut World) {
    world.plague.active = true;
    world.plague.start_year = world.year;
    world.plague.affected = affected_cluster(world);
    world.news.push(world.year, WorldEvent::PlagueStarted);
}

fn end_plague(world: &mut World) {
    world.plague.active = false;
    world.plague.affected.clear();
    let min = world.config.disease.plague_interval_min;
    let max = world.config.disease.plague_interval_max;
    let gap = world.rng.next_range_i32(min, max);
    world.plague.next_plague_year = world.year + gap;
    let deaths = world.plague.total_deaths;
    world.news.push(world.year, WorldEvent::PlagueEnded { deaths });
}

/// Membership: seed at the most populous living polity, spread across the
/// neighbor graph; isolated polities escape.
fn affected_cluster(world: &World) -> BTreeSet<usize> {
    let mut affected = BTreeSet::new();
    let seed = world
        .polities
        .iter()
        .filter(|p| p.alive() && p.population > 0)
        .max_by_key(|p| (p.population, std::cmp::Reverse(p.index)))
        .map(|p| p.index);
    let Some(seed) = seed else {
        return affected;
    };
    let mut frontier = vec![seed];
    affected.insert(seed);
    while let Some(current) = frontier.pop() {
        for neighbor in world.grid.sorted_neighbors(current) {
            if neighbor < world.polities.len()
                && world.polities[neighbor].alive()
                && affected.insert(neighbor)
            {
                frontier.push(neighbor);
            }
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;

    fn world_due_for_plague() -> World {
        let mut config = SimConfig::default();
        config.world.start_year = 0;
        let mut world = World::new(config, Terrain::uniform_land(20, 20, 3.0), 3);
        world.spawn_polity("A".into(), PolityType::Pacifist, CellPos::new(2, 2), 50_000);
        world.spawn_polity("B".into(), PolityType::Pacifist, CellPos::new(3, 2), 10_000);
        world.spawn_polity("C".into(), PolityType::Pacifist, CellPos::new(15, 15), 10_000);
        world.plague.next_plague_year = 0;
        world
    }

    #[test]
    fn plague_lasts_three_years_and_reschedules_far_out() {
        let mut world = world_due_for_plague();
        run_plague_phase(&mut world);
        assert!(world.plague.active);
        let start = world.plague.start_year;
        for offset in 1..=3 {
            world.year = start + offset;
            run_plague_phase(&mut world);
        }
        assert!(!world.plague.active);
        // Strictly more than 599 years out from the end year.
        assert!(world.plague.next_plague_year > world.year + 599);
        assert!(world.plague.next_plague_year <= world.year + 700);
    }

    #[test]
    fn membership_spreads_over_adjacency_only() {
        let mut world = world_due_for_plague();
        run_plague_phase(&mut world);
        // A and B border each other; C is isolated across the map.
        assert!(world.plague.affected.contains(&0));
        assert!(world.plague.affected.contains(&1));
        assert!(!world.plague.affected.contains(&2));
    }
}
