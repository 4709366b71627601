//! Culture and institutions tick.
//!
//! Cultural traits diffuse across borders and trade links, pulling neighbors
//! toward each other at contact-weighted rates; the institution adoption
//! cadence converts literacy-era techs plus administrative spending into
//! institution capacity every five years.

use crate::bounded::clamp01;
use crate::state::{World, TRAITS};
use crate::tech::tech_id;
use tracing::instrument;

const TRAIT_DIFFUSION_RATE: f64 = 0.012;
const INSTITUTION_CADENCE: i32 = 5;

#[instrument(skip_all, name = "culture_tick")]
pub fn run_culture_tick(world: &mut World, dt_years: i32) {
    let dt = dt_years.max(1) as f64;
    trait_diffusion(world, dt);
    if world.year.rem_euclid(INSTITUTION_CADENCE) == 0 {
        institution_adoption(world);
    }
}

fn trait_diffusion(world: &mut World, dt: f64) {
    let n = world.polities.len();
    let mut delta = vec![[0.0f64; TRAITS]; n];

    let pull = |world: &World, delta: &mut Vec<[f64; TRAITS]>, a: usize, b: usize, w: f64| {
        if w <= 0.0 {
            return;
        }
        let pa = &world.polities[a];
        let pb = &world.polities[b];
        let openness = 0.5
            * (pa.traits[crate::state::TRAIT_OPENNESS] + pb.traits[crate::state::TRAIT_OPENNESS]);
        let rate = TRAIT_DIFFUSION_RATE * clamp01(w) * (0.3 + 0.7 * openness) * dt;
        for t in 0..TRAITS {
            let gap = pb.traits[t] - pa.traits[t];
            delta[a][t] += rate * gap;
            delta[b][t] -= rate * gap;
        }
    };

    for a in 0..n {
        if world.polities[a].population <= 0 {
            continue;
        }
        for b in world.grid.sorted_neighbors(a) {
            if b <= a || b >= n || world.polities[b].population <= 0 {
                continue;
            }
            let contact = world.grid.border_contacts(a, b);
            let w = clamp01((contact as f64).ln_1p() / 5.0);
            pull(world, &mut delta, a, b, w);
        }
        for b in (a + 1)..n {
            if world.polities[b].population <= 0 {
                continue;
            }
            let w = world.trade.intensity(a, b) as f64;
            if w > 0.001 {
                pull(world, &mut delta, a, b, 0.6 * w);
            }
        }
    }

    for (polity, d) in world.polities.iter_mut().zip(delta) {
        for t in 0..TRAITS {
            polity.traits[t] = clamp01(polity.traits[t] + d[t]);
        }
    }
}

/// Institutions accrete where the enabling techs are adopted and the budget
/// actually funds administration and schooling.
fn institution_adoption(world: &mut World) {
    let threshold = world.config.tech.adoption_threshold;
    let tech_mgr = &world.tech;
    for polity in &mut world.polities {
        if polity.dead || polity.population == 0 {
            continue;
        }
        let mut gain = 0.0;
        if tech_mgr.is_unlocked(&polity.tech, tech_id::WRITING, threshold) {
            gain += 0.010;
        }
        if tech_mgr.is_unlocked(&polity.tech, tech_id::CURRENCY, threshold) {
            gain += 0.008;
        }
        if tech_mgr.is_unlocked(&polity.tech, tech_id::CIVIL_SERVICE, threshold) {
            gain += 0.014;
        }
        if tech_mgr.is_unlocked(&polity.tech, tech_id::BANKING, threshold) {
            gain += 0.008;
        }
        if tech_mgr.is_unlocked(&polity.tech, tech_id::PRINTING_PRESS, threshold) {
            gain += 0.008;
        }
        gain *= 0.5 + polity.budget.admin + polity.budget.education;
        gain *= 0.5 + 0.5 * polity.stability;
        polity.macros.institution_capacity =
            clamp01(polity.macros.institution_capacity + gain - 0.002);

        // Fragmentation eases as one institutional frame spreads.
        polity.macros.competition_fragmentation = clamp01(
            polity.macros.competition_fragmentation
                - 0.01 * polity.macros.institution_capacity
                + 0.004,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;

    #[test]
    fn bordering_polities_converge_culturally() {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(16, 16, 3.0), 17);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(4, 4), 10_000);
        world.spawn_polity("B".into(), PolityType::Trader, CellPos::new(5, 4), 10_000);
        world.polities[0].traits = [0.9; TRAITS];
        world.polities[1].traits = [0.1; TRAITS];
        let before = (world.polities[0].traits[0] - world.polities[1].traits[0]).abs();
        for year in 0..200 {
            world.year = year;
            run_culture_tick(&mut world, 1);
        }
        let after = (world.polities[0].traits[0] - world.polities[1].traits[0]).abs();
        assert!(after < before * 0.8, "distance {after} did not shrink from {before}");
    }

    #[test]
    fn institutions_need_both_tech_and_budget() {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(16, 16, 3.0), 17);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(4, 4), 10_000);
        let ids = [tech_id::WRITING, tech_id::CURRENCY, tech_id::CIVIL_SERVICE];
        let threshold = world.config.tech.adoption_threshold;
        let bonuses = world
            .tech
            .set_unlocked(&mut world.polities[0].tech, &ids, true, threshold);
        world.polities[0].bonuses = bonuses;
        let before = world.polities[0].macros.institution_capacity;
        world.year = 5;
        run_culture_tick(&mut world, 1);
        assert!(world.polities[0].macros.institution_capacity > before);
    }
}
