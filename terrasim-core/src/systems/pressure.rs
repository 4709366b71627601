//! Pressure vector and the policy step.
//!
//! Four scalar pressures summarize a polity's situation; the single largest
//! drives the cadenced policy step, which nudges the budget, tax and spend
//! knobs and may open a war.

use super::war;
use super::UpdateContext;
use crate::bounded::clamp01;
use crate::state::{Polity, Pressure, PressureVector};

/// A neighbor is a viable war target iff our power ratio clears the
/// opportunistic threshold, or the target is fragile and the ratio is close.
pub fn is_viable_target(polity: &Polity, target: usize, ctx: &UpdateContext) -> bool {
    let Some(view) = ctx.view(target) else {
        return false;
    };
    if !view.alive || view.population == 0 {
        return false;
    }
    let ratio = polity.power() / view.power.max(1e-9);
    let fragility = 0.6 * (1.0 - view.stability) + 0.4 * (1.0 - view.legitimacy);
    ratio > ctx.config.war.opportunistic_war_threshold || (fragility > 0.62 && ratio > 0.92)
}

/// Best viable target among adjacency-index neighbors, scored by power
/// ratio plus target fragility.
pub fn best_war_target(polity: &Polity, ctx: &UpdateContext) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for neighbor in ctx.grid.sorted_neighbors(polity.index) {
        if !is_viable_target(polity, neighbor, ctx) {
            continue;
        }
        let view = ctx.view(neighbor)?;
        let ratio = polity.power() / view.power.max(1e-9);
        let fragility = 0.6 * (1.0 - view.stability) + 0.4 * (1.0 - view.legitimacy);
        let predation = ctx.config.war.weak_state_predation_weight * fragility;
        let score = ratio + predation;
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((neighbor, score));
        }
    }
    best
}

pub fn compute_pressures(polity: &Polity, ctx: &UpdateContext) -> PressureVector {
    let neighbors = ctx.grid.sorted_neighbors(polity.index);

    // Survival: worst neighbor power ratio blended with border exposure.
    let our_power = polity.power().max(1e-9);
    let mut worst_ratio: f64 = 0.0;
    let mut total_contacts = 0u32;
    for &n in &neighbors {
        if let Some(view) = ctx.view(n) {
            if view.alive {
                worst_ratio = worst_ratio.max(view.power / our_power);
                total_contacts += ctx.grid.border_contacts(polity.index, n);
            }
        }
    }
    let threat = clamp01((worst_ratio - 1.0) / 1.5);
    let exposure = clamp01(total_contacts as f64 / (8.0 * polity.territory_len().max(1) as f64));
    let survival = clamp01(0.7 * threat + 0.3 * exposure);

    // Revenue: deficit, thin reserves, debt load, fiscal capacity gap.
    let income = polity.income_annual.max(1.0);
    let deficit = ((polity.expenses_annual - polity.income_annual) / income).max(0.0);
    let reserve_years = polity.gold / income;
    let reserve_short = clamp01(1.0 - reserve_years / 2.0);
    let debt_load = clamp01(polity.debt / (3.0 * income));
    let fiscal_gap = 1.0 - polity.fiscal_capacity;
    let revenue = clamp01(
        0.35 * clamp01(deficit) + 0.25 * reserve_short + 0.25 * debt_load + 0.15 * fiscal_gap,
    );

    let legitimacy = clamp01(0.7 * (1.0 - polity.legitimacy) + 0.3 * (1.0 - polity.stability));

    // Opportunity: frontier food plus half the best viable-target score.
    let frontier = frontier_food_score(polity, ctx);
    let viable = best_war_target(polity, ctx)
        .map(|(_, score)| clamp01(score / 3.0))
        .unwrap_or(0.0);
    let opportunity = clamp01(frontier + viable / 2.0);

    PressureVector {
        survival,
        revenue,
        legitimacy,
        opportunity,
    }
}

/// Mean desirability of unclaimed land just beyond the border, from a
/// bounded deterministic sample of territory cells.
fn frontier_food_score(polity: &Polity, ctx: &UpdateContext) -> f64 {
    const SAMPLE: usize = 64;
    if polity.territory_vec.is_empty() {
        return 0.0;
    }
    let own = ctx.grid.lock();
    let mut sum = 0.0;
    let mut count = 0;
    let stride = (polity.territory_vec.len() / SAMPLE).max(1);
    for pos in polity.territory_vec.iter().step_by(stride).take(SAMPLE) {
        for neighbor in pos.orthogonal() {
            if ctx.grid.terrain().is_land(neighbor)
                && ctx.grid.owner_locked(&own, neighbor) == crate::grid::UNCLAIMED
            {
                sum += ctx.grid.expansion_score(neighbor);
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        clamp01(sum / count as f64)
    }
}

/// Cadenced policy step: every 5 years below 25 known techs, every 2 above.
pub fn policy_step(polity: &mut Polity, ctx: &UpdateContext) {
    if ctx.year < polity.next_policy_year {
        return;
    }
    let interval = if polity.tech.known_count() >= 25 { 2 } else { 5 };
    polity.next_policy_year = ctx.year + interval;

    let pressures = polity.pressures;
    match pressures.dominant() {
        Pressure::Survival => {
            polity.budget.military += 0.08;
            polity.tax_rate.add(0.02);
            polity.treasury_spend_rate.add(0.10);
            // Emergency: a defensive war against the looming neighbor can
            // pre-empt a worse one.
            if pressures.survival > 0.85 && !polity.war.is_at_war {
                if let Some(threat) = strongest_threat(polity, ctx) {
                    war::try_declare(polity, threat, ctx);
                }
            }
        }
        Pressure::Revenue => {
            polity.tax_rate.add(0.03);
            polity.budget.admin += 0.05;
            polity.treasury_spend_rate.add(-0.10);
        }
        Pressure::Legitimacy => {
            polity.budget.health += 0.04;
            polity.budget.education += 0.04;
            polity.tax_rate.add(-0.02);
        }
        Pressure::Opportunity => {
            polity.budget.infra += 0.04;
            polity.budget.rnd += 0.02;
            let spare_gold = polity.gold > 0.5 * polity.income_annual.max(1.0);
            if spare_gold && !polity.war.is_at_war {
                if let Some((target, _)) = best_war_target(polity, ctx) {
                    war::try_declare(polity, target, ctx);
                }
            }
        }
    }
    polity.budget.normalize();
}

fn strongest_threat(polity: &Polity, ctx: &UpdateContext) -> Option<usize> {
    ctx.grid
        .sorted_neighbors(polity.index)
        .into_iter()
        .filter(|&n| ctx.view(n).is_some_and(|v| v.alive && v.population > 0))
        .max_by(|&a, &b| {
            let pa = ctx.view(a).map(|v| v.power).unwrap_or(0.0);
            let pb = ctx.view(b).map(|v| v.power).unwrap_or(0.0);
            pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PolityType;
    use crate::testing::{with_update_context, WorldBuilder};

    fn world() -> crate::state::World {
        WorldBuilder::flat(14, 3.0)
            .seed(43)
            .with_polity("Strong", PolityType::Warmonger, 5, 5, 200_000)
            .with_polity("Weak", PolityType::Pacifist, 6, 5, 5_000)
            .build()
    }

    #[test]
    fn weak_neighbors_are_viable_targets() {
        let world = world();
        let strong = world.polities[0].clone();
        let weak = world.polities[1].clone();
        with_update_context(&world, |ctx| {
            assert!(is_viable_target(&strong, 1, ctx));
            // The weak polity cannot view the strong one as prey.
            assert!(!is_viable_target(&weak, 0, ctx));
            let (target, _) = best_war_target(&strong, ctx).unwrap();
            assert_eq!(target, 1);
        });
    }

    #[test]
    fn fragile_near_peers_are_viable_too() {
        let mut world = world();
        world.polities[1].population = world.polities[0].population;
        world.polities[1].military_strength = world.polities[0].military_strength * 0.95;
        world.polities[1].stability = 0.1;
        world.polities[1].legitimacy = 0.1;
        let strong = world.polities[0].clone();
        with_update_context(&world, |ctx| {
            assert!(is_viable_target(&strong, 1, ctx));
        });
    }

    #[test]
    fn legitimacy_pressure_follows_the_blend() {
        let world = world();
        let mut polity = world.polities[0].clone();
        polity.legitimacy = 0.2;
        polity.stability = 0.4;
        with_update_context(&world, |ctx| {
            let pressures = compute_pressures(&polity, ctx);
            let expected = 0.7 * 0.8 + 0.3 * 0.6;
            assert!((pressures.legitimacy - expected).abs() < 1e-9);
        });
    }

    #[test]
    fn dominant_pressure_drives_the_policy_knobs() {
        let world = world();
        let mut polity = world.polities[0].clone();
        polity.pressures = crate::state::PressureVector {
            survival: 0.1,
            revenue: 0.9,
            legitimacy: 0.1,
            opportunity: 0.1,
        };
        polity.next_policy_year = world.year;
        let tax_before = polity.tax_rate.get();
        with_update_context(&world, |ctx| {
            policy_step(&mut polity, ctx);
        });
        assert!(polity.tax_rate.get() > tax_before);
        assert!(polity.next_policy_year > world.year);
        assert!((polity.budget.sum() - 1.0).abs() < 1e-9);
    }
}
