//! Regional polity structure and succession.

use super::UpdateContext;
use crate::bounded::clamp01;
use crate::events::WorldEvent;
use crate::rng::{deterministic_unit, salt};
use crate::state::{Leader, Polity, Region};

/// Lazily create regional sub-states and integrate local control,
/// grievance, elite power and the defection pressure.
pub fn update_regions(polity: &mut Polity, ctx: &UpdateContext) {
    let cfg = &ctx.config.polity;
    let wanted = (cfg.region_count_min + polity.territory_len() / 500)
        .clamp(cfg.region_count_min, cfg.region_count_max);
    while polity.regions.len() < wanted {
        let i = polity.regions.len();
        let n = wanted.max(1) as f64;
        polity.regions.push(Region {
            // Decreasing population shares, increasing distance penalty.
            population_share: (0.5f64).powi(i as i32 + 1),
            distance: (i as f64 + 1.0) / n,
            local_control: polity.avg_control,
            grievance: 0.1,
            elite_power: 0.3,
        });
    }
    if polity.regions.is_empty() {
        return;
    }

    let extraction = polity.tax_rate.get();
    let at_war = polity.war.is_at_war;
    let famine = polity.macros.famine_severity;
    let legitimacy = polity.legitimacy;
    let admin = polity.admin_capacity;
    let infra_share = polity.budget.infra;
    let avg_control = polity.avg_control;
    let far_penalty = cfg.far_region_penalty;

    let mut control_sum = 0.0;
    let mut share_sum = 0.0;
    let mut defection = 0.0;
    for region in &mut polity.regions {
        let target = clamp01(
            avg_control - far_penalty * region.distance + 0.35 * admin + 0.15 * infra_share,
        );
        region.local_control += 0.2 * (target - region.local_control);
        region.local_control = clamp01(region.local_control);

        let mut grievance_delta = 0.0;
        grievance_delta += 0.05 * (extraction - 0.15).max(0.0) / 0.30;
        grievance_delta += 0.04 * famine;
        if at_war {
            grievance_delta += 0.02;
        }
        grievance_delta -= 0.05 * legitimacy;
        grievance_delta -= 0.03 * region.local_control;
        region.grievance = clamp01(region.grievance + grievance_delta);

        region.elite_power = clamp01(
            region.elite_power + 0.03 * (region.grievance - 0.3) - 0.02 * region.local_control,
        );

        control_sum += region.local_control * region.population_share;
        share_sum += region.population_share;
        defection += region.population_share * region.grievance * region.elite_power;
    }
    if share_sum > 0.0 {
        polity.avg_control = clamp01(control_sum / share_sum);
        let raw = clamp01(defection / share_sum * cfg.elite_defection_sensitivity * 3.0);
        // Integrate toward the raw signal instead of jumping.
        polity.elite_defection_pressure =
            clamp01(polity.elite_defection_pressure + 0.25 * (raw - polity.elite_defection_pressure));
    }
}

/// Succession check at its scheduled cadence.
pub fn succession_check(polity: &mut Polity, ctx: &UpdateContext) {
    if ctx.year < polity.next_succession_year || polity.population == 0 {
        return;
    }
    let cfg = &ctx.config.polity;
    let income = polity.income_annual.max(1.0);
    let deficit = clamp01((polity.expenses_annual - polity.income_annual) / income);
    let famine = polity.macros.famine_severity;
    let fragility = clamp01(
        0.6 * polity.leader.age + 0.4 * (polity.leader.years_in_power / 40.0).min(1.0)
            - 0.3 * polity.leader.competence,
    );
    let risk = clamp01(
        0.30 * polity.elite_defection_pressure
            + 0.20 * (1.0 - polity.admin_capacity)
            + 0.15 * if polity.war.is_at_war { 1.0 } else { 0.0 }
            + 0.15 * famine
            + 0.10 * deficit
            + 0.10 * fragility,
    );

    let draw = deterministic_unit(ctx.seed, ctx.year, polity.index, 0, salt::SUCCESSION);
    let crisis = draw < risk;
    if crisis {
        polity.legitimacy = clamp01(polity.legitimacy - 0.15 * (0.5 + risk));
        polity.stability = clamp01(polity.stability - 0.12 * (0.5 + risk));
        polity.autonomy_pressure = clamp01(polity.autonomy_pressure + 0.10);
        polity.leader = Leader::generate(&mut polity.rng, true);
    } else {
        polity.leader = Leader::generate(&mut polity.rng, false);
        polity.legitimacy = clamp01(polity.legitimacy + 0.02);
    }
    ctx.effects
        .lock()
        .expect("effects lock poisoned")
        .news
        .push((ctx.year, WorldEvent::Succession {
            polity: polity.index,
            crisis,
        }));

    let span = (cfg.succession_interval_max - cfg.succession_interval_min).max(0);
    polity.next_succession_year =
        ctx.year + cfg.succession_interval_min + polity.rng.next_range_i32(0, span);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PolityType;
    use crate::testing::{with_update_context, WorldBuilder};

    fn world() -> crate::state::World {
        WorldBuilder::flat(14, 3.0)
            .seed(47)
            .with_polity("A", PolityType::Trader, 5, 5, 40_000)
            .build()
    }

    #[test]
    fn regions_are_created_lazily_and_far_ones_slip() {
        let world = world();
        let mut polity = world.polities[0].clone();
        with_update_context(&world, |ctx| {
            for _ in 0..40 {
                update_regions(&mut polity, ctx);
            }
        });
        assert!(polity.regions.len() >= ctx_min(&world));
        let first = polity.regions.first().unwrap().local_control;
        let last = polity.regions.last().unwrap().local_control;
        assert!(first >= last, "near region {first} vs far {last}");
    }

    fn ctx_min(world: &crate::state::World) -> usize {
        world.config.polity.region_count_min
    }

    #[test]
    fn succession_reschedules_and_replaces_the_leader() {
        let mut world = world();
        world.year = world.polities[0].next_succession_year;
        let mut polity = world.polities[0].clone();
        let old_competence = polity.leader.competence;
        let old_years = polity.leader.years_in_power;
        polity.leader.years_in_power = 30.0;
        with_update_context(&world, |ctx| {
            succession_check(&mut polity, ctx);
        });
        assert!(polity.next_succession_year > world.year);
        // A fresh leader starts from zero tenure.
        assert_eq!(polity.leader.years_in_power, 0.0);
        let _ = (old_competence, old_years);
    }

    #[test]
    fn succession_waits_for_its_year() {
        let world = world();
        let mut polity = world.polities[0].clone();
        polity.next_succession_year = world.year + 10;
        polity.leader.years_in_power = 5.0;
        with_update_context(&world, |ctx| {
            succession_check(&mut polity, ctx);
        });
        assert_eq!(polity.leader.years_in_power, 5.0);
    }
}
