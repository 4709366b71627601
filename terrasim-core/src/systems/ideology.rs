//! Ideology transitions, checked every 25 years.
//!
//! Possible transitions gate on population, institutions, control and
//! specific techs; among the open doors, a deterministic weighted draw
//! biased by the leader and the polity type decides.

use super::UpdateContext;
use crate::events::WorldEvent;
use crate::rng::{deterministic_unit, salt};
use crate::state::{Ideology, Polity, PolityType};
use crate::tech::tech_id;

const CHECK_INTERVAL: i32 = 25;

pub fn ideology_check(polity: &mut Polity, ctx: &UpdateContext) {
    if polity.population == 0 {
        return;
    }
    let age = ctx.year - polity.founding_year;
    if age <= 0 || age % CHECK_INTERVAL != 0 {
        return;
    }

    let candidates = transition_candidates(polity, ctx);
    if candidates.is_empty() {
        return;
    }
    let total: f64 = candidates.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return;
    }
    // The no-change outcome keeps the same weight as the strongest door, so
    // transitions stay occasional rather than metronomic.
    let stay = candidates
        .iter()
        .map(|(_, w)| *w)
        .fold(0.0f64, f64::max);
    let draw =
        deterministic_unit(ctx.seed, ctx.year, polity.index, 0, salt::IDEOLOGY) * (total + stay);
    let mut acc = 0.0;
    for (ideology, weight) in candidates {
        acc += weight;
        if draw < acc {
            polity.ideology = ideology;
            if ideology.holds_elections() {
                polity.next_election_year = Some(ctx.year + polity.rng.next_range_i32(4, 8));
            } else {
                polity.next_election_year = None;
            }
            ctx.effects
                .lock()
                .expect("effects lock poisoned")
                .news
                .push((ctx.year, WorldEvent::IdeologyChanged {
                    polity: polity.index,
                    ideology: ideology.label().to_string(),
                }));
            return;
        }
    }
}

fn transition_candidates(polity: &Polity, ctx: &UpdateContext) -> Vec<(Ideology, f64)> {
    let mut out = Vec::new();
    let threshold = ctx.config.tech.adoption_threshold;
    let unlocked = |id: u32| ctx.tech.is_unlocked(&polity.tech, id, threshold);
    let institution = polity.macros.institution_capacity;
    let leader = &polity.leader;
    let warlike = matches!(polity.kind, PolityType::Warmonger);
    let mercantile = matches!(polity.kind, PolityType::Trader);

    match polity.ideology {
        Ideology::Tribal => {
            if polity.population >= 5_000 && institution >= 0.08 {
                out.push((Ideology::Chiefdom, 1.0));
            }
        }
        Ideology::Chiefdom => {
            if polity.population >= 50_000 && unlocked(tech_id::WRITING) && polity.avg_control >= 0.3
            {
                out.push((Ideology::Kingdom, 1.0 + 0.5 * leader.ambition));
            }
            if polity.macros.urbanization > 0.25 && polity.population < 80_000 {
                out.push((Ideology::CityState, 0.6 + if mercantile { 0.6 } else { 0.0 }));
            }
        }
        Ideology::Kingdom => {
            if polity.population >= 500_000
                && polity.territory_len() >= 1_000
                && unlocked(tech_id::CIVIL_SERVICE)
            {
                out.push((
                    Ideology::Empire,
                    1.0 + leader.ambition + if warlike { 0.5 } else { 0.0 },
                ));
            }
            if unlocked(tech_id::CURRENCY) && institution >= 0.5 && unlocked(22) {
                out.push((Ideology::Republic, 0.6 + leader.reformism));
            }
            if polity.elites[crate::state::ELITE_RITUAL].influence > 0.5 {
                out.push((Ideology::Theocracy, 0.4));
            }
        }
        Ideology::Empire => {
            if unlocked(tech_id::ECONOMICS) && institution >= 0.7 {
                out.push((Ideology::Federation, 0.5 + leader.reformism));
            }
            if unlocked(tech_id::CURRENCY) && institution >= 0.5 && unlocked(22) {
                out.push((Ideology::Republic, 0.3 + leader.reformism));
            }
        }
        Ideology::Republic => {
            if unlocked(tech_id::DEMOCRACY) && unlocked(tech_id::EDUCATION)
                && polity.legitimacy >= 0.5
            {
                out.push((Ideology::Democracy, 0.8 + leader.reformism));
            }
        }
        Ideology::Democracy | Ideology::Federation => {}
        Ideology::Dictatorship => {
            if polity.stability > 0.6 && polity.legitimacy > 0.5 && institution >= 0.5 {
                out.push((Ideology::Republic, 0.4 + leader.reformism));
            }
        }
        Ideology::Theocracy | Ideology::CityState => {
            if polity.population >= 500_000 && unlocked(tech_id::CIVIL_SERVICE) {
                out.push((Ideology::Empire, 0.5 + leader.ambition));
            }
        }
    }

    // Any sufficiently broken polity can fall to a strongman.
    if polity.stability < 0.2 && leader.coercion > 0.7 && polity.ideology != Ideology::Dictatorship
    {
        out.push((Ideology::Dictatorship, 0.8 + leader.coercion));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{with_update_context, WorldBuilder};

    #[test]
    fn tribes_step_up_to_chiefdoms_once_gates_open() {
        let mut world = WorldBuilder::flat(14, 3.0)
            .seed(61)
            .with_polity("A", crate::state::PolityType::Trader, 5, 5, 20_000)
            .build();
        let founding = world.polities[0].founding_year;
        let mut polity = world.polities[0].clone();
        polity.macros.institution_capacity = 0.3;
        // Check years come every 25 years from founding; run a few.
        let mut changed = false;
        for cycle in 1..=12 {
            world.year = founding + 25 * cycle;
            with_update_context(&world, |ctx| {
                ideology_check(&mut polity, ctx);
            });
            if polity.ideology != Ideology::Tribal {
                changed = true;
                break;
            }
        }
        assert!(changed, "chiefdom transition never fired");
        assert_eq!(polity.ideology, Ideology::Chiefdom);
    }

    #[test]
    fn off_cadence_years_never_transition() {
        let mut world = WorldBuilder::flat(14, 3.0)
            .seed(61)
            .with_polity("A", crate::state::PolityType::Trader, 5, 5, 20_000)
            .build();
        world.year = world.polities[0].founding_year + 13;
        let mut polity = world.polities[0].clone();
        polity.macros.institution_capacity = 0.9;
        with_update_context(&world, |ctx| {
            ideology_check(&mut polity, ctx);
        });
        assert_eq!(polity.ideology, Ideology::Tribal);
    }
}
