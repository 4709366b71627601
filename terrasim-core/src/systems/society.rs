//! Agentic society: class structure, elite blocs, social pressures,
//! the election sub-machine, and the slow rename/language drift.

use super::UpdateContext;
use crate::bounded::clamp01;
use crate::events::WorldEvent;
use crate::names;
use crate::rng::{deterministic_unit, salt};
use crate::state::{
    Polity, CLASS_ARTISANS, CLASS_BUREAUCRATS, CLASS_ELITE, CLASS_LABORERS, CLASS_MERCHANTS,
    CLASS_SUBSISTENCE, ELITE_LANDED, ELITE_MERCHANT, ELITE_RITUAL, ELITE_WARRIOR,
};

pub fn society_tick(polity: &mut Polity, ctx: &UpdateContext) {
    if polity.population == 0 {
        return;
    }
    update_class_structure(polity);
    update_class_sentiments(polity);
    update_elites(polity);
    compute_social_pressures(polity);
    apply_pressures_to_policy(polity);
    maybe_rename(polity, ctx);
    election_machine(polity, ctx);
}

/// Class-complexity level in [2, 6] and smoothed class shares.
fn update_class_structure(polity: &mut Polity) {
    let capability = polity.capability_blend();
    let tech_depth = (polity.tech.known_count() as f64 / 40.0).min(1.0);
    let commercial = polity.macros.merchant_power;
    let urban = polity.macros.urbanization;

    let target_level = 2.0 + 1.5 * capability + 1.5 * tech_depth + 1.0 * commercial;
    polity.class_complexity += 0.1 * (target_level.clamp(2.0, 6.0) - polity.class_complexity);
    let level = polity.class_complexity;

    // Targets open up as the complexity level rises; below the level the
    // class effectively does not exist yet.
    let mut targets = [0.0f64; 6];
    targets[CLASS_SUBSISTENCE] = (1.0 - 0.55 * capability - 0.25 * urban).max(0.15);
    targets[CLASS_LABORERS] = 0.10 + 0.25 * urban;
    if level >= 3.0 {
        targets[CLASS_ARTISANS] = 0.05 + 0.15 * polity.macros.specialization + 0.05 * tech_depth;
    }
    if level >= 4.0 {
        targets[CLASS_MERCHANTS] = 0.03 + 0.12 * commercial;
    }
    if level >= 5.0 {
        targets[CLASS_BUREAUCRATS] = 0.02 + 0.08 * polity.macros.institution_capacity;
    }
    targets[CLASS_ELITE] = 0.02 + 0.03 * polity.macros.inequality;

    let sum: f64 = targets.iter().sum();
    for t in &mut targets {
        *t /= sum;
    }
    for (class, target) in polity.classes.iter_mut().zip(targets) {
        class.share += 0.10 * (target - class.share);
    }
    let share_sum: f64 = polity.classes.iter().map(|c| c.share).sum();
    if share_sum > 0.0 {
        for class in &mut polity.classes {
            class.share /= share_sum;
        }
    }
}

/// Sentiments move with hardship against each class's preference fit.
fn update_class_sentiments(polity: &mut Polity) {
    let hardship = clamp01(
        0.5 * polity.macros.famine_severity
            + 0.3 * (1.0 - polity.macros.food_security)
            + if polity.war.is_at_war { 0.2 } else { 0.0 },
    );
    let tax_pain = (polity.tax_rate.get() - 0.15).max(0.0) / 0.30;
    let trade_open = polity.macros.market_access;
    let redistribution = polity.budget.health + polity.budget.education;

    for class in &mut polity.classes {
        let fit = 0.4 * (1.0 - (class.trade_pref - trade_open).abs())
            + 0.3 * (1.0 - (class.redistribution_pref - redistribution * 2.0).abs().min(1.0))
            + 0.3 * class.innovation_pref * polity.macros.knowledge_stock;
        let target = clamp01(0.25 + 0.55 * fit - 0.5 * hardship - 0.3 * tax_pain);
        class.sentiment += 0.15 * (target - class.sentiment);
        class.influence = clamp01(0.3 * class.share + 0.4 * class.external_network + 0.1);
        class.external_network =
            clamp01(class.external_network + 0.02 * (trade_open - class.external_network));
    }
}

fn update_elites(polity: &mut Polity) {
    let extraction = polity.tax_rate.get();
    let at_war = polity.war.is_at_war;
    let commercial = polity.macros.merchant_power;
    let legitimacy = polity.legitimacy;

    for (i, elite) in polity.elites.iter_mut().enumerate() {
        let over_extraction = (extraction - elite.extraction_tolerance * 0.45).max(0.0);
        elite.grievance = clamp01(elite.grievance + 0.08 * over_extraction - 0.04 * legitimacy);
        elite.loyalty = clamp01(elite.loyalty + 0.04 * legitimacy - 0.06 * elite.grievance);
        let drift = match i {
            ELITE_WARRIOR if at_war => 0.02,
            ELITE_MERCHANT => 0.03 * commercial,
            ELITE_RITUAL => 0.01 * (1.0 - legitimacy),
            ELITE_LANDED => 0.01 * (1.0 - polity.macros.urbanization),
            _ => -0.01,
        };
        elite.influence = clamp01(elite.influence + drift - 0.005);
    }
}

fn compute_social_pressures(polity: &mut Polity) {
    let elites = &polity.elites;
    polity.elite_bargaining_pressure = clamp01(
        elites
            .iter()
            .map(|e| e.influence * e.grievance)
            .sum::<f64>(),
    );
    let commons = &polity.classes;
    polity.commoner_pressure = clamp01(
        (commons[CLASS_SUBSISTENCE].share + commons[CLASS_LABORERS].share)
            * (1.0 - 0.5 * (commons[CLASS_SUBSISTENCE].sentiment + commons[CLASS_LABORERS].sentiment)),
    );
    polity.bourgeois_pressure = clamp01(
        commons[CLASS_MERCHANTS].share * commons[CLASS_MERCHANTS].influence * 4.0
            * (1.0 - commons[CLASS_MERCHANTS].sentiment),
    );
    polity.bureaucrat_pressure =
        clamp01(commons[CLASS_BUREAUCRATS].share * polity.macros.institution_capacity * 5.0);
}

/// Pressures perturb budget shares, tax and spend through the leader's
/// affinities; the cultural traits drift slowly with them.
fn apply_pressures_to_policy(polity: &mut Polity) {
    let leader = polity.leader;
    if polity.elite_bargaining_pressure > 0.4 {
        let give = 0.02 * leader.elite_affinity;
        polity.budget.military += give;
        polity.tax_rate.add(-0.005 * leader.elite_affinity);
    }
    if polity.commoner_pressure > 0.4 {
        let give = 0.02 * leader.commoner_affinity;
        polity.budget.health += give;
        polity.budget.education += give * 0.5;
        polity.tax_rate.add(-0.01 * leader.commoner_affinity);
    }
    if polity.bourgeois_pressure > 0.3 {
        polity.budget.infra += 0.015;
        polity.treasury_spend_rate.add(0.02 * leader.reformism);
        polity.traits[crate::state::TRAIT_OPENNESS] =
            clamp01(polity.traits[crate::state::TRAIT_OPENNESS] + 0.01);
    }
    if polity.bureaucrat_pressure > 0.3 {
        polity.budget.admin += 0.01;
    }
    polity.budget.normalize();
}

/// A polity under long cultural drift can rename itself; 220-year cooldown.
fn maybe_rename(polity: &mut Polity, ctx: &UpdateContext) {
    if ctx.year < polity.rename_allowed_after {
        return;
    }
    let drift = polity.bourgeois_pressure.max(polity.elite_bargaining_pressure);
    if drift < 0.55 {
        return;
    }
    let draw = deterministic_unit(ctx.seed, ctx.year, polity.index, 0, salt::RENAME);
    if draw >= 0.03 {
        return;
    }
    polity.name = names::evolve_name(&polity.name, &mut polity.rng);
    polity.rename_allowed_after = ctx.year + ctx.config.polity.rename_cooldown_years;
    ctx.effects
        .lock()
        .expect("effects lock poisoned")
        .news
        .push((ctx.year, WorldEvent::Renamed {
            polity: polity.index,
            name: polity.name.clone(),
        }));
}

/// Elections for Republic/Democracy/Federation: 4-8 year terms, incumbent
/// retention from economy/governance/incumbency minus war, and an
/// unconditional legitimacy bump for holding the vote at all.
fn election_machine(polity: &mut Polity, ctx: &UpdateContext) {
    if !polity.ideology.holds_elections() {
        polity.next_election_year = None;
        return;
    }
    let due = match polity.next_election_year {
        None => {
            polity.next_election_year = Some(ctx.year + polity.rng.next_range_i32(4, 8));
            return;
        }
        Some(year) => ctx.year >= year,
    };
    if !due {
        return;
    }

    let economy = clamp01(0.6 * polity.macros.food_security + 0.4 * polity.macros.market_access);
    let governance = clamp01(0.5 * (polity.stability + polity.legitimacy));
    let incumbency = (-polity.leader.years_in_power / 25.0).exp();
    let war = if polity.war.is_at_war { 1.0 } else { 0.0 };
    let retain = clamp01(0.22 + 0.34 * economy + 0.28 * governance + 0.16 * incumbency - 0.22 * war);

    let draw = deterministic_unit(ctx.seed, ctx.year, polity.index, 0, salt::ELECTION);
    let retained = draw < retain;
    if !retained {
        polity.leader = crate::state::Leader::generate(&mut polity.rng, false);
    }
    polity.legitimacy = clamp01(polity.legitimacy + 0.03);
    polity.next_election_year = Some(ctx.year + polity.rng.next_range_i32(4, 8));
    ctx.effects
        .lock()
        .expect("effects lock poisoned")
        .news
        .push((ctx.year, WorldEvent::ElectionHeld {
            polity: polity.index,
            incumbent_retained: retained,
        }));
}

/// Yearly leader aging, called once from the polity update.
pub fn age_leader(polity: &mut Polity) {
    polity.leader.years_in_power += 1.0;
    polity.leader.age = clamp01(polity.leader.age + 0.012);
}
