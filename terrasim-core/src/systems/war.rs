//! War lifecycle: declaration, per-tick accounting, peace, annihilation.
//!
//! Declarations made inside the per-polity phase apply the attacker's half
//! immediately and queue the symmetric half; the join commits queued halves
//! in index order so thread scheduling never shows. [`start_war`] is the
//! immediate symmetric entry point for world-level callers (tests, editor).

use super::UpdateContext;
use crate::bounded::clamp01;
use crate::events::WorldEvent;
use crate::rng::{deterministic_unit, salt};
use crate::state::{Polity, PolityView, WarDeclaration, WarGoal, World};

/// Gate on opening any war: at peace, minimally stable and legitimate,
/// alive, and not already fighting on five fronts.
pub fn can_declare_war(polity: &Polity, max_concurrent: usize) -> bool {
    polity.alive()
        && polity.war.peace_duration == 0
        && polity.stability >= 0.18
        && polity.legitimacy >= 0.12
        && polity.population > 0
        && polity.war.enemies.len() < 5
        && polity.war.enemies.len() < max_concurrent
}

/// Base war duration before tech reductions:
/// `clamp(8 + 10/max(0.6, ratio) + 8·(1−logistics), 6, 36)`.
pub fn base_duration(power_ratio: f64, logistics: f64, duration_reduction: f64) -> i32 {
    let raw = 8.0 + 10.0 / power_ratio.max(0.6) + 8.0 * (1.0 - clamp01(logistics));
    let reduced = raw * (1.0 - duration_reduction.min(0.80));
    (reduced.round() as i32).clamp(6, 36)
}

/// Weighted goal selection. The draw is a pure hash of
/// `(seed, year, attacker, target)` so it reproduces across schedules.
pub fn choose_war_goal(
    polity: &Polity,
    target: usize,
    target_view: &PolityView,
    ctx: &UpdateContext,
) -> WarGoal {
    let cfg = &ctx.config.war;
    let ratio = polity.power() / target_view.power.max(1e-9);
    let weakness = 0.6 * (1.0 - target_view.stability) + 0.4 * (1.0 - target_view.legitimacy);
    let imperial = polity.imperial_window(cfg.weak_state_predation_weight * weakness);
    let scarcity = 1.0 - polity.macros.food_security;
    let tribal = matches!(
        polity.ideology,
        crate::state::Ideology::Tribal | crate::state::Ideology::Chiefdom
    );
    let institution = polity.macros.institution_capacity;
    let legit_pressure = 1.0 - polity.legitimacy;
    // Annihilation wars fade once institutions thicken; they dominate the
    // earliest, most anarchic era.
    let era = clamp01((1000.0 - ctx.year as f64) / 6000.0);

    let weights = [
        (
            WarGoal::Raid,
            cfg.objective_raid_weight * (0.2 + scarcity) * if tribal { 1.6 } else { 0.6 },
        ),
        (
            WarGoal::BorderShift,
            cfg.objective_border_weight
                * (0.3 + 0.7 * institution)
                * (0.5 + 0.5 * polity.leader.ambition * cfg.leader_ambition_war_weight)
                * (0.4 + 0.6 * imperial)
                * (0.5 + weakness),
        ),
        (
            WarGoal::Tribute,
            cfg.objective_tribute_weight * (0.2 + 0.8 * institution) * (0.3 + weakness),
        ),
        (
            WarGoal::Vassalization,
            cfg.objective_vassal_weight
                * clamp01(ratio - 1.0)
                * (0.3 + weakness)
                * (0.4 + 0.6 * imperial),
        ),
        (
            WarGoal::RegimeChange,
            cfg.objective_regime_weight
                * (0.2 + 0.8 * legit_pressure)
                * (0.3 + (1.0 - target_view.legitimacy)),
        ),
        (
            WarGoal::Annihilation,
            cfg.objective_annihilation_weight
                * (cfg.early_annihilation_bias + era)
                * if ratio > 1.25 { 1.0 } else { 0.15 }
                * (0.2 + weakness * polity.leader.ambition)
                * (0.4 + 0.6 * imperial)
                * (1.0 - cfg.high_institution_annihilation_damp * institution),
        ),
    ];

    let total: f64 = weights.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return WarGoal::BorderShift;
    }
    let draw = deterministic_unit(ctx.seed, ctx.year, polity.index, target, salt::WAR_GOAL) * total;
    let mut acc = 0.0;
    for (goal, w) in weights {
        acc += w.max(0.0);
        if draw < acc {
            return goal;
        }
    }
    WarGoal::BorderShift
}

/// In-phase declaration: apply the attacker's half and queue the symmetric
/// half for the join. Returns true when the declaration went out.
pub fn try_declare(polity: &mut Polity, target: usize, ctx: &UpdateContext) -> bool {
    if target == polity.index {
        return false;
    }
    if !can_declare_war(polity, ctx.config.war.max_concurrent_wars) {
        return false;
    }
    let Some(target_view) = ctx.view(target) else {
        return false;
    };
    if !target_view.alive || target_view.population == 0 {
        return false;
    }
    if polity.war.enemies.contains(&target) {
        return false;
    }
    let goal = choose_war_goal(polity, target, target_view, ctx);
    let ratio = polity.power() / target_view.power.max(1e-9);
    let duration = base_duration(
        ratio,
        polity.logistics_reach,
        polity.bonuses.war_duration_reduction,
    );

    polity.war.is_at_war = true;
    polity.war.enemies.push(target);
    polity.war.enemies.sort_unstable();
    polity.war.peace_duration = 0;
    polity.war.war_exhaustion = 0.0;
    polity.war.war_duration = polity.war.war_duration.max(duration);
    polity.war.active_goal = Some(goal);

    let mut effects = ctx.effects.lock().expect("effects lock poisoned");
    effects.declarations.push(WarDeclaration {
        attacker: polity.index,
        target,
        goal,
        duration,
    });
    effects.news.push((
        ctx.year,
        WorldEvent::WarStarted {
            attacker: polity.index,
            defender: target,
        },
    ));
    true
}

/// Immediate symmetric declaration, for world-level callers. Exhaustion is
/// reset for the attacker only.
pub fn start_war(world: &mut World, attacker: usize, target: usize, goal: Option<WarGoal>) -> bool {
    if attacker == target || attacker >= world.polities.len() || target >= world.polities.len() {
        return false;
    }
    if world.polities[target].dead {
        return false;
    }
    if !can_declare_war(
        &world.polities[attacker],
        world.config.war.max_concurrent_wars,
    ) {
        return false;
    }
    let ratio = world.polities[attacker].power() / world.polities[target].power().max(1e-9);
    let duration = base_duration(
        ratio,
        world.polities[attacker].logistics_reach,
        world.polities[attacker].bonuses.war_duration_reduction,
    );
    let goal = goal.unwrap_or(WarGoal::BorderShift);
    {
        let a = &mut world.polities[attacker];
        a.war.is_at_war = true;
        if !a.war.enemies.contains(&target) {
            a.war.enemies.push(target);
            a.war.enemies.sort_unstable();
        }
        a.war.peace_duration = 0;
        a.war.war_exhaustion = 0.0;
        a.war.war_duration = a.war.war_duration.max(duration);
        a.war.active_goal = Some(goal);
    }
    link_defender(world, attacker, target, duration);
    world
        .news
        .push(world.year, WorldEvent::WarStarted { attacker, defender: target });
    true
}

fn link_defender(world: &mut World, attacker: usize, target: usize, duration: i32) {
    let defender = &mut world.polities[target];
    defender.war.is_at_war = true;
    if !defender.war.enemies.contains(&attacker) {
        defender.war.enemies.push(attacker);
        defender.war.enemies.sort_unstable();
    }
    defender.war.peace_duration = 0;
    defender.war.war_duration = defender.war.war_duration.max(duration);
    if defender.war.active_goal.is_none() {
        defender.war.active_goal = Some(WarGoal::BorderShift);
    }
}

/// Commit queued declarations at the phase join, in (attacker, target) order.
pub fn apply_declarations(world: &mut World, mut declarations: Vec<WarDeclaration>) {
    declarations.sort_by_key(|d| (d.attacker, d.target));
    declarations.dedup();
    for d in declarations {
        if world.polities[d.target].dead || world.polities[d.attacker].dead {
            // The attacker's half is rolled back if the target died this tick.
            let a = &mut world.polities[d.attacker];
            a.war.enemies.retain(|&e| e != d.target);
            if a.war.enemies.is_empty() {
                a.war.is_at_war = false;
                a.war.war_duration = 0;
            }
            continue;
        }
        link_defender(world, d.attacker, d.target, d.duration);
    }
}

/// Per-tick war accounting: supply vs demand, exhaustion,
/// attrition, duration countdown, annihilation capture checks.
pub fn war_accounting(polity: &mut Polity, ctx: &UpdateContext) {
    polity.war.conquest_momentum = clamp01(polity.war.conquest_momentum * 0.88);

    if !polity.war.is_at_war {
        if polity.war.peace_duration > 0 {
            polity.war.peace_duration -= 1;
        }
        return;
    }

    let cfg = &ctx.config.war;
    let road_mobility = clamp01(polity.roads.len() as f64 / 12.0);
    let terrain_defense = polity.bonuses.defensive_bonus.min(1.0);
    let food_stock_score = clamp01(polity.food_stock / polity.population.max(1) as f64);
    let energy = clamp01(polity.resources.energy / (1.0 + polity.territory_len() as f64 * 0.05));

    let supply = clamp01(
        cfg.supply_base
            + cfg.supply_logistics_weight * polity.logistics_reach
            + cfg.supply_market_weight * polity.macros.market_access
            + cfg.supply_control_weight * polity.avg_control
            + cfg.supply_energy_weight * energy
            + cfg.supply_food_stock_weight * food_stock_score
            + 0.10 * road_mobility
            + 0.10 * terrain_defense,
    );
    let demand = 0.20
        + 1.25 * polity.budget.military
        + 0.15 * (1.0 - road_mobility)
        + if polity.war.active_goal == Some(WarGoal::Annihilation) {
            0.25
        } else {
            0.0
        };
    let overdraw = (demand - supply).max(0.0);

    polity.war.war_exhaustion = clamp01(
        polity.war.war_exhaustion
            + cfg.exhaustion_rise * (0.5 + overdraw)
            + cfg.over_supply_attrition * overdraw
            + 0.02 * (1.0 - polity.stability),
    );

    if overdraw > 0.0 {
        let attrition = (cfg.over_supply_attrition * overdraw).min(0.30);
        polity.military_strength *= 1.0 - attrition;
        polity.stability = clamp01(polity.stability - 0.5 * attrition);
        polity.legitimacy = clamp01(polity.legitimacy - 0.3 * attrition);
        polity.food_stock = (polity.food_stock * (1.0 - attrition)).max(0.0);
    }

    // Annihilation capture: once dominance is overwhelming, queue the
    // absorption for the join.
    if polity.war.active_goal == Some(WarGoal::Annihilation) {
        if let Some(target) = polity.war.primary_enemy() {
            if let Some(view) = ctx.view(target) {
                if can_annihilate(polity, view) {
                    ctx.effects
                        .lock()
                        .expect("effects lock poisoned")
                        .absorptions
                        .push((polity.index, target));
                }
            }
        }
    }

    polity.war.war_duration -= 1;
    if polity.war.war_exhaustion >= cfg.exhaustion_peace_threshold {
        polity.war.war_duration = 0;
    }
    if polity.war.war_duration <= 0 {
        ctx.effects
            .lock()
            .expect("effects lock poisoned")
            .war_ends
            .push(polity.index);
    }
}

/// Overwhelming-dominance test for absorbing the target outright.
pub fn can_annihilate(polity: &Polity, target: &PolityView) -> bool {
    if !target.alive {
        return false;
    }
    let ratio = polity.power() / target.power.max(1e-9);
    if ratio <= 1.60 {
        return false;
    }
    let pop_dominance = polity.population >= target.population.saturating_mul(5);
    let territory_dominance = polity.territory_len() >= target.territory_len * 5;
    let collapse_driven = target.stability < 0.15;
    pop_dominance || territory_dominance || collapse_driven
}

/// Close out every war of `index`: unlink both sides eagerly, record the
/// war-end year per pair, apply reconstruction drag and the goal-dependent
/// legitimacy shift, start the peace cooldown.
pub fn end_wars_of(world: &mut World, index: usize) {
    let enemies = world.polities[index].war.enemies.clone();
    if enemies.is_empty() && !world.polities[index].war.is_at_war {
        return;
    }
    let year = world.year;
    for &enemy in &enemies {
        world
            .war_end_year
            .insert(World::pair_key(index, enemy), year);
        let other = &mut world.polities[enemy];
        other.war.enemies.retain(|&e| e != index);
        if other.war.enemies.is_empty() && other.war.is_at_war {
            settle_peace(other, &world.config.war);
        }
    }
    let polity = &mut world.polities[index];
    polity.war.enemies.clear();
    settle_peace(polity, &world.config.war);
    world.news.push(year, WorldEvent::WarEnded { polity: index });
}

fn settle_peace(polity: &mut Polity, cfg: &crate::config::WarConfig) {
    let exhaustion = polity.war.war_exhaustion;
    let goal_shift = match polity.war.active_goal {
        Some(WarGoal::Tribute) => 0.02,
        Some(WarGoal::Vassalization) => 0.01,
        Some(WarGoal::RegimeChange) => -0.01,
        Some(WarGoal::Annihilation) => -0.04,
        _ => 0.0,
    };
    polity.legitimacy = clamp01(polity.legitimacy + goal_shift - 0.08 * exhaustion);

    // Reconstruction drag: war economies wind down slowly.
    let drag = cfg.peace_reconstruction_drag * (0.5 + exhaustion);
    polity.macros.last_nonfood_output *= 1.0 - drag.min(0.5);
    polity.logistics_reach = clamp01(polity.logistics_reach * (1.0 - 0.3 * drag));

    polity.war.is_at_war = false;
    polity.war.war_duration = 0;
    polity.war.active_goal = None;
    let span = (cfg.cooldown_max_years - cfg.cooldown_min_years).max(0);
    polity.war.peace_duration =
        cfg.cooldown_min_years + polity.rng.next_range_i32(0, span);
}

/// Commit queued war ends at the join, in index order.
pub fn apply_war_ends(world: &mut World, mut ends: Vec<usize>) {
    ends.sort_unstable();
    ends.dedup();
    for index in ends {
        // Only end wars whose duration actually ran out; an absorption may
        // already have cleared the state.
        if world.polities[index].war.is_at_war && world.polities[index].war.war_duration <= 0 {
            end_wars_of(world, index);
        }
    }
}

/// Absorb `loser` into `winner`: territory and cities transfer, 80% of the
/// treasury is seized, and the loser dies at its index.
pub fn absorb(world: &mut World, winner: usize, loser: usize) {
    if winner == loser || world.polities[loser].dead || world.polities[winner].dead {
        return;
    }
    let year = world.year;

    let cells: Vec<_> = world.polities[loser].territory_vec.clone();
    {
        let mut own = world.grid.lock();
        for &pos in &cells {
            world.grid.set_owner_locked(&mut own, pos, winner as i32);
        }
    }
    let cities: Vec<_> = world.polities[loser].cities.drain(..).collect();
    let seized_gold = world.polities[loser].gold * 0.80;
    world.polities[loser].gold -= seized_gold;

    {
        let loser_state = &mut world.polities[loser];
        loser_state.territory_set.clear();
        loser_state.territory_vec.clear();
        loser_state.population = 0;
    }
    {
        let winner_state = &mut world.polities[winner];
        for pos in cells {
            winner_state.add_cell(pos);
        }
        winner_state.cities.extend(cities);
        winner_state.gold += seized_gold;
        winner_state.war.conquest_momentum = 1.0;
    }

    end_wars_of(world, loser);
    world.mark_dead(loser);
    world.news.push(year, WorldEvent::Annihilation { winner, loser });
}

/// Commit queued absorptions at the join, in (winner, loser) order.
pub fn apply_absorptions(world: &mut World, mut absorptions: Vec<(usize, usize)>) {
    absorptions.sort_unstable();
    absorptions.dedup();
    for (winner, loser) in absorptions {
        absorb(world, winner, loser);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;

    fn two_polity_world() -> World {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(20, 20, 3.0), 21);
        world.spawn_polity("A".into(), PolityType::Warmonger, CellPos::new(4, 4), 100_000);
        world.spawn_polity("B".into(), PolityType::Pacifist, CellPos::new(5, 4), 10_000);
        world
    }

    #[test]
    fn start_war_is_symmetric() {
        let mut world = two_polity_world();
        assert!(start_war(&mut world, 0, 1, Some(WarGoal::BorderShift)));
        assert!(world.polities[0].war.is_at_war);
        assert!(world.polities[1].war.is_at_war);
        assert_eq!(world.polities[0].war.enemies, vec![1]);
        assert_eq!(world.polities[1].war.enemies, vec![0]);
        assert_eq!(world.polities[0].war.war_exhaustion, 0.0);
    }

    #[test]
    fn self_and_dead_targets_are_forbidden() {
        let mut world = two_polity_world();
        assert!(!start_war(&mut world, 0, 0, None));
        let cells: Vec<CellPos> = world.polities[1].territory_vec.clone();
        for pos in cells {
            world.grid.set_owner(pos, crate::grid::UNCLAIMED);
        }
        world.polities[1].territory_set.clear();
        world.polities[1].territory_vec.clear();
        world.polities[1].population = 0;
        world.mark_dead(1);
        assert!(!start_war(&mut world, 0, 1, None));
    }

    #[test]
    fn peace_cooldown_blocks_redeclaration() {
        let mut world = two_polity_world();
        assert!(start_war(&mut world, 0, 1, None));
        end_wars_of(&mut world, 0);
        assert!(!world.polities[0].war.is_at_war);
        assert!(!world.polities[1].war.is_at_war);
        assert!(world.polities[0].war.peace_duration >= world.config.war.cooldown_min_years);
        assert!(!start_war(&mut world, 0, 1, None));
        assert!(world.war_end_year.contains_key(&World::pair_key(0, 1)));
    }

    #[test]
    fn duration_formula_respects_bounds() {
        assert_eq!(base_duration(10.0, 1.0, 0.0), 9);
        assert!(base_duration(0.1, 0.0, 0.0) <= 36);
        assert!(base_duration(10.0, 1.0, 0.9) >= 6);
    }

    #[test]
    fn absorption_transfers_everything() {
        let mut world = two_polity_world();
        for x in 10..14 {
            let pos = CellPos::new(x, 10);
            world.grid.set_owner(pos, 1);
            world.polities[1].add_cell(pos);
        }
        world.polities[1].gold = 1000.0;
        world.polities[0].gold = 0.0;
        start_war(&mut world, 0, 1, Some(WarGoal::Annihilation));
        let loser_cells: Vec<CellPos> = world.polities[1].territory_vec.clone();
        absorb(&mut world, 0, 1);
        assert!(world.polities[1].dead);
        assert_eq!(world.polities[1].population, 0);
        assert_eq!(world.polities[1].territory_len(), 0);
        for pos in loser_cells {
            assert_eq!(world.grid.owner(pos), 0);
            assert!(world.polities[0].territory_set.contains(&pos));
        }
        assert!((world.polities[0].gold - 800.0).abs() < 1e-9);
        assert!(!world.polities[0].war.is_at_war);
        world.check_invariants().unwrap();
    }

    #[test]
    fn goal_weights_steer_selection() {
        let mut world = two_polity_world();
        world.config.war.objective_raid_weight = 0.0;
        world.config.war.objective_border_weight = 0.0;
        world.config.war.objective_vassal_weight = 0.0;
        world.config.war.objective_regime_weight = 0.0;
        world.config.war.objective_annihilation_weight = 0.0;
        world.config.war.objective_tribute_weight = 1.0;
        let polity = world.polities[0].clone();
        crate::testing::with_update_context(&world, |ctx| {
            let view = ctx.view(1).unwrap();
            assert_eq!(choose_war_goal(&polity, 1, view, ctx), WarGoal::Tribute);
        });
    }

    #[test]
    fn exhaustion_forces_peace() {
        let config = SimConfig::default();
        assert!(config.war.exhaustion_peace_threshold <= 1.0);
        let mut world = two_polity_world();
        start_war(&mut world, 0, 1, None);
        world.polities[0].war.war_exhaustion = 1.0;
        // Accounting is exercised through the tick in step_tests; here we
        // check the forced-zero rule directly.
        let p = &mut world.polities[0];
        if p.war.war_exhaustion >= config.war.exhaustion_peace_threshold {
            p.war.war_duration = 0;
        }
        assert_eq!(p.war.war_duration, 0);
    }
}
