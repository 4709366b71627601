//! Per-polity yearly update, in its fixed step order.
//!
//! The function takes only `&mut` to its own polity plus the shared
//! read-only context; anything cross-polity goes through the grid lock or
//! the effects queue. Returns the plague deaths applied, for the world
//! ledger.

use super::{
    budget, cities, demography, expansion, ideology, infrastructure, pressure, regions, society,
    stability, war, UpdateContext,
};
use crate::state::Polity;

pub fn update_polity(polity: &mut Polity, ctx: &UpdateContext) -> i64 {
    if polity.dead {
        return 0;
    }
    let plague_affected = ctx.is_plague_affected(polity.index);

    // 1. Per-tick scratch and budget normalization.
    budget::begin_year(polity);

    // 2-3. Regional structure and succession.
    regions::update_regions(polity, ctx);
    regions::succession_check(polity, ctx);

    // 4. Agentic society.
    society::age_leader(polity);
    society::society_tick(polity, ctx);

    // 5-6. Pressure vector, then the cadenced policy step.
    polity.pressures = pressure::compute_pressures(polity, ctx);
    pressure::policy_step(polity, ctx);

    // 7-8. Expansion budget under soft overload.
    let budget_cells = expansion::expansion_budget(polity, ctx);
    let budget_cells = expansion::apply_soft_overload(polity, budget_cells);

    // 9-10. Territorial execution.
    if polity.war.is_at_war {
        expansion::wartime_expansion(polity, budget_cells, ctx);
    } else {
        expansion::peacetime_expansion(polity, budget_cells, ctx);
    }
    expansion::warmonger_surge(polity, ctx);

    // 11. Fresh per-tick resource ledger.
    polity.resources = aggregate_resources(polity, ctx);
    polity.yearly_food = polity.resources.food;

    // 12. Population.
    let plague_deaths = demography::population_step(polity, ctx.tech, ctx.config, plague_affected);

    // 13. Stability and legitimacy drift.
    stability::stability_drift(polity, ctx.config, plague_affected);
    stability::legitimacy_drift(polity, ctx.config, plague_affected);

    // 14-16. Cities, ideology, infrastructure cadences.
    cities::city_growth(polity, ctx);
    ideology::ideology_check(polity, ctx);
    infrastructure::infrastructure_cadence(polity, ctx);

    // 17. War accounting.
    war::war_accounting(polity, ctx);

    polity.clamp_scalars();
    plague_deaths
}

/// Recompute the per-tick resource ledger from owned cells.
/// Not persisted across years.
fn aggregate_resources(polity: &Polity, ctx: &UpdateContext) -> crate::state::ResourceLedger {
    let mut ledger = crate::state::ResourceLedger::default();
    let terrain = ctx.grid.terrain();
    let cfg = &ctx.config.resources;
    for &pos in &polity.territory_vec {
        ledger.food += terrain.food(pos) as f64;
        match terrain.resource(pos) {
            crate::grid::ResourceKind::Food => ledger.food += 1.0,
            crate::grid::ResourceKind::Ore => ledger.ore += 1.0,
            crate::grid::ResourceKind::Energy => ledger.energy += 1.0,
            crate::grid::ResourceKind::Construction => ledger.construction += 1.0,
            crate::grid::ResourceKind::None => {}
        }
        ledger.energy += cfg.energy_biomass_base * 0.01;
        ledger.construction += cfg.construction_stone_base * 0.01;
    }
    ledger
}
