//! The year-advance scheduler.
//!
//! `advance_year` executes the fixed sub-phase order; each sub-phase
//! completes before the next begins:
//!
//!   1. Plague check
//!   2. Per-polity update (index order, or rayon when the deterministic
//!      schedule is switched off); all grid writes under the grid lock,
//!      then the cross-polity effects join in deterministic order
//!   3. Technology tick (innovation, discovery, diffusion, adoption)
//!   4. Culture/institutions tick
//!   5. Trade tick (barter cadence)
//!   6. Budget & fiscal
//!   7. Global bookkeeping (extinctions, adjacency rebuild when dirty,
//!      year counter)
//!
//! Fast forward runs the same pipeline with a coarser barter cadence and a
//! suppressed news feed; observable state invariants hold every tick either
//! way, but only the normal schedule promises bit-identical replay.

use crate::grid::UNCLAIMED;
use crate::metrics::SimMetrics;
use crate::state::{TickEffects, World};
use crate::systems::{budget, culture, knowledge, plague, polity_update, trade, war, UpdateContext};
use rayon::prelude::*;
use std::time::Instant;
use tracing::instrument;

/// Barter cadence in years for the normal and fast-forward schedules.
const BARTER_INTERVAL: i32 = 2;
const BARTER_INTERVAL_FAST: i32 = 5;

pub fn advance_year(world: &mut World) {
    advance_year_with(world, false, None);
}

/// Run `years` ticks with the cheap sub-schedules and no news output.
pub fn fast_forward(world: &mut World, years: i32) {
    let suppressed = world.news.suppressed;
    world.news.suppressed = true;
    for _ in 0..years {
        advance_year_with(world, true, None);
    }
    world.news.suppressed = suppressed;
}

#[instrument(skip_all, name = "advance_year", fields(year = world.year))]
pub fn advance_year_with(
    world: &mut World,
    fast_forward: bool,
    mut metrics: Option<&mut SimMetrics>,
) {
    let tick_start = Instant::now();
    let dt = world.config.world.years_per_tick.max(1);

    // Plague check.
    let phase_start = Instant::now();
    plague::run_plague_phase(world);
    if let Some(m) = metrics.as_deref_mut() {
        m.plague_time += phase_start.elapsed();
    }

    // Per-polity update.
    let phase_start = Instant::now();
    let views = world.views();
    let plague_active = world.plague.active;
    let affected = world.plague.affected.clone();
    let deaths: i64 = {
        let ctx = UpdateContext {
            year: world.year,
            seed: world.seed,
            config: &world.config,
            grid: &world.grid,
            views: &views,
            effects: &world.effects,
            tech: &world.tech,
            plague_active,
            plague_affected: &affected,
            war_end_year: &world.war_end_year,
        };
        if world.config.world.deterministic_mode {
            world
                .polities
                .iter_mut()
                .map(|p| polity_update::update_polity(p, &ctx))
                .sum()
        } else {
            world
                .polities
                .par_iter_mut()
                .map(|p| polity_update::update_polity(p, &ctx))
                .sum()
        }
    };
    if plague_active {
        world.plague.total_deaths += deaths;
    }
    if let Some(m) = metrics.as_deref_mut() {
        m.polity_time += phase_start.elapsed();
    }

    // Join: commit queued cross-polity effects in deterministic order.
    let phase_start = Instant::now();
    let effects: TickEffects = std::mem::take(
        world
            .effects
            .get_mut()
            .expect("effects lock poisoned"),
    );
    world.sync_territories(&effects.transitions);
    war::apply_declarations(world, effects.declarations);
    war::apply_absorptions(world, effects.absorptions);
    war::apply_war_ends(world, effects.war_ends);
    for (year, event) in effects.news {
        world.news.push(year, event);
    }
    if let Some(m) = metrics.as_deref_mut() {
        m.join_time += phase_start.elapsed();
    }

    // Technology tick.
    let phase_start = Instant::now();
    knowledge::run_knowledge_tick(world, dt);
    if let Some(m) = metrics.as_deref_mut() {
        m.knowledge_time += phase_start.elapsed();
    }

    // Culture/institutions tick.
    let phase_start = Instant::now();
    culture::run_culture_tick(world, dt);
    if let Some(m) = metrics.as_deref_mut() {
        m.culture_time += phase_start.elapsed();
    }

    // Trade tick.
    let phase_start = Instant::now();
    let barter_interval = if fast_forward {
        BARTER_INTERVAL_FAST
    } else {
        BARTER_INTERVAL
    };
    let barter_year = world.year.rem_euclid(barter_interval) == 0;
    trade::run_trade_tick(world, barter_year);
    if let Some(m) = metrics.as_deref_mut() {
        m.trade_time += phase_start.elapsed();
    }

    // Budget & fiscal.
    let phase_start = Instant::now();
    budget::run_fiscal_tick(world);
    if let Some(m) = metrics.as_deref_mut() {
        m.fiscal_time += phase_start.elapsed();
    }

    // Global bookkeeping.
    let phase_start = Instant::now();
    retire_collapsed_polities(world);
    if world.adjacency_dirty {
        world.grid.rebuild_adjacency();
        world.adjacency_dirty = false;
    }
    // Invariant enforcement: fatal in debug, clamp-and-log in release.
    if world.year.rem_euclid(64) == 0 {
        #[cfg(debug_assertions)]
        {
            debug_assert!(world.grid.verify_adjacency());
            if let Err(violation) = world.check_invariants() {
                panic!("invariant violation at year {}: {violation}", world.year);
            }
        }
        #[cfg(not(debug_assertions))]
        {
            world.repair_invariants();
        }
    }
    world.year += dt;
    if let Some(m) = metrics.as_deref_mut() {
        m.bookkeeping_time += phase_start.elapsed();
        m.total_ticks += 1;
        m.total_time += tick_start.elapsed();
    }
}

/// A polity whose population reached zero releases its land and dies at its
/// index. Indices are never reused.
fn retire_collapsed_polities(world: &mut World) {
    for i in 0..world.polities.len() {
        if world.polities[i].dead || world.polities[i].population > 0 {
            continue;
        }
        let cells = world.polities[i].territory_vec.clone();
        if !cells.is_empty() {
            let mut own = world.grid.lock();
            for pos in cells {
                world.grid.set_owner_locked(&mut own, pos, UNCLAIMED);
            }
        }
        world.polities[i].territory_set.clear();
        world.polities[i].territory_vec.clear();
        world.mark_dead(i);
    }
}
