//! Trade tick.
//!
//! The rest of the core only consumes the symmetric `trade_intensity`
//! matrix and the per-polity exports aggregate; this module produces them
//! from border contact, market development, sea routes and the war map.
//! Pairs at war always read zero.

use crate::bounded::clamp01;
use crate::state::World;
use tracing::instrument;

#[instrument(skip_all, name = "trade_tick")]
pub fn run_trade_tick(world: &mut World, barter_year: bool) {
    let n = world.polities.len();
    if n == 0 {
        return;
    }
    world.trade.ensure_size(n);

    // Sea routes connect polities that both operate ports.
    let with_ports: Vec<usize> = world
        .polities
        .iter()
        .filter(|p| p.alive() && !p.ports.is_empty())
        .map(|p| p.index)
        .collect();
    for (i, &a) in with_ports.iter().enumerate() {
        for &b in &with_ports[i + 1..] {
            world.trade.add_sea_route(a, b);
        }
    }

    let memory = world.config.economy.trade_intensity_memory;
    let scale = world.config.economy.trade_intensity_scale.max(0.0);
    let sea_mult = world.config.economy.sea_route_multiplier.max(1.0);
    let norm = world.config.economy.trade_intensity_value_norm_base.max(1.0);

    let mut exports = vec![0.0f64; n];
    for a in 0..n {
        for b in (a + 1)..n {
            let old = world.trade.intensity(a, b) as f64;
            let pa = &world.polities[a];
            let pb = &world.polities[b];

            let at_war = pa.war.enemies.contains(&b) || pb.war.enemies.contains(&a);
            if at_war || !pa.alive() || !pb.alive() || pa.population == 0 || pb.population == 0 {
                world.trade.set_intensity(a, b, 0.0);
                continue;
            }
            // Warmonger pairs stay frozen out for centuries after a war.
            let embargo = world.years_since_war(a, b).is_some_and(|since| {
                since < 500
                    && (pa.kind == crate::state::PolityType::Warmonger
                        || pb.kind == crate::state::PolityType::Warmonger)
            });
            if embargo {
                world.trade.set_intensity(a, b, 0.0);
                continue;
            }

            // Barter runs at its own cadence; off-years only decay memory.
            let target = if barter_year {
                let contact = world.grid.border_contacts(a, b);
                let mut throughput = clamp01((contact as f64).ln_1p() / 5.0);
                if world.trade.has_sea_route(a, b) {
                    throughput *= sea_mult;
                }
                if throughput <= 0.0 {
                    0.0
                } else {
                    let access = 0.5 * (pa.macros.market_access + pb.macros.market_access);
                    let value = (pa.macros.last_nonfood_output + pb.macros.last_nonfood_output)
                        / (norm + pa.macros.last_nonfood_output + pb.macros.last_nonfood_output);
                    clamp01(scale * throughput * (0.25 + 0.75 * access) * (0.3 + 0.7 * value))
                }
            } else {
                old
            };
            let blended = memory * old + (1.0 - memory) * target;
            world.trade.set_intensity(a, b, blended as f32);

            let flow = blended
                * 0.5
                * (world.polities[a].macros.last_nonfood_output
                    + world.polities[b].macros.last_nonfood_output)
                .min(1e9)
                * 0.01;
            exports[a] += flow;
            exports[b] += flow;
        }
    }
    world.trade.exports = exports;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;
    use crate::systems::war;

    fn trading_world() -> World {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(16, 16, 3.0), 31);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(4, 4), 50_000);
        world.spawn_polity("B".into(), PolityType::Trader, CellPos::new(5, 4), 50_000);
        for p in &mut world.polities {
            p.macros.market_access = 0.6;
            p.macros.last_nonfood_output = 100.0;
        }
        world
    }

    #[test]
    fn bordering_traders_build_intensity() {
        let mut world = trading_world();
        for _ in 0..30 {
            run_trade_tick(&mut world, true);
        }
        assert!(world.trade.intensity(0, 1) > 0.05);
        assert_eq!(world.trade.intensity(0, 1), world.trade.intensity(1, 0));
    }

    #[test]
    fn war_zeroes_intensity_immediately() {
        let mut world = trading_world();
        for _ in 0..30 {
            run_trade_tick(&mut world, true);
        }
        assert!(world.trade.intensity(0, 1) > 0.0);
        war::start_war(&mut world, 0, 1, None);
        run_trade_tick(&mut world, true);
        assert_eq!(world.trade.intensity(0, 1), 0.0);
    }

    #[test]
    fn sea_routes_lift_throughput() {
        let mut world = trading_world();
        let mut with_route = trading_world();
        with_route.polities[0].ports.push(CellPos::new(4, 4));
        with_route.polities[1].ports.push(CellPos::new(5, 4));
        for _ in 0..30 {
            run_trade_tick(&mut world, true);
            run_trade_tick(&mut with_route, true);
        }
        assert!(with_route.trade.intensity(0, 1) > world.trade.intensity(0, 1));
    }

    #[test]
    fn off_years_keep_the_matrix_stable() {
        let mut world = trading_world();
        for _ in 0..10 {
            run_trade_tick(&mut world, true);
        }
        let before = world.trade.intensity(0, 1);
        run_trade_tick(&mut world, false);
        assert!((world.trade.intensity(0, 1) - before).abs() < 1e-6);
    }
}
