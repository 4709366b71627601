//! Road, port and airway cadence.
//!
//! Per-polity staggered year triggers build infrastructure between existing
//! cities and partners, gated on the enabling techs. Roads and ports feed
//! logistics and market access; airways feed connectivity directly.

use super::UpdateContext;
use crate::bounded::clamp01;
use crate::events::WorldEvent;
use crate::grid::CellPos;
use crate::state::Polity;
use crate::tech::tech_id;

const ROAD_INTERVAL: i32 = 12;
const PORT_INTERVAL: i32 = 18;
const AIRWAY_INTERVAL: i32 = 9;

pub fn infrastructure_cadence(polity: &mut Polity, ctx: &UpdateContext) {
    let threshold = ctx.config.tech.adoption_threshold;
    let unlocked = |id: u32| ctx.tech.is_unlocked(&polity.tech, id, threshold);

    if ctx.year >= polity.next_road_year {
        polity.next_road_year = ctx.year + ROAD_INTERVAL;
        if unlocked(tech_id::CONSTRUCTION) && unlocked(tech_id::ROADS) && polity.cities.len() >= 2 {
            let next_pair = polity.roads.len() % (polity.cities.len() - 1);
            let a = polity.cities[next_pair].location;
            let b = polity.cities[next_pair + 1].location;
            if !polity.roads.contains(&(a, b)) {
                polity.roads.push((a, b));
                polity.logistics_reach = clamp01(polity.logistics_reach + 0.02);
                ctx.effects
                    .lock()
                    .expect("effects lock poisoned")
                    .news
                    .push((ctx.year, WorldEvent::RoadBuilt {
                        polity: polity.index,
                    }));
            }
        }
    }

    if ctx.year >= polity.next_port_year {
        polity.next_port_year = ctx.year + PORT_INTERVAL;
        if unlocked(tech_id::SHIPBUILDING) && unlocked(tech_id::NAVIGATION) {
            if let Some(site) = coastal_site(polity, ctx) {
                if !polity.ports.contains(&site) {
                    polity.ports.push(site);
                    polity.logistics_reach = clamp01(polity.logistics_reach + 0.03);
                    polity.macros.market_access = clamp01(polity.macros.market_access + 0.03);
                    ctx.effects
                        .lock()
                        .expect("effects lock poisoned")
                        .news
                        .push((ctx.year, WorldEvent::PortBuilt {
                            polity: polity.index,
                        }));
                }
            }
        }
    }

    if ctx.year >= polity.next_airway_year {
        polity.next_airway_year = ctx.year + AIRWAY_INTERVAL;
        if unlocked(tech_id::FLIGHT) {
            // Link the first neighbor not yet served.
            let partner = ctx
                .grid
                .sorted_neighbors(polity.index)
                .into_iter()
                .find(|&n| {
                    !polity.airways.contains(&n)
                        && ctx.view(n).is_some_and(|v| v.alive && v.population > 0)
                });
            if let Some(partner) = partner {
                polity.airways.push(partner);
                polity.macros.connectivity = clamp01(polity.macros.connectivity + 0.04);
                ctx.effects
                    .lock()
                    .expect("effects lock poisoned")
                    .news
                    .push((ctx.year, WorldEvent::AirwayOpened {
                        polity: polity.index,
                    }));
            }
        }
    }
}

/// First territory cell with a water 4-neighbor (or map edge), in canonical
/// sequence order.
fn coastal_site(polity: &Polity, ctx: &UpdateContext) -> Option<CellPos> {
    let terrain = ctx.grid.terrain();
    polity.territory_vec.iter().copied().find(|pos| {
        pos.orthogonal()
            .into_iter()
            .any(|n| !terrain.in_bounds(n) || !terrain.is_land(n))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{City, PolityType};
    use crate::testing::{with_update_context, WorldBuilder};

    #[test]
    fn roads_need_both_techs_and_two_cities() {
        let mut world = WorldBuilder::flat(14, 3.0)
            .seed(71)
            .with_polity("A", PolityType::Trader, 5, 5, 50_000)
            .build();
        let threshold = world.config.tech.adoption_threshold;
        world.year = world.polities[0].next_road_year;
        let mut polity = world.polities[0].clone();
        polity.cities = vec![
            City { location: CellPos::new(5, 5), population: 5_000, is_major: false },
            City { location: CellPos::new(7, 7), population: 3_000, is_major: false },
        ];
        // No techs yet: cadence passes, nothing is built.
        with_update_context(&world, |ctx| {
            infrastructure_cadence(&mut polity, ctx);
        });
        assert!(polity.roads.is_empty());

        let bonuses = world.tech.set_unlocked(
            &mut polity.tech,
            &[tech_id::CONSTRUCTION, tech_id::ROADS],
            true,
            threshold,
        );
        polity.bonuses = bonuses;
        polity.next_road_year = world.year;
        let logistics_before = polity.logistics_reach;
        with_update_context(&world, |ctx| {
            infrastructure_cadence(&mut polity, ctx);
        });
        assert_eq!(polity.roads.len(), 1);
        assert!(polity.logistics_reach > logistics_before);
    }

    #[test]
    fn ports_require_naval_techs_and_a_coast() {
        let mut world = WorldBuilder::flat(14, 3.0)
            .seed(73)
            .with_polity("A", PolityType::Trader, 0, 0, 50_000)
            .build();
        let threshold = world.config.tech.adoption_threshold;
        world.year = world.polities[0].next_port_year;
        let mut polity = world.polities[0].clone();
        // The capital sits on the map edge, which counts as coast.
        let bonuses = world.tech.set_unlocked(
            &mut polity.tech,
            &[tech_id::SHIPBUILDING, tech_id::NAVIGATION],
            true,
            threshold,
        );
        polity.bonuses = bonuses;
        with_update_context(&world, |ctx| {
            infrastructure_cadence(&mut polity, ctx);
        });
        assert_eq!(polity.ports.len(), 1);
    }
}
