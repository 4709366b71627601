//! City founding and capital promotion.

use super::UpdateContext;
use crate::events::WorldEvent;
use crate::rng::{deterministic_unit, salt};
use crate::state::{City, Polity};

const FIRST_CITY_POPULATION: i64 = 10_000;
const MAJOR_CAPITAL_POPULATION: i64 = 1_000_000;
/// Every additional city needs this much more population behind it.
const POPULATION_PER_EXTRA_CITY: i64 = 250_000;

pub fn city_growth(polity: &mut Polity, ctx: &UpdateContext) {
    if polity.population < FIRST_CITY_POPULATION || polity.territory_vec.is_empty() {
        return;
    }

    if polity.cities.is_empty() {
        // The first city rises at the capital cell.
        polity.cities.push(City {
            location: polity.capital,
            population: polity.population / 10,
            is_major: false,
        });
        push_city_news(polity, ctx, polity.capital);
        return;
    }

    // Capital promotion is a one-shot.
    if polity.population >= MAJOR_CAPITAL_POPULATION && !polity.capital_promoted {
        polity.cities[0].is_major = true;
        polity.capital_promoted = true;
        ctx.effects
            .lock()
            .expect("effects lock poisoned")
            .news
            .push((ctx.year, WorldEvent::CapitalPromoted {
                polity: polity.index,
            }));
    }

    let allowed = 1 + (polity.population / POPULATION_PER_EXTRA_CITY) as usize;
    if polity.cities.len() >= allowed {
        return;
    }
    // Deterministic site choice: a hash draw indexes the canonical territory
    // sequence, skipping cells that already host a city.
    let draw = deterministic_unit(
        ctx.seed,
        ctx.year,
        polity.index,
        polity.cities.len(),
        salt::CITY,
    );
    let start = (draw * polity.territory_vec.len() as f64) as usize;
    let site = (0..polity.territory_vec.len())
        .map(|offset| polity.territory_vec[(start + offset) % polity.territory_vec.len()])
        .find(|pos| !polity.cities.iter().any(|c| c.location == *pos));
    if let Some(site) = site {
        polity.cities.push(City {
            location: site,
            population: polity.population / 20,
            is_major: false,
        });
        push_city_news(polity, ctx, site);
    }
}

fn push_city_news(polity: &Polity, ctx: &UpdateContext, pos: crate::grid::CellPos) {
    ctx.effects
        .lock()
        .expect("effects lock poisoned")
        .news
        .push((ctx.year, WorldEvent::CityFounded {
            polity: polity.index,
            x: pos.x,
            y: pos.y,
        }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PolityType;
    use crate::testing::{with_update_context, WorldBuilder};

    fn world(pop: i64) -> crate::state::World {
        WorldBuilder::flat(14, 3.0)
            .seed(59)
            .with_polity("A", PolityType::Trader, 5, 5, pop)
            .build()
    }

    #[test]
    fn first_city_rises_at_the_capital() {
        let world = world(20_000);
        let mut polity = world.polities[0].clone();
        with_update_context(&world, |ctx| {
            city_growth(&mut polity, ctx);
        });
        assert_eq!(polity.cities.len(), 1);
        assert_eq!(polity.cities[0].location, polity.capital);
        assert!(!polity.cities[0].is_major);
    }

    #[test]
    fn small_polities_found_nothing() {
        let world = world(5_000);
        let mut polity = world.polities[0].clone();
        with_update_context(&world, |ctx| {
            city_growth(&mut polity, ctx);
        });
        assert!(polity.cities.is_empty());
    }

    #[test]
    fn capital_promotion_is_one_shot() {
        let world = world(1_500_000);
        let mut polity = world.polities[0].clone();
        with_update_context(&world, |ctx| {
            city_growth(&mut polity, ctx); // founds
            city_growth(&mut polity, ctx); // promotes
        });
        assert!(polity.cities[0].is_major);
        assert!(polity.capital_promoted);
        polity.cities[0].is_major = false;
        with_update_context(&world, |ctx| {
            city_growth(&mut polity, ctx);
        });
        assert!(!polity.cities[0].is_major, "promotion must not repeat");
    }
}
