//! Logistic population model.
//!
//! Carrying capacity comes from the year's food sum; the growth rate is a
//! slow baseline lifted by agrarian, industrial and medical techs and damped
//! again by the fertility transition.

use crate::config::SimConfig;
use crate::state::Polity;
use crate::tech::TechManager;

/// Carrying capacity for one polity, before rounding.
pub fn carrying_capacity(polity: &Polity, tech: &TechManager, adoption_threshold: f64) -> f64 {
    let food_k = (polity.yearly_food * 1200.0).max(1.0);
    let tech_k = tech.k_multiplier(&polity.tech, adoption_threshold);
    // Climate multiplier hook; uniform climate until a climate overlay
    // feeds per-polity values.
    let climate_k = 1.0;
    food_k * tech_k * climate_k
}

/// One year of logistic growth plus plague mortality.
/// Returns the plague deaths applied this year.
pub fn population_step(
    polity: &mut Polity,
    tech: &TechManager,
    config: &SimConfig,
    plague_affected: bool,
) -> i64 {
    if polity.dead {
        return 0;
    }
    let threshold = config.tech.adoption_threshold;
    let k = carrying_capacity(polity, tech, threshold);
    let r = tech.growth_rate_r(&polity.tech, threshold);
    let p = polity.population.max(0) as f64;
    let delta = r * p * (1.0 - p / k);
    let grown = (p + delta.round()).max(0.0);
    polity.population = if grown >= i64::MAX as f64 {
        i64::MAX
    } else {
        grown as i64
    };

    let mut plague_deaths = 0;
    if plague_affected && polity.population > 0 {
        let tech_mult = tech.plague_mortality_multiplier(&polity.tech, threshold);
        let resist = (1.0 - polity.bonuses.plague_resistance).max(0.15);
        plague_deaths =
            (polity.population as f64 * config.disease.plague_mortality * tech_mult * resist)
                .round() as i64;
        polity.population = (polity.population - plague_deaths).max(0);
    }

    // Stagnation bookkeeping feeds the stability drift.
    let growth = polity.population - polity.last_population;
    if growth <= 0 && polity.population > 0 {
        polity.stagnation_years += 1;
    } else {
        polity.stagnation_years = 0;
    }
    polity.last_population = polity.population;

    // City populations track the urban share of the total.
    if !polity.cities.is_empty() {
        let urban = (polity.population as f64 * polity.macros.urbanization.max(0.04)) as i64;
        let per_city = urban / polity.cities.len() as i64;
        for city in &mut polity.cities {
            city.population = if city.is_major {
                per_city * 2
            } else {
                per_city
            };
        }
    }
    plague_deaths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellPos;
    use crate::state::PolityType;

    fn polity_with_food(food: f64, population: i64) -> Polity {
        let mut p = Polity::new(
            0,
            "Test".into(),
            [10, 20, 30],
            CellPos::new(0, 0),
            population,
            PolityType::Pacifist,
            -5000,
            9,
        );
        p.yearly_food = food;
        p
    }

    #[test]
    fn population_approaches_carrying_capacity() {
        let tech = TechManager::new();
        let config = SimConfig::default();
        let mut p = polity_with_food(500.0, 10_000);
        let k = carrying_capacity(&p, &tech, config.tech.adoption_threshold);
        for _ in 0..60_000 {
            population_step(&mut p, &tech, &config, false);
        }
        let pop = p.population as f64;
        assert!(pop <= k.round() + 1.0);
        assert!(pop > k * 0.95, "population {pop} far below capacity {k}");
    }

    #[test]
    fn population_never_goes_negative() {
        let tech = TechManager::new();
        let config = SimConfig::default();
        let mut p = polity_with_food(0.0, 10);
        for _ in 0..100 {
            population_step(&mut p, &tech, &config, true);
        }
        assert!(p.population >= 0);
    }

    #[test]
    fn plague_kills_about_five_percent_per_year() {
        let tech = TechManager::new();
        let config = SimConfig::default();
        let mut p = polity_with_food(10_000.0, 1_000_000);
        // Large K so logistic growth is negligible next to plague deaths.
        population_step(&mut p, &tech, &config, true);
        let lost = 1_000_000 - p.population;
        assert!(lost > 30_000 && lost < 60_000, "lost {lost}");
    }

    #[test]
    fn stagnation_counter_resets_on_growth() {
        let tech = TechManager::new();
        let config = SimConfig::default();
        let mut p = polity_with_food(0.001, 1_000);
        for _ in 0..5 {
            population_step(&mut p, &tech, &config, false);
        }
        assert!(p.stagnation_years > 0);
        p.yearly_food = 500.0;
        population_step(&mut p, &tech, &config, false);
        assert_eq!(p.stagnation_years, 0);
    }
}
