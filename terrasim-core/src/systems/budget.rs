//! Per-tick budget scratch reset and the yearly fiscal pass.

use crate::bounded::clamp01;
use crate::state::{Polity, World};

/// Reset per-tick macro scratch and set the year's income and
/// expense expectations from last year's tax take.
pub fn begin_year(polity: &mut Polity) {
    polity.budget.normalize();
    polity.income_annual = polity.last_tax_take;
    let spend = polity.treasury_spend_rate.get() + if polity.war.is_at_war { 0.25 } else { 0.0 };
    polity.expenses_annual = polity.income_annual * spend;
    polity.resources = Default::default();
}

/// Yearly fiscal pass: tax take, shortfall financing, debt service,
/// capacity accrual, and the slow macro-index drift that follows the money.
pub fn run_fiscal_tick(world: &mut World) {
    let n = world.polities.len();
    for i in 0..n {
        let exports = world.trade.exports.get(i).copied().unwrap_or(0.0);
        let polity = &mut world.polities[i];
        if polity.dead {
            continue;
        }

        // Output proxy: population working at the polity's access and
        // specialization level, plus trade exports.
        let pop = polity.population.max(0) as f64;
        let productivity = 0.4
            + 0.6 * polity.macros.market_access
            + 0.5 * polity.macros.specialization
            + 0.3 * polity.macros.human_capital;
        let output = pop / 1000.0 * productivity + exports;
        polity.macros.last_nonfood_output = output * (1.0 - 0.35 * polity.macros.famine_severity);
        polity.macros.last_nonfood_cons = pop / 1000.0 * 0.35;

        let take = polity.tax_rate.get() * output * (0.5 + 0.5 * polity.fiscal_capacity);
        polity.last_tax_take = take;
        polity.gold += take - polity.expenses_annual;

        // Debt service; shortfalls roll into debt rather than halting.
        if polity.debt > 0.0 {
            let service = polity.debt * 0.04;
            polity.gold -= service;
        }
        if polity.gold < 0.0 {
            polity.debt += -polity.gold;
            polity.gold = 0.0;
            polity.legitimacy = clamp01(polity.legitimacy - 0.005);
        } else if polity.debt > 0.0 {
            let repay = polity.gold.min(polity.debt * 0.10);
            polity.gold -= repay;
            polity.debt -= repay;
        }

        // Capacity accrual follows the budget shares.
        let b = polity.budget;
        polity.fiscal_capacity = clamp01(
            polity.fiscal_capacity + 0.006 * b.admin * (0.5 + polity.macros.institution_capacity)
                - 0.001,
        );
        polity.admin_capacity = clamp01(
            polity.admin_capacity
                + 0.005 * b.admin * (0.4 + 0.6 * polity.macros.human_capital)
                - 0.0012,
        );
        polity.logistics_reach = clamp01(
            polity.logistics_reach + 0.004 * b.infra * (0.5 + polity.macros.connectivity)
                - 0.0008,
        );
        polity.military_strength = (polity.military_strength
            + 0.02 * b.military * (0.5 + polity.macros.last_nonfood_output.min(1e6) / 1e6)
            - 0.004 * (1.0 - b.military))
            .clamp(0.05, polity.kind.base_military_strength() * 4.0);

        refresh_macro_indices(polity, exports);
        polity.clamp_scalars();
    }
}

/// Macro indices the rest of the pipeline reads next year.
fn refresh_macro_indices(polity: &mut Polity, exports: f64) {
    let pop = polity.population.max(1) as f64;
    let m = &mut polity.macros;

    m.urbanization = clamp01(polity.cities.iter().map(|c| c.population).sum::<i64>() as f64 / pop);
    m.market_access = clamp01(
        0.9 * m.market_access
            + 0.1 * clamp01(0.3 + exports / (1.0 + pop / 1000.0) + 0.2 * m.urbanization),
    );
    m.human_capital = clamp01(m.human_capital + 0.02 * polity.budget.education - 0.003);
    let crafts = polity.classes[crate::state::CLASS_ARTISANS].share
        + polity.classes[crate::state::CLASS_MERCHANTS].share
        + polity.classes[crate::state::CLASS_BUREAUCRATS].share;
    m.specialization = clamp01(
        m.specialization + 0.01 * (m.urbanization + m.market_access + 2.0 * crafts) - 0.002,
    );
    m.institution_capacity = clamp01(
        m.institution_capacity
            + 0.004 * (polity.budget.admin + polity.budget.education)
                * (0.5 + 0.5 * polity.stability)
            - 0.001,
    );
    m.connectivity = clamp01(
        0.95 * m.connectivity
            + 0.05
                * clamp01(
                    0.15 * polity.roads.len() as f64 / 8.0
                        + 0.3 * polity.ports.len() as f64 / 4.0
                        + 0.3 * polity.airways.len() as f64 / 6.0
                        + 0.4 * m.market_access,
                ),
    );
    m.knowledge_stock = clamp01(
        (polity.knowledge.iter().sum::<f64>() / 50_000.0).sqrt().min(1.0),
    );
    m.inequality = clamp01(
        m.inequality
            + 0.004 * (polity.tax_rate.get() - 0.15)
            + 0.002 * m.market_access
            - 0.006 * (polity.budget.health + polity.budget.education),
    );
    m.idea_market_integration =
        clamp01(0.95 * m.idea_market_integration + 0.05 * (0.5 * m.market_access + 0.5 * m.urbanization));
    m.media_throughput = clamp01(
        0.95 * m.media_throughput + 0.05 * (0.4 * m.human_capital + 0.6 * m.connectivity),
    );
    m.credible_commitment = clamp01(
        0.95 * m.credible_commitment
            + 0.05 * (0.5 * m.institution_capacity + 0.5 * polity.legitimacy),
    );
    m.merchant_power = clamp01(
        0.95 * m.merchant_power
            + 0.05 * (polity.classes[crate::state::CLASS_MERCHANTS].share * 3.0),
    );
    m.relative_factor_price = clamp01(
        0.98 * m.relative_factor_price + 0.02 * (0.3 + 0.7 * m.market_access),
    );

    // Food security from this year's carrying headroom.
    let k = (polity.yearly_food * 1200.0).max(1.0);
    let ratio = k / pop;
    m.food_security = clamp01(ratio / 1.25);
    m.famine_severity = clamp01((0.55 - m.food_security).max(0.0) / 0.55);

    // Food stock carries a season's surplus forward.
    let surplus = (k - pop).max(0.0);
    polity.food_stock = (0.8 * polity.food_stock + 0.2 * surplus).max(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;

    #[test]
    fn fiscal_tick_accrues_capacity_and_never_breaks_clamps() {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(12, 12, 4.0), 3);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(3, 3), 50_000);
        world.polities[0].yearly_food = 100.0;
        world.polities[0].last_tax_take = 50.0;
        let admin_before = world.polities[0].admin_capacity;
        for _ in 0..50 {
            begin_year(&mut world.polities[0]);
            run_fiscal_tick(&mut world);
        }
        let p = &world.polities[0];
        assert!(p.admin_capacity >= admin_before);
        assert!((0.0..=1.0).contains(&p.fiscal_capacity));
        assert!(p.gold >= 0.0);
        assert!(p.debt >= 0.0);
        assert!((p.budget.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shortfall_rolls_into_debt() {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(12, 12, 4.0), 3);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(3, 3), 1_000);
        let p = &mut world.polities[0];
        p.last_tax_take = 100.0;
        p.treasury_spend_rate.set(2.2);
        begin_year(p);
        assert!(p.expenses_annual > p.income_annual);
        run_fiscal_tick(&mut world);
        assert!(world.polities[0].debt > 0.0 || world.polities[0].gold >= 0.0);
    }
}
