//! Stability and legitimacy drift.
//!
//! Single additive step per year, clamped at the end. Crisis hits scale
//! down with resilience; recovery scales up with it. A structural floor
//! keeps capable polities from pinning at zero forever.

use crate::bounded::clamp01;
use crate::config::SimConfig;
use crate::state::Polity;

/// Severity of the current crisis mix, used to damp recovery terms.
fn crisis_level(polity: &Polity, plague_affected: bool) -> f64 {
    let mut crisis: f64 = 0.0;
    if polity.war.is_at_war {
        crisis += 0.45 + 0.35 * polity.war.war_exhaustion;
    }
    if plague_affected {
        crisis += 0.35;
    }
    crisis += 0.5 * polity.macros.famine_severity;
    clamp01(crisis)
}

pub fn stability_drift(polity: &mut Polity, config: &SimConfig, plague_affected: bool) {
    let cfg = &config.polity;
    let resilience = polity.resilience();
    let crisis = crisis_level(polity, plague_affected);
    let mut delta = 0.0;
    let mut in_crisis = false;

    if polity.war.is_at_war {
        in_crisis = true;
        delta -= cfg.yearly_war_stability_hit
            * (0.70 + 0.90 * polity.war.war_exhaustion)
            * (1.0 - 0.45 * resilience);
    }
    if plague_affected {
        in_crisis = true;
        delta -= cfg.yearly_plague_stability_hit
            * (1.0 - 0.40 * polity.budget.health - 0.35 * polity.macros.institution_capacity);
    }
    if polity.stagnation_years > 20 {
        in_crisis = true;
        delta -= cfg.yearly_stagnation_stability_hit * (0.70 + 0.30 * (1.0 - resilience));
    }
    if !in_crisis {
        let growth_recovery = if polity.population > polity.last_population {
            cfg.peace_recovery_high_growth
        } else {
            cfg.peace_recovery_low_growth
        };
        delta += growth_recovery * (0.45 + 0.55 * resilience);
    }

    // Tail recovery pulls hard-hit but capable polities back up.
    let low_stability = clamp01(1.0 - polity.stability / 0.5);
    delta += cfg.resilience_recovery_strength * low_stability * resilience * (1.0 - 0.75 * crisis);

    polity.stability = clamp01(polity.stability + delta);
    let floor = 0.04 * resilience * (1.0 - 0.85 * crisis);
    polity.stability = polity.stability.max(floor);
}

pub fn legitimacy_drift(polity: &mut Polity, config: &SimConfig, plague_affected: bool) {
    let cfg = &config.polity;
    let resilience = polity.resilience();
    let crisis = crisis_level(polity, plague_affected);
    let mut delta = 0.0;

    // Tax pain beyond the tolerated band.
    let tax_pain = (polity.tax_rate.get() - 0.18).max(0.0);
    delta -= 0.15 * tax_pain;

    // Debt stress in years-of-income.
    let income = polity.income_annual.max(1.0);
    let debt_years = polity.debt / income;
    delta -= 0.010 * debt_years.min(4.0);

    // Service stress: spending starved below a basic floor.
    let service_share = polity.budget.health + polity.budget.education + polity.budget.infra;
    if service_share < 0.25 {
        delta -= 0.020 * (0.25 - service_share) / 0.25;
    }

    // Weak territorial control reads as weak rule.
    delta -= 0.015 * (1.0 - polity.avg_control);

    // Food shortfall.
    if polity.macros.food_security < 0.85 {
        delta -= 0.030 * (0.85 - polity.macros.food_security) / 0.85;
    }

    if polity.war.is_at_war {
        delta -= 0.012 * (0.6 + polity.war.war_exhaustion);
    }
    if plague_affected {
        delta -= 0.015 * (1.0 - 0.35 * polity.macros.institution_capacity);
    }

    let low_legit = clamp01(1.0 - polity.legitimacy / 0.5);
    delta += cfg.legitimacy_recovery_strength
        * low_legit
        * polity.macros.institution_capacity
        * (0.3 + 0.7 * polity.admin_capacity)
        * (0.3 + 0.7 * polity.avg_control)
        * (0.3 + 0.7 * polity.macros.food_security)
        * (1.0 - 0.80 * crisis);

    polity.legitimacy = clamp01(polity.legitimacy + delta);
    let floor = 0.03 * polity.macros.institution_capacity * (1.0 - 0.85 * crisis);
    polity.legitimacy = polity.legitimacy.max(floor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellPos;
    use crate::state::PolityType;

    fn polity() -> Polity {
        Polity::new(
            0,
            "Test".into(),
            [0, 0, 0],
            CellPos::new(0, 0),
            10_000,
            PolityType::Trader,
            0,
            5,
        )
    }

    #[test]
    fn war_erodes_stability() {
        let config = SimConfig::default();
        let mut p = polity();
        p.war.is_at_war = true;
        p.war.war_exhaustion = 0.8;
        let before = p.stability;
        for _ in 0..10 {
            stability_drift(&mut p, &config, false);
        }
        assert!(p.stability < before);
    }

    #[test]
    fn peace_recovers_and_clamps_to_unit_interval() {
        let config = SimConfig::default();
        let mut p = polity();
        p.stability = 0.2;
        p.macros.institution_capacity = 0.8;
        p.admin_capacity = 0.8;
        for _ in 0..200 {
            p.last_population = p.population - 1; // growth
            stability_drift(&mut p, &config, false);
        }
        assert!(p.stability > 0.5);
        assert!(p.stability <= 1.0);
    }

    #[test]
    fn capable_polities_keep_a_structural_floor() {
        let config = SimConfig::default();
        let mut p = polity();
        p.stability = 0.0;
        p.macros.institution_capacity = 0.9;
        p.admin_capacity = 0.9;
        p.avg_control = 0.9;
        p.legitimacy = 0.9;
        stability_drift(&mut p, &config, false);
        assert!(p.stability > 0.0);
    }

    #[test]
    fn heavy_taxation_drags_legitimacy() {
        let config = SimConfig::default();
        let mut light = polity();
        let mut heavy = polity();
        heavy.tax_rate.set(0.45);
        light.tax_rate.set(0.05);
        for _ in 0..20 {
            legitimacy_drift(&mut light, &config, false);
            legitimacy_drift(&mut heavy, &config, false);
        }
        assert!(heavy.legitimacy < light.legitimacy);
    }
}
