//! Runtime configuration.
//!
//! The config file is TOML with one table per subsystem. Unknown keys are
//! ignored, missing keys fall back to the compiled defaults below, and
//! out-of-range values are clamped with a logged warning; a bad config
//! never stops the simulation from starting. The loader records a SHA-256
//! content hash of the file so runs can be attributed to an exact config.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimConfig {
    pub world: WorldConfig,
    pub food: FoodConfig,
    pub resources: ResourcesConfig,
    pub migration: MigrationConfig,
    pub disease: DiseaseConfig,
    pub war: WarConfig,
    pub polity: PolityConfig,
    pub tech: TechConfig,
    pub economy: EconomyConfig,
    pub scoring: ScoringConfig,
    /// SHA-256 of the loaded file, or "defaults" when none was read.
    #[serde(skip)]
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    pub years_per_tick: i32,
    pub start_year: i32,
    pub end_year: i32,
    pub rng_seed_mode: String,
    pub deterministic_mode: bool,
    /// "on" | "off" | "auto"
    pub deterministic_overseas_fallback: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            years_per_tick: 1,
            start_year: -5000,
            end_year: 2050,
            rng_seed_mode: "fixed".to_string(),
            deterministic_mode: true,
            deterministic_overseas_fallback: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FoodConfig {
    pub base_foraging: f64,
    pub base_farming: f64,
    pub climate_sensitivity: f64,
    pub riverland_food_floor: f64,
    pub coastal_bonus: f64,
    pub spoilage_base: f64,
    pub storage_base: f64,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            base_foraging: 0.8,
            base_farming: 2.4,
            climate_sensitivity: 0.6,
            riverland_food_floor: 1.5,
            coastal_bonus: 0.25,
            spoilage_base: 0.12,
            storage_base: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourcesConfig {
    pub ore_normalization: f64,
    pub energy_normalization: f64,
    pub construction_normalization: f64,
    pub ore_depletion_rate: f64,
    pub energy_biomass_base: f64,
    pub construction_stone_base: f64,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            ore_normalization: 120.0,
            energy_normalization: 120.0,
            construction_normalization: 120.0,
            ore_depletion_rate: 0.0,
            energy_biomass_base: 0.4,
            construction_stone_base: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationConfig {
    pub famine_shock_threshold: f64,
    pub epidemic_shock_threshold: f64,
    pub war_shock_threshold: f64,
    pub famine_shock_multiplier: f64,
    pub epidemic_shock_multiplier: f64,
    pub war_shock_multiplier: f64,
    pub refugee_half_life_years: f64,
    pub cultural_preference: f64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            famine_shock_threshold: 0.55,
            epidemic_shock_threshold: 0.04,
            war_shock_threshold: 0.5,
            famine_shock_multiplier: 2.0,
            epidemic_shock_multiplier: 1.6,
            war_shock_multiplier: 1.8,
            refugee_half_life_years: 12.0,
            cultural_preference: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiseaseConfig {
    /// Years the plague lasts once started.
    pub plague_duration_years: i32,
    /// Inclusive bounds on the gap between plagues.
    pub plague_interval_min: i32,
    pub plague_interval_max: i32,
    /// Baseline share of an affected polity's population lost per year.
    pub plague_mortality: f64,
    /// Re-derive the affected set every year instead of fixing it at start.
    pub recompute_membership_yearly: bool,
    pub war_amplifier: f64,
    pub famine_amplifier: f64,
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        Self {
            plague_duration_years: 3,
            plague_interval_min: 600,
            plague_interval_max: 700,
            plague_mortality: 0.05,
            recompute_membership_yearly: false,
            war_amplifier: 1.3,
            famine_amplifier: 1.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WarConfig {
    pub supply_base: f64,
    pub supply_logistics_weight: f64,
    pub supply_market_weight: f64,
    pub supply_control_weight: f64,
    pub supply_energy_weight: f64,
    pub supply_food_stock_weight: f64,
    pub over_supply_attrition: f64,
    pub terrain_defense_weight: f64,
    pub exhaustion_rise: f64,
    pub exhaustion_peace_threshold: f64,
    pub objective_raid_weight: f64,
    pub objective_border_weight: f64,
    pub objective_tribute_weight: f64,
    pub objective_vassal_weight: f64,
    pub objective_regime_weight: f64,
    pub objective_annihilation_weight: f64,
    pub cooldown_min_years: i32,
    pub cooldown_max_years: i32,
    pub peace_reconstruction_drag: f64,
    pub max_concurrent_wars: usize,
    pub opportunistic_war_threshold: f64,
    pub leader_ambition_war_weight: f64,
    pub weak_state_predation_weight: f64,
    pub early_annihilation_bias: f64,
    pub high_institution_annihilation_damp: f64,
}

impl Default for WarConfig {
    fn default() -> Self {
        Self {
            supply_base: 0.28,
            supply_logistics_weight: 0.22,
            supply_market_weight: 0.14,
            supply_control_weight: 0.14,
            supply_energy_weight: 0.10,
            supply_food_stock_weight: 0.12,
            over_supply_attrition: 0.16,
            terrain_defense_weight: 0.10,
            exhaustion_rise: 0.035,
            exhaustion_peace_threshold: 0.85,
            objective_raid_weight: 1.0,
            objective_border_weight: 1.0,
            objective_tribute_weight: 0.8,
            objective_vassal_weight: 0.6,
            objective_regime_weight: 0.5,
            objective_annihilation_weight: 0.45,
            cooldown_min_years: 8,
            cooldown_max_years: 25,
            peace_reconstruction_drag: 0.06,
            max_concurrent_wars: 3,
            opportunistic_war_threshold: 1.08,
            leader_ambition_war_weight: 0.5,
            weak_state_predation_weight: 0.6,
            early_annihilation_bias: 0.35,
            high_institution_annihilation_damp: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolityConfig {
    pub region_count_min: usize,
    pub region_count_max: usize,
    pub succession_interval_min: i32,
    pub succession_interval_max: i32,
    pub elite_defection_sensitivity: f64,
    pub far_region_penalty: f64,
    pub yearly_war_stability_hit: f64,
    pub yearly_plague_stability_hit: f64,
    pub yearly_stagnation_stability_hit: f64,
    pub peace_recovery_low_growth: f64,
    pub peace_recovery_high_growth: f64,
    pub resilience_recovery_strength: f64,
    pub legitimacy_recovery_strength: f64,
    pub expansion_cell_cap: usize,
    pub rename_cooldown_years: i32,
}

impl Default for PolityConfig {
    fn default() -> Self {
        Self {
            region_count_min: 2,
            region_count_max: 6,
            succession_interval_min: 18,
            succession_interval_max: 42,
            elite_defection_sensitivity: 0.6,
            far_region_penalty: 0.08,
            yearly_war_stability_hit: 0.030,
            yearly_plague_stability_hit: 0.040,
            yearly_stagnation_stability_hit: 0.012,
            peace_recovery_low_growth: 0.010,
            peace_recovery_high_growth: 0.020,
            resilience_recovery_strength: 0.035,
            legitimacy_recovery_strength: 0.030,
            expansion_cell_cap: 170,
            rename_cooldown_years: 220,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TechConfig {
    pub discovery_base: f64,
    pub discovery_difficulty_scale: f64,
    pub adoption_base_speed: f64,
    pub adoption_decay_base: f64,
    /// Adoption at which a known tech counts as unlocked. Clamped 0.10..0.95.
    pub adoption_threshold: f64,
    pub collapse_decay_multiplier: f64,
    pub diffusion_base: f64,
    pub cultural_friction_strength: f64,
    pub known_diffusion_base: f64,
    pub known_diffusion_top_k: usize,
    pub prereq_adoption_fraction: f64,
    pub rare_forget_years: u16,
    pub rare_forget_chance: f64,
    pub resource_req_energy: f64,
    pub resource_req_ore: f64,
    pub resource_req_construction: f64,
    pub discovery_seed_adoption: f64,
    pub adoption_seed_from_neighbors: f64,
    pub max_discoveries_per_year: usize,
}

impl Default for TechConfig {
    fn default() -> Self {
        Self {
            discovery_base: 4.0,
            discovery_difficulty_scale: 0.9,
            adoption_base_speed: 4.0,
            adoption_decay_base: 0.020,
            adoption_threshold: 0.65,
            collapse_decay_multiplier: 2.5,
            diffusion_base: 0.6,
            cultural_friction_strength: 1.6,
            known_diffusion_base: 6.0,
            known_diffusion_top_k: 8,
            prereq_adoption_fraction: 1.0,
            rare_forget_years: 30,
            rare_forget_chance: 0.05,
            resource_req_energy: 0.35,
            resource_req_ore: 0.35,
            resource_req_construction: 0.35,
            discovery_seed_adoption: 0.08,
            adoption_seed_from_neighbors: 0.05,
            max_discoveries_per_year: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EconomyConfig {
    pub food_labor_elasticity: f64,
    pub goods_labor_elasticity: f64,
    pub services_labor_elasticity: f64,
    pub energy_intensity: f64,
    pub ore_intensity: f64,
    pub goods_to_military: f64,
    pub services_scaling: f64,
    pub trade_intensity_scale: f64,
    pub trade_intensity_value_norm_base: f64,
    /// Exponential-memory factor on the intensity matrix (0 = no memory).
    pub trade_intensity_memory: f64,
    pub credit_friction_weight: f64,
    pub information_friction_weight: f64,
    /// Additive multiplier a sea shipping route applies to a pair's
    /// per-route throughput.
    pub sea_route_multiplier: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            food_labor_elasticity: 0.55,
            goods_labor_elasticity: 0.35,
            services_labor_elasticity: 0.45,
            energy_intensity: 0.3,
            ore_intensity: 0.3,
            goods_to_military: 0.25,
            services_scaling: 0.4,
            trade_intensity_scale: 1.0,
            trade_intensity_value_norm_base: 40.0,
            trade_intensity_memory: 0.6,
            credit_friction_weight: 0.3,
            information_friction_weight: 0.3,
            sea_route_multiplier: 1.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub checkpoints_years: Vec<i32>,
    pub weight_food_security_stability: f64,
    pub weight_innovation_urbanization: f64,
    pub weight_empire_logistics_constraint: f64,
    pub weight_disease_transition: f64,
    pub weight_trade_resource_inequality: f64,
    pub weight_variance_penalty: f64,
    pub weight_brittleness_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            checkpoints_years: vec![-3000, -1000, 0, 1000, 1500, 1900, 2000],
            weight_food_security_stability: 1.0,
            weight_innovation_urbanization: 1.0,
            weight_empire_logistics_constraint: 1.0,
            weight_disease_transition: 1.0,
            weight_trade_resource_inequality: 1.0,
            weight_variance_penalty: 0.5,
            weight_brittleness_penalty: 0.5,
        }
    }
}

impl SimConfig {
    /// Load from a TOML file. IO and parse failures are hard errors; the
    /// caller decides whether to fall back to [`SimConfig::default`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: SimConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        config.content_hash = format!("{:x}", hasher.finalize());
        config.clamp_ranges();
        Ok(config)
    }

    /// Load, falling back to compiled defaults on any failure (logged once).
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("{err}; using built-in defaults");
                let mut config = Self::default();
                config.content_hash = "defaults".to_string();
                config
            }
        }
    }

    /// Clamp values whose documented range the file may have violated.
    /// One log line per correction; never an error.
    fn clamp_ranges(&mut self) {
        let mut clamp = |name: &str, value: &mut f64, lo: f64, hi: f64| {
            if value.is_nan() || *value < lo || *value > hi {
                let fixed = if value.is_nan() { lo } else { value.clamp(lo, hi) };
                log::warn!("config: {name}={value} out of range [{lo}, {hi}], clamped to {fixed}");
                *value = fixed;
            }
        };
        clamp("tech.adoptionThreshold", &mut self.tech.adoption_threshold, 0.10, 0.95);
        clamp("tech.prereqAdoptionFraction", &mut self.tech.prereq_adoption_fraction, 0.25, 1.0);
        clamp("tech.rareForgetChance", &mut self.tech.rare_forget_chance, 0.0, 1.0);
        clamp("war.exhaustionPeaceThreshold", &mut self.war.exhaustion_peace_threshold, 0.1, 1.0);
        clamp("war.overSupplyAttrition", &mut self.war.over_supply_attrition, 0.0, 1.0);
        clamp("disease.plagueMortality", &mut self.disease.plague_mortality, 0.0, 1.0);
        clamp("economy.tradeIntensityMemory", &mut self.economy.trade_intensity_memory, 0.0, 0.99);
        if self.war.cooldown_max_years < self.war.cooldown_min_years {
            log::warn!("config: war cooldown range inverted, swapping");
            std::mem::swap(&mut self.war.cooldown_min_years, &mut self.war.cooldown_max_years);
        }
        if self.polity.region_count_max < self.polity.region_count_min {
            std::mem::swap(&mut self.polity.region_count_min, &mut self.polity.region_count_max);
        }
        self.world.years_per_tick = self.world.years_per_tick.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = SimConfig::default();
        assert_eq!(config.world.start_year, -5000);
        assert!(config.tech.adoption_threshold >= 0.10);
        assert!(config.war.cooldown_min_years <= config.war.cooldown_max_years);
    }

    #[test]
    fn partial_file_fills_from_defaults_and_ignores_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[world]
startYear = -3000
someFutureKey = "ignored"

[tech]
adoptionThreshold = 0.5
"#
        )
        .unwrap();
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.world.start_year, -3000);
        assert_eq!(config.world.end_year, 2050); // default preserved
        assert_eq!(config.tech.adoption_threshold, 0.5);
        assert_ne!(config.content_hash, "defaults");
        assert_eq!(config.content_hash.len(), 64);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tech]
adoptionThreshold = 7.0

[war]
cooldownMinYears = 30
cooldownMaxYears = 5
"#
        )
        .unwrap();
        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.tech.adoption_threshold, 0.95);
        assert!(config.war.cooldown_min_years <= config.war.cooldown_max_years);
    }

    #[test]
    fn missing_file_falls_back() {
        let config = SimConfig::load_or_default(Path::new("/no/such/config.toml"));
        assert_eq!(config.content_hash, "defaults");
        assert_eq!(config.world.end_year, 2050);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not [valid toml").unwrap();
        assert!(matches!(
            SimConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
