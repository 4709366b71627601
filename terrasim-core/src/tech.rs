//! Technology DAG, per-polity dense tech state, and tech effects.
//!
//! The catalogue is static data (see [`crate::tech_table`]). A polity's
//! per-tech state is the dense triple `(known, adoption, low_adoption_years)`
//! indexed by the catalogue's stable dense order. "Known" means discovered;
//! "unlocked" means adoption crossed the configured threshold.

use crate::bounded::clamp01;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compact bit set for the per-polity `known` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitSet {
    bits: Vec<u64>,
    len: usize,
}

impl BitSet {
    pub fn with_len(len: usize) -> Self {
        Self {
            bits: vec![0; (len + 63) / 64],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && (self.bits[idx / 64] >> (idx % 64)) & 1 == 1
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        if idx >= self.len {
            return;
        }
        let word = &mut self.bits[idx / 64];
        if value {
            *word |= 1 << (idx % 64);
        } else {
            *word &= !(1 << (idx % 64));
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    fn grow(&mut self, len: usize) {
        if len > self.len {
            self.len = len;
            self.bits.resize((len + 63) / 64, 0);
        }
    }
}

/// Dense per-polity technology state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechState {
    pub known: BitSet,
    pub adoption: Vec<f32>,
    pub low_adoption_years: Vec<u16>,
}

impl TechState {
    pub fn ensure_size(&mut self, n: usize) {
        self.known.grow(n);
        if self.adoption.len() < n {
            self.adoption.resize(n, 0.0);
        }
        if self.low_adoption_years.len() < n {
            self.low_adoption_years.resize(n, 0);
        }
    }

    pub fn known_count(&self) -> usize {
        self.known.count()
    }

    /// Wipe all dense state (editor override entry point).
    pub fn reset(&mut self) {
        self.known.clear();
        self.adoption.iter_mut().for_each(|a| *a = 0.0);
        self.low_adoption_years.iter_mut().for_each(|y| *y = 0);
    }
}

/// Per-tech static feasibility gates. Zero means "no requirement".
#[derive(Debug, Clone, Copy, Default)]
pub struct FeasibilityGates {
    pub requires_coast: bool,
    pub requires_river_or_wetland: bool,
    pub min_climate_food: f64,
    pub min_farming: f64,
    pub min_foraging: f64,
    pub min_ore: f64,
    pub min_energy: f64,
    pub min_construction: f64,
    pub min_institution: f64,
    pub min_specialization: f64,
    pub min_plant_domestication: f64,
    pub min_herd_domestication: f64,
}

#[derive(Debug, Clone)]
pub struct Technology {
    pub id: u32,
    pub name: &'static str,
    /// Domain knowledge needed before discovery hazard ramps in.
    pub threshold: f64,
    /// Stable progression order; dense indices sort by (order, id).
    pub order: i32,
    pub difficulty: f64,
    pub key_transition: bool,
    pub domain: usize,
    pub prereqs: &'static [u32],
    pub gates: FeasibilityGates,
}

/// Induced-innovation search bias classes, inferred from name + domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBias {
    Neutral,
    LaborSaving,
    EnergyUsing,
    MaterialsIntensive,
    Information,
    Institutions,
}

/// Per-polity signals feeding feasibility, discovery and adoption.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolitySignals {
    pub population: f64,
    pub urbanization: f64,
    pub specialization: f64,
    pub institution: f64,
    pub stability: f64,
    pub legitimacy: f64,
    pub market_access: f64,
    pub connectivity: f64,
    pub openness: f64,
    pub inequality: f64,
    pub fragmentation: f64,
    pub idea_market: f64,
    pub credible_commitment: f64,
    pub relative_factor_price: f64,
    pub media_throughput: f64,
    pub merchant_power: f64,
    pub food_security: f64,
    pub famine_severity: f64,
    pub at_war: bool,
    pub climate_food_mult: f64,
    pub farming_potential: f64,
    pub foraging_potential: f64,
    pub ore_avail: f64,
    pub energy_avail: f64,
    pub construction_avail: f64,
    pub coast_access: f64,
    pub river_wetland_share: f64,
    pub plant_domestication: f64,
    pub herd_domestication: f64,
}

/// Recomputed multipliers from the static (tech id → bonus deltas) table,
/// scaled by adoption.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TechBonuses {
    pub plague_resistance: f64,
    pub military_strength_bonus: f64,
    pub territory_capture_bonus: f64,
    pub defensive_bonus: f64,
    pub war_duration_reduction: f64,
    pub max_size_multiplier: f64,
    pub flat_max_size_bonus: i32,
    pub expansion_rate_bonus: i32,
    pub burst_radius: i32,
    pub burst_frequency: i32,
    pub war_burst_radius: i32,
    pub war_burst_frequency: i32,
    pub science_points_bonus: f64,
    pub research_multiplier: f64,
}

impl Default for TechBonuses {
    fn default() -> Self {
        Self {
            plague_resistance: 0.0,
            military_strength_bonus: 0.0,
            territory_capture_bonus: 0.0,
            defensive_bonus: 0.0,
            war_duration_reduction: 0.0,
            max_size_multiplier: 1.0,
            flat_max_size_bonus: 0,
            expansion_rate_bonus: 0,
            burst_radius: 1,
            burst_frequency: 0,
            war_burst_radius: 1,
            war_burst_frequency: 0,
            science_points_bonus: 0.0,
            research_multiplier: 1.0,
        }
    }
}

/// `smoothstep` on the unit interval.
pub fn smooth01(x: f64) -> f64 {
    let t = clamp01(x);
    t * t * (3.0 - 2.0 * t)
}

/// Well-known tech ids referenced by named systems.
/// Keep aligned with the catalogue in `tech_table`.
pub mod tech_id {
    pub const POTTERY: u32 = 1;
    pub const ARCHERY: u32 = 3;
    pub const SAILING: u32 = 5;
    pub const WHEEL: u32 = 7;
    pub const IRRIGATION: u32 = 10;
    pub const WRITING: u32 = 11;
    pub const SHIPBUILDING: u32 = 12;
    pub const IRON_WORKING: u32 = 13;
    pub const CURRENCY: u32 = 15;
    pub const CONSTRUCTION: u32 = 16;
    pub const ROADS: u32 = 17;
    pub const HORSEBACK_RIDING: u32 = 18;
    pub const AGRICULTURE: u32 = 20;
    pub const ENGINEERING: u32 = 23;
    pub const DEMOCRACY: u32 = 27;
    pub const EDUCATION: u32 = 30;
    pub const CIVIL_SERVICE: u32 = 32;
    pub const BANKING: u32 = 34;
    pub const MARKETS: u32 = 35;
    pub const UNIVERSITIES: u32 = 39;
    pub const ASTRONOMY: u32 = 40;
    pub const CHEMISTRY: u32 = 41;
    pub const METALLURGY: u32 = 42;
    pub const NAVIGATION: u32 = 43;
    pub const ECONOMICS: u32 = 45;
    pub const PRINTING_PRESS: u32 = 46;
    pub const SCIENTIFIC_METHOD: u32 = 49;
    pub const RIFLING: u32 = 50;
    pub const STEAM_ENGINE: u32 = 51;
    pub const INDUSTRIALIZATION: u32 = 52;
    pub const VACCINATION: u32 = 53;
    pub const ELECTRICITY: u32 = 54;
    pub const RAILROAD: u32 = 55;
    pub const REPLACEABLE_PARTS: u32 = 57;
    pub const TELEGRAPH: u32 = 58;
    pub const TELEPHONE: u32 = 59;
    pub const FLIGHT: u32 = 61;
    pub const MASS_PRODUCTION: u32 = 63;
    pub const PENICILLIN: u32 = 65;
    pub const COMPUTERS: u32 = 69;
    pub const REFRIGERATION: u32 = 71;
    pub const INTERNET: u32 = 79;
    pub const PERSONAL_COMPUTERS: u32 = 80;
    pub const GENETIC_ENGINEERING: u32 = 81;
    pub const ARTIFICIAL_INTELLIGENCE: u32 = 85;
    pub const BIOTECHNOLOGY: u32 = 90;
    pub const SANITATION: u32 = 96;
}

pub struct TechManager {
    techs: BTreeMap<u32, Technology>,
    /// Tech ids sorted by (order, id); position is the dense index.
    sorted_ids: Vec<u32>,
    dense_of_id: BTreeMap<u32, usize>,
}

impl Default for TechManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TechManager {
    pub fn new() -> Self {
        let techs = crate::tech_table::build_catalogue();
        let mut sorted_ids: Vec<u32> = techs.keys().copied().collect();
        sorted_ids.sort_by_key(|id| {
            let t = &techs[id];
            (t.order, t.id)
        });
        let dense_of_id = sorted_ids
            .iter()
            .enumerate()
            .map(|(dense, &id)| (id, dense))
            .collect();
        Self {
            techs,
            sorted_ids,
            dense_of_id,
        }
    }

    pub fn count(&self) -> usize {
        self.sorted_ids.len()
    }

    pub fn get(&self, id: u32) -> Option<&Technology> {
        self.techs.get(&id)
    }

    pub fn sorted_ids(&self) -> &[u32] {
        &self.sorted_ids
    }

    pub fn dense_index(&self, id: u32) -> Option<usize> {
        self.dense_of_id.get(&id).copied()
    }

    pub fn id_of_dense(&self, dense: usize) -> Option<u32> {
        self.sorted_ids.get(dense).copied()
    }

    pub fn tech_of_dense(&self, dense: usize) -> Option<&Technology> {
        self.id_of_dense(dense).and_then(|id| self.techs.get(&id))
    }

    pub fn knows(&self, state: &TechState, id: u32) -> bool {
        self.dense_index(id).is_some_and(|d| state.known.get(d))
    }

    pub fn adoption(&self, state: &TechState, id: u32) -> f32 {
        self.dense_index(id)
            .map(|d| state.adoption.get(d).copied().unwrap_or(0.0))
            .unwrap_or(0.0)
    }

    /// Unlocked means adoption at or above the configured threshold.
    pub fn is_unlocked(&self, state: &TechState, id: u32, threshold: f64) -> bool {
        self.adoption(state, id) as f64 >= threshold
    }

    /// Ids unlocked at `threshold`, in dense order.
    pub fn unlocked_ids(&self, state: &TechState, threshold: f64) -> Vec<u32> {
        self.sorted_ids
            .iter()
            .enumerate()
            .filter(|(dense, _)| {
                state.adoption.get(*dense).copied().unwrap_or(0.0) as f64 >= threshold
            })
            .map(|(_, &id)| id)
            .collect()
    }

    pub fn prereqs_known(&self, state: &TechState, tech: &Technology) -> bool {
        tech.prereqs.iter().all(|&req| self.knows(state, req))
    }

    /// All prerequisites adopted at `0.65 · prereq_adoption_fraction`
    /// (clamped 0.15..0.95).
    pub fn prereqs_adopted(&self, state: &TechState, tech: &Technology, fraction: f64) -> bool {
        let threshold = (0.65 * fraction).clamp(0.15, 0.95) as f32;
        tech.prereqs.iter().all(|&req| {
            self.dense_index(req)
                .is_some_and(|d| state.adoption.get(d).copied().unwrap_or(0.0) >= threshold)
        })
    }

    pub fn is_feasible(&self, tech: &Technology, s: &PolitySignals) -> bool {
        let g = &tech.gates;
        if g.requires_coast && s.coast_access <= 0.03 {
            return false;
        }
        if g.requires_river_or_wetland && s.river_wetland_share <= 0.06 {
            return false;
        }
        s.climate_food_mult >= g.min_climate_food
            && s.farming_potential >= g.min_farming
            && s.foraging_potential >= g.min_foraging
            && s.ore_avail >= g.min_ore
            && s.energy_avail >= g.min_energy
            && s.construction_avail >= g.min_construction
            && s.institution >= g.min_institution
            && s.specialization >= g.min_specialization
            && s.plant_domestication >= g.min_plant_domestication
            && s.herd_domestication >= g.min_herd_domestication
    }

    pub fn search_bias(&self, tech: &Technology) -> SearchBias {
        let n = tech.name.to_ascii_lowercase();
        let has = |kw: &str| n.contains(kw);
        if tech.domain == 6
            || has("printing")
            || has("paper")
            || has("writing")
            || has("alphabet")
            || has("telegraph")
            || has("radio")
            || has("internet")
            || has("computer")
            || has("education")
        {
            return SearchBias::Information;
        }
        if tech.domain == 4
            || has("bank")
            || has("currency")
            || has("civil service")
            || has("economics")
            || has("market")
        {
            return SearchBias::Institutions;
        }
        if has("steam") || has("engine") || has("industrial") || has("rail") || has("electric") {
            return SearchBias::EnergyUsing;
        }
        if has("metall") || has("mining") || has("smelting") || has("steel") || has("iron")
            || has("bronze")
        {
            return SearchBias::MaterialsIntensive;
        }
        if has("automation") || has("machine") || has("mechan") || has("assembly") {
            return SearchBias::LaborSaving;
        }
        SearchBias::Neutral
    }

    /// Induced-innovation bias multiplier, clamped 0.35..2.20.
    pub fn induced_bias(&self, tech: &Technology, s: &PolitySignals) -> f64 {
        let mut mult = match self.search_bias(tech) {
            SearchBias::LaborSaving => 0.85 + 0.55 * s.relative_factor_price,
            SearchBias::EnergyUsing => {
                0.80 + 0.45 * s.relative_factor_price + 0.35 * s.energy_avail
            }
            SearchBias::MaterialsIntensive => 0.85 + 0.55 * s.ore_avail,
            SearchBias::Information => 0.80 + 0.55 * s.media_throughput + 0.35 * s.idea_market,
            SearchBias::Institutions => {
                0.82 + 0.50 * s.credible_commitment + 0.35 * s.merchant_power
            }
            SearchBias::Neutral => 1.0,
        };
        mult *= 0.85 + 0.30 * s.fragmentation;
        mult *= 0.80 + 0.35 * s.idea_market;
        mult.clamp(0.35, 2.20)
    }

    /// Rebuild a polity's bonus multipliers from its adoption levels.
    pub fn recompute_bonuses(&self, state: &TechState, adoption_threshold: f64) -> TechBonuses {
        let mut bonuses = TechBonuses::default();
        for (dense, &id) in self.sorted_ids.iter().enumerate() {
            let a = state.adoption.get(dense).copied().unwrap_or(0.0) as f64;
            if a <= 0.001 {
                continue;
            }
            let scale = smooth01(a / adoption_threshold.max(0.05));
            if scale <= 0.0 {
                continue;
            }
            crate::tech_table::apply_bonus(&mut bonuses, id, scale);
        }
        bonuses
    }

    /// Carrying-capacity multiplier from unlocked techs.
    pub fn k_multiplier(&self, state: &TechState, threshold: f64) -> f64 {
        const FOOD_CLUSTER: &[(u32, f64)] = &[
            (tech_id::IRRIGATION, 1.06),
            (tech_id::AGRICULTURE, 1.10),
            (tech_id::ENGINEERING, 1.05),
            (tech_id::ROADS, 1.03),
            (tech_id::CIVIL_SERVICE, 1.03),
            (tech_id::BANKING, 1.03),
            (tech_id::ECONOMICS, 1.04),
            (tech_id::CHEMISTRY, 1.12),
            (tech_id::RAILROAD, 1.20),
            (tech_id::STEAM_ENGINE, 1.15),
            (tech_id::MASS_PRODUCTION, 1.10),
            (tech_id::REPLACEABLE_PARTS, 1.08),
            (tech_id::REFRIGERATION, 1.10),
            (tech_id::PENICILLIN, 1.05),
            (tech_id::GENETIC_ENGINEERING, 1.08),
            (tech_id::BIOTECHNOLOGY, 1.07),
        ];
        const TRANSPORT_EXTRAS: &[(u32, f64)] = &[
            (tech_id::NAVIGATION, 1.02),
            (tech_id::TELEGRAPH, 1.02),
            (tech_id::TELEPHONE, 1.02),
            (tech_id::INTERNET, 1.01),
        ];
        let mut m = 1.0;
        for &(id, mult) in FOOD_CLUSTER.iter().chain(TRANSPORT_EXTRAS) {
            if self.is_unlocked(state, id, threshold) {
                m *= mult;
            }
        }
        m
    }

    /// Logistic growth rate from unlocked techs, clamped to [5e-5, 0.02].
    pub fn growth_rate_r(&self, state: &TechState, threshold: f64) -> f64 {
        const EARLY: &[(u32, f64)] = &[
            (tech_id::IRRIGATION, 0.00005),
            (tech_id::AGRICULTURE, 0.00008),
            (tech_id::ENGINEERING, 0.00003),
            (tech_id::CIVIL_SERVICE, 0.00002),
        ];
        const INDUSTRIAL: &[(u32, f64)] = &[
            (tech_id::STEAM_ENGINE, 0.0006),
            (tech_id::INDUSTRIALIZATION, 0.0008),
            (tech_id::RAILROAD, 0.0004),
            (tech_id::SANITATION, 0.0010),
            (tech_id::VACCINATION, 0.0010),
            (tech_id::ELECTRICITY, 0.0005),
            (tech_id::MASS_PRODUCTION, 0.0005),
            (tech_id::PENICILLIN, 0.0006),
        ];
        const FERTILITY_TRANSITION: &[(u32, f64)] = &[
            (tech_id::EDUCATION, 0.92),
            (tech_id::UNIVERSITIES, 0.95),
            (tech_id::ECONOMICS, 0.96),
            (tech_id::COMPUTERS, 0.92),
            (tech_id::PERSONAL_COMPUTERS, 0.95),
            (tech_id::INTERNET, 0.95),
            (tech_id::ARTIFICIAL_INTELLIGENCE, 0.97),
        ];
        let mut r = 0.0003;
        for &(id, add) in EARLY.iter().chain(INDUSTRIAL) {
            if self.is_unlocked(state, id, threshold) {
                r += add;
            }
        }
        let mut fertility = 1.0;
        for &(id, mult) in FERTILITY_TRANSITION {
            if self.is_unlocked(state, id, threshold) {
                fertility *= mult;
            }
        }
        (r * fertility).clamp(5e-5, 0.02)
    }

    /// Plague mortality multiplier after medical techs, in [0.1, 1].
    pub fn plague_mortality_multiplier(&self, state: &TechState, threshold: f64) -> f64 {
        let mut m: f64 = 1.0;
        if self.is_unlocked(state, tech_id::SANITATION, threshold) {
            m *= 0.70;
        }
        if self.is_unlocked(state, tech_id::VACCINATION, threshold) {
            m *= 0.50;
        }
        if self.is_unlocked(state, tech_id::PENICILLIN, threshold) {
            m *= 0.40;
        }
        m.max(0.1)
    }

    /// Editor override: wipe dense state and mark `ids` (optionally with the
    /// transitive prerequisite closure) known at adoption 1. Returns the
    /// recomputed bonuses for the caller to install.
    pub fn set_unlocked(
        &self,
        state: &mut TechState,
        ids: &[u32],
        include_prereqs: bool,
        adoption_threshold: f64,
    ) -> TechBonuses {
        state.ensure_size(self.count());
        state.reset();
        let mut queue: Vec<u32> = ids.to_vec();
        while let Some(id) = queue.pop() {
            let Some(tech) = self.techs.get(&id) else {
                continue;
            };
            let Some(dense) = self.dense_index(id) else {
                continue;
            };
            if state.known.get(dense) {
                continue;
            }
            state.known.set(dense, true);
            state.adoption[dense] = 1.0;
            state.low_adoption_years[dense] = 0;
            if include_prereqs {
                queue.extend_from_slice(tech.prereqs);
            }
        }
        self.recompute_bonuses(state, adoption_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_a_dag_with_known_ids() {
        let tm = TechManager::new();
        // Ids 1..=96 plus the 100..=120 deep-start section.
        assert_eq!(tm.count(), 117);
        // 0 = unvisited, 1 = on stack, 2 = done.
        fn visit(tm: &TechManager, id: u32, marks: &mut std::collections::BTreeMap<u32, u8>) {
            match marks.get(&id) {
                Some(1) => panic!("prerequisite cycle through tech {id}"),
                Some(2) => return,
                _ => {}
            }
            marks.insert(id, 1);
            for &req in tm.get(id).unwrap().prereqs {
                assert!(tm.get(req).is_some(), "missing prereq {req} of {id}");
                visit(tm, req, marks);
            }
            marks.insert(id, 2);
        }
        let mut marks = std::collections::BTreeMap::new();
        for &id in tm.sorted_ids() {
            visit(&tm, id, &mut marks);
            let tech = tm.get(id).unwrap();
            assert!(tech.domain < crate::state::DOMAINS);
            assert!(tech.difficulty > 0.0);
        }
    }

    #[test]
    fn agriculture_prereq_chain_reaches_proto_cultivation() {
        let tm = TechManager::new();
        let agriculture = tm.get(tech_id::AGRICULTURE).unwrap();
        assert!(agriculture.prereqs.contains(&112));
        assert_eq!(agriculture.domain, 0);
    }

    #[test]
    fn set_unlocked_closes_prereqs_and_scores_bonuses() {
        let tm = TechManager::new();
        let mut state = TechState::default();
        let bonuses = tm.set_unlocked(&mut state, &[tech_id::AGRICULTURE], true, 0.65);
        assert!(tm.knows(&state, tech_id::AGRICULTURE));
        // Transitive closure: Proto-cultivation (112) and Sedentism (113).
        assert!(tm.knows(&state, 112));
        assert!(tm.knows(&state, 113));
        assert!(bonuses.max_size_multiplier > 1.0);
        assert!(tm.is_unlocked(&state, tech_id::AGRICULTURE, 0.65));

        // Without closure only the named tech flips.
        let mut bare = TechState::default();
        tm.set_unlocked(&mut bare, &[tech_id::AGRICULTURE], false, 0.65);
        assert!(tm.knows(&bare, tech_id::AGRICULTURE));
        assert!(!tm.knows(&bare, 112));
    }

    #[test]
    fn growth_rate_moves_with_tech_eras() {
        let tm = TechManager::new();
        let mut state = TechState::default();
        state.ensure_size(tm.count());
        let base = tm.growth_rate_r(&state, 0.65);
        assert!((base - 0.0003).abs() < 1e-12);

        tm.set_unlocked(&mut state, &[tech_id::SANITATION, tech_id::VACCINATION], true, 0.65);
        let industrial = tm.growth_rate_r(&state, 0.65);
        assert!(industrial > base);
        assert!(industrial <= 0.02);
    }

    #[test]
    fn bonuses_scale_with_adoption() {
        let tm = TechManager::new();
        let mut state = TechState::default();
        state.ensure_size(tm.count());
        let dense = tm.dense_index(tech_id::IRON_WORKING).unwrap();
        state.known.set(dense, true);
        state.adoption[dense] = 0.2;
        let partial = tm.recompute_bonuses(&state, 0.65);
        state.adoption[dense] = 1.0;
        let full = tm.recompute_bonuses(&state, 0.65);
        assert!(partial.military_strength_bonus > 0.0);
        assert!(full.military_strength_bonus > partial.military_strength_bonus);
        assert!((full.military_strength_bonus - 0.40).abs() < 1e-9);
    }

    #[test]
    fn feasibility_gates_block_and_release() {
        let tm = TechManager::new();
        let watercraft = tm.get(108).unwrap();
        let mut signals = PolitySignals {
            coast_access: 0.0,
            river_wetland_share: 0.5,
            climate_food_mult: 1.0,
            foraging_potential: 500.0,
            ..Default::default()
        };
        assert!(!tm.is_feasible(watercraft, &signals));
        signals.coast_access = 0.4;
        assert!(tm.is_feasible(watercraft, &signals));
    }

    #[test]
    fn plague_multiplier_drops_with_medicine() {
        let tm = TechManager::new();
        let mut state = TechState::default();
        state.ensure_size(tm.count());
        assert_eq!(tm.plague_mortality_multiplier(&state, 0.65), 1.0);
        tm.set_unlocked(
            &mut state,
            &[tech_id::SANITATION, tech_id::VACCINATION, tech_id::PENICILLIN],
            true,
            0.65,
        );
        let m = tm.plague_mortality_multiplier(&state, 0.65);
        assert!(m < 0.2 && m >= 0.1);
    }
}
