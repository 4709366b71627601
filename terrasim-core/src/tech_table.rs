//! Static technology catalogue and the (tech id → bonus deltas) table.
//!
//! Ids 100..120 are the deep-start foraging/neolithic section; ids 1..96 are
//! the historical tree. Dense ordering sorts by (order, id); unmarked techs
//! default to `order = 300 + id·10` and a difficulty derived from their
//! threshold.

use crate::tech::{FeasibilityGates, TechBonuses, Technology};
use std::collections::BTreeMap;

type RawTech = (u32, &'static str, i32, &'static [u32]);

#[rustfmt::skip]
const RAW: &[RawTech] = &[
    // Paleolithic / Mesolithic section for deep starts.
    (100, "Cordage and Knots", 25, &[]),
    (101, "Hide Working and Tailored Clothing", 30, &[100]),
    (102, "Hafted Stone Tools", 35, &[100]),
    (103, "Bone and Antler Tools", 35, &[102]),
    (104, "Fishing Technology", 45, &[100, 102]),
    (105, "Food Preservation", 50, &[100, 101]),
    (106, "Storage Pits and Containers", 60, &[105]),
    (107, "Seasonal Aggregation Camps", 70, &[106]),
    (108, "Watercraft", 75, &[104]),
    (109, "Long-distance Exchange Networks", 85, &[108, 107]),
    (110, "Dog Domestication", 90, &[102]),
    (111, "Grinding Stones", 100, &[102]),
    (112, "Proto-cultivation", 120, &[111, 107]),
    (113, "Sedentism", 140, &[106, 107]),
    (114, "Enclosures and Herd Management", 150, &[113]),
    (115, "Counting Tokens and Tallies", 170, &[113, 106]),
    (116, "Charcoal Firing", 180, &[111, 106]),
    (117, "Proto-writing and Administrative Notation", 220, &[115, 113]),
    (118, "Numeracy and Measurement", 240, &[115, 117]),
    (119, "Native Copper Working", 150, &[4, 116]),
    (120, "Copper Smelting", 190, &[119, 116]),
    // Historical tree, rewired onto the deep-start section.
    (1, "Pottery", 50, &[106, 113, 116]),
    (2, "Animal Husbandry", 60, &[110, 113, 114]),
    (3, "Archery", 70, &[102]),
    (4, "Mining", 80, &[102, 111]),
    (5, "Sailing", 90, &[108]),
    (6, "Calendar", 100, &[113]),
    (7, "Wheel", 120, &[113, 114]),
    (8, "Masonry", 140, &[4]),
    (9, "Bronze Alloying", 220, &[120]),
    (10, "Irrigation", 180, &[20]),
    (11, "Writing", 250, &[117]),
    (12, "Shipbuilding", 220, &[5]),
    (13, "Iron Working", 250, &[9]),
    (14, "Formal Mathematics", 340, &[118, 11]),
    (15, "Currency", 380, &[118, 115]),
    (16, "Construction", 350, &[8]),
    (17, "Roads", 380, &[7]),
    (18, "Horseback Riding", 420, &[2, 7]),
    (19, "Alphabet", 420, &[11]),
    (20, "Agriculture", 500, &[112, 113]),
    (21, "Drama and Poetry", 550, &[19]),
    (22, "Philosophy", 540, &[19]),
    (23, "Engineering", 700, &[16, 17]),
    (24, "Optics", 750, &[14]),
    (25, "Metal Casting", 800, &[13]),
    (26, "Compass", 900, &[12, 14]),
    (27, "Democracy", 1000, &[22]),
    (28, "Steel", 1100, &[25]),
    (29, "Machinery", 1200, &[23]),
    (30, "Education", 1150, &[22]),
    (31, "Acoustics", 1400, &[21, 24]),
    (32, "Civil Service", 1500, &[15, 30]),
    (33, "Paper", 1600, &[19]),
    (34, "Banking", 1700, &[15, 32]),
    (35, "Markets", 1750, &[15, 34]),
    (36, "Printing", 1800, &[33]),
    (37, "Gunpowder", 2000, &[28]),
    (38, "Mechanical Clock", 2200, &[29]),
    (39, "Universities", 2100, &[30]),
    (40, "Astronomy", 2600, &[24, 39]),
    (41, "Chemistry", 2800, &[40]),
    (42, "Metallurgy", 3000, &[28, 4, 116]),
    (43, "Navigation", 3200, &[26, 40]),
    (44, "Architecture", 3400, &[23, 31]),
    (45, "Economics", 3600, &[34]),
    (46, "Printing Press", 3800, &[36]),
    (47, "Firearms", 4000, &[37, 42]),
    (48, "Physics", 4200, &[40]),
    (49, "Scientific Method", 4500, &[48]),
    (50, "Rifling", 4800, &[47]),
    (51, "Steam Engine", 5000, &[48]),
    (52, "Industrialization", 5500, &[42, 51]),
    (53, "Vaccination", 6500, &[40]),
    (54, "Electricity", 7000, &[48]),
    (55, "Railroad", 7500, &[50, 51]),
    (56, "Dynamite", 8000, &[40]),
    (57, "Replaceable Parts", 8500, &[51]),
    (58, "Telegraph", 9000, &[54]),
    (59, "Telephone", 9500, &[54]),
    (60, "Combustion", 10000, &[50]),
    (61, "Flight", 11000, &[60]),
    (62, "Radio", 12000, &[58]),
    (63, "Mass Production", 13000, &[57]),
    (64, "Electronics", 14000, &[54]),
    (65, "Penicillin", 15000, &[53]),
    (66, "Plastics", 16000, &[40]),
    (67, "Rocketry", 17000, &[61]),
    (68, "Nuclear Fission", 18000, &[47]),
    (69, "Computers", 20000, &[64]),
    (70, "Transistors", 22000, &[64]),
    (71, "Refrigeration", 24000, &[52]),
    (72, "Ecology", 26000, &[52]),
    (73, "Satellites", 28000, &[67]),
    (74, "Lasers", 30000, &[64]),
    (75, "Robotics", 32000, &[69]),
    (76, "Integrated Circuit", 35000, &[70]),
    (77, "Advanced Ballistics", 38000, &[49]),
    (78, "Superconductors", 40000, &[74]),
    (79, "Internet", 45000, &[69, 73]),
    (80, "Personal Computers", 50000, &[76]),
    (81, "Genetic Engineering", 55000, &[65]),
    (82, "Fiber Optics", 60000, &[74]),
    (83, "Mobile Phones", 65000, &[76, 82]),
    (84, "Stealth Technology", 70000, &[61, 78]),
    (85, "Artificial Intelligence", 75000, &[75, 80]),
    (86, "Nanotechnology", 80000, &[78]),
    (87, "Renewable Energy", 85000, &[72]),
    (88, "3D Printing", 90000, &[80]),
    (89, "Social Media", 95000, &[79]),
    (90, "Biotechnology", 100000, &[81]),
    (91, "Quantum Computing", 110000, &[85]),
    (92, "Blockchain", 120000, &[79]),
    (93, "Machine Learning", 130000, &[85]),
    (94, "Augmented Reality", 140000, &[80]),
    (95, "Virtual Reality", 150000, &[80]),
    (96, "Sanitation", 6000, &[40]),
];

/// (id, order, difficulty, key transition) for techs whose progression
/// position is pinned; everything else takes the defaults.
#[rustfmt::skip]
const MARKS: &[(u32, i32, f64, bool)] = &[
    (100, 10, 0.2, false),
    (101, 20, 0.25, false),
    (102, 30, 0.25, false),
    (103, 40, 0.3, false),
    (104, 50, 0.35, false),
    (105, 60, 0.35, false),
    (106, 70, 0.4, false),
    (107, 80, 0.45, true),
    (108, 85, 0.5, true),
    (109, 90, 0.55, true),
    (110, 95, 0.45, false),
    (111, 110, 0.6, false),
    (112, 130, 0.8, true),
    (113, 150, 0.9, true),
    (114, 155, 1.0, false),
    (115, 160, 1.0, true),
    (116, 165, 1.1, true),
    (117, 175, 1.2, true),
    (118, 190, 1.3, true),
    (119, 185, 1.25, true),
    (120, 205, 1.4, true),
    (1, 180, 1.1, true),
    (2, 195, 1.2, true),
    (4, 200, 1.2, true),
    (20, 220, 1.35, true),
    (11, 275, 1.7, true),
    (42, 560, 2.2, true),
];

/// Feasibility gates for the environment-bound early techs:
/// (id, coast, river/wetland, climate food, farming, foraging, ore, energy,
/// construction, institution, specialization, plant dom., herd dom.)
#[rustfmt::skip]
const GATES: &[(u32, bool, bool, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64)] = &[
    (104, false, true,  0.45, 0.0,   120.0, 0.0,  0.0,  0.0,  0.0,  0.00, 0.0,  0.0),
    (108, true,  true,  0.40, 0.0,   100.0, 0.0,  0.0,  0.0,  0.0,  0.00, 0.0,  0.0),
    (112, false, true,  0.55, 220.0, 90.0,  0.0,  0.0,  0.0,  0.02, 0.01, 0.28, 0.0),
    (113, false, false, 0.52, 0.0,   180.0, 0.0,  0.0,  0.0,  0.03, 0.02, 0.18, 0.0),
    (20,  false, false, 0.62, 340.0, 0.0,   0.0,  0.0,  0.0,  0.06, 0.05, 0.40, 0.0),
    (2,   false, false, 0.48, 0.0,   140.0, 0.0,  0.0,  0.0,  0.04, 0.02, 0.0,  0.35),
    (1,   false, false, 0.50, 0.0,   0.0,   0.0,  0.08, 0.08, 0.04, 0.02, 0.0,  0.0),
    (4,   false, false, 0.0,  0.0,   0.0,   0.20, 0.08, 0.0,  0.02, 0.01, 0.0,  0.0),
    (9,   false, false, 0.0,  0.0,   0.0,   0.30, 0.22, 0.12, 0.08, 0.05, 0.0,  0.0),
    (117, false, false, 0.50, 80.0,  0.0,   0.0,  0.0,  0.02, 0.07, 0.04, 0.0,  0.0),
    (118, false, false, 0.50, 100.0, 0.0,   0.0,  0.0,  0.03, 0.09, 0.05, 0.0,  0.0),
    (119, false, false, 0.0,  0.0,   0.0,   0.22, 0.12, 0.08, 0.04, 0.02, 0.0,  0.0),
    (120, false, false, 0.0,  0.0,   0.0,   0.26, 0.18, 0.10, 0.06, 0.03, 0.0,  0.0),
    (42,  false, false, 0.0,  0.0,   0.0,   0.36, 0.34, 0.18, 0.12, 0.08, 0.0,  0.0),
    (11,  false, false, 0.53, 120.0, 0.0,   0.0,  0.0,  0.05, 0.14, 0.07, 0.0,  0.0),
    (43,  true,  false, 0.0,  0.0,   0.0,   0.0,  0.12, 0.0,  0.20, 0.06, 0.0,  0.0),
];

/// Knowledge-domain classification by name keywords, checked in fixed
/// precedence order. Falls through to Materials (1).
fn domain_for_name(name: &str) -> usize {
    let n = name.to_ascii_lowercase();
    let has = |kw: &str| n.contains(kw);
    // 0 Agriculture, 1 Materials, 2 Construction, 3 Navigation,
    // 4 Governance, 5 Medicine, 6 Education, 7 Warfare/Industry.
    if has("agriculture")
        || has("irrigation")
        || has("husbandry")
        || has("calendar")
        || has("refrigeration")
        || has("cultivation")
        || has("sedentism")
        || has("domestication")
    {
        return 0;
    }
    if has("sanitation")
        || has("vaccination")
        || has("penicillin")
        || has("genetic")
        || has("biotechnology")
        || has("medicine")
    {
        return 5;
    }
    if has("education")
        || has("universit")
        || has("writing")
        || has("alphabet")
        || has("paper")
        || has("printing")
        || has("computer")
        || has("internet")
        || has("telephone")
        || has("telegraph")
        || has("radio")
        || has("mobile")
        || has("fiber optics")
        || has("integrated circuit")
        || has("tokens")
        || has("tallies")
    {
        return 6;
    }
    if has("sailing")
        || has("ship")
        || has("compass")
        || has("navigation")
        || has("flight")
        || has("satellite")
        || has("rocketry")
        || has("watercraft")
        || has("exchange networks")
    {
        return 3;
    }
    if has("democracy")
        || has("currency")
        || has("civil service")
        || has("banking")
        || has("markets")
        || has("economics")
        || has("blockchain")
    {
        return 4;
    }
    if has("masonry")
        || has("construction")
        || has("engineering")
        || has("architecture")
        || has("road")
        || has("railroad")
        || has("storage")
        || has("enclosures")
    {
        return 2;
    }
    if has("archery")
        || has("gunpowder")
        || has("firearms")
        || has("rifling")
        || has("ballistics")
        || has("stealth")
    {
        return 7;
    }
    1
}

pub fn build_catalogue() -> BTreeMap<u32, Technology> {
    let mut techs: BTreeMap<u32, Technology> = RAW
        .iter()
        .map(|&(id, name, cost, prereqs)| {
            (
                id,
                Technology {
                    id,
                    name,
                    threshold: cost as f64,
                    order: 0,
                    difficulty: 0.0,
                    key_transition: false,
                    domain: domain_for_name(name),
                    prereqs,
                    gates: FeasibilityGates::default(),
                },
            )
        })
        .collect();

    for &(id, order, difficulty, key) in MARKS {
        if let Some(t) = techs.get_mut(&id) {
            t.order = order;
            t.difficulty = difficulty;
            t.key_transition = key;
        }
    }

    for t in techs.values_mut() {
        if t.order == 0 {
            t.order = 300 + t.id as i32 * 10;
        }
        if t.difficulty <= 0.0 {
            t.difficulty = ((1.0 + t.threshold).log10() / 4.8).clamp(0.10, 3.5);
        }
    }

    for &(id, coast, river, climate, farm, forage, ore, energy, constr, inst, spec, plant, herd) in
        GATES
    {
        if let Some(t) = techs.get_mut(&id) {
            t.gates = FeasibilityGates {
                requires_coast: coast,
                requires_river_or_wetland: river,
                min_climate_food: climate,
                min_farming: farm,
                min_foraging: forage,
                min_ore: ore,
                min_energy: energy,
                min_construction: constr,
                min_institution: inst,
                min_specialization: spec,
                min_plant_domestication: plant,
                min_herd_domestication: herd,
            };
        }
    }

    techs
}

/// Apply one tech's bonus deltas at adoption scale `s` in (0, 1].
pub fn apply_bonus(b: &mut TechBonuses, id: u32, s: f64) {
    let s = s.clamp(0.0, 1.0);
    if s <= 0.0 {
        return;
    }
    let add = |v: &mut f64, delta: f64| *v += delta * s;
    let add_int = |v: &mut i32, delta: f64| *v += (delta * s).round() as i32;
    let apply_mult = |v: &mut f64, full: f64| *v *= 1.0 + (full - 1.0) * s;
    let blend_up = |v: &mut i32, base: i32, target: i32| {
        let candidate = base + ((target - base) as f64 * s).round() as i32;
        *v = (*v).max(candidate);
    };
    // Frequencies count years between bursts, so scaling up means
    // dividing the interval; partial adoption stretches it.
    let blend_freq = |v: &mut i32, target: i32| {
        if s < 0.25 || target <= 0 {
            return;
        }
        let candidate = ((target as f64 / s.max(0.25)).round() as i32).max(1);
        *v = if *v <= 0 { candidate } else { (*v).min(candidate) };
    };

    match id {
        10 => add(&mut b.max_size_multiplier, 0.2),
        20 => {
            add(&mut b.max_size_multiplier, 0.3);
            add_int(&mut b.expansion_rate_bonus, 5.0);
        }

        11 => add(&mut b.science_points_bonus, 3.0),
        14 => add(&mut b.science_points_bonus, 5.0),
        22 => add(&mut b.science_points_bonus, 8.0),
        39 => {
            add(&mut b.science_points_bonus, 15.5);
            add(&mut b.max_size_multiplier, 0.30);
            apply_mult(&mut b.research_multiplier, 1.10);
        }
        40 => add(&mut b.science_points_bonus, 20.0),
        49 => {
            add(&mut b.science_points_bonus, 50.0);
            apply_mult(&mut b.research_multiplier, 1.10);
        }
        54 => {
            add(&mut b.science_points_bonus, 30.0);
            apply_mult(&mut b.research_multiplier, 1.05);
        }
        69 => {
            add(&mut b.science_points_bonus, 100.0);
            apply_mult(&mut b.research_multiplier, 1.10);
        }
        76 => add(&mut b.science_points_bonus, 75.0),
        79 => {
            add(&mut b.science_points_bonus, 200.0);
            apply_mult(&mut b.research_multiplier, 1.10);
        }
        80 => add(&mut b.science_points_bonus, 150.0),
        85 => {
            add(&mut b.science_points_bonus, 300.0);
            apply_mult(&mut b.research_multiplier, 1.15);
        }
        93 => {
            add(&mut b.science_points_bonus, 250.0);
            apply_mult(&mut b.research_multiplier, 1.10);
        }

        3 => {
            add(&mut b.military_strength_bonus, 0.15);
            add(&mut b.territory_capture_bonus, 0.10);
        }
        9 => {
            add(&mut b.military_strength_bonus, 0.25);
            add(&mut b.defensive_bonus, 0.15);
        }
        13 => {
            add(&mut b.military_strength_bonus, 0.40);
            add(&mut b.territory_capture_bonus, 0.20);
            add(&mut b.defensive_bonus, 0.25);
        }
        18 => {
            add(&mut b.military_strength_bonus, 0.30);
            add(&mut b.territory_capture_bonus, 0.35);
            add(&mut b.war_duration_reduction, 0.20);
            add_int(&mut b.expansion_rate_bonus, 8.0);
        }

        16 => {
            add(&mut b.max_size_multiplier, 0.25);
            add_int(&mut b.expansion_rate_bonus, 3.0);
        }
        17 => {
            add(&mut b.max_size_multiplier, 0.40);
            add_int(&mut b.expansion_rate_bonus, 6.0);
        }
        23 => {
            add(&mut b.max_size_multiplier, 0.50);
            add_int(&mut b.expansion_rate_bonus, 8.0);
        }
        32 => {
            add(&mut b.max_size_multiplier, 0.60);
            add_int(&mut b.expansion_rate_bonus, 10.0);
        }

        12 => {
            add(&mut b.max_size_multiplier, 0.50);
            add_int(&mut b.expansion_rate_bonus, 12.0);
            blend_up(&mut b.burst_radius, 1, 2);
            blend_freq(&mut b.burst_frequency, 10);
        }
        26 => {
            add(&mut b.max_size_multiplier, 0.75);
            add_int(&mut b.expansion_rate_bonus, 20.0);
            blend_up(&mut b.burst_radius, 1, 3);
            blend_freq(&mut b.burst_frequency, 8);
        }
        43 => {
            add(&mut b.max_size_multiplier, 1.5);
            b.flat_max_size_bonus += (2000.0 * s).round() as i32;
            add_int(&mut b.expansion_rate_bonus, 90.0);
            blend_up(&mut b.burst_radius, 1, 6);
            blend_freq(&mut b.burst_frequency, 4);
        }

        34 => {
            add(&mut b.max_size_multiplier, 0.80);
            add_int(&mut b.expansion_rate_bonus, 25.0);
        }
        45 => {
            add(&mut b.max_size_multiplier, 1.2);
            add_int(&mut b.expansion_rate_bonus, 35.0);
        }
        36 => {
            add(&mut b.max_size_multiplier, 0.60);
            add_int(&mut b.expansion_rate_bonus, 15.0);
            add(&mut b.science_points_bonus, 0.3);
        }
        55 => {
            add(&mut b.max_size_multiplier, 2.0);
            b.flat_max_size_bonus += (3000.0 * s).round() as i32;
            add_int(&mut b.expansion_rate_bonus, 180.0);
            blend_up(&mut b.burst_radius, 1, 10);
            blend_freq(&mut b.burst_frequency, 2);
        }

        28 => {
            add(&mut b.military_strength_bonus, 0.50);
            add(&mut b.defensive_bonus, 0.40);
            add(&mut b.territory_capture_bonus, 0.25);
            blend_up(&mut b.war_burst_radius, 1, 3);
            blend_freq(&mut b.war_burst_frequency, 8);
        }
        37 => {
            add(&mut b.military_strength_bonus, 0.75);
            add(&mut b.territory_capture_bonus, 0.50);
            add(&mut b.war_duration_reduction, 0.30);
            blend_up(&mut b.war_burst_radius, 1, 5);
            blend_freq(&mut b.war_burst_frequency, 5);
        }
        47 => {
            add(&mut b.military_strength_bonus, 0.60);
            add(&mut b.territory_capture_bonus, 0.40);
            add(&mut b.war_duration_reduction, 0.25);
            blend_up(&mut b.war_burst_radius, 1, 4);
            blend_freq(&mut b.war_burst_frequency, 6);
        }
        50 => {
            add(&mut b.military_strength_bonus, 0.35);
            add(&mut b.defensive_bonus, 0.50);
            blend_up(&mut b.war_burst_radius, 1, 6);
            blend_freq(&mut b.war_burst_frequency, 4);
        }
        56 => {
            add(&mut b.military_strength_bonus, 0.45);
            add(&mut b.territory_capture_bonus, 0.60);
            blend_up(&mut b.war_burst_radius, 1, 7);
            blend_freq(&mut b.war_burst_frequency, 3);
        }
        68 => {
            add(&mut b.military_strength_bonus, 1.50);
            add(&mut b.war_duration_reduction, 0.70);
            add(&mut b.territory_capture_bonus, 0.80);
            blend_up(&mut b.war_burst_radius, 1, 10);
            blend_freq(&mut b.war_burst_frequency, 2);
        }
        77 => {
            add(&mut b.military_strength_bonus, 0.40);
            add(&mut b.territory_capture_bonus, 0.30);
            add(&mut b.defensive_bonus, 0.35);
            blend_up(&mut b.war_burst_radius, 1, 5);
            blend_freq(&mut b.war_burst_frequency, 5);
        }
        84 => {
            add(&mut b.military_strength_bonus, 0.60);
            add(&mut b.war_duration_reduction, 0.40);
            add(&mut b.territory_capture_bonus, 0.45);
            blend_up(&mut b.war_burst_radius, 1, 8);
            blend_freq(&mut b.war_burst_frequency, 3);
        }

        96 => add(&mut b.plague_resistance, 0.30),
        53 => add(&mut b.plague_resistance, 0.50),
        65 => add(&mut b.plague_resistance, 0.60),
        81 => {
            add(&mut b.plague_resistance, 0.40);
            add(&mut b.military_strength_bonus, 0.30);
        }
        90 => {
            add(&mut b.plague_resistance, 0.50);
            add(&mut b.military_strength_bonus, 0.25);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_match_classification() {
        assert_eq!(domain_for_name("Agriculture"), 0);
        assert_eq!(domain_for_name("Sanitation"), 5);
        assert_eq!(domain_for_name("Universities"), 6);
        assert_eq!(domain_for_name("Navigation"), 3);
        assert_eq!(domain_for_name("Banking"), 4);
        assert_eq!(domain_for_name("Railroad"), 2);
        assert_eq!(domain_for_name("Gunpowder"), 7);
        assert_eq!(domain_for_name("Pottery"), 1);
        // "Domestication" hits the agriculture keyword list first.
        assert_eq!(domain_for_name("Dog Domestication"), 0);
    }

    #[test]
    fn catalogue_difficulties_default_from_threshold() {
        let techs = build_catalogue();
        let internet = &techs[&79];
        assert!(internet.order >= 300);
        let expected = ((1.0 + 45000.0f64).log10() / 4.8).clamp(0.10, 3.5);
        assert!((internet.difficulty - expected).abs() < 1e-12);
    }

    #[test]
    fn burst_frequency_shortens_with_full_adoption() {
        let mut partial = TechBonuses::default();
        apply_bonus(&mut partial, 12, 0.5);
        let mut full = TechBonuses::default();
        apply_bonus(&mut full, 12, 1.0);
        assert!(partial.burst_frequency >= full.burst_frequency);
        assert_eq!(full.burst_frequency, 10);
        assert_eq!(full.burst_radius, 2);
    }
}
