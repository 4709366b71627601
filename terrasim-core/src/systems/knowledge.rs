//! Technology tick: innovation, domain diffusion, discovery, known-tech
//! diffusion, adoption/loss integration and rare forgetting.
//!
//! Every stochastic decision here uses the pure hash draws, never a polity
//! stream, so the outcome is identical whatever order parallel workers
//! ran in.

use crate::bounded::clamp01;
use crate::rng::{deterministic_unit, pair_unit, salt};
use crate::state::{World, DOMAINS, TRAITS, TRAIT_OPENNESS};
use crate::tech::{smooth01, tech_id, PolitySignals};
use tracing::instrument;

/// Biomes that support plant domestication / herd management, matching the
/// loader's biome palette.
fn plant_friendly(biome: u8) -> bool {
    matches!(biome, 3 | 4 | 6 | 7 | 8)
}

fn herd_friendly(biome: u8) -> bool {
    matches!(biome, 1 | 2 | 4 | 6)
}

fn trait_distance(a: &[f64; TRAITS], b: &[f64; TRAITS]) -> f64 {
    let sum_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (sum_sq / TRAITS as f64).sqrt()
}

fn saturate(x: f64, scale: f64) -> f64 {
    let x = x.max(0.0);
    x / (x + scale.max(1e-9))
}

#[instrument(skip_all, name = "knowledge_tick")]
pub fn run_knowledge_tick(world: &mut World, dt_years: i32) {
    let dt = dt_years.max(1) as f64;
    let n = world.polities.len();
    if n == 0 {
        return;
    }
    let threshold = world.config.tech.adoption_threshold.clamp(0.10, 0.95);

    for polity in &mut world.polities {
        polity.tech.ensure_size(world.tech.count());
        if polity.population <= 0 && !polity.dead {
            // A collapsed population holds no practice, only memory.
            for a in &mut polity.tech.adoption {
                *a = 0.0;
            }
        }
    }

    innovation_pass(world, dt);
    domain_diffusion_pass(world, dt);
    let signals: Vec<PolitySignals> = (0..n).map(|i| build_signals(world, i)).collect();
    discovery_pass(world, &signals, dt);
    known_diffusion_pass(world, &signals, dt);
    adoption_pass(world, &signals, dt);

    for polity in &mut world.polities {
        if polity.alive() {
            polity.bonuses = world.tech.recompute_bonuses(&polity.tech, threshold);
        }
    }
}

/// Per-polity innovation and its distribution across knowledge domains.
fn innovation_pass(world: &mut World, dt: f64) {
    let threshold = world.config.tech.adoption_threshold;
    let cfg_resources = world.config.resources.clone();
    let req_e = world.config.tech.resource_req_energy.clamp(0.05, 2.0);
    let req_o = world.config.tech.resource_req_ore.clamp(0.05, 2.0);
    let req_c = world.config.tech.resource_req_construction.clamp(0.05, 2.0);
    let tech_mgr = &world.tech;

    for polity in &mut world.polities {
        if polity.dead || polity.population <= 0 {
            polity.innovation_rate = 0.0;
            continue;
        }
        let pop = polity.population.max(1) as f64;
        let m = polity.macros;
        let urban = m.urbanization;
        let access = m.market_access;
        let open = polity.traits[TRAIT_OPENNESS];
        let edu = polity.budget.education;
        let health = polity.budget.health;

        let craft_pop = (0.35 + 0.25 * (pop / 20_000.0).ln_1p()).min(2.0);
        let contact = 0.60 + 0.40 * (0.5 * access + 0.5 * open);
        let order = (0.35 + 0.65 * polity.stability) * (0.40 + 0.60 * polity.legitimacy);
        let survival = 0.55 + 0.45 * m.food_security;
        let war_penalty = if polity.war.is_at_war { 0.90 } else { 1.0 };
        let baseline_craft = 1.1 * craft_pop * contact * order * survival * war_penalty;

        let resource_scale = 50.0 + 0.0002 * pop;
        let ore_sat = saturate(
            polity.resources.ore,
            resource_scale * (cfg_resources.ore_normalization / 120.0).max(0.5),
        );
        let energy_sat = saturate(
            polity.resources.energy,
            resource_scale * (cfg_resources.energy_normalization / 120.0).max(0.5),
        );
        let constr_sat = saturate(
            polity.resources.construction,
            resource_scale * (cfg_resources.construction_normalization / 120.0).max(0.5),
        );
        let resource_gate =
            clamp01((energy_sat / req_e).min(ore_sat / req_o).min(constr_sat / req_c));

        let surplus_pc = (m.last_nonfood_output - m.last_nonfood_cons).max(0.0) / pop;
        let surplus_factor = clamp01(surplus_pc / 0.00085);
        let mut adv = 12.0 * surplus_factor + urban;

        // Knowledge infrastructure: built by stable, schooled, connected
        // societies; burned down by chaos.
        {
            let edu_term = 0.05 + 0.95 * edu;
            let mut inst = 1.0;
            let unlocked =
                |ts: &crate::tech::TechState, id: u32| tech_mgr.is_unlocked(ts, id, threshold);
            if unlocked(&polity.tech, tech_id::WRITING) {
                inst += 0.25;
            }
            if unlocked(&polity.tech, tech_id::EDUCATION) {
                inst += 0.35;
            }
            if unlocked(&polity.tech, tech_id::UNIVERSITIES) {
                inst += 0.25;
            }
            if unlocked(&polity.tech, tech_id::SCIENTIFIC_METHOD) {
                inst += 0.45;
            }
            if unlocked(&polity.tech, tech_id::ELECTRICITY) {
                inst += 0.20;
            }
            if unlocked(&polity.tech, tech_id::COMPUTERS) {
                inst += 0.18;
            }
            if unlocked(&polity.tech, tech_id::INTERNET) {
                inst += 0.12;
            }
            let infra_up = 18.0
                * edu_term
                * (0.35 + 0.65 * polity.stability)
                * (0.35 + 0.65 * polity.admin_capacity)
                * (0.25 + 0.75 * urban)
                * (0.25 + 0.75 * access)
                * inst;
            let mut chaos = 0.0;
            if polity.war.is_at_war {
                chaos += 1.0;
            }
            chaos += 1.0 - polity.avg_control;
            chaos += 1.4 * (0.92 - m.food_security).max(0.0);
            chaos += 0.8 * (0.55 - polity.legitimacy).max(0.0);
            let infra_decay = 5.0 * chaos;
            polity.knowledge_infra = (polity.knowledge_infra + (infra_up - infra_decay) * dt).max(0.0);
            adv *= 1.0 + 0.16 * polity.knowledge_infra.ln_1p();
        }

        let pop_scale = (0.30 + 0.24 * (pop / 50_000.0).ln_1p()).min(2.2);
        adv *= 0.22 + 0.78 * access;
        adv *= 0.35 + 0.65 * polity.stability;
        adv *= 0.40 + 0.60 * polity.legitimacy;
        adv *= 0.25 + 0.75 * urban;
        adv *= 0.75 + 0.70 * edu;
        adv *= pop_scale;
        if m.food_security < 0.95 {
            adv *= 0.80 + 0.20 * m.food_security;
        }
        adv *= 0.25 + 0.75 * m.human_capital;
        adv *= 0.20 + 0.80 * m.knowledge_stock;
        adv *= 0.20 + 0.80 * m.connectivity;
        adv *= 0.30 + 0.70 * m.institution_capacity;
        adv *= 1.0 - 0.45 * m.inequality;
        adv *= 0.28 + 0.72 * resource_gate;

        let innov = (baseline_craft + adv.max(0.0)).max(0.0) * polity.bonuses.research_multiplier;
        polity.innovation_rate = innov;

        // Pressure-biased distribution across the domains.
        let mut w = [1.0f64; DOMAINS];
        if m.food_security < 0.90 {
            w[0] += 1.6;
        }
        if !polity.ports.is_empty() {
            w[3] += 0.7;
        }
        if polity.war.is_at_war {
            w[7] += 1.2;
        }
        w[4] += 0.6 * polity.budget.admin;
        w[6] += 1.8 * edu;
        w[5] += 1.2 * health;
        let sum_w: f64 = w.iter().sum();
        for (domain, weight) in w.iter().enumerate() {
            polity.knowledge[domain] =
                (polity.knowledge[domain] + innov * (weight / sum_w) * dt).max(0.0);
        }
    }
}

/// Knowledge flows pairwise from higher to lower per domain, over borders,
/// trade links, and (for the warfare domain) active fronts.
fn domain_diffusion_pass(world: &mut World, dt: f64) {
    let n = world.polities.len();
    let base = world.config.tech.diffusion_base.max(0.0);
    let friction_strength = world.config.tech.cultural_friction_strength.max(0.0);
    let mut delta = vec![[0.0f64; DOMAINS]; n];

    let diffuse_pair = |world: &World, delta: &mut Vec<[f64; DOMAINS]>, a: usize, b: usize, w: f64, rate: f64| {
        if a == b || w <= 0.0 || rate <= 0.0 {
            return;
        }
        let pa = &world.polities[a];
        let pb = &world.polities[b];
        let friction = (-friction_strength * trait_distance(&pa.traits, &pb.traits)).exp();
        let r = base * rate * clamp01(w) * friction * dt;
        if r <= 0.0 {
            return;
        }
        let absorb_a = 0.20 + 0.80 * pa.macros.institution_capacity;
        let absorb_b = 0.20 + 0.80 * pb.macros.institution_capacity;
        for d in 0..DOMAINS {
            let va = pa.knowledge[d];
            let vb = pb.knowledge[d];
            if vb > va {
                delta[a][d] += r * absorb_a * (vb - va);
            } else if va > vb {
                delta[b][d] += r * absorb_b * (va - vb);
            }
        }
    };

    let pair_rate = |world: &World, a: usize, b: usize, border: bool| {
        let pa = &world.polities[a];
        let pb = &world.polities[b];
        let avg = |x: f64, y: f64| 0.5 * (clamp01(x) + clamp01(y));
        let access = avg(pa.macros.market_access, pb.macros.market_access);
        let open = avg(pa.traits[TRAIT_OPENNESS], pb.traits[TRAIT_OPENNESS]);
        let conn = avg(pa.macros.connectivity, pb.macros.connectivity);
        let inst = avg(
            pa.macros.institution_capacity,
            pb.macros.institution_capacity,
        );
        let control = avg(pa.avg_control, pb.avg_control);
        let legit = avg(pa.legitimacy, pb.legitimacy);
        let ineq = avg(pa.macros.inequality, pb.macros.inequality);
        let absorption = (0.20 + 0.80 * inst)
            * (0.20 + 0.80 * control)
            * (0.20 + 0.80 * conn)
            * (0.25 + 0.75 * legit)
            * (1.0 - 0.55 * ineq);
        if border {
            let urban = avg(pa.macros.urbanization, pb.macros.urbanization);
            0.32 * (0.25 + 0.75 * access) * (0.25 + 0.75 * open) * (0.35 + 0.65 * urban) * absorption
        } else {
            0.95 * (0.20 + 0.80 * access) * (0.25 + 0.75 * open) * absorption
        }
    };

    for a in 0..n {
        if world.polities[a].population <= 0 {
            continue;
        }
        for b in world.grid.sorted_neighbors(a) {
            if b <= a || b >= n || world.polities[b].population <= 0 {
                continue;
            }
            let contact = world.grid.border_contacts(a, b).max(1);
            let w = clamp01((contact as f64).ln_1p() / 5.0);
            let rate = pair_rate(world, a, b, true);
            diffuse_pair(world, &mut delta, a, b, w, rate);
        }
    }

    for a in 0..n {
        for b in (a + 1)..n {
            if world.polities[a].population <= 0 || world.polities[b].population <= 0 {
                continue;
            }
            let w = world.trade.intensity(a, b) as f64;
            if w <= 0.001 {
                continue;
            }
            let rate = pair_rate(world, a, b, false);
            diffuse_pair(world, &mut delta, a, b, w, rate);
        }
    }

    // Fronts teach the arts of war to both sides.
    for a in 0..n {
        if !world.polities[a].war.is_at_war || world.polities[a].population <= 0 {
            continue;
        }
        let enemies = world.polities[a].war.enemies.clone();
        for b in enemies {
            if b >= n || b == a {
                continue;
            }
            let r = 0.03 * 0.85 * dt;
            let va = world.polities[a].knowledge[7];
            let vb = world.polities[b].knowledge[7];
            if vb > va {
                delta[a][7] += r * (vb - va);
            } else if va > vb {
                delta[b][7] += r * (va - vb);
            }
        }
    }

    for (polity, d) in world.polities.iter_mut().zip(delta) {
        for domain in 0..DOMAINS {
            polity.knowledge[domain] = (polity.knowledge[domain] + d[domain]).max(0.0);
        }
    }
}

/// Feasibility and discovery inputs for one polity.
fn build_signals(world: &World, index: usize) -> PolitySignals {
    let polity = &world.polities[index];
    let terrain = world.grid.terrain();
    let pop = polity.population.max(1) as f64;
    let m = &polity.macros;

    let mut owned = 0.0f64;
    let mut coast = 0.0f64;
    let mut plant = 0.0f64;
    let mut herd = 0.0f64;
    let mut farming = 0.0f64;
    let mut foraging = 0.0f64;
    for &pos in &polity.territory_vec {
        owned += 1.0;
        let biome = terrain.biome(pos);
        let food = terrain.food(pos) as f64;
        if plant_friendly(biome) {
            plant += 1.0;
            farming += food;
        }
        if herd_friendly(biome) {
            herd += 1.0;
        }
        foraging += food * 0.5;
        if pos
            .orthogonal()
            .into_iter()
            .any(|q| !terrain.in_bounds(q) || !terrain.is_land(q))
        {
            coast += 1.0;
        }
    }
    let owned = owned.max(1.0);
    // Uniform maps without plant-friendly biomes still farm what they eat.
    if farming <= 0.0 {
        farming = foraging;
    }

    let cfg = &world.config;
    let resource_scale = 40.0 + 0.0002 * pop;
    let ore_avail = saturate(
        polity.resources.ore,
        resource_scale * (cfg.resources.ore_normalization / 120.0).max(0.5),
    );
    let energy_avail = saturate(
        polity.resources.energy,
        resource_scale * (cfg.resources.energy_normalization / 120.0).max(0.5),
    );
    let construction_avail = saturate(
        polity.resources.construction,
        resource_scale * (cfg.resources.construction_normalization / 120.0).max(0.5),
    );

    PolitySignals {
        population: pop,
        urbanization: m.urbanization,
        specialization: m.specialization,
        institution: m.institution_capacity,
        stability: polity.stability,
        legitimacy: polity.legitimacy,
        market_access: m.market_access,
        connectivity: m.connectivity,
        openness: polity.traits[TRAIT_OPENNESS],
        inequality: m.inequality,
        fragmentation: m.competition_fragmentation,
        idea_market: m.idea_market_integration,
        credible_commitment: m.credible_commitment,
        relative_factor_price: m.relative_factor_price,
        media_throughput: m.media_throughput,
        merchant_power: m.merchant_power,
        food_security: m.food_security,
        famine_severity: m.famine_severity,
        at_war: polity.war.is_at_war,
        climate_food_mult: 1.0,
        farming_potential: farming,
        foraging_potential: foraging,
        ore_avail,
        energy_avail,
        construction_avail,
        coast_access: (coast / owned).max(if polity.ports.is_empty() { 0.0 } else { 0.60 }),
        river_wetland_share: clamp01(farming / (farming + foraging).max(1.0)),
        plant_domestication: clamp01(plant / owned),
        herd_domestication: clamp01(herd / owned),
    }
}

/// Discovery pass: per-year hazard per candidate tech, triggered by a pure
/// hash draw, capped per polity per year.
fn discovery_pass(world: &mut World, signals: &[PolitySignals], dt: f64) {
    let cfg = world.config.tech.clone();
    let seed = world.seed;
    let year = world.year;
    let sorted_ids: Vec<u32> = world.tech.sorted_ids().to_vec();

    for i in 0..world.polities.len() {
        if world.polities[i].population <= 0 {
            continue;
        }
        let s = &signals[i];
        let max_discoveries = (cfg.max_discoveries_per_year
            + usize::from(s.specialization > 0.10))
        .clamp(1, 3);
        let mut discovered = 0;

        for &id in &sorted_ids {
            if discovered >= max_discoveries {
                break;
            }
            let tech = world.tech.get(id).expect("catalogue id");
            let Some(dense) = world.tech.dense_index(id) else {
                continue;
            };
            let polity = &world.polities[i];
            if polity.tech.known.get(dense) {
                continue;
            }
            if !world.tech.prereqs_known(&polity.tech, tech) {
                continue;
            }
            if !world.tech.is_feasible(tech, s) {
                continue;
            }
            let domain_k = polity.knowledge[tech.domain];
            let domain_factor =
                smooth01((domain_k - 0.45 * tech.threshold) / (0.90 * tech.threshold).max(1.0));
            if domain_factor <= 0.0 {
                continue;
            }

            let pop_factor = (0.35 + 0.20 * (s.population / 25_000.0).ln_1p()).clamp(0.20, 2.4);
            let org_factor = (0.35 + 0.65 * s.specialization)
                * (0.35 + 0.65 * s.institution)
                * (0.45 + 0.55 * s.stability)
                * (0.35 + 0.65 * s.legitimacy)
                * (0.35 + 0.65 * s.connectivity)
                * (0.25 + 0.75 * s.openness);
            let mechanism_boost = (0.72 + 0.28 * s.fragmentation)
                * (0.72 + 0.28 * s.idea_market)
                * (0.75 + 0.25 * s.credible_commitment)
                * (0.80 + 0.20 * s.media_throughput);
            let induced = world.tech.induced_bias(tech, s);
            let difficulty_den =
                (1.0 + cfg.discovery_difficulty_scale.max(0.0) * tech.difficulty).max(0.2);
            let hazard = cfg.discovery_base.max(0.0) * pop_factor * org_factor * domain_factor
                * mechanism_boost
                * induced
                / difficulty_den;
            let p = 1.0 - (-hazard * dt).exp();
            // A NaN anywhere in the chain is treated as zero hazard.
            if !p.is_finite() {
                continue;
            }
            let u = deterministic_unit(seed, year, i, dense, salt::DISCOVERY);
            if u >= p {
                continue;
            }

            let polity = &mut world.polities[i];
            polity.tech.known.set(dense, true);
            let adoption_seed = (cfg.discovery_seed_adoption * (0.6 + 0.8 * domain_factor))
                .clamp(0.0, 0.35) as f32;
            polity.tech.adoption[dense] = polity.tech.adoption[dense].max(adoption_seed);
            polity.tech.low_adoption_years[dense] = 0;
            discovered += 1;
        }
    }
}

/// Directed contact-weighted diffusion of already-known techs, over borders
/// and trade links separately.
fn known_diffusion_pass(world: &mut World, signals: &[PolitySignals], dt: f64) {
    let n = world.polities.len();
    let cfg = world.config.tech.clone();
    let seed = world.seed;
    let year = world.year;
    let top_k = cfg.known_diffusion_top_k.clamp(2, 16);

    // Directed (from, to, contact weight) link list, borders then trade.
    let mut links: Vec<(usize, usize, f64)> = Vec::new();
    for a in 0..n {
        if world.polities[a].population <= 0 {
            continue;
        }
        for b in world.grid.sorted_neighbors(a) {
            if b >= n || world.polities[b].population <= 0 {
                continue;
            }
            let contact = world.grid.border_contacts(a, b).max(1);
            let w = clamp01((contact as f64).ln_1p() / 5.0);
            links.push((a, b, w));
        }
        for b in 0..n {
            if b == a || world.polities[b].population <= 0 {
                continue;
            }
            let w = world.trade.intensity(a, b) as f64;
            if w > 0.001 {
                links.push((a, b, w));
            }
        }
    }

    for (from, to, w) in links {
        let friction = (-cfg.cultural_friction_strength.max(0.0)
            * trait_distance(&world.polities[from].traits, &world.polities[to].traits))
        .exp();
        let sf = &signals[from];
        let st = &signals[to];

        // Source's top-K most adopted known techs are the candidates.
        let mut candidates: Vec<(usize, f32)> = world.polities[from]
            .tech
            .adoption
            .iter()
            .enumerate()
            .filter(|(dense, _)| world.polities[from].tech.known.get(*dense))
            .map(|(dense, &a)| (dense, a))
            .collect();
        // Most-adopted first; ties break toward the most advanced tech so a
        // mature society teaches its frontier, not its prehistory.
        candidates.sort_by(|x, y| {
            y.1.partial_cmp(&x.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(y.0.cmp(&x.0))
        });
        candidates.truncate(top_k);

        for (dense, source_adoption) in candidates {
            let tech = match world.tech.tech_of_dense(dense) {
                Some(t) => t,
                None => continue,
            };
            let target = &world.polities[to];
            let target_knows = target.tech.known.get(dense);

            if !target_knows && world.tech.prereqs_known(&target.tech, tech) {
                let p_learn = (cfg.known_diffusion_base.max(0.0)
                    * w
                    * friction
                    * (0.30 + 0.70 * sf.idea_market)
                    * (0.30 + 0.70 * sf.media_throughput)
                    * (0.30 + 0.70 * st.idea_market)
                    * (0.35 + 0.65 * sf.connectivity)
                    * (0.25 + 0.75 * st.openness)
                    * dt)
                    .clamp(0.0, 0.85);
                let u = pair_unit(seed, year, from, to, dense, salt::LEARN);
                if u < p_learn {
                    let target = &mut world.polities[to];
                    target.tech.known.set(dense, true);
                    target.tech.low_adoption_years[dense] = 0;
                }
            }

            // Seed adoption across the link once the source has made the
            // practice routine.
            let target = &world.polities[to];
            if source_adoption > 0.80
                && target.tech.known.get(dense)
                && target.tech.adoption[dense] < 0.10
                && world.tech.is_feasible(tech, st)
            {
                let p_seed = (0.12
                    * w
                    * friction
                    * (0.30 + 0.70 * sf.idea_market)
                    * (0.30 + 0.70 * sf.media_throughput)
                    * (0.35 + 0.65 * st.institution)
                    * (0.30 + 0.70 * st.connectivity)
                    * dt)
                    .clamp(0.0, 0.60);
                if pair_unit(seed, year, from, to, dense, salt::ADOPT_SEED) < p_seed {
                    let strength = pair_unit(seed, year, from, to, dense, salt::ADOPT_SEED ^ 0x5345);
                    let seed_value = (cfg.adoption_seed_from_neighbors * (0.8 + 0.4 * strength))
                        .clamp(0.02, 0.18) as f32;
                    let target = &mut world.polities[to];
                    target.tech.adoption[dense] = target.tech.adoption[dense].max(seed_value);
                }
            }
        }
    }
}

/// Adoption growth toward 1 where prerequisites and feasibility hold, decay
/// otherwise; low-adoption years feed the rare-forgetting clause.
fn adoption_pass(world: &mut World, signals: &[PolitySignals], dt: f64) {
    let cfg = world.config.tech.clone();
    let seed = world.seed;
    let year = world.year;

    for i in 0..world.polities.len() {
        if world.polities[i].dead {
            continue;
        }
        let s = signals[i];
        let collapse = s.stability < 0.25
            || s.famine_severity > 0.5
            || (s.at_war && world.polities[i].war.war_exhaustion > 0.7);

        for dense in 0..world.tech.count() {
            let known = world.polities[i].tech.known.get(dense);
            if !known {
                continue;
            }
            let tech = world.tech.tech_of_dense(dense).expect("dense in range");
            let polity = &world.polities[i];
            let a = polity.tech.adoption[dense] as f64;

            let grows = world
                .tech
                .prereqs_adopted(&polity.tech, tech, cfg.prereq_adoption_fraction)
                && world.tech.is_feasible(tech, &s);

            let new_a = if grows {
                let mut speed = cfg.adoption_base_speed.max(0.0)
                    * (0.30 + 0.70 * s.institution)
                    * (0.45 + 0.55 * s.stability)
                    * (0.40 + 0.60 * s.legitimacy)
                    * (0.25 + 0.75 * s.market_access)
                    * (0.25 + 0.75 * s.connectivity)
                    * (0.35 + 0.65 * s.specialization)
                    * (1.0 - 0.5 * s.inequality)
                    * (0.40 + 0.60 * s.food_security)
                    * (0.30 + 0.70 * s.idea_market)
                    * (0.30 + 0.70 * s.credible_commitment)
                    * (0.30 + 0.70 * s.media_throughput)
                    * (0.85 + 0.30 * s.fragmentation)
                    * world.tech.induced_bias(tech, &s);
                if s.at_war {
                    speed *= 0.85;
                }
                speed *= 1.0 - 0.4 * s.famine_severity;
                a + speed * (1.0 - a) * dt
            } else {
                let decay = cfg.adoption_decay_base.max(0.0)
                    * if collapse {
                        cfg.collapse_decay_multiplier.max(1.0)
                    } else {
                        1.0
                    };
                a - decay * a * dt
            };
            let new_a = if new_a.is_finite() { new_a.clamp(0.0, 1.0) } else { a };

            let polity = &mut world.polities[i];
            polity.tech.adoption[dense] = new_a as f32;
            if new_a < 0.05 {
                polity.tech.low_adoption_years[dense] =
                    polity.tech.low_adoption_years[dense].saturating_add(dt as u16);
            } else {
                polity.tech.low_adoption_years[dense] = 0;
            }

            // Rare forgetting: tiny, isolated, early-era societies can lose
            // a practice outright.
            let polity = &world.polities[i];
            if polity.tech.low_adoption_years[dense] >= cfg.rare_forget_years
                && polity.tech.adoption[dense] < 0.05
                && polity.population < 1_500
                && s.connectivity < 0.12
                && tech.order <= 250
            {
                let u = deterministic_unit(seed, year, i, dense, salt::FORGET);
                if u < (cfg.rare_forget_chance * dt).min(1.0) {
                    let polity = &mut world.polities[i];
                    polity.tech.known.set(dense, false);
                    polity.tech.adoption[dense] = 0.0;
                    polity.tech.low_adoption_years[dense] = 0;
                }
            }
        }
    }
}
