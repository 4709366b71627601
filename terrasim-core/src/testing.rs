//! Test fixtures.
//!
//! `WorldBuilder` assembles small synthetic worlds without going through
//! the image loader. Used by the crate's own tests and by downstream
//! integration tests; not part of the simulation itself.

use crate::config::SimConfig;
use crate::grid::{CellPos, Terrain};
use crate::state::{PolityType, World};
use crate::systems::UpdateContext;
use std::collections::BTreeSet;

pub struct WorldBuilder {
    config: SimConfig,
    terrain: Terrain,
    seed: u64,
    spawns: Vec<(String, PolityType, CellPos, i64)>,
}

impl WorldBuilder {
    /// A `size`×`size` all-land world with uniform food per cell.
    pub fn flat(size: i32, food: f32) -> Self {
        Self {
            config: SimConfig::default(),
            terrain: Terrain::uniform_land(size, size, food),
            seed: 42,
            spawns: Vec::new(),
        }
    }

    pub fn terrain(mut self, terrain: Terrain) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut SimConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_polity(mut self, name: &str, kind: PolityType, x: i32, y: i32, pop: i64) -> Self {
        self.spawns
            .push((name.to_string(), kind, CellPos::new(x, y), pop));
        self
    }

    pub fn build(self) -> World {
        let mut world = World::new(self.config, self.terrain, self.seed);
        for (name, kind, cell, pop) in self.spawns {
            world.spawn_polity(name, kind, cell, pop);
        }
        world
    }
}

/// Run `f` with a per-polity update context over `world`, the way the
/// per-polity phase would build one (no plague, current views).
pub fn with_update_context<R>(world: &World, f: impl FnOnce(&UpdateContext) -> R) -> R {
    let views = world.views();
    let affected = BTreeSet::new();
    let ctx = UpdateContext {
        year: world.year,
        seed: world.seed,
        config: &world.config,
        grid: &world.grid,
        views: &views,
        effects: &world.effects,
        tech: &world.tech,
        plague_active: false,
        plague_affected: &affected,
        war_end_year: &world.war_end_year,
    };
    f(&ctx)
}
