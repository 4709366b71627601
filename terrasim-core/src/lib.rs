//! # Terrasim Core
//!
//! Deterministic, tick-driven historical world simulation engine.
//!
//! The crate implements the simulation core only: the year-advance
//! scheduler, the polity state machine, the knowledge/adoption/diffusion
//! model over a technology DAG, the territorial expansion and war engine,
//! and the logistic demographic model. Rendering, input and map decoding
//! live with the callers.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐      ┌───────────────┐      ┌──────────────┐
//! │ map images │─────▶│ Terrain/World │─────▶│ advance_year │──┐
//! │ + config   │      │ construction  │      │ (7 phases)   │  │ per year
//! └────────────┘      └───────────────┘      └──────┬───────┘◀─┘
//!                                                   │
//!                      ┌────────────┐        ┌──────▼───────┐
//!                      │  Snapshot  │◀───────│    World     │
//!                      │ (replay)   │        │ (all state)  │
//!                      └────────────┘        └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`World`] | Complete simulation state (grid, polities, tech, trade) |
//! | [`Grid`] | Cell terrain plus the adjacency-safe ownership layer |
//! | [`Polity`] | One polity; identity is its stable registry index |
//! | [`TechManager`] | Static technology DAG and effects tables |
//! | [`advance_year`] | One year through the fixed sub-phase order |
//! | [`Snapshot`] | Canonicalizable state capture for replay comparison |
//!
//! ## Determinism
//!
//! Given the same seed, map and config, end-of-year state is bit-identical
//! under the deterministic schedule. Per-polity RNG streams are seeded from
//! `(world_seed, index)`; decisions that must match across thread orderings
//! use the pure [`rng::deterministic_unit`] hash instead of any stream.

pub mod bounded;
pub mod config;
pub mod events;
pub mod grid;
pub mod metrics;
pub mod names;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod step;
pub mod systems;
pub mod tech;
pub mod tech_table;
pub mod testing;

#[cfg(test)]
mod step_tests;

pub use bounded::{clamp01, Bounded};
pub use config::{ConfigError, SimConfig};
pub use events::{NewsLog, WorldEvent};
pub use grid::{CellPos, Grid, ResourceKind, Terrain, UNCLAIMED};
pub use metrics::SimMetrics;
pub use snapshot::{Snapshot, SnapshotError, FINE_SCALE, GOV_SCALE};
pub use state::{Ideology, Polity, PolityType, WarGoal, World};
pub use step::{advance_year, fast_forward};
pub use tech::{TechManager, TechState};
