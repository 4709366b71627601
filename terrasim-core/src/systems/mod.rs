//! Simulation systems, one module per concern.
//!
//! The per-polity sub-phase runs through [`polity_update::update_polity`]
//! with a shared read-only [`UpdateContext`]; cross-polity effects are queued
//! in `World::effects` and committed at the phase join. The world-level
//! sub-phases (technology, culture, trade, fiscal) take `&mut World`
//! directly.

pub mod budget;
pub mod cities;
pub mod culture;
pub mod demography;
pub mod expansion;
pub mod ideology;
pub mod infrastructure;
pub mod knowledge;
pub mod plague;
pub mod polity_update;
pub mod pressure;
pub mod regions;
pub mod society;
pub mod stability;
pub mod trade;
pub mod war;

pub use budget::run_fiscal_tick;
pub use culture::run_culture_tick;
pub use knowledge::run_knowledge_tick;
pub use plague::run_plague_phase;
pub use polity_update::update_polity;
pub use trade::run_trade_tick;

use crate::config::SimConfig;
use crate::grid::Grid;
use crate::state::{PolityView, TickEffects};
use crate::tech::TechManager;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Read-only context shared by every polity's yearly update. Workers read
/// other polities only through `views`, captured before the phase started.
pub struct UpdateContext<'a> {
    pub year: i32,
    pub seed: u64,
    pub config: &'a SimConfig,
    pub grid: &'a Grid,
    pub views: &'a [PolityView],
    pub effects: &'a Mutex<TickEffects>,
    pub tech: &'a TechManager,
    pub plague_active: bool,
    pub plague_affected: &'a BTreeSet<usize>,
    pub war_end_year: &'a FxHashMap<(usize, usize), i32>,
}

impl UpdateContext<'_> {
    pub fn is_plague_affected(&self, polity: usize) -> bool {
        self.plague_active && self.plague_affected.contains(&polity)
    }

    pub fn view(&self, polity: usize) -> Option<&PolityView> {
        self.views.get(polity)
    }
}
