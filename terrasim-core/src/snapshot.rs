//! Deterministic world snapshots.
//!
//! A snapshot carries everything replay needs: the owner array, per-polity
//! state (RNG streams included), the contact matrix, trade/plague state and
//! the year. Before comparing two snapshots, apply
//! [`Snapshot::canonicalize`]: containers are sorted into their canonical
//! orders and scalars rounded to fixed grids, so two runs of the same seed
//! compare byte-equal.

use crate::state::{PlagueState, Polity, TradeState, World};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// Default rounding grids: money/populations on the fine grid, governance
/// scalars on the coarse one.
pub const FINE_SCALE: f64 = 1e-6;
pub const GOV_SCALE: f64 = 1e-9;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot archive failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub year: i32,
    pub seed: u64,
    pub world_rng: crate::rng::SplitMix64,
    pub width: i32,
    pub height: i32,
    pub owners: Vec<i32>,
    pub contacts: Vec<u32>,
    pub polities: Vec<Polity>,
    pub trade: TradeState,
    pub plague: PlagueState,
    pub war_end_year: Vec<(usize, usize, i32)>,
}

impl Snapshot {
    pub fn capture(world: &World) -> Self {
        let (owners, contacts) = {
            let own = world.grid.lock();
            let n = world.polities.len();
            let mut contacts = Vec::with_capacity(n * n);
            for a in 0..n {
                for b in 0..n {
                    contacts.push(own.contact().get(a, b));
                }
            }
            (own.owner_array().to_vec(), contacts)
        };
        let mut war_end_year: Vec<(usize, usize, i32)> = world
            .war_end_year
            .iter()
            .map(|(&(a, b), &year)| (a, b, year))
            .collect();
        war_end_year.sort_unstable();
        Self {
            year: world.year,
            seed: world.seed,
            world_rng: world.rng,
            width: world.grid.width(),
            height: world.grid.height(),
            owners,
            contacts,
            polities: world.polities.clone(),
            trade: world.trade.clone(),
            plague: world.plague.clone(),
            war_end_year,
        }
    }

    /// Apply both canonicalization passes.
    pub fn canonicalize(&mut self, fine_scale: f64, gov_scale: f64) {
        self.canonicalize_deterministic_containers();
        self.canonicalize_deterministic_scalars(fine_scale, gov_scale);
    }

    /// Sort territory, ports, roads by (y, x); enemies by index; keep the
    /// capital at city index 0 and sort the rest by location.
    pub fn canonicalize_deterministic_containers(&mut self) {
        for polity in &mut self.polities {
            polity.territory_vec.sort_unstable();
            polity.ports.sort_unstable();
            polity.roads.sort_unstable();
            polity.airways.sort_unstable();
            polity.war.enemies.sort_unstable();
            if polity.cities.len() > 1 {
                let rest = &mut polity.cities[1..];
                rest.sort_by_key(|c| c.location);
            }
        }
        self.war_end_year.sort_unstable();
    }

    /// Round money/population floats to `fine_scale` and governance scalars
    /// to `gov_scale` grids.
    pub fn canonicalize_deterministic_scalars(&mut self, fine_scale: f64, gov_scale: f64) {
        let fine = |v: f64| (v / fine_scale).round() * fine_scale;
        let gov = |v: f64| (v / gov_scale).round() * gov_scale;
        for polity in &mut self.polities {
            polity.gold = fine(polity.gold);
            polity.debt = fine(polity.debt);
            polity.last_tax_take = fine(polity.last_tax_take);
            polity.income_annual = fine(polity.income_annual);
            polity.expenses_annual = fine(polity.expenses_annual);
            polity.yearly_food = fine(polity.yearly_food);
            polity.food_stock = fine(polity.food_stock);
            polity.knowledge_infra = fine(polity.knowledge_infra);
            polity.innovation_rate = fine(polity.innovation_rate);
            polity.military_strength = fine(polity.military_strength);
            for k in &mut polity.knowledge {
                *k = fine(*k);
            }

            polity.legitimacy = gov(polity.legitimacy);
            polity.stability = gov(polity.stability);
            polity.avg_control = gov(polity.avg_control);
            polity.admin_capacity = gov(polity.admin_capacity);
            polity.fiscal_capacity = gov(polity.fiscal_capacity);
            polity.logistics_reach = gov(polity.logistics_reach);
            polity.autonomy_pressure = gov(polity.autonomy_pressure);
            polity.elite_defection_pressure = gov(polity.elite_defection_pressure);
            polity.war.war_exhaustion = gov(polity.war.war_exhaustion);
            polity.war.conquest_momentum = gov(polity.war.conquest_momentum);
        }
    }

    /// SHA-256 over the serialized snapshot.
    pub fn checksum(&self) -> Result<String, SnapshotError> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Byte-equality after canonicalization, the replay comparison.
    pub fn matches(&self, other: &Snapshot) -> Result<bool, SnapshotError> {
        let mut a = self.clone();
        let mut b = other.clone();
        a.canonicalize(FINE_SCALE, GOV_SCALE);
        b.canonicalize(FINE_SCALE, GOV_SCALE);
        Ok(serde_json::to_vec(&a)? == serde_json::to_vec(&b)?)
    }

    /// Write a zip archive holding the snapshot as JSON.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let file = std::fs::File::create(path)?;
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        archive.start_file("snapshot.json", options)?;
        archive.write_all(&serde_json::to_vec(self)?)?;
        archive.finish()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name("snapshot.json")?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::{CellPos, Terrain};
    use crate::state::PolityType;

    fn small_world() -> World {
        let mut world = World::new(SimConfig::default(), Terrain::uniform_land(10, 10, 3.0), 77);
        world.spawn_polity("A".into(), PolityType::Trader, CellPos::new(2, 2), 5_000);
        world.spawn_polity("B".into(), PolityType::Pacifist, CellPos::new(7, 7), 5_000);
        world
    }

    #[test]
    fn identical_worlds_match() {
        let world = small_world();
        let a = Snapshot::capture(&world);
        let b = Snapshot::capture(&world);
        assert!(a.matches(&b).unwrap());
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());
    }

    #[test]
    fn canonicalization_sorts_territory_and_rounds() {
        let world = small_world();
        let mut snapshot = Snapshot::capture(&world);
        snapshot.polities[0].territory_vec = vec![
            CellPos::new(5, 5),
            CellPos::new(1, 1),
            CellPos::new(5, 1),
        ];
        snapshot.polities[0].gold = 10.000000049;
        snapshot.canonicalize(FINE_SCALE, GOV_SCALE);
        let territory = &snapshot.polities[0].territory_vec;
        assert_eq!(territory[0], CellPos::new(1, 1));
        assert_eq!(territory[1], CellPos::new(5, 1));
        assert_eq!(territory[2], CellPos::new(5, 5));
        assert!((snapshot.polities[0].gold - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zip_round_trip_preserves_the_snapshot() {
        let world = small_world();
        let snapshot = Snapshot::capture(&world);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.snap.zip");
        snapshot.save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();
        assert!(snapshot.matches(&loaded).unwrap());
        assert_eq!(loaded.year, world.year);
        assert_eq!(loaded.owners, snapshot.owners);
    }
}
