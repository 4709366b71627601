//! World grid and incremental polity adjacency.
//!
//! The terrain layers (land mask, food potential, resource kind, biome) are
//! immutable after construction. Cell ownership is the only mutable layer
//! and every write goes through [`Grid::set_owner`] /
//! [`Grid::set_owner_locked`], which maintain:
//!
//! - per-pair border-contact counts (`+1`/`-1` deltas against the old and
//!   new owner for each of the 8 neighboring cells),
//! - the derived neighbor sets (edge present iff contact count > 0),
//! - the dirty-region set consumed by an external renderer.
//!
//! Writing the owner array directly is impossible from outside this module;
//! that is the point.

use crate::bounded::clamp01;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Owner value for unclaimed cells.
pub const UNCLAIMED: i32 = -1;

/// Grid coordinates. Canonical ordering for snapshots is `(y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub y: i32,
    pub x: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (8-connected steps).
    pub fn chebyshev(&self, other: CellPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// The 4-connected neighbors, in fixed order.
    pub fn orthogonal(&self) -> [CellPos; 4] {
        [
            CellPos::new(self.x + 1, self.y),
            CellPos::new(self.x - 1, self.y),
            CellPos::new(self.x, self.y + 1),
            CellPos::new(self.x, self.y - 1),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    None,
    Food,
    Ore,
    Energy,
    Construction,
}

impl Default for ResourceKind {
    fn default() -> Self {
        ResourceKind::None
    }
}

/// Immutable per-cell layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    width: i32,
    height: i32,
    is_land: Vec<bool>,
    food: Vec<f32>,
    resource: Vec<ResourceKind>,
    biome: Vec<u8>,
}

impl Terrain {
    pub fn new(
        width: i32,
        height: i32,
        is_land: Vec<bool>,
        food: Vec<f32>,
        resource: Vec<ResourceKind>,
        biome: Vec<u8>,
    ) -> Self {
        let cells = (width as usize) * (height as usize);
        assert_eq!(is_land.len(), cells);
        assert_eq!(food.len(), cells);
        assert_eq!(resource.len(), cells);
        assert_eq!(biome.len(), cells);
        Self {
            width,
            height,
            is_land,
            food,
            resource,
            biome,
        }
    }

    /// Uniform all-land terrain, for tests and synthetic worlds.
    pub fn uniform_land(width: i32, height: i32, food: f32) -> Self {
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            is_land: vec![true; cells],
            food: vec![food; cells],
            resource: vec![ResourceKind::None; cells],
            biome: vec![0; cells],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: CellPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn index(&self, pos: CellPos) -> usize {
        debug_assert!(self.in_bounds(pos));
        pos.y as usize * self.width as usize + pos.x as usize
    }

    pub fn is_land(&self, pos: CellPos) -> bool {
        self.in_bounds(pos) && self.is_land[self.index(pos)]
    }

    pub fn food(&self, pos: CellPos) -> f32 {
        if self.in_bounds(pos) {
            self.food[self.index(pos)]
        } else {
            0.0
        }
    }

    pub fn resource(&self, pos: CellPos) -> ResourceKind {
        if self.in_bounds(pos) {
            self.resource[self.index(pos)]
        } else {
            ResourceKind::None
        }
    }

    pub fn biome(&self, pos: CellPos) -> u8 {
        if self.in_bounds(pos) {
            self.biome[self.index(pos)]
        } else {
            0
        }
    }

    /// Raise the food potential at one cell to at least `floor`.
    /// Used once, for the capital-cell food floor at world construction.
    pub fn raise_food_floor(&mut self, pos: CellPos, floor: f32) {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            if self.food[idx] < floor {
                self.food[idx] = floor;
            }
        }
    }
}

/// Symmetric border-contact counts between polity pairs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContactMatrix {
    n: usize,
    counts: Vec<u32>,
}

impl ContactMatrix {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            counts: vec![0; n * n],
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, a: usize, b: usize) -> u32 {
        if a >= self.n || b >= self.n {
            return 0;
        }
        self.counts[a * self.n + b]
    }

    fn add(&mut self, a: usize, b: usize) {
        if a == b || a >= self.n || b >= self.n {
            return;
        }
        self.counts[a * self.n + b] += 1;
        self.counts[b * self.n + a] += 1;
    }

    /// Saturating decrement: a negative contact count is an invariant
    /// violation, clamped to zero and logged once per offending pair.
    fn remove(&mut self, a: usize, b: usize) {
        if a == b || a >= self.n || b >= self.n {
            return;
        }
        for (x, y) in [(a, b), (b, a)] {
            let slot = &mut self.counts[x * self.n + y];
            if *slot == 0 {
                debug_assert!(false, "border contact count underflow for ({x}, {y})");
                log::error!("border contact count underflow for ({x}, {y}); clamped to 0");
            } else {
                *slot -= 1;
            }
        }
    }

    fn ensure_size(&mut self, n: usize) {
        if n <= self.n {
            return;
        }
        let mut counts = vec![0; n * n];
        for a in 0..self.n {
            for b in 0..self.n {
                counts[a * n + b] = self.counts[a * self.n + b];
            }
        }
        self.n = n;
        self.counts = counts;
    }
}

/// The mutable ownership layer. Lives behind the grid mutex so the parallel
/// per-polity phase and the editor share one critical section.
#[derive(Debug)]
pub struct Ownership {
    owner: Vec<i32>,
    contact: ContactMatrix,
    neighbors: Vec<FxHashSet<usize>>,
    dirty_regions: FxHashSet<usize>,
}

impl Ownership {
    pub fn owner_at_index(&self, idx: usize) -> i32 {
        self.owner[idx]
    }

    pub fn contact(&self) -> &ContactMatrix {
        &self.contact
    }

    pub fn dirty_regions(&self) -> &FxHashSet<usize> {
        &self.dirty_regions
    }

    pub fn clear_dirty_regions(&mut self) {
        self.dirty_regions.clear();
    }

    pub fn owner_array(&self) -> &[i32] {
        &self.owner
    }
}

/// A single committed ownership change, recorded so polity territory
/// containers can be reconciled after the per-polity phase joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerTransition {
    pub pos: CellPos,
    pub old: i32,
    pub new: i32,
}

/// Result of an editor paint operation.
#[derive(Debug, Default)]
pub struct PaintResult {
    pub changed: Vec<OwnerTransition>,
    /// Other polity indices whose territory shrank.
    pub affected: Vec<usize>,
}

const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug)]
pub struct Grid {
    terrain: Terrain,
    region_size: i32,
    ownership: Mutex<Ownership>,
}

impl Grid {
    pub fn new(terrain: Terrain, region_size: i32, polity_count: usize) -> Self {
        let cells = (terrain.width() as usize) * (terrain.height() as usize);
        let ownership = Ownership {
            owner: vec![UNCLAIMED; cells],
            contact: ContactMatrix::new(polity_count),
            neighbors: vec![FxHashSet::default(); polity_count],
            dirty_regions: FxHashSet::default(),
        };
        Self {
            terrain,
            region_size: region_size.max(1),
            ownership: Mutex::new(ownership),
        }
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut Terrain {
        &mut self.terrain
    }

    pub fn width(&self) -> i32 {
        self.terrain.width()
    }

    pub fn height(&self) -> i32 {
        self.terrain.height()
    }

    pub fn region_size(&self) -> i32 {
        self.region_size
    }

    /// Acquire the grid lock. Use with [`Grid::set_owner_locked`] when a
    /// read-then-commit must be one critical section.
    pub fn lock(&self) -> MutexGuard<'_, Ownership> {
        self.ownership.lock().expect("grid lock poisoned")
    }

    pub fn owner(&self, pos: CellPos) -> i32 {
        if !self.terrain.in_bounds(pos) {
            return UNCLAIMED;
        }
        self.lock().owner[self.terrain.index(pos)]
    }

    pub fn owner_locked(&self, own: &Ownership, pos: CellPos) -> i32 {
        if !self.terrain.in_bounds(pos) {
            return UNCLAIMED;
        }
        own.owner[self.terrain.index(pos)]
    }

    /// Change a cell's owner, taking the internal lock.
    /// Returns the previous owner when a change was committed, `None` when
    /// the write was a no-op (out of bounds, water, or same owner).
    pub fn set_owner(&self, pos: CellPos, new_owner: i32) -> Option<i32> {
        let mut own = self.lock();
        self.set_owner_locked(&mut own, pos, new_owner)
    }

    /// Same as [`Grid::set_owner`], caller already holds the lock.
    pub fn set_owner_locked(
        &self,
        own: &mut Ownership,
        pos: CellPos,
        new_owner: i32,
    ) -> Option<i32> {
        if !self.terrain.in_bounds(pos) {
            return None;
        }
        // owner >= 0 implies is_land.
        if new_owner >= 0 && !self.terrain.is_land(pos) {
            debug_assert!(false, "attempted to claim water cell {pos:?}");
            log::error!("refused to set owner {new_owner} on water cell {pos:?}");
            return None;
        }
        let idx = self.terrain.index(pos);
        let old_owner = own.owner[idx];
        if old_owner == new_owner {
            return None;
        }
        if new_owner >= 0 {
            self.ensure_polity_capacity(own, new_owner as usize + 1);
        }
        own.owner[idx] = new_owner;

        for (dx, dy) in NEIGHBORS_8 {
            let npos = CellPos::new(pos.x + dx, pos.y + dy);
            if !self.terrain.in_bounds(npos) {
                continue;
            }
            let q = own.owner[self.terrain.index(npos)];
            if q < 0 {
                continue;
            }
            let q = q as usize;
            if old_owner >= 0 && old_owner as usize != q {
                let a = old_owner as usize;
                own.contact.remove(a, q);
                if own.contact.get(a, q) == 0 {
                    own.neighbors[a].remove(&q);
                    own.neighbors[q].remove(&a);
                }
            }
            if new_owner >= 0 && new_owner as usize != q {
                let a = new_owner as usize;
                own.contact.add(a, q);
                own.neighbors[a].insert(q);
                own.neighbors[q].insert(a);
            }
        }

        let regions_x = (self.terrain.width() + self.region_size - 1) / self.region_size;
        let region = (pos.y / self.region_size) * regions_x + (pos.x / self.region_size);
        own.dirty_regions.insert(region as usize);
        Some(old_owner)
    }

    fn ensure_polity_capacity(&self, own: &mut Ownership, n: usize) {
        if own.neighbors.len() < n {
            own.neighbors.resize_with(n, FxHashSet::default);
        }
        own.contact.ensure_size(n);
    }

    /// Border-contact count between two polities.
    pub fn border_contacts(&self, a: usize, b: usize) -> u32 {
        self.lock().contact.get(a, b)
    }

    pub fn are_neighbors(&self, a: usize, b: usize) -> bool {
        self.border_contacts(a, b) > 0
    }

    /// Neighbor indices of a polity in ascending order. Sorted so iteration
    /// order is independent of hash-set history.
    pub fn sorted_neighbors(&self, polity: usize) -> Vec<usize> {
        let own = self.lock();
        Self::sorted_neighbors_locked(&own, polity)
    }

    pub fn sorted_neighbors_locked(own: &Ownership, polity: usize) -> Vec<usize> {
        let mut out: Vec<usize> = own
            .neighbors
            .get(polity)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Editor tool: paint (or erase) a disk of land cells.
    ///
    /// With `erase`, cells currently owned by `polity` inside the disk are
    /// released to unclaimed. Otherwise cells are claimed for `polity`;
    /// `overwrite` controls whether other polities' cells are taken too.
    pub fn paint_cells(
        &self,
        polity: usize,
        center: CellPos,
        radius: i32,
        erase: bool,
        overwrite: bool,
    ) -> PaintResult {
        let mut result = PaintResult::default();
        let mut affected: FxHashSet<usize> = FxHashSet::default();
        let mut own = self.lock();
        let r2 = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let pos = CellPos::new(center.x + dx, center.y + dy);
                if !self.terrain.is_land(pos) {
                    continue;
                }
                let current = self.owner_locked(&own, pos);
                let target = if erase {
                    if current != polity as i32 {
                        continue;
                    }
                    UNCLAIMED
                } else {
                    if current >= 0 && current != polity as i32 && !overwrite {
                        continue;
                    }
                    polity as i32
                };
                if let Some(old) = self.set_owner_locked(&mut own, pos, target) {
                    if old >= 0 && old != polity as i32 {
                        affected.insert(old as usize);
                    }
                    result.changed.push(OwnerTransition {
                        pos,
                        old,
                        new: target,
                    });
                }
            }
        }
        result.affected = affected.into_iter().collect();
        result.affected.sort_unstable();
        result
    }

    /// Rebuild the contact matrix and neighbor sets from the owner array.
    /// The incremental bookkeeping must always agree with this.
    pub fn rebuild_adjacency(&self) {
        let mut own = self.lock();
        let n = own.neighbors.len();
        let rebuilt = self.compute_adjacency_locked(&own, n);
        own.contact = rebuilt.0;
        own.neighbors = rebuilt.1;
    }

    /// Recompute the adjacency from scratch and compare against the
    /// incrementally maintained state. Returns true when they agree.
    pub fn verify_adjacency(&self) -> bool {
        let own = self.lock();
        let n = own.neighbors.len();
        let (contact, neighbors) = self.compute_adjacency_locked(&own, n);
        let counts_match = contact.counts == own.contact.counts;
        let neighbors_match = neighbors == own.neighbors;
        if !counts_match || !neighbors_match {
            log::error!("incremental adjacency diverged from rebuilt adjacency");
        }
        counts_match && neighbors_match
    }

    fn compute_adjacency_locked(
        &self,
        own: &Ownership,
        n: usize,
    ) -> (ContactMatrix, Vec<FxHashSet<usize>>) {
        let mut contact = ContactMatrix::new(n);
        let mut neighbors = vec![FxHashSet::default(); n];
        for y in 0..self.terrain.height() {
            for x in 0..self.terrain.width() {
                let pos = CellPos::new(x, y);
                let a = own.owner[self.terrain.index(pos)];
                if a < 0 {
                    continue;
                }
                // Count each unordered cell pair once: only look at the
                // 4 "forward" offsets.
                for (dx, dy) in [(1, 0), (-1, 1), (0, 1), (1, 1)] {
                    let npos = CellPos::new(x + dx, y + dy);
                    if !self.terrain.in_bounds(npos) {
                        continue;
                    }
                    let b = own.owner[self.terrain.index(npos)];
                    if b < 0 || b == a {
                        continue;
                    }
                    contact.add(a as usize, b as usize);
                    neighbors[a as usize].insert(b as usize);
                    neighbors[b as usize].insert(a as usize);
                }
            }
        }
        (contact, neighbors)
    }

    /// Food-driven desirability of a cell for expansion, in [0, 1].
    pub fn expansion_score(&self, pos: CellPos) -> f64 {
        clamp01(self.terrain.food(pos) as f64 / 10.0)
    }
}
