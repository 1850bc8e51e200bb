use bevy::prelude::*;

use crate::game::agents::{AgentId, AgentRecord};

mod uniform;
#[cfg(test)]
mod tests;

pub use uniform::UniformGrid;

// ============================================================================
// Cell Keys
// ============================================================================

/// Pack two cell coordinates into one 64-bit key.
///
/// Both axes keep their full 32 bits, so two distinct cells can never alias
/// no matter how far from the origin the world extends. `as u32` is a
/// bit-preserving cast for negative coordinates.
#[inline]
pub fn pack_cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u32 as u64) << 32) | (cy as u32 as u64)
}

/// Inverse of [`pack_cell_key`], for tests and diagnostics.
#[inline]
pub fn unpack_cell_key(key: u64) -> (i32, i32) {
    (((key >> 32) as u32) as i32, (key as u32) as i32)
}

// ============================================================================
// Hierarchical Grid
// ============================================================================

/// Two-tier spatial index over the agent list.
///
/// The coarse grid (large cells) holds every active agent and answers broad
/// queries; the fine grid (small cells) holds only agents near the focal
/// point and answers narrow-phase queries in the hot zone. Query results are
/// accumulated into a reused buffer to avoid per-call allocation; the buffer
/// is reset once per frame via [`HierarchicalGrid::clear_cache`].
///
/// Grid membership is cached on the [`AgentRecord`] itself (`coarse_key`,
/// `fine_key`) so removal never scans cells. Invariant: an active, inserted
/// agent sits in exactly one coarse cell and in at most one fine cell.
#[derive(Resource, Debug)]
pub struct HierarchicalGrid {
    coarse: UniformGrid<AgentId>,
    fine: UniformGrid<AgentId>,
    hot_zone_radius: f32,
    focal: Vec2,
    results: Vec<AgentId>,
}

impl HierarchicalGrid {
    pub fn new(coarse_cell_size: f32, fine_cell_size: f32, hot_zone_radius: f32) -> Self {
        Self {
            coarse: UniformGrid::new(coarse_cell_size),
            fine: UniformGrid::new(fine_cell_size),
            hot_zone_radius,
            focal: Vec2::ZERO,
            results: Vec::with_capacity(256),
        }
    }

    pub fn fine_cell_size(&self) -> f32 {
        self.fine.cell_size()
    }

    pub fn coarse_cell_size(&self) -> f32 {
        self.coarse.cell_size()
    }

    /// Update the focal position hot-zone registration is judged against.
    /// Called once per tick before agents are (re-)inserted.
    pub fn set_focal(&mut self, focal: Vec2) {
        self.focal = focal;
    }

    /// Register an agent: always in the coarse grid, and additionally in the
    /// fine grid when it sits inside the hot zone. The hot-zone check is a
    /// cheap heuristic against the focal point, not an exact test against
    /// future queries.
    pub fn insert(&mut self, id: AgentId, agent: &mut AgentRecord) {
        agent.coarse_key = Some(self.coarse.insert(id, agent.pos.x, agent.pos.y));
        let hot = agent.pos.distance_squared(self.focal) <= self.hot_zone_radius * self.hot_zone_radius;
        agent.fine_key = hot.then(|| self.fine.insert(id, agent.pos.x, agent.pos.y));
    }

    /// Unregister an agent from both tiers using its cached keys.
    pub fn remove(&mut self, id: AgentId, agent: &mut AgentRecord) {
        if let Some(key) = agent.coarse_key.take() {
            self.coarse.remove(id, key);
        }
        if let Some(key) = agent.fine_key.take() {
            self.fine.remove(id, key);
        }
    }

    /// Constant-time "move": remove via the cached keys, then re-insert at
    /// the agent's current position. Idempotent - calling it twice with an
    /// unchanged position yields the same membership as calling it once.
    pub fn insert_or_update(&mut self, id: AgentId, agent: &mut AgentRecord) {
        self.remove(id, agent);
        self.insert(id, agent);
    }

    /// Query agents around (x, y).
    ///
    /// Wide queries (radius beyond 1.5 fine cells) go straight to the coarse
    /// grid. Narrow queries try the fine grid first; when the queried area
    /// touches no populated fine cells - a sparse region outside the hot
    /// zone - the query falls back to the coarse grid. The fallback is a
    /// correctness guarantee: an empty fine answer says nothing about agents
    /// that were only coarse-registered.
    ///
    /// Results are appended to the shared frame buffer and returned as a
    /// slice; no exact-distance filtering is applied.
    pub fn query(&mut self, x: f32, y: f32, radius: f32) -> &[AgentId] {
        let start = self.results.len();
        if radius > 1.5 * self.fine.cell_size() {
            self.coarse.query_into(x, y, radius, &mut self.results);
        } else {
            let touched = self.fine.query_into(x, y, radius, &mut self.results);
            if touched == 0 {
                self.coarse.query_into(x, y, radius, &mut self.results);
            }
        }
        &self.results[start..]
    }

    /// Reset the shared query buffer. Called once per frame; query slices
    /// from the previous frame are invalid afterwards.
    pub fn clear_cache(&mut self) {
        self.results.clear();
    }

    /// Drop all grid contents and the query buffer. Cached keys on agent
    /// records become stale; callers reset them via re-insertion.
    pub fn clear(&mut self) {
        self.coarse.clear();
        self.fine.clear();
        self.results.clear();
    }

    pub fn coarse_entries(&self) -> usize {
        self.coarse.total_entries()
    }

    pub fn fine_entries(&self) -> usize {
        self.fine.total_entries()
    }
}
