/// Structure-of-arrays mirror of the authoritative agent list.
///
/// Rebuilt from scratch every tick it runs; it is scratch space for
/// branch-light bulk numeric work and never a source of truth across ticks.
/// Only built at all when the active-agent count exceeds the configured
/// capacity threshold.

use fixedbitset::FixedBitSet;

use crate::game::agents::{AgentArena, AgentKind};

/// Headroom added before rounding capacity up to a power of two, so a
/// trickle of spawns does not trigger a reallocation every tick.
const CAPACITY_MARGIN: usize = 64;

#[derive(Debug, Default)]
pub struct SoaMirror {
    pub xs: Vec<f32>,
    pub ys: Vec<f32>,
    pub vxs: Vec<f32>,
    pub vys: Vec<f32>,
    pub healths: Vec<f32>,
    pub radii: Vec<f32>,
    pub kinds: Vec<AgentKind>,
    active: FixedBitSet,
    far: FixedBitSet,
    live: usize,
}

impl SoaMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of agents mirrored this tick.
    pub fn live(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_active(&self, i: usize) -> bool {
        self.active.contains(i)
    }

    /// Whether agent i was classified far this tick. Far-tier integrators
    /// must consult this before writing; near-field agents are never theirs.
    #[inline]
    pub fn is_far(&self, i: usize) -> bool {
        self.far.contains(i)
    }

    pub fn capacity(&self) -> usize {
        self.xs.len()
    }

    /// Grow every parallel array together to the next power of two at or
    /// above `n + margin`. Prior contents are not preserved - the mirror is
    /// rebuilt in full on every activation.
    pub fn ensure_capacity(&mut self, n: usize) {
        let needed = n + CAPACITY_MARGIN;
        if self.capacity() >= needed {
            return;
        }
        let new_cap = needed.next_power_of_two();
        self.xs.resize(new_cap, 0.0);
        self.ys.resize(new_cap, 0.0);
        self.vxs.resize(new_cap, 0.0);
        self.vys.resize(new_cap, 0.0);
        self.healths.resize(new_cap, 0.0);
        self.radii.resize(new_cap, 0.0);
        self.kinds.resize(new_cap, AgentKind::Small);
        self.active.grow(new_cap);
        self.far.grow(new_cap);
    }

    /// Copy every agent's fields into the parallel arrays, index-aligned
    /// with the authoritative list: mirror\[i\] == arena\[i\] for i < live.
    pub fn sync_from(&mut self, arena: &AgentArena) {
        self.ensure_capacity(arena.len());
        self.live = arena.len();
        for (i, rec) in arena.records().iter().enumerate() {
            self.xs[i] = rec.pos.x;
            self.ys[i] = rec.pos.y;
            self.vxs[i] = rec.vel.x;
            self.vys[i] = rec.vel.y;
            self.healths[i] = rec.health;
            self.radii[i] = rec.radius;
            self.kinds[i] = rec.kind;
            self.active.set(i, rec.active);
        }
    }

    /// Classify every mirrored agent against the far boundary.
    ///
    /// mask\[i\] = 1 iff squared distance to the focal point is **>=**
    /// `far_start_sq`; the comparison is deterministic at the boundary.
    /// Agents under the threshold belong to the authoritative near-field
    /// path regardless of which far tier later runs.
    pub fn update_far_mask(&mut self, focal_x: f32, focal_y: f32, far_start_sq: f32) {
        for i in 0..self.live {
            let dx = self.xs[i] - focal_x;
            let dy = self.ys[i] - focal_y;
            self.far.set(i, dx * dx + dy * dy >= far_start_sq);
        }
    }

    /// Number of mirrored agents currently masked far.
    pub fn far_count(&self) -> usize {
        self.far.count_ones(0..self.live)
    }
}
