/// Tier-selecting simulation scheduler.
///
/// Two interchangeable variants sit behind [`AgentSimulation`]: the baseline
/// (precise path only) and the high-capacity scheduler, which engages the SoA
/// mirror and a far-field tier once the active population crosses the
/// configured threshold. The host picks a variant once at startup via
/// [`build_simulation`]; everything downstream sees the same surface.

use bevy::prelude::*;

use crate::game::agents::{AgentArena, AgentId, FocalPoint};
use crate::game::config::SimConfig;
use crate::game::far_field::{
    CpuFarField, FarFieldError, FarFieldIntegrator, FarFieldParams, GpuFarField,
};
use crate::game::mirror::SoaMirror;
use crate::game::simulation::near_field::{rebuild_grid, update_near_field};
use crate::game::spatial_hash::HierarchicalGrid;

// ============================================================================
// Shared Surface
// ============================================================================

/// Update/query surface shared by both simulation variants.
pub trait AgentSimulation: Send + Sync {
    /// Advance the whole simulation by `dt` seconds.
    fn update(&mut self, arena: &mut AgentArena, focal: &FocalPoint, dt: f32);

    /// Spatial candidate query for downstream collision/targeting. Results
    /// come from the tick's rebuilt grid and carry no exact-distance filter.
    fn query(&mut self, x: f32, y: f32, radius: f32) -> &[AgentId];

    /// Invalidate outstanding query slices and reclaim the buffer.
    fn clear_query_cache(&mut self);

    /// Variant name for logs.
    fn name(&self) -> &'static str;
}

/// Which update path owns far agents this tick. Recomputed from scratch
/// every tick; no variant of it carries history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierDecision {
    /// Population at or below the threshold: the precise path covers everyone.
    #[default]
    Idle,
    /// Far tier on the CPU.
    ActiveCpu,
    /// Far tier offloaded to the compute device.
    ActiveGpu,
}

/// Build the configured variant. The high-capacity scheduler probes for a
/// compute device here, once; the result is final for the session.
pub fn build_simulation(config: &SimConfig) -> Box<dyn AgentSimulation> {
    if config.high_capacity_enabled {
        Box::new(HighCapacitySimulation::new(config.clone()))
    } else {
        Box::new(BaselineSimulation::new(config.clone()))
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// Precise near-field path plus grid maintenance, nothing else. The variant
/// for hosts that cap their population well under the tiering threshold.
pub struct BaselineSimulation {
    config: SimConfig,
    grid: HierarchicalGrid,
}

impl BaselineSimulation {
    pub fn new(config: SimConfig) -> Self {
        let grid = HierarchicalGrid::new(
            config.coarse_cell_size,
            config.fine_cell_size,
            config.hot_zone_radius,
        );
        Self { config, grid }
    }
}

impl AgentSimulation for BaselineSimulation {
    fn update(&mut self, arena: &mut AgentArena, focal: &FocalPoint, dt: f32) {
        update_near_field(arena, &mut self.grid, focal, &self.config, dt, None);
        rebuild_grid(&mut self.grid, arena, focal);
    }

    fn query(&mut self, x: f32, y: f32, radius: f32) -> &[AgentId] {
        self.grid.query(x, y, radius)
    }

    fn clear_query_cache(&mut self) {
        self.grid.clear_cache();
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}

// ============================================================================
// High Capacity
// ============================================================================

/// Tier-selecting scheduler for populations that cross the capacity
/// threshold.
///
/// Tick order is fixed: tier selection, precise near-field update, mirror
/// sync + far classification, far-tier upload/step/readback, write-back,
/// grid rebuild. Below the threshold every phase past the near-field update
/// is skipped and the scheduler behaves exactly like the baseline.
pub struct HighCapacitySimulation {
    config: SimConfig,
    grid: HierarchicalGrid,
    mirror: SoaMirror,
    fallback: Box<dyn FarFieldIntegrator>,
    /// Present iff offload is enabled and the one-time probe succeeded.
    offload: Option<Box<dyn FarFieldIntegrator>>,
    params: FarFieldParams,
    far_start_sq: f32,
    frame: u64,
    last_tier: TierDecision,
}

impl HighCapacitySimulation {
    pub fn new(config: SimConfig) -> Self {
        let offload: Option<Box<dyn FarFieldIntegrator>> = if config.compute_offload_enabled {
            match GpuFarField::new(config.readback_interval as u64) {
                Ok(gpu) => {
                    info!("far-field compute offload available");
                    Some(Box::new(gpu))
                }
                Err(e) => {
                    warn!("far-field compute offload unavailable, using CPU tier: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::with_far_tiers(config, Box::new(CpuFarField::new()), offload)
    }

    /// Assemble a scheduler around explicit far-tier strategies. The normal
    /// path is [`HighCapacitySimulation::new`]; this exists for hosts that
    /// bring their own integrator (and for exercising failure paths).
    pub fn with_far_tiers(
        config: SimConfig,
        fallback: Box<dyn FarFieldIntegrator>,
        offload: Option<Box<dyn FarFieldIntegrator>>,
    ) -> Self {
        let grid = HierarchicalGrid::new(
            config.coarse_cell_size,
            config.fine_cell_size,
            config.hot_zone_radius,
        );
        let params = FarFieldParams::from_config(&config);
        let far_start = config.far_start_distance();
        Self {
            config,
            grid,
            mirror: SoaMirror::new(),
            fallback,
            offload,
            params,
            far_start_sq: far_start * far_start,
            frame: 0,
            last_tier: TierDecision::Idle,
        }
    }

    /// Whether the compute-offload tier survived the capability probe.
    pub fn offload_available(&self) -> bool {
        self.offload.is_some()
    }

    /// The path chosen on the most recent tick.
    pub fn last_tier(&self) -> TierDecision {
        self.last_tier
    }

    /// Stateless tier selection from the current active count.
    pub fn select_tier(&self, active_count: usize) -> TierDecision {
        if active_count <= self.config.capacity_threshold {
            TierDecision::Idle
        } else if self.offload.is_some() {
            TierDecision::ActiveGpu
        } else {
            TierDecision::ActiveCpu
        }
    }

    /// Run upload/step/readback on the selected integrator and scatter back
    /// into the arena when a readback landed. A per-tick failure skips this
    /// tick's far update and nothing else.
    fn run_far_tier(
        &mut self,
        arena: &mut AgentArena,
        focal: &FocalPoint,
        dt: f32,
        decision: TierDecision,
    ) {
        let integrator: &mut dyn FarFieldIntegrator = match (decision, self.offload.as_mut()) {
            (TierDecision::ActiveGpu, Some(offload)) => offload.as_mut(),
            _ => self.fallback.as_mut(),
        };

        integrator.upload(&self.mirror, focal, &self.params);
        let result: Result<bool, FarFieldError> = integrator
            .step(dt, self.frame)
            .and_then(|_| integrator.readback(&mut self.mirror, self.frame));

        match result {
            Ok(true) => {
                // Scatter far agents' mirror state back into the arena.
                for i in 0..self.mirror.live() {
                    if self.mirror.is_far(i) && self.mirror.is_active(i) {
                        let rec = &mut arena.records_mut()[i];
                        rec.pos = Vec2::new(self.mirror.xs[i], self.mirror.ys[i]);
                        rec.vel = Vec2::new(self.mirror.vxs[i], self.mirror.vys[i]);
                    }
                }
            }
            Ok(false) => {} // amortized readback skipped this frame
            Err(e) => {
                warn!("far-field update skipped this tick: {}", e);
            }
        }
    }
}

impl AgentSimulation for HighCapacitySimulation {
    fn update(&mut self, arena: &mut AgentArena, focal: &FocalPoint, dt: f32) {
        self.frame += 1;

        let decision = self.select_tier(arena.active_count());
        self.last_tier = decision;

        let skip_far = (decision != TierDecision::Idle).then_some(self.far_start_sq);
        update_near_field(arena, &mut self.grid, focal, &self.config, dt, skip_far);

        if decision != TierDecision::Idle {
            self.mirror.sync_from(arena);
            self.mirror
                .update_far_mask(focal.pos.x, focal.pos.y, self.far_start_sq);
            self.run_far_tier(arena, focal, dt, decision);
        }

        rebuild_grid(&mut self.grid, arena, focal);
    }

    fn query(&mut self, x: f32, y: f32, radius: f32) -> &[AgentId] {
        self.grid.query(x, y, radius)
    }

    fn clear_query_cache(&mut self) {
        self.grid.clear_cache();
    }

    fn name(&self) -> &'static str {
        "high-capacity"
    }
}
