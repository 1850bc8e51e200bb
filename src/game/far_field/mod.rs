/// Far-field kinematics tiers.
///
/// Agents beyond the far boundary get a cheap pursuit-and-integrate update
/// instead of the precise near-field path. Both tiers sit behind the
/// [`FarFieldIntegrator`] strategy so the scheduler stays agnostic to which
/// one is active:
///
/// - **upload**: compact far+active agents out of the SoA mirror into dense
///   buffers (with an index list mapping compacted slot -> mirror index) and
///   compute their pursuit velocities
/// - **step**: integrate positions by the elapsed seconds
/// - **readback**: scatter results back into the mirror; the GPU tier
///   amortizes this over several frames

use thiserror::Error;

use crate::game::agents::FocalPoint;
use crate::game::config::SimConfig;
use crate::game::mirror::SoaMirror;

pub mod cpu;
pub mod gpu;

pub use cpu::CpuFarField;
pub use gpu::GpuFarField;

/// Errors emitted by far-field integrators. All of them fail soft: a tick's
/// far update is skipped, the simulation continues.
#[derive(Debug, Error)]
pub enum FarFieldError {
    /// No usable compute device; detected once at construction and final
    /// for the session.
    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),
    /// A dispatch failed this tick.
    #[error("compute dispatch failed: {0}")]
    Dispatch(String),
    /// Reading results back from the device failed this tick.
    #[error("readback failed: {0}")]
    Readback(String),
}

/// Tuning for the far pursuit behavior.
#[derive(Debug, Clone, Copy)]
pub struct FarFieldParams {
    /// Fraction of the focal point's own speed far agents chase at.
    pub speed_fraction: f32,
    /// Minimum chase speed so agents keep closing on a stationary player.
    pub speed_floor: f32,
}

impl FarFieldParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            speed_fraction: config.far_speed_fraction,
            speed_floor: config.far_speed_floor,
        }
    }
}

/// Velocity damping applied once an agent is within its own radius of the
/// focal point, so arrivals settle instead of oscillating through it.
const ARRIVAL_DAMPING: f32 = 0.85;

/// Pursuit velocity for one far agent: unit vector toward the focal point
/// scaled by the capped chase speed, or a gentle deceleration once arrived.
#[inline]
pub(crate) fn pursuit_velocity(
    px: f32,
    py: f32,
    vx: f32,
    vy: f32,
    radius: f32,
    focal_x: f32,
    focal_y: f32,
    focal_speed: f32,
    params: &FarFieldParams,
) -> (f32, f32) {
    let dx = focal_x - px;
    let dy = focal_y - py;
    let dist_sq = dx * dx + dy * dy;
    if dist_sq <= radius * radius {
        return (vx * ARRIVAL_DAMPING, vy * ARRIVAL_DAMPING);
    }
    let dist = dist_sq.sqrt();
    let speed = (focal_speed * params.speed_fraction).max(params.speed_floor);
    (dx / dist * speed, dy / dist * speed)
}

/// Interchangeable far-tier implementations (CPU and compute-offload).
pub trait FarFieldIntegrator: Send + Sync {
    /// Grow internal buffers to hold up to `n` compacted agents.
    fn ensure_capacity(&mut self, n: usize);

    /// Compact far+active agents into dense buffers and compute their
    /// pursuit velocities. Near-field agents are filtered out here and can
    /// never be written by the later phases.
    fn upload(&mut self, mirror: &SoaMirror, focal: &FocalPoint, params: &FarFieldParams);

    /// Advance compacted positions by `dt`.
    fn step(&mut self, dt: f32, frame: u64) -> Result<(), FarFieldError>;

    /// Scatter compacted results back into the mirror through the index
    /// list. Returns whether a scatter actually happened this frame (the
    /// GPU tier skips frames between amortized readbacks).
    fn readback(&mut self, mirror: &mut SoaMirror, frame: u64) -> Result<bool, FarFieldError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
