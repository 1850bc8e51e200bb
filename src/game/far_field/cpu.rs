use crate::game::agents::FocalPoint;
use crate::game::mirror::SoaMirror;

use super::{pursuit_velocity, FarFieldError, FarFieldIntegrator, FarFieldParams};

/// CPU far tier: the baseline strategy and the fallback when compute
/// offload is unavailable or disabled.
///
/// Works on the same compacted layout the GPU tier uploads, so the two
/// produce identical trajectories for the same inputs (modulo readback
/// cadence). Results scatter back into the mirror every tick.
#[derive(Debug, Default)]
pub struct CpuFarField {
    indices: Vec<u32>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    vxs: Vec<f32>,
    vys: Vec<f32>,
}

impl CpuFarField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compacted agents currently held.
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

impl FarFieldIntegrator for CpuFarField {
    fn ensure_capacity(&mut self, n: usize) {
        // reserve is relative to len and a no-op when capacity suffices.
        self.indices.reserve(n);
        self.xs.reserve(n);
        self.ys.reserve(n);
        self.vxs.reserve(n);
        self.vys.reserve(n);
    }

    fn upload(&mut self, mirror: &SoaMirror, focal: &FocalPoint, params: &FarFieldParams) {
        self.indices.clear();
        self.xs.clear();
        self.ys.clear();
        self.vxs.clear();
        self.vys.clear();

        let focal_speed = focal.speed();
        for i in 0..mirror.live() {
            if !mirror.is_active(i) || !mirror.is_far(i) {
                continue;
            }
            let (vx, vy) = pursuit_velocity(
                mirror.xs[i],
                mirror.ys[i],
                mirror.vxs[i],
                mirror.vys[i],
                mirror.radii[i],
                focal.pos.x,
                focal.pos.y,
                focal_speed,
                params,
            );
            self.indices.push(i as u32);
            self.xs.push(mirror.xs[i]);
            self.ys.push(mirror.ys[i]);
            self.vxs.push(vx);
            self.vys.push(vy);
        }
    }

    fn step(&mut self, dt: f32, _frame: u64) -> Result<(), FarFieldError> {
        for i in 0..self.indices.len() {
            self.xs[i] += self.vxs[i] * dt;
            self.ys[i] += self.vys[i] * dt;
        }
        Ok(())
    }

    fn readback(&mut self, mirror: &mut SoaMirror, _frame: u64) -> Result<bool, FarFieldError> {
        for (slot, &mi) in self.indices.iter().enumerate() {
            let mi = mi as usize;
            mirror.xs[mi] = self.xs[slot];
            mirror.ys[mi] = self.ys[slot];
            mirror.vxs[mi] = self.vxs[slot];
            mirror.vys[mi] = self.vys[slot];
        }
        Ok(!self.indices.is_empty())
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::agents::{AgentArena, AgentKind, FocalPoint};
    use bevy::prelude::Vec2;

    fn params() -> FarFieldParams {
        FarFieldParams {
            speed_fraction: 0.85,
            speed_floor: 12.0,
        }
    }

    fn mirror_with_far_mask(positions: &[Vec2], far_start: f32) -> SoaMirror {
        let mut arena = AgentArena::default();
        for &pos in positions {
            arena.spawn(pos, AgentKind::Small);
        }
        let mut mirror = SoaMirror::new();
        mirror.sync_from(&arena);
        mirror.update_far_mask(0.0, 0.0, far_start * far_start);
        mirror
    }

    #[test]
    fn upload_compacts_only_far_active_agents() {
        let mirror = mirror_with_far_mask(
            &[
                Vec2::new(1000.0, 0.0),
                Vec2::new(10.0, 0.0), // near: must be skipped
                Vec2::new(0.0, -900.0),
            ],
            240.0,
        );
        let focal = FocalPoint::default();

        let mut tier = CpuFarField::new();
        tier.upload(&mirror, &focal, &params());

        assert_eq!(tier.count(), 2);
        assert_eq!(tier.indices, vec![0, 2]);
    }

    #[test]
    fn far_agents_converge_on_focal_point() {
        let mut mirror = mirror_with_far_mask(&[Vec2::new(1000.0, 0.0)], 240.0);
        let focal = FocalPoint::default();
        let mut tier = CpuFarField::new();

        let before = mirror.xs[0];
        tier.upload(&mirror, &focal, &params());
        tier.step(1.0 / 30.0, 0).unwrap();
        tier.readback(&mut mirror, 0).unwrap();

        assert!(mirror.xs[0] < before, "should have moved toward the origin");
        assert!(mirror.vxs[0] < 0.0);
        assert_eq!(mirror.ys[0], 0.0);
    }

    #[test]
    fn near_agents_are_never_written() {
        let mut mirror = mirror_with_far_mask(
            &[Vec2::new(10.0, 5.0), Vec2::new(2000.0, 0.0)],
            240.0,
        );
        let focal = FocalPoint::default();
        let mut tier = CpuFarField::new();

        tier.upload(&mirror, &focal, &params());
        tier.step(1.0, 0).unwrap();
        tier.readback(&mut mirror, 0).unwrap();

        assert_eq!(mirror.xs[0], 10.0);
        assert_eq!(mirror.ys[0], 5.0);
        assert_eq!(mirror.vxs[0], 0.0);
        assert_ne!(mirror.xs[1], 2000.0);
    }

    #[test]
    fn ensure_capacity_guarantees_room_over_warm_buffers() {
        let mut tier = CpuFarField::new();
        // Warm buffers from a previous, smaller activation.
        tier.indices.reserve(512);
        tier.xs.reserve(512);

        tier.ensure_capacity(1000);

        assert!(tier.indices.capacity() >= 1000);
        assert!(tier.xs.capacity() >= 1000);
        assert!(tier.ys.capacity() >= 1000);
    }

    #[test]
    fn empty_far_set_is_a_no_op() {
        let mut mirror = mirror_with_far_mask(&[Vec2::new(1.0, 1.0)], 240.0);
        let focal = FocalPoint::default();
        let mut tier = CpuFarField::new();

        tier.upload(&mirror, &focal, &params());
        tier.step(1.0, 0).unwrap();
        let scattered = tier.readback(&mut mirror, 0).unwrap();

        assert!(!scattered);
        assert_eq!(tier.count(), 0);
    }
}
