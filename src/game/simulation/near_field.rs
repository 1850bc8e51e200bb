/// Precise near-field kinematics: the authoritative path for every agent
/// close enough to the focal point to matter for gameplay.
///
/// Per agent: pursuit seek toward the focal point, separation away from
/// exact-distance-filtered grid neighbors, friction, then integration.
/// Neighbor queries hit the spatial index rebuilt at the end of the previous
/// tick, so every agent sees a consistent snapshot.

use bevy::prelude::*;
use smallvec::SmallVec;

use crate::game::agents::{AgentArena, AgentId, FocalPoint};
use crate::game::config::SimConfig;
use crate::game::spatial_hash::HierarchicalGrid;

/// Advance every active near-field agent by `dt`.
///
/// When a far tier is running this tick, `far_start_sq` carries the squared
/// far boundary and agents at or beyond it are skipped entirely - the far
/// tier owns them. The same `>=` comparison is used on both sides, so every
/// agent is advanced by exactly one path per tick.
pub fn update_near_field(
    arena: &mut AgentArena,
    grid: &mut HierarchicalGrid,
    focal: &FocalPoint,
    config: &SimConfig,
    dt: f32,
    far_start_sq: Option<f32>,
) {
    let sep_radius_sq = config.separation_radius * config.separation_radius;

    for i in 0..arena.len() {
        let rec = arena.records()[i];
        if !rec.active {
            continue;
        }
        if let Some(threshold) = far_start_sq {
            if rec.pos.distance_squared(focal.pos) >= threshold {
                continue;
            }
        }

        // Pursuit: full speed toward the focal point until arrival.
        let to_focal = focal.pos - rec.pos;
        let dist = to_focal.length();
        let mut desired = if dist > config.arrival_threshold + rec.radius {
            to_focal / dist * config.pursuit_speed
        } else {
            Vec2::ZERO
        };

        // Separation: grid candidates, exact-filtered by distance. The query
        // slice aliases the grid's frame buffer, so copy ids out before
        // touching the arena.
        let neighbors: SmallVec<[AgentId; 16]> = grid
            .query(rec.pos.x, rec.pos.y, config.separation_radius)
            .iter()
            .copied()
            .collect();
        let mut push = Vec2::ZERO;
        for nid in neighbors {
            if nid.index() == i {
                continue;
            }
            let Some(other) = arena.get(nid) else {
                continue;
            };
            if !other.active {
                continue;
            }
            let delta = rec.pos - other.pos;
            let d_sq = delta.length_squared();
            if d_sq < sep_radius_sq && d_sq > 1e-6 {
                let d = d_sq.sqrt();
                // Linear falloff: strongest when overlapping, zero at the rim.
                push += delta / d * (1.0 - d / config.separation_radius);
            }
        }
        desired += push * config.separation_strength;

        let rec = &mut arena.records_mut()[i];
        rec.vel = (rec.vel + desired * dt) * config.friction;
        if rec.vel.length_squared() < config.min_velocity * config.min_velocity {
            rec.vel = Vec2::ZERO;
        }
        rec.pos += rec.vel * dt;
    }
}

/// Re-register every agent at its post-integration position and reset the
/// query buffer. Runs last in the tick so downstream queries (and next
/// tick's separation pass) see positions and grid membership in agreement.
pub fn rebuild_grid(grid: &mut HierarchicalGrid, arena: &mut AgentArena, focal: &FocalPoint) {
    grid.clear_cache();
    grid.set_focal(focal.pos);
    for i in 0..arena.len() {
        let id = AgentId(i as u32);
        let rec = &mut arena.records_mut()[i];
        if rec.active {
            grid.insert_or_update(id, rec);
        } else {
            grid.remove(id, rec);
        }
    }
}
