use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Simulation configuration loaded once at startup. These values define the
/// tiering, spatial-index and kinematics parameters of the core; hosts that
/// want different behavior load a different RON file before building the
/// simulation.
#[derive(Resource, Deserialize, Serialize, Clone, Debug)]
pub struct SimConfig {
    // Tick timing
    pub tick_rate: f64,

    // Tiering
    /// Active-agent count above which the SoA mirror and far-field tiers
    /// engage. At or below this the precise near-field path alone runs.
    pub capacity_threshold: usize,
    /// Allow the high-capacity scheduler at all; when false the baseline
    /// simulation is built instead (same update/query surface).
    pub high_capacity_enabled: bool,
    /// Enable the GPU compute-offload far tier (still subject to the
    /// one-time capability probe).
    pub compute_offload_enabled: bool,
    /// Reserved: CPU worker-pool far tier. Parsed and carried so configs
    /// stay forward-compatible; no tier consumes it yet.
    pub worker_parallel_enabled: bool,
    /// Frames between blocking GPU readbacks. 1 = read back every frame.
    pub readback_interval: u32,

    // Far/near classification
    /// far_start = max(far_start_multiplier * critical_radius, far_start_floor)
    pub far_start_multiplier: f32,
    pub far_start_floor: f32,
    /// Radius around the focal point inside which gameplay must stay
    /// high-fidelity; the far boundary is derived from it.
    pub critical_radius: f32,

    // Spatial index
    /// Radius around the focal point inside which agents also register in
    /// the fine grid.
    pub hot_zone_radius: f32,
    pub coarse_cell_size: f32,
    /// Chosen so a typical narrow-phase query touches roughly 9 cells.
    pub fine_cell_size: f32,

    // Near-field kinematics
    pub pursuit_speed: f32,
    pub separation_radius: f32,
    pub separation_strength: f32,
    pub friction: f32,
    pub min_velocity: f32,
    pub arrival_threshold: f32,

    // Far-field kinematics
    /// Far agents chase at this fraction of the focal point's own speed.
    pub far_speed_fraction: f32,
    /// Lower bound so far agents keep closing in on a stationary player.
    pub far_speed_floor: f32,
}

impl SimConfig {
    /// Distance from the focal point at which the far tier takes ownership
    /// of an agent.
    pub fn far_start_distance(&self) -> f32 {
        (self.far_start_multiplier * self.critical_radius).max(self.far_start_floor)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            capacity_threshold: 1000,
            high_capacity_enabled: true,
            compute_offload_enabled: true,
            worker_parallel_enabled: false,
            readback_interval: 3,
            far_start_multiplier: 1.6,
            far_start_floor: 240.0,
            critical_radius: 150.0,
            hot_zone_radius: 180.0,
            coarse_cell_size: 64.0,
            fine_cell_size: 8.0,
            pursuit_speed: 30.0,
            separation_radius: 2.0,
            separation_strength: 18.0,
            friction: 0.92,
            min_velocity: 0.01,
            arrival_threshold: 0.5,
            far_speed_fraction: 0.85,
            far_speed_floor: 12.0,
        }
    }
}

/// Load simulation configuration synchronously at startup.
/// Any failure falls back to defaults; a broken config file must never keep
/// the core from running.
pub fn load_sim_config(path: &str) -> SimConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match ron::from_str::<SimConfig>(&contents) {
            Ok(config) => {
                info!("Loaded sim config from {}", path);
                config
            }
            Err(e) => {
                error!("Failed to parse sim config: {}", e);
                error!("Using default SimConfig");
                SimConfig::default()
            }
        },
        Err(e) => {
            error!("Failed to read {}: {}", path, e);
            error!("Using default SimConfig");
            SimConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_start_distance_respects_floor() {
        let mut config = SimConfig::default();
        config.critical_radius = 10.0;
        config.far_start_multiplier = 1.6;
        config.far_start_floor = 240.0;
        assert_eq!(config.far_start_distance(), 240.0);

        config.critical_radius = 200.0;
        assert_eq!(config.far_start_distance(), 320.0);
    }

    #[test]
    fn config_round_trips_through_ron() {
        let config = SimConfig::default();
        let text = ron::to_string(&config).unwrap();
        let back: SimConfig = ron::from_str(&text).unwrap();
        assert_eq!(back.capacity_threshold, config.capacity_threshold);
        assert_eq!(back.readback_interval, config.readback_interval);
        assert_eq!(back.far_start_distance(), config.far_start_distance());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_sim_config("does/not/exist.ron");
        assert_eq!(config.capacity_threshold, SimConfig::default().capacity_threshold);
    }
}
