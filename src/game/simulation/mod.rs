/// Simulation layer - fixed-timestep agent updates.
///
/// This module is organized into:
/// - **resources**: Simulation resources (tick counter, perf, sim handle)
/// - **near_field**: Precise pursuit/separation/integration path
/// - **scheduler**: Tier-selecting scheduler behind the shared surface

use bevy::prelude::*;

use crate::game::agents::{AgentArena, FocalPoint};
use crate::game::config::SimConfig;
use crate::profile_log;

pub mod near_field;
pub mod resources;
pub mod scheduler;

pub use resources::*;
pub use scheduler::{build_simulation, AgentSimulation, TierDecision};

/// Main simulation plugin
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Configure FixedUpdate timestep from config when the host inserted
        // one before adding the plugin.
        let tick_rate = app
            .world()
            .get_resource::<SimConfig>()
            .map(|c| c.tick_rate)
            .unwrap_or_else(|| SimConfig::default().tick_rate);
        app.insert_resource(Time::<Fixed>::from_hz(tick_rate));

        app.init_resource::<SimConfig>();
        app.init_resource::<AgentArena>();
        app.init_resource::<FocalPoint>();
        app.init_resource::<SimTick>();
        app.init_resource::<SimPerformance>();

        app.add_systems(Startup, init_simulation);

        app.add_systems(
            FixedUpdate,
            (increment_sim_tick, run_simulation, log_sim_status).chain(),
        );
    }
}

/// Build the configured simulation variant. The compute capability probe
/// happens in here, exactly once per session.
pub fn init_simulation(mut commands: Commands, config: Res<SimConfig>) {
    let sim = build_simulation(&config);
    info!(
        "simulation variant: {} (threshold {}, far boundary {:.0})",
        sim.name(),
        config.capacity_threshold,
        config.far_start_distance()
    );
    commands.insert_resource(SimHandle(sim));
}

pub fn increment_sim_tick(mut tick: ResMut<SimTick>) {
    tick.0 += 1;
}

/// Advance the simulation by one fixed step.
pub fn run_simulation(
    mut handle: ResMut<SimHandle>,
    mut arena: ResMut<AgentArena>,
    focal: Res<FocalPoint>,
    time: Res<Time>,
    mut perf: ResMut<SimPerformance>,
) {
    let start = std::time::Instant::now();
    handle.0.update(&mut arena, &focal, time.delta_secs());
    perf.last_duration = start.elapsed();
}

pub fn log_sim_status(
    #[allow(unused_variables)] tick: Res<SimTick>,
    #[allow(unused_variables)] arena: Res<AgentArena>,
    #[allow(unused_variables)] perf: Res<SimPerformance>,
) {
    profile_log!(
        tick,
        "[SIM STATUS] Tick: {} | Agents: {} active / {} total | Last sim duration: {:?}",
        tick.0,
        arena.active_count(),
        arena.len(),
        perf.last_duration
    );
}
