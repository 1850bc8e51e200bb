use bevy::prelude::*;

pub mod agents;
pub mod config;
pub mod far_field;
pub mod mirror;
pub mod simulation;
pub mod spatial_hash;

use simulation::SimulationPlugin;

/// Top-level plugin for the agent-simulation core.
///
/// Embeds the simulation scheduler into a host app. Rendering, audio, UI and
/// combat rules live in the host; they consume the core through the
/// [`simulation::AgentSimulation`] update/query surface.
pub struct StampedePlugin;

impl Plugin for StampedePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(SimulationPlugin);
    }
}
