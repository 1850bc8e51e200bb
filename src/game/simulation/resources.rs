/// Resource definitions for the simulation.

use bevy::prelude::*;
use std::time::Duration;

use super::scheduler::AgentSimulation;

// ============================================================================
// Tick Counter
// ============================================================================

/// Monotonic simulation tick, incremented once per fixed update before
/// anything else runs.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct SimTick(pub u64);

// ============================================================================
// Performance Tracking
// ============================================================================

/// Performance tracking for simulation ticks
#[derive(Resource, Default)]
pub struct SimPerformance {
    pub last_duration: Duration,
}

// ============================================================================
// Simulation Handle
// ============================================================================

/// The active simulation variant behind the shared update/query surface.
/// Built once at startup; baseline or high-capacity depending on config.
#[derive(Resource)]
pub struct SimHandle(pub Box<dyn AgentSimulation>);
