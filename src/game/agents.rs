/// Authoritative agent storage.
///
/// Agents live in a plain list owned by the host's agent manager; the core
/// reads every field but writes only position, velocity and the cached grid
/// keys. Identity is ephemeral per session - an [`AgentId`] is just the
/// agent's slot in the list.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity & Records
// ============================================================================

/// Opaque agent identity: the slot index in the authoritative list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(pub u32);

impl AgentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Coarse size/behavior class of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentKind {
    #[default]
    Small,
    Medium,
    Large,
}

/// Authoritative per-agent record.
///
/// `coarse_key`/`fine_key` cache the agent's current spatial-hash cells so
/// grid removal is constant time; they are owned by the grid and must not be
/// touched by anything else.
#[derive(Debug, Clone, Copy)]
pub struct AgentRecord {
    pub pos: Vec2,
    pub vel: Vec2,
    pub health: f32,
    pub radius: f32,
    pub active: bool,
    pub kind: AgentKind,
    pub coarse_key: Option<u64>,
    pub fine_key: Option<u64>,
}

impl AgentRecord {
    pub fn new(pos: Vec2, kind: AgentKind) -> Self {
        let (radius, health) = match kind {
            AgentKind::Small => (0.5, 10.0),
            AgentKind::Medium => (1.0, 40.0),
            AgentKind::Large => (2.5, 160.0),
        };
        Self {
            pos,
            vel: Vec2::ZERO,
            health,
            radius,
            active: true,
            kind,
            coarse_key: None,
            fine_key: None,
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// The mutable list of agents consumed by the core each tick.
///
/// Spawning and destruction belong to the host; destruction just clears the
/// active flag so list positions stay stable within a tick (the SoA mirror
/// relies on index i meaning the same agent on both sides).
#[derive(Resource, Default)]
pub struct AgentArena {
    agents: Vec<AgentRecord>,
}

impl AgentArena {
    pub fn spawn(&mut self, pos: Vec2, kind: AgentKind) -> AgentId {
        let id = AgentId(self.agents.len() as u32);
        self.agents.push(AgentRecord::new(pos, kind));
        id
    }

    pub fn despawn(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(id.index()) {
            agent.active = false;
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of agents still participating in the simulation; this is the
    /// count tier activation is judged against.
    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|a| a.active).count()
    }

    pub fn get(&self, id: AgentId) -> Option<&AgentRecord> {
        self.agents.get(id.index())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentRecord> {
        self.agents.get_mut(id.index())
    }

    pub fn records(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn records_mut(&mut self) -> &mut [AgentRecord] {
        &mut self.agents
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }
}

// ============================================================================
// Focal Point
// ============================================================================

/// The position the near/far classification and hot-zone registration are
/// centered on - typically the player.
///
/// Supplied explicitly by the host every tick; the core never reaches into
/// ambient state to find it.
#[derive(Resource, Debug, Clone, Copy)]
pub struct FocalPoint {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl FocalPoint {
    pub fn speed(&self) -> f32 {
        self.vel.length()
    }
}

impl Default for FocalPoint {
    fn default() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn despawn_clears_active_but_keeps_slot() {
        let mut arena = AgentArena::default();
        let a = arena.spawn(Vec2::new(1.0, 2.0), AgentKind::Small);
        let b = arena.spawn(Vec2::new(3.0, 4.0), AgentKind::Large);

        arena.despawn(a);

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.active_count(), 1);
        assert!(!arena.get(a).unwrap().active);
        assert_eq!(arena.get(b).unwrap().pos, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn spawn_assigns_sequential_ids() {
        let mut arena = AgentArena::default();
        let a = arena.spawn(Vec2::ZERO, AgentKind::Small);
        let b = arena.spawn(Vec2::ZERO, AgentKind::Medium);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }
}
