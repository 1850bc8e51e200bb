use super::*;
use crate::game::agents::AgentKind;

fn record_at(x: f32, y: f32) -> AgentRecord {
    AgentRecord::new(Vec2::new(x, y), AgentKind::Small)
}

// ============================================================================
// Cell Keys
// ============================================================================

#[test]
fn cell_key_round_trips_including_negatives() {
    for &(cx, cy) in &[(0, 0), (1, -1), (-7, 13), (i32::MAX, i32::MIN), (-100_000, 250_000)] {
        assert_eq!(unpack_cell_key(pack_cell_key(cx, cy)), (cx, cy));
    }
}

#[test]
fn distant_cells_never_alias() {
    // The packed key keeps full 32 bits per axis; cells that collide under
    // narrow-width packing schemes must stay distinct here.
    let a = pack_cell_key(1, 0);
    let b = pack_cell_key(0, 1);
    let c = pack_cell_key(65536, 0);
    let d = pack_cell_key(0, 65536);
    let keys = [a, b, c, d];
    for i in 0..keys.len() {
        for j in (i + 1)..keys.len() {
            assert_ne!(keys[i], keys[j]);
        }
    }
}

// ============================================================================
// UniformGrid
// ============================================================================

#[test]
fn uniform_query_returns_box_contents_without_circular_filter() {
    let mut grid = UniformGrid::new(10.0);
    grid.insert(1u32, 0.0, 0.0);
    grid.insert(2u32, 9.0, 9.0); // same cell, outside the circle of radius 5

    let mut out = Vec::new();
    grid.query_into(0.0, 0.0, 5.0, &mut out);

    // Both come back: the grid enumerates cells, callers do exact filtering.
    assert!(out.contains(&1));
    assert!(out.contains(&2));
}

#[test]
fn uniform_remove_by_cached_key() {
    let mut grid = UniformGrid::new(10.0);
    let key = grid.insert(7u32, 3.0, 3.0);
    assert_eq!(grid.total_entries(), 1);

    grid.remove(7u32, key);
    assert_eq!(grid.total_entries(), 0);
    assert_eq!(grid.non_empty_cells(), 0);

    let mut out = Vec::new();
    let touched = grid.query_into(3.0, 3.0, 1.0, &mut out);
    assert_eq!(touched, 0);
    assert!(out.is_empty());
}

#[test]
fn uniform_clear_empties_all_cells() {
    let mut grid = UniformGrid::new(4.0);
    for i in 0..20u32 {
        grid.insert(i, i as f32 * 3.0, -(i as f32));
    }
    assert!(grid.total_entries() == 20);

    grid.clear();
    assert_eq!(grid.total_entries(), 0);

    let mut out = Vec::new();
    grid.query_into(10.0, -5.0, 50.0, &mut out);
    assert!(out.is_empty());
}

#[test]
fn uniform_query_spans_negative_coordinates() {
    let mut grid = UniformGrid::new(10.0);
    grid.insert(1u32, -15.0, -15.0);
    grid.insert(2u32, 15.0, 15.0);

    let mut out = Vec::new();
    grid.query_into(0.0, 0.0, 20.0, &mut out);
    assert_eq!(out.len(), 2);
}

// ============================================================================
// HierarchicalGrid
// ============================================================================

fn test_grid() -> HierarchicalGrid {
    // coarse 64, fine 8, hot zone 180 - the default shape
    HierarchicalGrid::new(64.0, 8.0, 180.0)
}

#[test]
fn insert_registers_coarse_always_fine_only_in_hot_zone() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    let mut near = record_at(50.0, 0.0);
    let mut far = record_at(500.0, 0.0);
    grid.insert(AgentId(0), &mut near);
    grid.insert(AgentId(1), &mut far);

    assert!(near.coarse_key.is_some());
    assert!(near.fine_key.is_some());
    assert!(far.coarse_key.is_some());
    assert!(far.fine_key.is_none());
    assert_eq!(grid.coarse_entries(), 2);
    assert_eq!(grid.fine_entries(), 1);
}

#[test]
fn insert_or_update_is_idempotent() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    let mut agent = record_at(30.0, 30.0);
    grid.insert_or_update(AgentId(3), &mut agent);
    let coarse_key = agent.coarse_key;
    let fine_key = agent.fine_key;

    // Unchanged position: membership must be identical to a single insert.
    grid.insert_or_update(AgentId(3), &mut agent);
    assert_eq!(agent.coarse_key, coarse_key);
    assert_eq!(agent.fine_key, fine_key);
    assert_eq!(grid.coarse_entries(), 1);
    assert_eq!(grid.fine_entries(), 1);
}

#[test]
fn remove_excludes_agent_from_former_cell() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    let mut agent = record_at(20.0, 20.0);
    grid.insert(AgentId(9), &mut agent);
    grid.remove(AgentId(9), &mut agent);

    assert!(agent.coarse_key.is_none());
    assert!(agent.fine_key.is_none());
    let hits = grid.query(20.0, 20.0, 100.0);
    assert!(!hits.contains(&AgentId(9)));
}

#[test]
fn wide_query_has_no_false_negatives_at_coarse_tier() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);
    let diagonal = 64.0 * std::f32::consts::SQRT_2;

    let mut agents: Vec<AgentRecord> = (0..50)
        .map(|i| record_at((i as f32 * 37.0) - 600.0, (i as f32 * 53.0) - 900.0))
        .collect();
    for (i, agent) in agents.iter_mut().enumerate() {
        grid.insert(AgentId(i as u32), agent);
    }

    for (i, agent) in agents.iter().enumerate() {
        grid.clear_cache();
        let hits = grid.query(agent.pos.x, agent.pos.y, diagonal);
        assert!(
            hits.contains(&AgentId(i as u32)),
            "agent {} missing from its own neighborhood query",
            i
        );
    }
}

#[test]
fn narrow_query_falls_back_to_coarse_in_sparse_regions() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    // Far outside the hot zone: coarse-registered only.
    let mut agent = record_at(1000.0, 1000.0);
    grid.insert(AgentId(5), &mut agent);
    assert!(agent.fine_key.is_none());

    // Narrow query (radius below the fine/coarse switch): the fine grid is
    // unpopulated there, so the coarse fallback must still find the agent.
    let hits = grid.query(1000.0, 1000.0, 4.0);
    assert!(hits.contains(&AgentId(5)));
}

#[test]
fn narrow_query_prefers_fine_grid_in_hot_zone() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    // Two agents in the same coarse cell; one inside the narrow fine query
    // area, one well outside it but still hot-zone registered.
    let mut close = record_at(10.0, 10.0);
    let mut same_coarse_cell = record_at(60.0, 60.0);
    grid.insert(AgentId(0), &mut close);
    grid.insert(AgentId(1), &mut same_coarse_cell);

    let hits = grid.query(10.0, 10.0, 4.0);
    assert!(hits.contains(&AgentId(0)));
    // A coarse answer would have dragged in the whole 64-unit cell.
    assert!(!hits.contains(&AgentId(1)));
}

#[test]
fn adjacent_coarse_cells_scenario() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    // Five agents in coarse cell [0, 64), five in [64, 128).
    let mut agents = Vec::new();
    for i in 0..5 {
        agents.push(record_at(10.0 + 2.0 * i as f32, 32.0));
    }
    for i in 0..5 {
        agents.push(record_at(70.0 + 2.0 * i as f32, 32.0));
    }
    for (i, agent) in agents.iter_mut().enumerate() {
        grid.insert(AgentId(i as u32), agent);
    }

    // Spanning both cells: all ten.
    let hits = grid.query(64.0, 32.0, 40.0);
    assert_eq!(hits.len(), 10);

    // Confined to the first cell's bounds, exact-filtered by the caller.
    grid.clear_cache();
    let radius = 15.0;
    let center = Vec2::new(16.0, 32.0);
    let hits: Vec<AgentId> = grid
        .query(center.x, center.y, radius)
        .iter()
        .copied()
        .filter(|id| agents[id.index()].pos.distance_squared(center) <= radius * radius)
        .collect();
    assert_eq!(hits.len(), 5);
    assert!(hits.iter().all(|id| id.index() < 5));
}

#[test]
fn query_buffer_accumulates_until_clear_cache() {
    let mut grid = test_grid();
    grid.set_focal(Vec2::ZERO);

    let mut a = record_at(0.0, 0.0);
    let mut b = record_at(500.0, 0.0);
    grid.insert(AgentId(0), &mut a);
    grid.insert(AgentId(1), &mut b);

    let first = grid.query(0.0, 0.0, 4.0).len();
    let second = grid.query(500.0, 0.0, 4.0).len();
    assert_eq!(first, 1);
    assert_eq!(second, 1);

    grid.clear_cache();
    let after_clear = grid.query(0.0, 0.0, 4.0);
    assert_eq!(after_clear.len(), 1);
}
