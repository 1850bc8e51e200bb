use rustc_hash::FxHashMap;

use super::pack_cell_key;

/// Single-resolution spatial hash grid.
///
/// Divides the plane into `cell_size` squares and maps each occupied cell to
/// the items whose position falls in it. Cells are keyed by a packed 64-bit
/// key, so the world is unbounded - there is no map width/height and no key
/// aliasing between distant cells.
///
/// # Performance
///
/// - **Insert:** O(1) amortized
/// - **Query:** O(k) where k = items in the touched cells (typically << N)
/// - **Clear:** proportional to occupied cells; allocations are retained
///
/// # Implementation Notes
///
/// - Queries enumerate every cell overlapping the axis-aligned box
///   `[pos - radius, pos + radius]` and concatenate contents. There is **no
///   exact circular filter**; callers post-filter by distance when precise
///   radius membership matters.
/// - Cells use `Vec` instead of `HashSet` for better cache locality.
#[derive(Debug, Clone)]
pub struct UniformGrid<T> {
    cell_size: f32,
    inv_cell_size: f32,
    cells: FxHashMap<u64, Vec<T>>,
}

impl<T: Copy + PartialEq> UniformGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0, "cell_size must be positive");
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: FxHashMap::default(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Packed key of the cell containing (x, y).
    #[inline]
    pub fn key_for(&self, x: f32, y: f32) -> u64 {
        let cx = (x * self.inv_cell_size).floor() as i32;
        let cy = (y * self.inv_cell_size).floor() as i32;
        pack_cell_key(cx, cy)
    }

    /// Place an item in the cell matching its position and return that
    /// cell's key. Items are never re-bucketed implicitly; moving an item
    /// means removing it with its cached key and inserting again.
    pub fn insert(&mut self, item: T, x: f32, y: f32) -> u64 {
        let key = self.key_for(x, y);
        self.cells.entry(key).or_default().push(item);
        key
    }

    /// Remove an item from the cell identified by its cached key.
    /// Empty cells are dropped from the map so sparse regions read as
    /// untouched by queries.
    pub fn remove(&mut self, item: T, key: u64) {
        if let Some(cell) = self.cells.get_mut(&key) {
            if let Some(idx) = cell.iter().position(|&e| e == item) {
                cell.swap_remove(idx);
            }
            if cell.is_empty() {
                self.cells.remove(&key);
            }
        }
    }

    /// Append the contents of every cell overlapping the query box to `out`
    /// and return how many non-empty cells were touched.
    pub fn query_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<T>) -> usize {
        let min_cx = ((x - radius) * self.inv_cell_size).floor() as i32;
        let max_cx = ((x + radius) * self.inv_cell_size).floor() as i32;
        let min_cy = ((y - radius) * self.inv_cell_size).floor() as i32;
        let max_cy = ((y + radius) * self.inv_cell_size).floor() as i32;

        let mut touched = 0;
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(cell) = self.cells.get(&pack_cell_key(cx, cy)) {
                    if !cell.is_empty() {
                        out.extend_from_slice(cell);
                        touched += 1;
                    }
                }
            }
        }
        touched
    }

    /// Empty all cells. Cheap enough to call once per frame when the grid is
    /// used as a rebuild-every-tick broadphase.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Count the total number of item entries across all cells.
    /// Useful for debugging and diagnostics.
    pub fn total_entries(&self) -> usize {
        self.cells.values().map(|cell| cell.len()).sum()
    }

    /// Count the number of non-empty cells.
    /// Useful for debugging and diagnostics.
    pub fn non_empty_cells(&self) -> usize {
        self.cells.values().filter(|cell| !cell.is_empty()).count()
    }
}
