//! Spatial hash grid for bounding-box candidate search
//!
//! Divides the world into square cells and stores a copyable handle in every
//! cell an item touches. Queries return each candidate at most once; exact
//! geometry tests are left to the caller.

use hashbrown::HashMap;
use smallvec::SmallVec;

/// Initial capacity for the cell map (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for item vectors within cells
const CELL_INITIAL_CAPACITY: usize = 4;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Candidate list returned by `search`
pub type Candidates<T> = SmallVec<[T; 16]>;

#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    /// Cell size in world units
    cell_size: f64,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f64,
    cells: HashMap<CellKey, Vec<T>>,
}

impl<T: Copy + Ord> SpatialGrid<T> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Clear all items, keeping cell allocations for reuse
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    #[inline]
    fn position_to_cell(&self, x: f64, y: f64) -> CellKey {
        (
            (x * self.inv_cell_size).floor() as i32,
            (y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Insert an item occupying a single point
    #[inline]
    pub fn insert_point(&mut self, item: T, x: f64, y: f64) {
        let key = self.position_to_cell(x, y);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(item);
    }

    /// Insert an item into every cell overlapped by the box (x1,y1)-(x2,y2)
    pub fn insert_span(&mut self, item: T, x1: f64, y1: f64, x2: f64, y2: f64) {
        let (min_cx, min_cy) = self.position_to_cell(x1.min(x2), y1.min(y2));
        let (max_cx, max_cy) = self.position_to_cell(x1.max(x2), y1.max(y2));
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                self.cells
                    .entry((cx, cy))
                    .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
                    .push(item);
            }
        }
    }

    /// Items whose cells overlap the box (x1,y1)-(x2,y2) grown by `margin`.
    /// The corners may be given in any order.
    pub fn search(&self, x1: f64, y1: f64, x2: f64, y2: f64, margin: f64) -> Candidates<T> {
        let (min_cx, min_cy) = self.position_to_cell(x1.min(x2) - margin, y1.min(y2) - margin);
        let (max_cx, max_cy) = self.position_to_cell(x1.max(x2) + margin, y1.max(y2) + margin);

        let mut found: Candidates<T> = SmallVec::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    found.extend(cell.iter().copied());
                }
            }
        }
        // Spans can sit in several of the visited cells
        found.sort_unstable();
        found.dedup();
        found
    }

    pub fn stats(&self) -> SpatialGridStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let total_entries: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialGridStats {
            non_empty_cells,
            total_entries,
            max_per_cell,
        }
    }
}

/// Statistics about the spatial grid
#[derive(Debug, Clone)]
pub struct SpatialGridStats {
    pub non_empty_cells: usize,
    /// Handles stored, counting an item once per cell it touches
    pub total_entries: usize,
    pub max_per_cell: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_search() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_point(1u32, 0.05, 0.05);
        grid.insert_point(2u32, 0.95, 0.95);

        let near = grid.search(0.0, 0.0, 0.1, 0.1, 0.0);
        assert!(near.contains(&1));
        assert!(!near.contains(&2));
    }

    #[test]
    fn test_margin_widens_search() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_point(7u32, 0.25, 0.05);

        assert!(grid.search(0.02, 0.02, 0.04, 0.04, 0.0).is_empty());
        assert_eq!(grid.search(0.02, 0.02, 0.04, 0.04, 0.2).as_slice(), &[7]);
    }

    #[test]
    fn test_span_found_once() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_span(3u32, 0.05, 0.05, 0.45, 0.35);

        let stats = grid.stats();
        assert_eq!(stats.total_entries, 5 * 4);

        let hits = grid.search(0.0, 0.0, 1.0, 1.0, 0.0);
        assert_eq!(hits.as_slice(), &[3]);
    }

    #[test]
    fn test_reversed_corners() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_point(9u32, 0.5, 0.5);
        assert_eq!(grid.search(0.6, 0.6, 0.4, 0.4, 0.0).as_slice(), &[9]);
    }

    #[test]
    fn test_clear() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_point(1u32, 0.5, 0.5);
        grid.clear();
        assert!(grid.search(0.0, 0.0, 1.0, 1.0, 0.0).is_empty());
        assert_eq!(grid.stats().total_entries, 0);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(0.1);
        grid.insert_point(4u32, -0.05, -0.05);
        assert_eq!(grid.search(-0.1, -0.1, 0.0, 0.0, 0.0).as_slice(), &[4]);
    }
}
