//! Overlay tile recomputation.
//!
//! When a controlled object moves or changes size, the overlay tiles
//! covering its bounding box are recomputed from scratch: the whole set is
//! cleared and rebuilt, with no incremental diffing. That is an intentional
//! simplicity/performance trade-off, not an oversight: the set is small
//! (a handful of tiles around one object) and a full rebuild is cheaper
//! than tracking deltas.

/// One overlay tile, addressed by grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayTile {
    pub col: u32,
    pub row: u32,
}

/// The current overlay tile set of one render object.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    tiles: Vec<OverlayTile>,
}

impl OverlayState {
    /// Rebuilds the overlay set for an axis-aligned bounding box.
    ///
    /// Covers the grid-aligned span of the box on both axes: a box spanning
    /// exactly 2×2 tiles produces exactly 4 tiles. Nothing from the
    /// previous recompute is carried over.
    pub fn recompute(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        tile_width: u32,
        tile_height: u32,
    ) {
        self.tiles.clear();
        if width <= 0.0 || height <= 0.0 || tile_width == 0 || tile_height == 0 {
            return;
        }

        let tw = tile_width as f64;
        let th = tile_height as f64;
        let first_col = (x / tw).floor().max(0.0) as u32;
        let last_col = ((x + width) / tw).ceil().max(0.0) as u32;
        let first_row = (y / th).floor().max(0.0) as u32;
        let last_row = ((y + height) / th).ceil().max(0.0) as u32;

        for col in first_col..last_col {
            for row in first_row..last_row {
                self.tiles.push(OverlayTile { col, row });
            }
        }
    }

    /// The current overlay tile set.
    pub fn tiles(&self) -> &[OverlayTile] {
        &self.tiles
    }
}
