//! Distance-transform ("openness") computation over the pathability grid.
//!
//! A multi-source flood fill: unpathable tiles and the virtual map border
//! carry the maximum depth, and every pathable tile receives one less than
//! the largest depth among its already-filled neighbors, clamped with
//! unsigned arithmetic. The openness reported to callers is the maximum
//! depth minus the measured depth, so wide-open ground scores high and
//! choke points score low.

use std::collections::VecDeque;

use crate::grid::BitGrid;

/// Depth assigned to obstruction sources.
const SOURCE_DEPTH: u8 = u8::MAX;

/// Per-tile obstruction-distance field, computed once from the static
/// pathing grid.
#[derive(Debug, Clone)]
pub struct OpennessGrid {
    width: i32,
    height: i32,
    depth: Vec<u8>,
}

impl OpennessGrid {
    /// Flood the whole pathing grid. Panics if any tile is left unvisited;
    /// that would mean a corrupt transform and silently wrong terrain
    /// answers downstream.
    pub fn compute(pathing: &BitGrid) -> Self {
        let width = pathing.width();
        let height = pathing.height();
        let total = (width.max(0) as usize) * (height.max(0) as usize);
        let mut depth = vec![0u8; total];
        let mut filled = vec![false; total];
        let mut visited = 0usize;
        let mut queue = VecDeque::new();

        let tile_index = |x: i32, y: i32| (y * width + x) as usize;

        // Obstruction sources first, then pathable border tiles: the border
        // is adjacent to virtual off-map obstruction.
        for y in 0..height {
            for x in 0..width {
                if !pathing.get(x, y) {
                    let i = tile_index(x, y);
                    depth[i] = SOURCE_DEPTH;
                    filled[i] = true;
                    visited += 1;
                    queue.push_back((x, y));
                }
            }
        }
        for y in 0..height {
            for x in 0..width {
                let on_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                let i = tile_index(x, y);
                if on_border && !filled[i] {
                    depth[i] = SOURCE_DEPTH - 1;
                    filled[i] = true;
                    visited += 1;
                    queue.push_back((x, y));
                }
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let d = depth[tile_index(x, y)];
            for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                if nx < 0 || nx >= width || ny < 0 || ny >= height {
                    continue;
                }
                let ni = tile_index(nx, ny);
                if filled[ni] {
                    continue;
                }
                depth[ni] = d.saturating_sub(1);
                filled[ni] = true;
                visited += 1;
                queue.push_back((nx, ny));
            }
        }

        assert_eq!(
            visited, total,
            "openness flood fill failed to visit every tile"
        );
        tracing::debug!(width, height, "openness transform computed");
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Raw flood-fill depth; obstruction tiles hold the maximum.
    #[inline]
    pub fn depth(&self, x: i32, y: i32) -> u8 {
        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            self.depth[(y * self.width + x) as usize]
        } else {
            SOURCE_DEPTH
        }
    }

    /// Hops to the nearest obstruction: 0 on obstructions, growing towards
    /// open ground.
    #[inline]
    pub fn openness(&self, x: i32, y: i32) -> u8 {
        SOURCE_DEPTH - self.depth(x, y)
    }
}
