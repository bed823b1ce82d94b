//! Terrain-height sampling over the once-per-game height raster.

use glam::Vec2;

/// Sentinel height for samples falling outside the map.
pub const MIN_HEIGHT: f32 = -16.0;

/// Terrain height field with bilinear interpolation between cell centers.
#[derive(Debug, Clone)]
pub struct HeightMap {
    width: i32,
    height: i32,
    values: Vec<f32>,
}

impl HeightMap {
    pub fn new(width: i32, height: i32, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), (width * height) as usize);
        Self {
            width,
            height,
            values,
        }
    }

    /// Decode the wire's byte raster; one byte per tile, `(v - 127) / 8`
    /// metres.
    pub fn from_bytes(width: i32, height: i32, data: &[u8]) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        let values = data.iter().map(|&v| (v as f32 - 127.0) / 8.0).collect();
        Self::new(width, height, values)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn at(&self, x: i32, y: i32) -> f32 {
        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            self.values[(y * self.width + x) as usize]
        } else {
            MIN_HEIGHT
        }
    }

    /// Bilinear interpolation over the four cells surrounding `pos`.
    /// Out-of-bounds corners read as [`MIN_HEIGHT`].
    pub fn sample(&self, pos: Vec2) -> f32 {
        let fx = pos.x.floor();
        let fy = pos.y.floor();
        let tx = pos.x - fx;
        let ty = pos.y - fy;
        let x0 = fx as i32;
        let y0 = fy as i32;

        let h00 = self.at(x0, y0);
        let h10 = self.at(x0 + 1, y0);
        let h01 = self.at(x0, y0 + 1);
        let h11 = self.at(x0 + 1, y0 + 1);

        let bottom = h00 + (h10 - h00) * tx;
        let top = h01 + (h11 - h01) * tx;
        bottom + (top - bottom) * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_decode() {
        let map = HeightMap::from_bytes(2, 1, &[127, 135]);
        assert_eq!(map.at(0, 0), 0.0);
        assert_eq!(map.at(1, 0), 1.0);
    }

    #[test]
    fn exact_at_cell_corners_and_linear_between() {
        let map = HeightMap::new(2, 2, vec![0.0, 4.0, 0.0, 4.0]);
        assert_eq!(map.sample(Vec2::new(0.0, 0.0)), 0.0);
        assert_eq!(map.sample(Vec2::new(1.0, 0.0)), 4.0);
        assert_eq!(map.sample(Vec2::new(0.5, 0.0)), 2.0);
        assert_eq!(map.sample(Vec2::new(0.25, 1.0)), 1.0);
    }

    #[test]
    fn out_of_bounds_blends_towards_sentinel() {
        let map = HeightMap::new(2, 2, vec![0.0; 4]);
        assert_eq!(map.sample(Vec2::new(-5.0, -5.0)), MIN_HEIGHT);
        // On the edge, the missing corners pull the sample down.
        let edge = map.sample(Vec2::new(1.5, 0.0));
        assert!(edge < 0.0 && edge > MIN_HEIGHT);
    }
}
