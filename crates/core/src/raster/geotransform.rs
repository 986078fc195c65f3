//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Zonal masking assumes an axis-aligned grid (both rotations zero); the
/// pixel height of a north-up grid is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis
    pub row_rotation: f64,
    /// Rotation about Y axis
    pub col_rotation: f64,
}

/// Half-open pixel window `[row_start, row_end) x [col_start, col_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl PixelWindow {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0
    }
}

impl GeoTransform {
    /// Create a north-up transform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the pixel's top-left corner
    pub fn pixel_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let (c, r) = (col as f64, row as f64);
        (
            self.origin_x + c * self.pixel_width + r * self.row_rotation,
            self.origin_y + c * self.col_rotation + r * self.pixel_height,
        )
    }

    /// Map coordinates of the pixel centre
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let (c, r) = (col as f64 + 0.5, row as f64 + 0.5);
        (
            self.origin_x + c * self.pixel_width + r * self.row_rotation,
            self.origin_y + c * self.col_rotation + r * self.pixel_height,
        )
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row)
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Ground area covered by one pixel
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs()
    }

    /// Whether the grid is axis-aligned
    pub fn is_axis_aligned(&self) -> bool {
        self.row_rotation.abs() < 1e-12 && self.col_rotation.abs() < 1e-12
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a `cols` x `rows` grid
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_corner(0, 0),
            self.pixel_corner(cols, 0),
            self.pixel_corner(0, rows),
            self.pixel_corner(cols, rows),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    /// Pixel window of a `cols` x `rows` grid covering a map-space rectangle.
    ///
    /// Every pixel whose cell overlaps the rectangle is part of the window;
    /// the window is clamped to the grid and may come back empty.
    pub fn window_for_bounds(
        &self,
        (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
        cols: usize,
        rows: usize,
    ) -> PixelWindow {
        let (c0, r0) = self.geo_to_pixel(min_x, min_y);
        let (c1, r1) = self.geo_to_pixel(max_x, max_y);

        let clamp = |v: f64, hi: usize| -> usize {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as usize).min(hi)
            }
        };

        let col_lo = c0.min(c1).floor();
        let col_hi = c0.max(c1).ceil();
        let row_lo = r0.min(r1).floor();
        let row_hi = r0.max(r1).ceil();

        let col_start = clamp(col_lo, cols);
        let row_start = clamp(row_lo, rows);
        PixelWindow {
            row_start,
            row_end: clamp(row_hi, rows).max(row_start),
            col_start,
            col_end: clamp(col_hi, cols).max(col_start),
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
