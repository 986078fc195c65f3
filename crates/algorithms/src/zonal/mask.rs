//! Any-touched pixel masks
//!
//! A pixel belongs to a zone when its cell rectangle shares interior area
//! with the zone. Cells that only meet the zone along an edge or at a corner
//! are left out.

use geo::{BoundingRect, Contains, Coord, MultiPolygon, Point, Rect, Relate};
use greentrend_core::raster::{GeoTransform, PixelWindow};
use greentrend_core::{Error, Result};
use ndarray::{Array2, ArrayView2};

/// Pixel mask of one zone within the window covering its bounding rectangle
#[derive(Debug, Clone)]
pub struct ZoneMask {
    window: PixelWindow,
    mask: Array2<bool>,
}

impl ZoneMask {
    pub fn window(&self) -> &PixelWindow {
        &self.window
    }

    /// Window-local mask, `(window rows, window cols)`
    pub fn mask(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    /// Number of selected pixels
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Whether a pixel in grid coordinates is selected
    pub fn contains(&self, row: usize, col: usize) -> bool {
        let w = &self.window;
        if row < w.row_start || row >= w.row_end || col < w.col_start || col >= w.col_end {
            return false;
        }
        self.mask[[row - w.row_start, col - w.col_start]]
    }
}

/// Mask of the pixels of a `rows` x `cols` grid touched by a zone.
///
/// # Errors
/// [`Error::Geometry`] when the zone misses the grid or selects no pixel;
/// [`Error::InvalidParameter`] for rotated grids.
pub fn touched_mask(
    zone: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    key: &str,
) -> Result<ZoneMask> {
    if !transform.is_axis_aligned() {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{:?}", transform.to_gdal()),
            reason: "zonal masks need a grid without rotation".into(),
        });
    }

    let Some(rect) = zone.bounding_rect() else {
        return Err(Error::geometry(key, "zone geometry is empty"));
    };
    let bounds = (rect.min().x, rect.min().y, rect.max().x, rect.max().y);
    let window = transform.window_for_bounds(bounds, cols, rows);
    if window.is_empty() {
        return Err(Error::geometry(key, "zone does not overlap the raster extent"));
    }

    let mask = Array2::from_shape_fn((window.rows(), window.cols()), |(r, c)| {
        let (row, col) = (window.row_start + r, window.col_start + c);
        let (cx, cy) = transform.pixel_center(col, row);
        if zone.contains(&Point::new(cx, cy)) {
            return true;
        }
        let (x0, y0) = transform.pixel_corner(col, row);
        let (x1, y1) = transform.pixel_corner(col + 1, row + 1);
        let cell = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
        let relation = zone.relate(&cell);
        relation.is_intersects() && !relation.is_touches()
    });

    let zone_mask = ZoneMask { window, mask };
    if zone_mask.count() == 0 {
        return Err(Error::geometry(key, "zone touches no pixel"));
    }

    tracing::debug!(
        "Zone {}: {} pixels in {}x{} window",
        key,
        zone_mask.count(),
        window.rows(),
        window.cols()
    );
    Ok(zone_mask)
}
