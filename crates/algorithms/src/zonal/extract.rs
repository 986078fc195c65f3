//! Per-zone reductions: period medians and class-area tallies

use super::mask::ZoneMask;
use super::schema::LandCoverClass;
use crate::trend::TREND_NODATA;
use greentrend_core::raster::{Raster, RasterElement, RasterStack};
use greentrend_core::{Error, Result};
use ndarray::{Array1, Axis, Zip};

/// Median of the finite values, averaging the middle pair for even counts.
///
/// Returns NaN when no finite value is present.
pub fn nan_median(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut vals: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(f64::total_cmp);

    let count = vals.len();
    if count % 2 == 0 {
        (vals[count / 2 - 1] + vals[count / 2]) / 2.0
    } else {
        vals[count / 2]
    }
}

/// Median of the masked pixels of every band.
///
/// Band no-data is excluded; a band with no valid masked pixel yields NaN.
pub fn masked_medians(stack: &RasterStack, mask: &ZoneMask) -> Array1<f64> {
    medians_where(stack, mask, |_| true)
}

/// Median of the masked pixels of one band (0-based)
pub fn masked_band_median(stack: &RasterStack, band: usize, mask: &ZoneMask) -> Result<f64> {
    let values = stack.band(band)?;
    let nodata = stack.nodata(band);
    let w = mask.window();
    let picked = (w.row_start..w.row_end)
        .flat_map(|row| (w.col_start..w.col_end).map(move |col| (row, col)))
        .filter(|&(row, col)| mask.contains(row, col))
        .map(|(row, col)| values[[row, col]])
        .filter(|v| !v.is_nodata(nodata));
    Ok(nan_median(picked))
}

/// Medians of every band of a trend raster.
///
/// The trend no-data sentinel is excluded even when the raster does not
/// declare it.
pub fn trend_band_medians(stack: &RasterStack, mask: &ZoneMask) -> Array1<f64> {
    medians_where(stack, mask, |v| v != TREND_NODATA)
}

fn medians_where(stack: &RasterStack, mask: &ZoneMask, keep: impl Fn(f64) -> bool) -> Array1<f64> {
    let cube = stack.resolved_window(mask.window());
    let inside = mask.mask();
    cube.axis_iter(Axis(0))
        .map(|band| {
            let mut picked = Vec::with_capacity(band.len());
            Zip::from(&band).and(&inside).for_each(|&v, &selected| {
                if selected && keep(v) {
                    picked.push(v);
                }
            });
            nan_median(picked)
        })
        .collect()
}

/// Areas of the land-cover classes inside one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassAreaTally {
    counts: [usize; 3],
    pixel_area: f64,
}

impl ClassAreaTally {
    /// Number of pixels of a class
    pub fn count(&self, class: LandCoverClass) -> usize {
        self.counts[class as usize - 1]
    }

    /// `pixel count x |pixel width| x |pixel height|`
    pub fn area(&self, class: LandCoverClass) -> f64 {
        self.count(class) as f64 * self.pixel_area
    }

    pub fn pixel_area(&self) -> f64 {
        self.pixel_area
    }
}

/// Count class pixels inside a mask of the classification raster's grid
pub fn class_area_tally<T: RasterElement>(
    classes: &Raster<T>,
    mask: &ZoneMask,
) -> Result<ClassAreaTally> {
    let w = mask.window();
    if w.row_end > classes.rows() || w.col_end > classes.cols() {
        return Err(Error::IndexOutOfBounds {
            row: w.row_end,
            col: w.col_end,
            rows: classes.rows(),
            cols: classes.cols(),
        });
    }

    let mut counts = [0usize; 3];
    let data = classes.data();
    for ((r, c), &inside) in mask.mask().indexed_iter() {
        if !inside {
            continue;
        }
        let value = data[[w.row_start + r, w.col_start + c]];
        if classes.is_nodata(value) {
            continue;
        }
        let class = value
            .as_f64()
            .filter(|v| v.fract() == 0.0)
            .and_then(|v| LandCoverClass::from_code(v as i32));
        if let Some(class) = class {
            counts[class as usize - 1] += 1;
        }
    }

    Ok(ClassAreaTally {
        counts,
        pixel_area: classes.transform().pixel_area(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zonal::mask::touched_mask;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};
    use greentrend_core::raster::GeoTransform;
    use ndarray::Array3;

    fn full_zone() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 50.0, y: 0.0),
            (x: 50.0, y: 50.0),
            (x: 0.0, y: 50.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    fn transform() -> GeoTransform {
        GeoTransform::new(0.0, 50.0, 5.0, -5.0)
    }

    #[test]
    fn test_nan_median() {
        assert_eq!(nan_median([3.0, 1.0, 2.0]), 2.0);
        assert_eq!(nan_median([4.0, f64::NAN, 1.0, 2.0, 3.0]), 2.5);
        assert!(nan_median([f64::NAN, f64::NAN]).is_nan());
        assert!(nan_median(Vec::new()).is_nan());
    }

    #[test]
    fn test_green_area_of_four_pixels() {
        let mut classes: Raster<i32> = Raster::new(10, 10);
        classes.set_transform(transform());
        for (r, c) in [(0, 0), (3, 4), (7, 7), (9, 2)] {
            classes.set(r, c, 1).unwrap();
        }
        classes.set(5, 5, 2).unwrap();

        let mask = touched_mask(&full_zone(), &transform(), 10, 10, "z").unwrap();
        let tally = class_area_tally(&classes, &mask).unwrap();

        assert_eq!(tally.count(LandCoverClass::Green), 4);
        assert_relative_eq!(tally.area(LandCoverClass::Green), 100.0);
        assert_relative_eq!(tally.area(LandCoverClass::Water), 25.0);
        assert_eq!(tally.area(LandCoverClass::Urban), 0.0);
    }

    #[test]
    fn test_masked_medians_skip_nodata() {
        let data = Array3::from_shape_fn((2, 10, 10), |(b, r, c)| {
            if b == 1 && r == 0 {
                -1.0
            } else {
                (b * 100 + r * 10 + c) as f64
            }
        });
        let mut stack = RasterStack::from_array(data).with_transform(transform());
        stack.set_all_nodata(Some(-1.0));

        let mask = touched_mask(&full_zone(), &transform(), 10, 10, "z").unwrap();
        let medians = masked_medians(&stack, &mask);
        assert_relative_eq!(medians[0], 49.5);
        // band 1 loses row 0: values 110..199
        assert_relative_eq!(medians[1], 154.5);

        assert_relative_eq!(masked_band_median(&stack, 1, &mask).unwrap(), 154.5);
    }

    #[test]
    fn test_trend_sentinel_excluded() {
        let data = Array3::from_shape_fn((1, 10, 10), |(_, r, _)| {
            if r < 5 {
                TREND_NODATA
            } else {
                0.25
            }
        });
        let stack = RasterStack::from_array(data).with_transform(transform());
        let mask = touched_mask(&full_zone(), &transform(), 10, 10, "z").unwrap();
        assert_relative_eq!(trend_band_medians(&stack, &mask)[0], 0.25);
    }
}
