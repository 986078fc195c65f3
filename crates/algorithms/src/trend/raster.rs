//! Pixel-wise trend rasters

use super::{trend_statistics, TimeBasis, TrendStatistic};
use greentrend_core::raster::RasterStack;
use greentrend_core::{Error, Result};

/// No-data value of trend rasters
pub const TREND_NODATA: f64 = -9999.0;

/// Compute a trend raster from a temporal stack.
///
/// Each pixel is one entity. Per-band no-data is resolved before the
/// regression; undefined statistics are written as [`TREND_NODATA`].
///
/// # Returns
/// Seven-band stack in [`TrendStatistic::ALL`] order, each band described by
/// its statistic label, sharing the input's geotransform.
pub fn raster_trend(stack: &RasterStack, basis: &TimeBasis) -> Result<RasterStack> {
    let (bands, rows, cols) = stack.shape();
    if bands != basis.len() {
        return Err(Error::SizeMismatch {
            what: "time basis periods",
            expected: basis.len(),
            actual: bands,
        });
    }

    let values = stack.entity_series()?;
    let time = basis.paired(values.view())?;

    tracing::debug!(
        "Fitting {} pixels over {} periods from {}",
        values.nrows(),
        basis.len(),
        basis.start()
    );
    let trend = trend_statistics(time.view(), values.view())?;

    let stats = trend
        .as_array()
        .mapv(|v| if v.is_finite() { v } else { TREND_NODATA });
    let mut out = RasterStack::from_entity_series(stats.reversed_axes(), rows, cols)?
        .with_transform(*stack.transform());
    out.set_all_nodata(Some(TREND_NODATA));
    for stat in TrendStatistic::ALL {
        out.set_description(stat.band_index(), stat.label())?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use greentrend_core::raster::GeoTransform;
    use ndarray::Array3;

    fn ramp_stack() -> RasterStack {
        // 4 periods over a 2x3 grid; pixel (r, c) grows by r + c per period
        let data = Array3::from_shape_fn((4, 2, 3), |(b, r, c)| (r + c) as f64 * b as f64 + 1.0);
        let mut stack = RasterStack::from_array(data)
            .with_transform(GeoTransform::new(500.0, 900.0, 30.0, -30.0));
        stack.set_all_nodata(Some(-1.0));
        stack
    }

    #[test]
    fn test_trend_raster_layout() {
        let stack = ramp_stack();
        let basis = TimeBasis::new(2000, 2003, 1).unwrap();
        let out = raster_trend(&stack, &basis).unwrap();

        assert_eq!(out.shape(), (7, 2, 3));
        assert_eq!(out.transform(), stack.transform());
        assert_eq!(out.description(2), Some("slope"));
        assert_eq!(out.description(6), Some("pval"));
        assert_eq!(out.nodata(0), Some(TREND_NODATA));

        let slope = out.band(TrendStatistic::Slope.band_index()).unwrap();
        assert_relative_eq!(slope[[1, 2]], 3.0, epsilon = 1e-9);
        assert_relative_eq!(slope[[0, 1]], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_pixel_and_nodata() {
        let mut stack = ramp_stack();
        let basis = TimeBasis::new(2000, 2003, 1).unwrap();
        let out = raster_trend(&stack, &basis).unwrap();

        // pixel (0, 0) is constant: slope 0, correlation undefined
        let corr = out.band(TrendStatistic::Correlation.band_index()).unwrap();
        let slope = out.band(TrendStatistic::Slope.band_index()).unwrap();
        assert_eq!(corr[[0, 0]], TREND_NODATA);
        assert_eq!(slope[[0, 0]], 0.0);

        // mask two of four periods at pixel (1, 1): n = 2, all undefined
        let mut data = stack.data().clone();
        data[[0, 1, 1]] = -1.0;
        data[[3, 1, 1]] = -1.0;
        stack = RasterStack::from_array(data);
        stack.set_all_nodata(Some(-1.0));
        let out = raster_trend(&stack, &basis).unwrap();
        for stat in TrendStatistic::ALL {
            assert_eq!(out.band(stat.band_index()).unwrap()[[1, 1]], TREND_NODATA);
        }
    }

    #[test]
    fn test_band_count_must_match_basis() {
        let stack = ramp_stack();
        let basis = TimeBasis::new(2000, 2009, 1).unwrap();
        assert!(raster_trend(&stack, &basis).is_err());
    }
}
