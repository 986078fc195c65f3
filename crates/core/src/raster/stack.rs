//! Temporal raster stacks
//!
//! A [`RasterStack`] holds one observation layer per period on a shared grid.
//! Storing all layers in a single `(band, row, col)` array makes the
//! "identical extent, resolution and entity count" invariant structural.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelWindow, RasterElement};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// Multi-band `f64` raster with per-band no-data and descriptions
#[derive(Debug, Clone)]
pub struct RasterStack {
    data: Array3<f64>,
    transform: GeoTransform,
    nodata: Vec<Option<f64>>,
    descriptions: Vec<Option<String>>,
}

impl RasterStack {
    /// Wrap a `(band, row, col)` array
    pub fn from_array(data: Array3<f64>) -> Self {
        let bands = data.len_of(Axis(0));
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: vec![None; bands],
            descriptions: vec![None; bands],
        }
    }

    /// Rebuild a stack from an `(entity, band)` matrix with row-major entities
    pub fn from_entity_series(series: Array2<f64>, rows: usize, cols: usize) -> Result<Self> {
        let (entities, bands) = series.dim();
        if entities != rows * cols {
            return Err(Error::SizeMismatch {
                what: "entity count",
                expected: rows * cols,
                actual: entities,
            });
        }

        let cube = series
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((rows, cols, bands))
            .map_err(|e| Error::Other(e.to_string()))?
            .permuted_axes([2, 0, 1]);
        Ok(Self::from_array(cube.as_standard_layout().into_owned()))
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Dimensions as (bands, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Raw values of one band (0-based)
    pub fn band(&self, band: usize) -> Result<ArrayView2<'_, f64>> {
        self.check_band(band)?;
        Ok(self.data.index_axis(Axis(0), band))
    }

    pub fn nodata(&self, band: usize) -> Option<f64> {
        self.nodata.get(band).copied().flatten()
    }

    pub fn set_nodata(&mut self, band: usize, nodata: Option<f64>) -> Result<()> {
        self.check_band(band)?;
        self.nodata[band] = nodata;
        Ok(())
    }

    /// Declare the same no-data sentinel on every band
    pub fn set_all_nodata(&mut self, nodata: Option<f64>) {
        self.nodata.iter_mut().for_each(|nd| *nd = nodata);
    }

    pub fn description(&self, band: usize) -> Option<&str> {
        self.descriptions.get(band).and_then(|d| d.as_deref())
    }

    pub fn set_description(&mut self, band: usize, description: impl Into<String>) -> Result<()> {
        self.check_band(band)?;
        self.descriptions[band] = Some(description.into());
        Ok(())
    }

    /// Copy of the data with every band's no-data sentinel replaced by NaN
    pub fn resolved(&self) -> Array3<f64> {
        let mut out = self.data.clone();
        self.resolve_in_place(&mut out);
        out
    }

    /// Resolved `(band, row, col)` values inside a pixel window
    pub fn resolved_window(&self, window: &PixelWindow) -> Array3<f64> {
        let mut out = self
            .data
            .slice(s![.., window.row_start..window.row_end, window.col_start..window.col_end])
            .to_owned();
        self.resolve_in_place(&mut out);
        out
    }

    /// Pixel time series as an `(entity, band)` matrix, entities in row-major order.
    ///
    /// No-data is resolved to NaN so the result feeds straight into the
    /// trend computation.
    pub fn entity_series(&self) -> Result<Array2<f64>> {
        let (bands, rows, cols) = self.shape();
        let pixel_major = self.resolved().permuted_axes([1, 2, 0]);
        pixel_major
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((rows * cols, bands))
            .map_err(|e| Error::Other(e.to_string()))
    }

    /// Number of valid cells in one band
    pub fn valid_count(&self, band: usize) -> Result<usize> {
        let nodata = self.nodata(band);
        Ok(self.band(band)?.iter().filter(|v| !v.is_nodata(nodata)).count())
    }

    fn resolve_in_place(&self, cube: &mut Array3<f64>) {
        for (b, mut band) in cube.outer_iter_mut().enumerate() {
            let nodata = self.nodata(b);
            band.mapv_inplace(|v| if v.is_nodata(nodata) { f64::NAN } else { v });
        }
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band < self.band_count() {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                name: "band",
                value: band.to_string(),
                reason: format!("stack has {} bands", self.band_count()),
            })
        }
    }
}
