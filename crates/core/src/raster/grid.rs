//! Single-band raster grid

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced single-band grid.
///
/// Used for categorical layers such as the land-cover classification; the
/// temporal observations live in [`RasterStack`](crate::raster::RasterStack).
///
/// # Example
///
/// ```ignore
/// use greentrend_core::Raster;
///
/// let mut classes: Raster<i32> = Raster::new(10, 10);
/// classes.set(2, 3, 1)?;
/// assert_eq!(classes.get(2, 3)?, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    /// No-data sentinel as declared by the source
    nodata: Option<f64>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a raster filled with `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Wrap an existing array with a default transform
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Whether a value is the declared no-data (or NaN for float rasters)
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Map-space bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Count of cells holding valid data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<i32> = Raster::new(10, 10);
        raster.set(5, 5, 3).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 3);
        assert!(raster.set(10, 0, 1).is_err());
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Raster::<u8>::from_vec(vec![1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_valid_count_respects_nodata() {
        let mut raster = Raster::filled(3, 3, 1_i32);
        raster.set(0, 0, 0).unwrap();
        raster.set_nodata(Some(0.0));
        assert_eq!(raster.valid_count(), 8);
    }
}
