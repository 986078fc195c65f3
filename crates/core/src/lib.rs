//! # GreenTrend Core
//!
//! Core types and I/O for the GreenTrend trend and zonal statistics engine.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid (land-cover classes)
//! - `RasterStack`: temporal stack of `f64` observation layers
//! - `GeoTransform`: affine georeferencing and pixel windows
//! - `FeatureLayer`: writable vector layer seam, with in-memory and GeoJSON
//!   implementations
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use error::{require_file, Error, Result};
pub use raster::{GeoTransform, PixelWindow, Raster, RasterElement, RasterStack};
pub use vector::{AttributeValue, Feature, FeatureLayer, FieldDefn, FieldType, MemoryLayer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RasterStack};
    pub use crate::vector::{AttributeValue, Feature, FeatureLayer, FieldDefn, MemoryLayer};
}
