//! Raster data structures

mod element;
mod geotransform;
mod grid;
mod stack;

pub use element::RasterElement;
pub use geotransform::{GeoTransform, PixelWindow};
pub use grid::Raster;
pub use stack::RasterStack;
