//! Raster and vector providers

mod geojson_layer;
mod native;

pub use geojson_layer::GeoJsonLayer;
pub use native::{
    read_geotiff, read_geotiff_stack, read_geotiff_stack_from_buffer, write_geotiff_stack,
    write_geotiff_stack_to_buffer,
};
