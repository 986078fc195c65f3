//! Zonal extraction and attribute writing
//!
//! - **dissolve**: merge all features of a zone key into one multipolygon
//! - **mask**: any-touched pixel masks on a raster grid
//! - **extract**: per-period medians and land-cover class areas
//! - **writer**: idempotent field creation and per-zone attribute writes
//! - **pipeline**: trend and snapshot batches over a feature layer

mod dissolve;
mod extract;
mod mask;
mod pipeline;
mod schema;
mod writer;

pub use dissolve::dissolve;
pub use extract::{
    class_area_tally, masked_band_median, masked_medians, nan_median, trend_band_medians,
    ClassAreaTally,
};
pub use mask::{touched_mask, ZoneMask};
pub use pipeline::{
    extract_zone, zonal_snapshot, zonal_trends, BatchReport, SkippedZone, SnapshotInputs,
    SnapshotParams, SourceSummary, ZonalInputs, ZonalTrendParams, ZoneSeries,
};
pub use schema::{LandCoverClass, Source, ZoneField};
pub use writer::{AttributeWriter, FieldValues};
