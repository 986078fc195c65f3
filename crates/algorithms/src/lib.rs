//! # GreenTrend Algorithms
//!
//! Trend and zonal statistics over temporal raster stacks.
//!
//! ## Modules
//!
//! - **trend**: time basis, vectorized OLS statistics, pixel trend rasters
//! - **zonal**: zone dissolution, any-touched masks, median series,
//!   class areas, attribute writing and batch pipelines

pub(crate) mod maybe_rayon;

pub mod trend;
pub mod zonal;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::trend::{
        raster_trend, trend_statistics, TimeBasis, TrendResult, TrendStack, TrendStatistic,
        TREND_NODATA,
    };
    pub use crate::zonal::{
        zonal_snapshot, zonal_trends, AttributeWriter, BatchReport, LandCoverClass,
        SkippedZone, SnapshotInputs, SnapshotParams, Source, ZonalInputs, ZonalTrendParams,
        ZoneField,
    };
    pub use greentrend_core::prelude::*;
}
