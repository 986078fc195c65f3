//! Linear trend statistics over temporal stacks
//!
//! - **time_basis**: time offsets per observation period
//! - **ols**: vectorized ordinary-least-squares statistics per entity
//! - **raster**: pixel-wise trend rasters

mod ols;
mod raster;
mod time_basis;

pub use ols::{trend_statistics, TrendResult, TrendStack, MIN_PERIODS};
pub use raster::{raster_trend, TREND_NODATA};
pub use time_basis::TimeBasis;

/// Regression statistics, in trend raster band order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrendStatistic {
    Covariance,
    Correlation,
    Slope,
    Intercept,
    TStatistic,
    StandardError,
    PValue,
}

impl TrendStatistic {
    /// All statistics in band order
    pub const ALL: [TrendStatistic; 7] = [
        TrendStatistic::Covariance,
        TrendStatistic::Correlation,
        TrendStatistic::Slope,
        TrendStatistic::Intercept,
        TrendStatistic::TStatistic,
        TrendStatistic::StandardError,
        TrendStatistic::PValue,
    ];

    /// 0-based band of this statistic in a trend raster
    pub fn band_index(self) -> usize {
        self as usize
    }

    /// Band description written to trend rasters
    pub fn label(self) -> &'static str {
        match self {
            TrendStatistic::Covariance => "covariance",
            TrendStatistic::Correlation => "correlation",
            TrendStatistic::Slope => "slope",
            TrendStatistic::Intercept => "intercept",
            TrendStatistic::TStatistic => "tstat",
            TrendStatistic::StandardError => "stderr",
            TrendStatistic::PValue => "pval",
        }
    }

    /// Prefix of per-zone trend fields (`slopeNDVI`, `corrLST`, ...)
    pub fn code(self) -> &'static str {
        match self {
            TrendStatistic::Covariance => "cov",
            TrendStatistic::Correlation => "corr",
            TrendStatistic::Slope => "slope",
            TrendStatistic::Intercept => "int",
            TrendStatistic::TStatistic => "tstat",
            TrendStatistic::StandardError => "stderr",
            TrendStatistic::PValue => "pval",
        }
    }

    /// Five-character code used by snapshot fields (`ndvi_covar`, ...)
    pub fn short_code(self) -> &'static str {
        match self {
            TrendStatistic::Covariance => "covar",
            TrendStatistic::Correlation => "corre",
            TrendStatistic::Slope => "slope",
            TrendStatistic::Intercept => "inter",
            TrendStatistic::TStatistic => "tstat",
            TrendStatistic::StandardError => "stder",
            TrendStatistic::PValue => "pval",
        }
    }
}

impl std::fmt::Display for TrendStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
