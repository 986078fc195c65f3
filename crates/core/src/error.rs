//! Error types for GreenTrend

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for GreenTrend operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File {} not found", path.display())]
    MissingFile { path: PathBuf },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Size mismatch in {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A zone could not be turned into a usable pixel mask or feature set.
    #[error("Zone '{key}': {reason}")]
    Geometry { key: String, reason: String },

    #[error("Field '{name}' already exists")]
    FieldExists { name: String },

    #[error("Field '{name}' is not declared on the layer")]
    UnknownField { name: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a zone-level geometry failure
    pub fn geometry(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Geometry {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only concerns a single zone and the batch may continue
    pub fn is_zone_local(&self) -> bool {
        matches!(self, Error::Geometry { .. })
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Fail with [`Error::MissingFile`] unless `path` points at an existing file
pub fn require_file(path: impl AsRef<std::path::Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::MissingFile {
            path: path.to_path_buf(),
        })
    }
}

/// Result type alias for GreenTrend operations
pub type Result<T> = std::result::Result<T, Error>;
