//! Cell value types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Continuous observations (NDVI, LST) are read as `f64`; categorical
/// land-cover codes as integers.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Value used when a source sample cannot be represented
    fn fallback() -> Self;

    /// Whether `self` is a missing observation under the given sentinel
    fn is_nodata(&self, nodata: Option<f64>) -> bool;

    /// Convert to `f64`, `None` when not representable
    fn as_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_integer_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fallback() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                nodata.is_some_and(|nd| *self as f64 == nd)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fallback() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                self.is_nan() || nodata.is_some_and(|nd| *self as f64 == nd)
            }
        }
    )*};
}

impl_integer_element!(i8, i16, i32, i64, u8, u16, u32);
impl_float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!0.25_f64.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn test_integer_nodata() {
        assert!(0_u8.is_nodata(Some(0.0)));
        assert!(!3_i32.is_nodata(Some(0.0)));
        assert!(!3_i32.is_nodata(None));
    }
}
