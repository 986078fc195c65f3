//! Temporal design matrix
//!
//! A [`TimeBasis`] assigns each observation period its offset from a
//! reference start year. Pairing it with a value matrix marks a period's time
//! as invalid wherever that entity's observation is missing, so time and
//! value invalidity always travel together.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use greentrend_core::{Error, Result};

/// Time offsets aligned one-to-one with the layers of a temporal stack
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBasis {
    start: i32,
    offsets: Array1<f64>,
}

impl TimeBasis {
    /// Periods of `step` years between `start` and `end` (inclusive).
    ///
    /// Each period sits at the centre of its bucket, `start + step / 2`,
    /// `start + step / 2 + step`, ... while it does not pass `end`. With
    /// `step = 1` every year is a period at offset `year - start`; with
    /// `step = 3` over 1990..=2019 the periods are 1991, 1994, ..., 2018.
    pub fn new(start: i32, end: i32, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(Error::InvalidParameter {
                name: "step",
                value: step.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        if end < start {
            return Err(Error::InvalidParameter {
                name: "end",
                value: end.to_string(),
                reason: format!("ends before start year {}", start),
            });
        }

        let step = i64::from(step);
        let first = i64::from(start) + step / 2;
        let offsets: Array1<f64> = (0..)
            .map(|k| first + k * step)
            .take_while(|&p| p <= i64::from(end))
            .map(|p| (p - i64::from(start)) as f64)
            .collect();

        if offsets.is_empty() {
            return Err(Error::InvalidParameter {
                name: "step",
                value: step.to_string(),
                reason: format!("no period centre falls within {}..={}", start, end),
            });
        }

        Ok(Self { start, offsets })
    }

    /// Irregular basis from explicit, strictly increasing offsets
    pub fn from_offsets(start: i32, offsets: Vec<f64>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::InvalidParameter {
                name: "offsets",
                value: "[]".into(),
                reason: "at least one period is required".into(),
            });
        }
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "offsets",
                value: format!("{:?}", offsets),
                reason: "offsets must be finite".into(),
            });
        }
        if offsets.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidParameter {
                name: "offsets",
                value: format!("{:?}", offsets),
                reason: "offsets must be strictly increasing".into(),
            });
        }

        Ok(Self {
            start,
            offsets: Array1::from(offsets),
        })
    }

    /// Reference start year
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Number of periods
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> ArrayView1<'_, f64> {
        self.offsets.view()
    }

    /// Absolute period positions (`start + offset`)
    pub fn periods(&self) -> Vec<f64> {
        self.offsets
            .iter()
            .map(|o| f64::from(self.start) + o)
            .collect()
    }

    /// Time matrix paired with an `(entity, period)` value matrix.
    ///
    /// Entries are the period offsets, or NaN wherever the value is not
    /// finite.
    ///
    /// # Errors
    /// [`Error::SizeMismatch`] when the period count differs from the basis.
    pub fn paired(&self, values: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let periods = values.len_of(Axis(1));
        if periods != self.len() {
            return Err(Error::SizeMismatch {
                what: "time basis periods",
                expected: self.len(),
                actual: periods,
            });
        }

        let mut time = Array2::from_elem(values.raw_dim(), f64::NAN);
        Zip::from(&mut time)
            .and(&values)
            .and_broadcast(&self.offsets)
            .for_each(|t, &v, &offset| {
                if v.is_finite() {
                    *t = offset;
                }
            });

        Ok(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_annual_basis() {
        let basis = TimeBasis::new(1990, 2019, 1).unwrap();
        assert_eq!(basis.len(), 30);
        assert_eq!(basis.offsets()[0], 0.0);
        assert_eq!(basis.offsets()[29], 29.0);
        assert_eq!(basis.periods()[29], 2019.0);
    }

    #[test]
    fn test_three_year_buckets() {
        let basis = TimeBasis::new(1990, 2019, 3).unwrap();
        assert_eq!(basis.len(), 10);
        assert_eq!(basis.offsets()[0], 1.0);
        assert_eq!(basis.offsets()[1], 4.0);
        assert_eq!(basis.offsets()[9], 28.0);
        assert_eq!(basis.periods()[0], 1991.0);
        assert_eq!(basis.periods()[9], 2018.0);
    }

    #[test]
    fn test_invalid_basis() {
        assert!(TimeBasis::new(1990, 2019, 0).is_err());
        assert!(TimeBasis::new(2019, 1990, 1).is_err());
        assert!(TimeBasis::new(1990, 1991, 10).is_err());
        assert!(TimeBasis::from_offsets(0, vec![0.0, 2.0, 1.0]).is_err());
        assert!(TimeBasis::from_offsets(0, vec![0.0, 0.0]).is_err());
        assert!(TimeBasis::from_offsets(0, vec![]).is_err());
    }

    #[test]
    fn test_paired_marks_missing() {
        let basis = TimeBasis::from_offsets(2000, vec![0.0, 1.0, 5.0]).unwrap();
        let values = array![[1.0, f64::NAN, 3.0], [f64::NAN, 2.0, 2.5]];
        let time = basis.paired(values.view()).unwrap();

        assert_eq!(time[[0, 0]], 0.0);
        assert!(time[[0, 1]].is_nan());
        assert_eq!(time[[0, 2]], 5.0);
        assert!(time[[1, 0]].is_nan());
        assert_eq!(time[[1, 1]], 1.0);
    }

    #[test]
    fn test_paired_period_mismatch() {
        let basis = TimeBasis::new(1990, 1994, 1).unwrap();
        let values = Array2::<f64>::zeros((2, 3));
        let err = basis.paired(values.view()).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 5, actual: 3, .. }));
    }
}
