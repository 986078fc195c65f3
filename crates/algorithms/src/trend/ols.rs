//! Vectorized ordinary-least-squares trend statistics
//!
//! Every entity (pixel or zone) owns one row of a time matrix and one row of
//! a value matrix. All statistics are computed with axis reductions over the
//! whole matrix at once; periods where either time or value is not finite are
//! masked out of every sum.
//!
//! Definitions, over the `n` valid periods of an entity:
//!
//! ```text
//! cov   = sum((t - t_mean) * (v - v_mean)) / n
//! r     = cov / (sd_t * sd_v)              population std (ddof = 0)
//! slope = cov / var_t
//! int   = v_mean - t_mean * slope
//! t     = r * sqrt(n - 2) / sqrt(1 - r^2)
//! se    = slope / t
//! p     = 2 * sf_t(|t|, n - 2)
//! ```

use super::TrendStatistic;
use crate::maybe_rayon::*;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use greentrend_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Minimum number of valid periods for any statistic to be defined
pub const MIN_PERIODS: usize = 3;

/// Entities per parallel block
const ENTITY_BLOCK: usize = 4096;

/// Relative tolerance below which a spread counts as zero
const FLAT_TOLERANCE: f64 = 1e-12;

/// Distance from +-1 within which a correlation counts as perfect
const PERFECT_TOLERANCE: f64 = 1e-12;

/// Statistics for one entity. `None` marks an undefined statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendResult {
    /// Number of valid periods
    pub n: usize,
    pub covariance: Option<f64>,
    pub correlation: Option<f64>,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub t_statistic: Option<f64>,
    pub standard_error: Option<f64>,
    pub p_value: Option<f64>,
}

impl TrendResult {
    pub fn get(&self, stat: TrendStatistic) -> Option<f64> {
        match stat {
            TrendStatistic::Covariance => self.covariance,
            TrendStatistic::Correlation => self.correlation,
            TrendStatistic::Slope => self.slope,
            TrendStatistic::Intercept => self.intercept,
            TrendStatistic::TStatistic => self.t_statistic,
            TrendStatistic::StandardError => self.standard_error,
            TrendStatistic::PValue => self.p_value,
        }
    }

    /// Whether no statistic is defined
    pub fn is_undefined(&self) -> bool {
        TrendStatistic::ALL.iter().all(|&s| self.get(s).is_none())
    }
}

/// Trend statistics for many entities: one row per statistic (band order),
/// one column per entity. Undefined values are NaN.
#[derive(Debug, Clone)]
pub struct TrendStack {
    stats: Array2<f64>,
    counts: Array1<usize>,
}

impl TrendStack {
    pub fn entity_count(&self) -> usize {
        self.counts.len()
    }

    /// Valid period count per entity
    pub fn counts(&self) -> ArrayView1<'_, usize> {
        self.counts.view()
    }

    /// One statistic for every entity
    pub fn statistic(&self, stat: TrendStatistic) -> ArrayView1<'_, f64> {
        self.stats.row(stat.band_index())
    }

    /// `(statistic, entity)` matrix in band order
    pub fn as_array(&self) -> &Array2<f64> {
        &self.stats
    }

    /// Statistics of one entity
    pub fn result(&self, entity: usize) -> Option<TrendResult> {
        let n = *self.counts.get(entity)?;
        let col = self.stats.column(entity);
        let get = |stat: TrendStatistic| {
            let v = col[stat.band_index()];
            v.is_finite().then_some(v)
        };
        Some(TrendResult {
            n,
            covariance: get(TrendStatistic::Covariance),
            correlation: get(TrendStatistic::Correlation),
            slope: get(TrendStatistic::Slope),
            intercept: get(TrendStatistic::Intercept),
            t_statistic: get(TrendStatistic::TStatistic),
            standard_error: get(TrendStatistic::StandardError),
            p_value: get(TrendStatistic::PValue),
        })
    }
}

/// Compute OLS trend statistics for every entity.
///
/// # Arguments
/// * `time` - `(entity, period)` time offsets, NaN where invalid
/// * `values` - `(entity, period)` observations, NaN where missing
///
/// # Errors
/// [`Error::SizeMismatch`] when the two matrices differ in shape.
pub fn trend_statistics(
    time: ArrayView2<'_, f64>,
    values: ArrayView2<'_, f64>,
) -> Result<TrendStack> {
    if time.dim() != values.dim() {
        return Err(Error::SizeMismatch {
            what: "trend matrix cells",
            expected: time.len(),
            actual: values.len(),
        });
    }

    let entities = time.nrows();
    let n_blocks = entities.div_ceil(ENTITY_BLOCK);

    let blocks: Vec<(Array2<f64>, Array1<usize>)> = (0..n_blocks)
        .into_par_iter()
        .map(|b| {
            let lo = b * ENTITY_BLOCK;
            let hi = (lo + ENTITY_BLOCK).min(entities);
            block_statistics(time.slice(s![lo..hi, ..]), values.slice(s![lo..hi, ..]))
        })
        .collect();

    if blocks.is_empty() {
        return Ok(TrendStack {
            stats: Array2::zeros((TrendStatistic::ALL.len(), 0)),
            counts: Array1::zeros(0),
        });
    }

    let views: Vec<_> = blocks.iter().map(|(stats, _)| stats.view()).collect();
    let stats = concatenate(Axis(1), &views).map_err(|e| Error::Other(e.to_string()))?;
    let counts: Array1<usize> = blocks
        .iter()
        .flat_map(|(_, counts)| counts.iter().copied())
        .collect();

    Ok(TrendStack { stats, counts })
}

/// Statistics for one block of entities, `(7, entities)`
fn block_statistics(
    time: ArrayView2<'_, f64>,
    values: ArrayView2<'_, f64>,
) -> (Array2<f64>, Array1<usize>) {
    let valid = Zip::from(&time)
        .and(&values)
        .map_collect(|t, v| t.is_finite() && v.is_finite());
    let mask = valid.mapv(|ok| if ok { 1.0 } else { 0.0 });
    let t = Zip::from(&time).and(&valid).map_collect(|&t, &ok| if ok { t } else { 0.0 });
    let v = Zip::from(&values).and(&valid).map_collect(|&v, &ok| if ok { v } else { 0.0 });

    let n = mask.sum_axis(Axis(1));
    let t_mean = t.sum_axis(Axis(1)) / &n;
    let v_mean = v.sum_axis(Axis(1)) / &n;

    let dt = (&t - &t_mean.view().insert_axis(Axis(1))) * &mask;
    let dv = (&v - &v_mean.view().insert_axis(Axis(1))) * &mask;

    let var_t = (&dt * &dt).sum_axis(Axis(1)) / &n;
    let var_v = (&dv * &dv).sum_axis(Axis(1)) / &n;
    let raw_cov = (&dt * &dv).sum_axis(Axis(1)) / &n;

    let enough = n.mapv(|n| n >= MIN_PERIODS as f64);
    let flat_t = Zip::from(&var_t)
        .and(&magnitude(&t))
        .map_collect(|&var, &scale| is_flat(var, scale));
    let flat_v = Zip::from(&var_v)
        .and(&magnitude(&v))
        .map_collect(|&var, &scale| is_flat(var, scale));

    let covariance = Zip::from(&raw_cov)
        .and(&enough)
        .and(&flat_v)
        .map_collect(|&cov, &ok, &flat| match (ok, flat) {
            (false, _) => f64::NAN,
            (true, true) => 0.0,
            (true, false) => cov,
        });

    let slope = Zip::from(&covariance)
        .and(&var_t)
        .and(&flat_t)
        .map_collect(|&cov, &var, &flat| if flat { f64::NAN } else { cov / var });

    let intercept = Zip::from(&v_mean)
        .and(&t_mean)
        .and(&slope)
        .map_collect(|&vm, &tm, &b| vm - tm * b);

    let spread = Zip::from(&var_t).and(&var_v).map_collect(|&a, &b| (a * b).sqrt());
    let correlation = Zip::from(&covariance)
        .and(&spread)
        .and(&flat_t)
        .and(&flat_v)
        .map_collect(|&cov, &sd, &ft, &fv| {
            if ft || fv {
                f64::NAN
            } else {
                snap_perfect(cov / sd)
            }
        });

    let t_statistic = Zip::from(&correlation).and(&n).map_collect(|&r, &n| {
        if r.abs() == 1.0 {
            f64::NAN
        } else {
            r * (n - 2.0).sqrt() / (1.0 - r * r).sqrt()
        }
    });

    let standard_error = &slope / &t_statistic;

    let table = StudentTable::new(&n);
    let p_value = Zip::from(&t_statistic)
        .and(&correlation)
        .and(&n)
        .map_collect(|&t, &r, &n| {
            if r.abs() == 1.0 {
                0.0
            } else if t.is_finite() {
                table.two_tailed(t, n)
            } else {
                f64::NAN
            }
        });

    let mut stats = Array2::from_elem((TrendStatistic::ALL.len(), n.len()), f64::NAN);
    for (stat, column) in [
        (TrendStatistic::Covariance, &covariance),
        (TrendStatistic::Correlation, &correlation),
        (TrendStatistic::Slope, &slope),
        (TrendStatistic::Intercept, &intercept),
        (TrendStatistic::TStatistic, &t_statistic),
        (TrendStatistic::StandardError, &standard_error),
        (TrendStatistic::PValue, &p_value),
    ] {
        stats.row_mut(stat.band_index()).assign(column);
    }

    (stats, n.mapv(|n| n as usize))
}

/// Largest absolute value per entity; masked cells are already zero
fn magnitude(x: &Array2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| row.fold(0.0, |m: f64, &v| m.max(v.abs())))
}

/// Whether a variance is zero up to round-off relative to the series' own scale
fn is_flat(var: f64, scale: f64) -> bool {
    var.sqrt() <= FLAT_TOLERANCE * scale
}

/// Correlations within tolerance of +-1 become exactly +-1
fn snap_perfect(r: f64) -> f64 {
    if r.abs() >= 1.0 - PERFECT_TOLERANCE {
        r.signum()
    } else {
        r
    }
}

/// Student's t distributions indexed by degrees of freedom
struct StudentTable {
    by_df: Vec<Option<StudentsT>>,
}

impl StudentTable {
    fn new(counts: &Array1<f64>) -> Self {
        let max_n = counts
            .iter()
            .copied()
            .filter(|n| n.is_finite())
            .fold(0.0, f64::max) as usize;
        let by_df = (0..max_n.saturating_sub(1))
            .map(|df| {
                if df == 0 {
                    None
                } else {
                    StudentsT::new(0.0, 1.0, df as f64).ok()
                }
            })
            .collect();
        Self { by_df }
    }

    fn two_tailed(&self, t: f64, n: f64) -> f64 {
        let df = (n as usize).saturating_sub(2);
        match self.by_df.get(df).and_then(Option::as_ref) {
            Some(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
            None => f64::NAN,
        }
    }
}
