//! Batch pipelines over the zones of a feature layer
//!
//! Zones are extracted one at a time. A zone that cannot be extracted or
//! written is recorded in [`BatchReport::skipped`] and the batch goes on;
//! only problems with the inputs themselves abort the batch.

use super::dissolve::dissolve;
use super::extract::{
    class_area_tally, masked_band_median, masked_medians, trend_band_medians, ClassAreaTally,
};
use super::mask::{touched_mask, ZoneMask};
use super::schema::{LandCoverClass, Source, ZoneField};
use super::writer::{AttributeWriter, FieldValues};
use crate::trend::{trend_statistics, TimeBasis, TrendResult, TrendStatistic};
use geo::MultiPolygon;
use greentrend_core::raster::{GeoTransform, Raster, RasterStack};
use greentrend_core::vector::{AttributeValue, FeatureLayer, FieldDefn};
use greentrend_core::{Error, Result};
use ndarray::{Array1, Array2};

/// Parameters for per-zone trend statistics
#[derive(Debug, Clone)]
pub struct ZonalTrendParams {
    /// Attribute identifying a zone
    pub key_field: String,
    /// First year of the series
    pub start_year: i32,
    /// Last year of the series (inclusive)
    pub end_year: i32,
    /// Years per period
    pub step: u32,
    /// Period reported in the `med{SOURCE}` fields (0-based)
    pub reference_band: usize,
}

impl Default for ZonalTrendParams {
    fn default() -> Self {
        Self {
            key_field: "zcta".into(),
            start_year: 1990,
            end_year: 2019,
            step: 1,
            reference_band: 0,
        }
    }
}

/// Parameters for per-zone snapshot statistics
#[derive(Debug, Clone)]
pub struct SnapshotParams {
    /// Attribute identifying a zone
    pub key_field: String,
    /// Band of the observation stacks reported in `median{SOURCE}` (0-based)
    pub band: usize,
}

impl Default for SnapshotParams {
    fn default() -> Self {
        Self {
            key_field: "GEOID".into(),
            band: 0,
        }
    }
}

/// Rasters shared by every zone of a batch
#[derive(Debug, Clone, Copy)]
pub struct ZonalInputs<'a> {
    pub ndvi: &'a RasterStack,
    pub lst: &'a RasterStack,
    pub classes: &'a Raster<i32>,
}

impl<'a> ZonalInputs<'a> {
    pub fn stack(&self, source: Source) -> &'a RasterStack {
        match source {
            Source::Ndvi => self.ndvi,
            Source::Lst => self.lst,
        }
    }
}

/// Snapshot inputs: observation stacks plus precomputed trend rasters
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInputs<'a> {
    pub zonal: ZonalInputs<'a>,
    pub ndvi_trend: &'a RasterStack,
    pub lst_trend: &'a RasterStack,
}

impl<'a> SnapshotInputs<'a> {
    pub fn trend(&self, source: Source) -> &'a RasterStack {
        match source {
            Source::Ndvi => self.ndvi_trend,
            Source::Lst => self.lst_trend,
        }
    }
}

/// A zone left out of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedZone {
    pub key: String,
    pub reason: String,
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Zones whose fields were written
    pub written: usize,
    pub skipped: Vec<SkippedZone>,
}

impl BatchReport {
    fn skip(&mut self, key: &str, error: &Error) {
        tracing::warn!("Skipping zone {}: {}", key, error);
        self.skipped.push(SkippedZone {
            key: key.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Trend of one source for one zone, with the reference-period value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSummary {
    pub trend: TrendResult,
    pub reference_median: f64,
}

/// Median series and class areas extracted for one zone
#[derive(Debug, Clone)]
pub struct ZoneSeries {
    pub key: String,
    pub ndvi: Array1<f64>,
    pub lst: Array1<f64>,
    pub areas: ClassAreaTally,
}

impl ZoneSeries {
    pub fn series(&self, source: Source) -> &Array1<f64> {
        match source {
            Source::Ndvi => &self.ndvi,
            Source::Lst => &self.lst,
        }
    }
}

/// Zone masks on each distinct grid of the inputs
struct GridMasks {
    zone: MultiPolygon<f64>,
    key: String,
    cached: Vec<(GeoTransform, (usize, usize), ZoneMask)>,
}

impl GridMasks {
    fn new(zone: MultiPolygon<f64>, key: &str) -> Self {
        Self {
            zone,
            key: key.to_string(),
            cached: Vec::new(),
        }
    }

    fn on(&mut self, transform: &GeoTransform, rows: usize, cols: usize) -> Result<&ZoneMask> {
        let pos = self
            .cached
            .iter()
            .position(|(t, shape, _)| t == transform && *shape == (rows, cols));
        let pos = match pos {
            Some(pos) => pos,
            None => {
                let mask = touched_mask(&self.zone, transform, rows, cols, &self.key)?;
                self.cached.push((*transform, (rows, cols), mask));
                self.cached.len() - 1
            }
        };
        Ok(&self.cached[pos].2)
    }

    fn on_stack(&mut self, stack: &RasterStack) -> Result<&ZoneMask> {
        self.on(stack.transform(), stack.rows(), stack.cols())
    }

    fn on_raster(&mut self, raster: &Raster<i32>) -> Result<&ZoneMask> {
        self.on(raster.transform(), raster.rows(), raster.cols())
    }
}

/// Dissolve, mask and reduce one zone
pub fn extract_zone<L>(
    layer: &L,
    key_field: &str,
    key: &str,
    inputs: &ZonalInputs<'_>,
) -> Result<ZoneSeries>
where
    L: FeatureLayer + ?Sized,
{
    let mut masks = GridMasks::new(dissolve(layer, key_field, key)?, key);
    let ndvi = masked_medians(inputs.ndvi, masks.on_stack(inputs.ndvi)?);
    let lst = masked_medians(inputs.lst, masks.on_stack(inputs.lst)?);
    let areas = class_area_tally(inputs.classes, masks.on_raster(inputs.classes)?)?;

    Ok(ZoneSeries {
        key: key.to_string(),
        ndvi,
        lst,
        areas,
    })
}

/// Per-zone OLS trends of the NDVI and LST median series.
///
/// For every distinct key in `params.key_field`: dissolve the zone, take the
/// median of each period over its pixels, fit a trend per source over the
/// time basis, and write `{stat}{SOURCE}`, `med{SOURCE}` and the class areas
/// onto every feature of the zone. The layer is synced at the end.
///
/// # Errors
/// Batch-fatal problems only: a stack whose band count differs from the
/// time basis, a reference band out of range, or a failing layer.
pub fn zonal_trends<L>(
    layer: &mut L,
    inputs: &ZonalInputs<'_>,
    params: &ZonalTrendParams,
) -> Result<BatchReport>
where
    L: FeatureLayer + ?Sized,
{
    let basis = TimeBasis::new(params.start_year, params.end_year, params.step)?;
    for source in Source::ALL {
        let bands = inputs.stack(source).band_count();
        if bands != basis.len() {
            return Err(Error::SizeMismatch {
                what: "time basis periods",
                expected: basis.len(),
                actual: bands,
            });
        }
    }
    if params.reference_band >= basis.len() {
        return Err(Error::InvalidParameter {
            name: "reference_band",
            value: params.reference_band.to_string(),
            reason: format!("stacks have {} bands", basis.len()),
        });
    }

    let mut report = BatchReport::default();
    let mut writer = AttributeWriter::new(layer, params.key_field.as_str());
    let fields: Vec<FieldDefn> = ZoneField::trend_fields().iter().map(ZoneField::defn).collect();
    writer.ensure_fields(&fields)?;

    let keys = writer.layer().keys(writer.key_field());
    tracing::info!("Extracting {} zones", keys.len());

    let mut zones = Vec::with_capacity(keys.len());
    for key in &keys {
        match extract_zone(writer.layer(), writer.key_field(), key, inputs) {
            Ok(series) => zones.push(series),
            Err(e) => report.skip(key, &e),
        }
    }

    let mut summaries: Vec<Vec<(Source, SourceSummary)>> = vec![Vec::new(); zones.len()];
    for source in Source::ALL {
        let mut values = Array2::from_elem((zones.len(), basis.len()), f64::NAN);
        for (mut row, zone) in values.rows_mut().into_iter().zip(&zones) {
            row.assign(zone.series(source));
        }
        let time = basis.paired(values.view())?;
        let trend = trend_statistics(time.view(), values.view())?;

        for (i, zone) in zones.iter().enumerate() {
            if let Some(result) = trend.result(i) {
                summaries[i].push((
                    source,
                    SourceSummary {
                        trend: result,
                        reference_median: zone.series(source)[params.reference_band],
                    },
                ));
            }
        }
    }

    for (zone, summary) in zones.iter().zip(&summaries) {
        let values = trend_values(summary, &zone.areas);
        match writer.write(&zone.key, &values) {
            Ok(_) => report.written += 1,
            Err(e) if e.is_zone_local() => report.skip(&zone.key, &e),
            Err(e) => return Err(e),
        }
    }

    writer.finish()?;
    tracing::info!(
        "Wrote {} zones, skipped {}",
        report.written,
        report.skipped.len()
    );
    Ok(report)
}

/// Per-zone snapshot statistics.
///
/// For every distinct key: the median of `params.band` of the NDVI and LST
/// stacks (`median{SOURCE}`), the class areas, and the median of every band
/// of the NDVI and LST trend rasters (`{source}_{stat}`). Trend raster bands
/// follow the fixed trend band order.
pub fn zonal_snapshot<L>(
    layer: &mut L,
    inputs: &SnapshotInputs<'_>,
    params: &SnapshotParams,
) -> Result<BatchReport>
where
    L: FeatureLayer + ?Sized,
{
    for source in Source::ALL {
        let bands = inputs.zonal.stack(source).band_count();
        if params.band >= bands {
            return Err(Error::InvalidParameter {
                name: "band",
                value: params.band.to_string(),
                reason: format!("{} stack has {} bands", source.label(), bands),
            });
        }
        let trend_bands = inputs.trend(source).band_count();
        if trend_bands != TrendStatistic::ALL.len() {
            return Err(Error::SizeMismatch {
                what: "trend raster bands",
                expected: TrendStatistic::ALL.len(),
                actual: trend_bands,
            });
        }
    }

    let mut report = BatchReport::default();
    let mut writer = AttributeWriter::new(layer, params.key_field.as_str());
    let fields: Vec<FieldDefn> = ZoneField::snapshot_fields()
        .iter()
        .map(ZoneField::defn)
        .collect();
    writer.ensure_fields(&fields)?;

    let keys = writer.layer().keys(writer.key_field());
    tracing::info!("Summarizing {} zones", keys.len());

    let mut rows = Vec::with_capacity(keys.len());
    for key in &keys {
        match snapshot_zone(writer.layer(), writer.key_field(), key, inputs, params.band) {
            Ok(values) => rows.push((key, values)),
            Err(e) => report.skip(key, &e),
        }
    }

    for (key, values) in rows {
        match writer.write(key, &values) {
            Ok(_) => report.written += 1,
            Err(e) if e.is_zone_local() => report.skip(key, &e),
            Err(e) => return Err(e),
        }
    }

    writer.finish()?;
    tracing::info!(
        "Wrote {} zones, skipped {}",
        report.written,
        report.skipped.len()
    );
    Ok(report)
}

fn snapshot_zone<L>(
    layer: &L,
    key_field: &str,
    key: &str,
    inputs: &SnapshotInputs<'_>,
    band: usize,
) -> Result<FieldValues>
where
    L: FeatureLayer + ?Sized,
{
    let mut masks = GridMasks::new(dissolve(layer, key_field, key)?, key);
    let mut values = FieldValues::new();

    for source in Source::ALL {
        let stack = inputs.zonal.stack(source);
        let median = masked_band_median(stack, band, masks.on_stack(stack)?)?;
        values.push((ZoneField::BandMedian(source).name(), Some(median).into()));
    }

    let areas = class_area_tally(inputs.zonal.classes, masks.on_raster(inputs.zonal.classes)?)?;
    values.extend(area_values(&areas));

    for source in Source::ALL {
        let trend = inputs.trend(source);
        let medians = trend_band_medians(trend, masks.on_stack(trend)?);
        for stat in TrendStatistic::ALL {
            values.push((
                ZoneField::TrendBandMedian(source, stat).name(),
                Some(medians[stat.band_index()]).into(),
            ));
        }
    }

    Ok(values)
}

fn trend_values(summary: &[(Source, SourceSummary)], areas: &ClassAreaTally) -> FieldValues {
    let mut values = FieldValues::new();
    for (source, s) in summary {
        for stat in TrendStatistic::ALL {
            values.push((ZoneField::Trend(stat, *source).name(), s.trend.get(stat).into()));
        }
        values.push((
            ZoneField::Median(*source).name(),
            Some(s.reference_median).into(),
        ));
    }
    values.extend(area_values(areas));
    values
}

fn area_values(areas: &ClassAreaTally) -> impl Iterator<Item = (String, AttributeValue)> + '_ {
    LandCoverClass::ALL
        .into_iter()
        .map(move |class| {
            (
                ZoneField::ClassArea(class).name(),
                AttributeValue::Float(areas.area(class)),
            )
        })
}
