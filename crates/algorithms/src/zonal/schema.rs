//! Output field schema of zone layers
//!
//! Field names are generated from a closed set of enums rather than from
//! raster band descriptions, so a renamed band can never produce a stray
//! field.

use crate::trend::TrendStatistic;
use greentrend_core::vector::FieldDefn;

/// Temporal observation sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Vegetation greenness
    Ndvi,
    /// Land-surface temperature
    Lst,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Ndvi, Source::Lst];

    /// Upper-case suffix of trend fields (`slopeNDVI`)
    pub fn label(self) -> &'static str {
        match self {
            Source::Ndvi => "NDVI",
            Source::Lst => "LST",
        }
    }

    /// Lower-case prefix of snapshot trend fields (`ndvi_slope`)
    pub fn prefix(self) -> &'static str {
        match self {
            Source::Ndvi => "ndvi",
            Source::Lst => "lst",
        }
    }
}

/// Land-cover classes tallied per zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LandCoverClass {
    Green = 1,
    Water = 2,
    Urban = 3,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; 3] =
        [LandCoverClass::Green, LandCoverClass::Water, LandCoverClass::Urban];

    /// Pixel value of the class in the classification raster
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn field_name(self) -> &'static str {
        match self {
            LandCoverClass::Green => "greenArea",
            LandCoverClass::Water => "waterArea",
            LandCoverClass::Urban => "urbanArea",
        }
    }
}

/// A numeric output field of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneField {
    /// Regression statistic of a zone's median series (`slopeNDVI`)
    Trend(TrendStatistic, Source),
    /// Series value at the reference period (`medNDVI`)
    Median(Source),
    /// Zonal median of one selected band (`medianNDVI`)
    BandMedian(Source),
    /// Zonal median of one band of a trend raster (`ndvi_slope`)
    TrendBandMedian(Source, TrendStatistic),
    /// Area covered by a land-cover class (`greenArea`)
    ClassArea(LandCoverClass),
}

impl ZoneField {
    pub fn name(&self) -> String {
        match *self {
            ZoneField::Trend(stat, source) => format!("{}{}", stat.code(), source.label()),
            ZoneField::Median(source) => format!("med{}", source.label()),
            ZoneField::BandMedian(source) => format!("median{}", source.label()),
            ZoneField::TrendBandMedian(source, stat) => {
                format!("{}_{}", source.prefix(), stat.short_code())
            }
            ZoneField::ClassArea(class) => class.field_name().to_string(),
        }
    }

    pub fn defn(&self) -> FieldDefn {
        FieldDefn::real(self.name())
    }

    /// Fields written by the zonal trend pipeline
    pub fn trend_fields() -> Vec<ZoneField> {
        let mut fields = Vec::new();
        for source in Source::ALL {
            fields.extend(TrendStatistic::ALL.map(|stat| ZoneField::Trend(stat, source)));
            fields.push(ZoneField::Median(source));
        }
        fields.extend(LandCoverClass::ALL.map(ZoneField::ClassArea));
        fields
    }

    /// Fields written by the snapshot pipeline
    pub fn snapshot_fields() -> Vec<ZoneField> {
        let mut fields: Vec<ZoneField> = Source::ALL.map(ZoneField::BandMedian).to_vec();
        fields.extend(LandCoverClass::ALL.map(ZoneField::ClassArea));
        for source in Source::ALL {
            fields.extend(
                TrendStatistic::ALL.map(|stat| ZoneField::TrendBandMedian(source, stat)),
            );
        }
        fields
    }
}
