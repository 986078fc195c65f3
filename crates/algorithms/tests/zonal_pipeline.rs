//! Zonal pipelines over small synthetic zones.
//!
//! All rasters share a 10x10 grid of 5 m cells with the upper-left corner at
//! (0, 50). Zone "west" covers columns 0..5, zone "east" columns 5..10.

use approx::assert_relative_eq;
use geo::{polygon, Geometry};
use greentrend_algorithms::trend::{raster_trend, TimeBasis};
use greentrend_algorithms::zonal::{
    extract_zone, zonal_snapshot, zonal_trends, SnapshotInputs, SnapshotParams, ZonalInputs,
    ZonalTrendParams,
};
use greentrend_core::io::GeoJsonLayer;
use greentrend_core::raster::{GeoTransform, Raster, RasterStack};
use greentrend_core::vector::{AttributeValue, Feature, FeatureLayer, MemoryLayer};
use ndarray::Array3;
use std::io::Write;

const PERIODS: usize = 5;

fn grid() -> GeoTransform {
    GeoTransform::new(0.0, 50.0, 5.0, -5.0)
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x1, y: y1),
        (x: x0, y: y1),
        (x: x0, y: y0),
    ])
}

fn zone(code: i64, geometry: Geometry<f64>) -> Feature {
    Feature::new(geometry).with_property("zcta", AttributeValue::Int(code))
}

fn zones() -> MemoryLayer {
    let mut layer = MemoryLayer::new();
    layer.push(zone(94110, rect(0.0, 0.0, 25.0, 50.0)));
    layer.push(zone(94112, rect(25.0, 0.0, 50.0, 50.0)));
    layer.push(zone(99999, rect(500.0, 500.0, 510.0, 510.0)));
    layer
}

/// NDVI rises by 0.01 per period in the west and falls by 0.02 in the east
fn ndvi() -> RasterStack {
    let data = Array3::from_shape_fn((PERIODS, 10, 10), |(b, _, c)| {
        if c < 5 {
            0.2 + 0.01 * b as f64
        } else {
            0.5 - 0.02 * b as f64
        }
    });
    let mut stack = RasterStack::from_array(data).with_transform(grid());
    stack.set_all_nodata(Some(-9999.0));
    stack
}

/// LST warms by 0.1 per period everywhere
fn lst() -> RasterStack {
    let data = Array3::from_shape_fn((PERIODS, 10, 10), |(b, _, _)| 30.0 + 0.1 * b as f64);
    RasterStack::from_array(data).with_transform(grid())
}

/// Four green pixels in the west, two urban pixels in the east
fn classes() -> Raster<i32> {
    let mut classes: Raster<i32> = Raster::new(10, 10);
    classes.set_transform(grid());
    for (r, c) in [(0, 0), (2, 3), (6, 1), (9, 4)] {
        classes.set(r, c, 1).unwrap();
    }
    for (r, c) in [(4, 7), (8, 9)] {
        classes.set(r, c, 3).unwrap();
    }
    classes
}

fn params() -> ZonalTrendParams {
    ZonalTrendParams {
        key_field: "zcta".into(),
        start_year: 2000,
        end_year: 2004,
        step: 1,
        reference_band: 2,
    }
}

fn float(feature: &Feature, name: &str) -> f64 {
    match feature.get_property(name) {
        Some(AttributeValue::Float(v)) => *v,
        other => panic!("{} is {:?}", name, other),
    }
}

// ---------------------------------------------------------------------------
// Zonal trends
// ---------------------------------------------------------------------------

#[test]
fn zonal_trends_writes_every_zone() {
    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };
    let mut layer = zones();

    let report = zonal_trends(&mut layer, &inputs, &params()).unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "99999");

    let west = layer.feature(0).unwrap();
    assert_relative_eq!(float(west, "slopeNDVI"), 0.01, epsilon = 1e-9);
    assert_relative_eq!(float(west, "intNDVI"), 0.2, epsilon = 1e-9);
    assert_eq!(float(west, "corrNDVI"), 1.0);
    assert_eq!(float(west, "pvalNDVI"), 0.0);
    assert_eq!(west.get_property("tstatNDVI"), Some(&AttributeValue::Null));
    assert_eq!(west.get_property("stderrNDVI"), Some(&AttributeValue::Null));
    assert_relative_eq!(float(west, "medNDVI"), 0.22, epsilon = 1e-12);
    assert_relative_eq!(float(west, "slopeLST"), 0.1, epsilon = 1e-9);
    assert_relative_eq!(float(west, "greenArea"), 100.0);
    assert_eq!(float(west, "urbanArea"), 0.0);

    let east = layer.feature(1).unwrap();
    assert_relative_eq!(float(east, "slopeNDVI"), -0.02, epsilon = 1e-9);
    assert_eq!(float(east, "corrNDVI"), -1.0);
    assert_relative_eq!(float(east, "urbanArea"), 50.0);
    assert_eq!(float(east, "greenArea"), 0.0);

    assert_eq!(layer.feature(2).unwrap().get_property("slopeNDVI"), None);
}

#[test]
fn zonal_trends_is_idempotent() {
    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };
    let mut layer = zones();

    zonal_trends(&mut layer, &inputs, &params()).unwrap();
    let first: Vec<_> = layer.features().iter().map(|f| f.properties.clone()).collect();
    let fields = layer.fields().len();

    zonal_trends(&mut layer, &inputs, &params()).unwrap();
    let second: Vec<_> = layer.features().iter().map(|f| f.properties.clone()).collect();

    assert_eq!(first, second);
    assert_eq!(layer.fields().len(), fields);
    assert_eq!(layer.feature_count(), 3);
}

#[test]
fn multipart_zone_is_dissolved() {
    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };
    let mut layer = MemoryLayer::new();
    layer.push(zone(1, rect(0.0, 25.0, 25.0, 50.0)));
    layer.push(zone(1, rect(0.0, 0.0, 25.0, 25.0)));

    let report = zonal_trends(&mut layer, &inputs, &params()).unwrap();
    assert_eq!(report.written, 1);

    // both parts receive the values of the whole west half
    for i in 0..2 {
        assert_relative_eq!(float(layer.feature(i).unwrap(), "greenArea"), 100.0);
    }
}

#[test]
fn overlapping_zones_share_pixels() {
    // Only pixel (0, 4) carries data
    let mut data = Array3::from_elem((PERIODS, 10, 10), -9999.0);
    for b in 0..PERIODS {
        data[[b, 0, 4]] = 0.7;
    }
    let mut ndvi = RasterStack::from_array(data).with_transform(grid());
    ndvi.set_all_nodata(Some(-9999.0));
    let (lst, classes) = (lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };

    let mut layer = MemoryLayer::new();
    layer.push(zone(1, rect(15.0, 40.0, 25.0, 50.0)));
    layer.push(zone(2, rect(20.0, 45.0, 30.0, 50.0)));

    for key in ["1", "2"] {
        let series = extract_zone(&layer, "zcta", key, &inputs).unwrap();
        assert!(series.ndvi.iter().all(|&v| v == 0.7), "zone {}", key);
    }
}

#[test]
fn band_count_must_match_time_basis() {
    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };
    let mut layer = zones();
    let params = ZonalTrendParams {
        end_year: 2010,
        ..params()
    };
    assert!(zonal_trends(&mut layer, &inputs, &params).is_err());
}

const ZCTAS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "id": 1,
         "properties": {"zcta": 94110},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[0,0],[25,0],[25,50],[0,50],[0,0]]]}},
        {"type": "Feature", "id": 2,
         "properties": {"zcta": 94112},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[25,0],[50,0],[50,50],[25,50],[25,0]]]}}
    ]
}"#;

fn field_names(layer: &GeoJsonLayer) -> Vec<String> {
    let mut names: Vec<String> = layer.fields().iter().map(|f| f.name.clone()).collect();
    names.sort();
    names
}

#[test]
fn zonal_trends_rerun_on_reopened_geojson() {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".geojson").unwrap();
    tmp.write_all(ZCTAS.as_bytes()).unwrap();

    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let inputs = ZonalInputs {
        ndvi: &ndvi,
        lst: &lst,
        classes: &classes,
    };

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut layer = GeoJsonLayer::open(tmp.path()).unwrap();
        let report = zonal_trends(&mut layer, &inputs, &params()).unwrap();
        assert_eq!(report.written, 2);
        drop(layer);

        let reopened = GeoJsonLayer::open(tmp.path()).unwrap();
        let properties: Vec<_> = reopened
            .layer()
            .features()
            .iter()
            .map(|f| f.properties.clone())
            .collect();
        runs.push((field_names(&reopened), properties, reopened.feature_count()));
    }

    assert_eq!(runs[0], runs[1]);
    let (fields, properties, count) = &runs[1];
    assert_eq!(*count, 2);
    assert_eq!(fields.len(), 1 + 19);
    assert_relative_eq!(
        properties[0]["slopeNDVI"].as_f64().unwrap(),
        0.01,
        epsilon = 1e-9
    );
    assert_eq!(properties[0]["tstatNDVI"], AttributeValue::Null);
}

// ---------------------------------------------------------------------------
// Snapshot on a GeoJSON layer
// ---------------------------------------------------------------------------

const TRACTS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "properties": {"GEOID": "06075010100"},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[0,0],[25,0],[25,50],[0,50],[0,0]]]}},
        {"type": "Feature",
         "properties": {"GEOID": "06075010200"},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[25,0],[50,0],[50,50],[25,50],[25,0]]]}}
    ]
}"#;

#[test]
fn snapshot_on_geojson_layer() {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".geojson").unwrap();
    tmp.write_all(TRACTS.as_bytes()).unwrap();

    let (ndvi, lst, classes) = (ndvi(), lst(), classes());
    let basis = TimeBasis::new(2000, 2004, 1).unwrap();
    let ndvi_trend = raster_trend(&ndvi, &basis).unwrap();
    let lst_trend = raster_trend(&lst, &basis).unwrap();
    let inputs = SnapshotInputs {
        zonal: ZonalInputs {
            ndvi: &ndvi,
            lst: &lst,
            classes: &classes,
        },
        ndvi_trend: &ndvi_trend,
        lst_trend: &lst_trend,
    };
    let params = SnapshotParams {
        key_field: "GEOID".into(),
        band: 1,
    };

    let mut layer = GeoJsonLayer::open(tmp.path()).unwrap();
    let report = zonal_snapshot(&mut layer, &inputs, &params).unwrap();
    assert_eq!(report.written, 2);
    assert!(report.skipped.is_empty());
    drop(layer);

    let reopened = GeoJsonLayer::open(tmp.path()).unwrap();
    let west = reopened.feature(0).unwrap();
    assert_relative_eq!(float(west, "medianNDVI"), 0.21, epsilon = 1e-12);
    assert_relative_eq!(float(west, "medianLST"), 30.1, epsilon = 1e-12);
    assert_relative_eq!(float(west, "ndvi_slope"), 0.01, epsilon = 1e-9);
    assert_eq!(float(west, "ndvi_corre"), 1.0);
    assert_eq!(west.get_property("ndvi_tstat"), Some(&AttributeValue::Null));
    assert_relative_eq!(float(west, "lst_slope"), 0.1, epsilon = 1e-9);
    assert_relative_eq!(float(west, "greenArea"), 100.0);

    let east = reopened.feature(1).unwrap();
    assert_relative_eq!(float(east, "ndvi_slope"), -0.02, epsilon = 1e-9);
    assert_relative_eq!(float(east, "urbanArea"), 50.0);
}
