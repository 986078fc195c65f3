//! Zone dissolution: all features sharing a key become one multipolygon

use geo::{BooleanOps, Geometry, MultiPolygon};
use greentrend_core::vector::FeatureLayer;
use greentrend_core::{Error, Result};

/// Union the polygons of every feature whose `key_field` equals `key`.
///
/// # Errors
/// [`Error::Geometry`] when no feature matches or none of the matches carries
/// polygonal geometry.
pub fn dissolve<L>(layer: &L, key_field: &str, key: &str) -> Result<MultiPolygon<f64>>
where
    L: FeatureLayer + ?Sized,
{
    let matches = layer.matching(key_field, key);
    if matches.is_empty() {
        return Err(Error::geometry(
            key,
            format!("no feature matches {} = {}", key_field, key),
        ));
    }

    let parts: Vec<MultiPolygon<f64>> = matches
        .iter()
        .filter_map(|&i| layer.feature(i))
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(polygonal)
        .filter(|mp| !mp.0.is_empty())
        .collect();

    let mut parts = parts.into_iter();
    let Some(first) = parts.next() else {
        return Err(Error::geometry(key, "matching features carry no polygon geometry"));
    };

    Ok(parts.fold(first, |acc, part| acc.union(&part)))
}

/// Polygonal content of a geometry, if any
fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polys: Vec<_> = gc
                .iter()
                .filter_map(polygonal)
                .flat_map(|mp| mp.0)
                .collect();
            (!polys.is_empty()).then(|| MultiPolygon::new(polys))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{point, polygon, Area};
    use greentrend_core::vector::{AttributeValue, Feature, MemoryLayer};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ])
    }

    fn zcta(code: i64, geometry: Geometry<f64>) -> Feature {
        Feature::new(geometry).with_property("zcta", AttributeValue::Int(code))
    }

    #[test]
    fn test_dissolve_overlapping_parts() {
        let mut layer = MemoryLayer::new();
        layer.push(zcta(94110, square(0.0, 0.0, 10.0)));
        layer.push(zcta(94110, square(5.0, 0.0, 10.0)));
        layer.push(zcta(94112, square(50.0, 50.0, 1.0)));

        let zone = dissolve(&layer, "zcta", "94110").unwrap();
        assert_relative_eq!(zone.unsigned_area(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dissolve_disjoint_parts_stay_multipart() {
        let mut layer = MemoryLayer::new();
        layer.push(zcta(1, square(0.0, 0.0, 1.0)));
        layer.push(zcta(1, square(5.0, 5.0, 1.0)));

        let zone = dissolve(&layer, "zcta", "1").unwrap();
        assert_eq!(zone.0.len(), 2);
        assert_relative_eq!(zone.unsigned_area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dissolve_no_match() {
        let layer = MemoryLayer::new();
        let err = dissolve(&layer, "zcta", "99999").unwrap_err();
        assert!(err.is_zone_local());
    }

    #[test]
    fn test_dissolve_point_only() {
        let mut layer = MemoryLayer::new();
        layer.push(zcta(7, Geometry::Point(point!(x: 1.0, y: 1.0))));
        assert!(matches!(
            dissolve(&layer, "zcta", "7"),
            Err(Error::Geometry { .. })
        ));
    }
}
