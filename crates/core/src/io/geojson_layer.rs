//! GeoJSON-backed feature layer
//!
//! Loads a `FeatureCollection` into a [`MemoryLayer`] and writes it back on
//! [`FeatureLayer::sync`]. Fields are inferred from the properties present on
//! the features, so fields written by an earlier run count as declared.
//!
//! Only the attributes set through the layer are re-encoded on write. Feature
//! ids, bounding boxes, foreign members and nested (array or object)
//! properties are carried through verbatim, as are scalar properties whose
//! value did not change.

use crate::error::{require_file, Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureLayer, FieldDefn, FieldType, MemoryLayer};
use geojson::feature::Id;
use geojson::{Bbox, FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::path::{Path, PathBuf};

/// Members of a source feature that the attribute model does not hold
#[derive(Debug, Clone, Default)]
struct SourceFeature {
    id: Option<Id>,
    bbox: Option<Bbox>,
    foreign_members: Option<JsonObject>,
    properties: JsonObject,
}

/// Feature layer persisted as a GeoJSON file
#[derive(Debug)]
pub struct GeoJsonLayer {
    path: PathBuf,
    layer: MemoryLayer,
    sources: Vec<SourceFeature>,
    bbox: Option<Bbox>,
    foreign_members: Option<JsonObject>,
}

impl GeoJsonLayer {
    /// Open an existing GeoJSON `FeatureCollection` for update
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        require_file(path)?;

        let text = fs::read_to_string(path)?;
        let collection = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(Error::GeoJson(format!(
                    "{} is not a FeatureCollection",
                    path.display()
                )))
            }
        };

        let mut fields: Vec<FieldDefn> = Vec::new();
        let mut features = Vec::with_capacity(collection.features.len());
        let mut sources = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let geometry = match feature.geometry {
                Some(g) => Some(geo::Geometry::<f64>::try_from(g)?),
                None => None,
            };

            let mut out = Feature {
                geometry,
                properties: Default::default(),
            };
            let properties = feature.properties.unwrap_or_default();
            for (name, value) in &properties {
                let value = json_to_attribute(value);
                if !fields.iter().any(|f| &f.name == name) {
                    fields.push(FieldDefn {
                        name: name.clone(),
                        field_type: value.as_ref().map_or(FieldType::String, infer_type),
                    });
                }
                if let Some(value) = value {
                    out.set_property(name.clone(), value);
                }
            }
            features.push(out);
            sources.push(SourceFeature {
                id: feature.id,
                bbox: feature.bbox,
                foreign_members: feature.foreign_members,
                properties,
            });
        }

        tracing::debug!(
            "Opened {} ({} features, {} fields)",
            path.display(),
            features.len(),
            fields.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            layer: MemoryLayer::from_features(fields, features),
            sources,
            bbox: collection.bbox,
            foreign_members: collection.foreign_members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layer(&self) -> &MemoryLayer {
        &self.layer
    }

    fn to_collection(&self) -> FeatureCollection {
        let features = self
            .layer
            .features()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let source = self.sources.get(i).cloned().unwrap_or_default();
                geojson::Feature {
                    bbox: source.bbox,
                    geometry: f
                        .geometry
                        .as_ref()
                        .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                    id: source.id,
                    properties: Some(merge_properties(source.properties, f)),
                    foreign_members: source.foreign_members,
                }
            })
            .collect();

        FeatureCollection {
            bbox: self.bbox.clone(),
            features,
            foreign_members: self.foreign_members.clone(),
        }
    }
}

impl FeatureLayer for GeoJsonLayer {
    fn fields(&self) -> &[FieldDefn] {
        self.layer.fields()
    }

    fn create_field(&mut self, field: FieldDefn) -> Result<()> {
        self.layer.create_field(field)
    }

    fn feature_count(&self) -> usize {
        self.layer.feature_count()
    }

    fn feature(&self, index: usize) -> Option<&Feature> {
        self.layer.feature(index)
    }

    fn set_field(&mut self, index: usize, name: &str, value: AttributeValue) -> Result<()> {
        self.layer.set_field(index, name, value)
    }

    fn persist(&mut self, index: usize) -> Result<()> {
        self.layer.persist(index)
    }

    fn sync(&mut self) -> Result<()> {
        let text = GeoJson::FeatureCollection(self.to_collection()).to_string();
        fs::write(&self.path, text)?;
        self.layer.sync()
    }
}

fn infer_type(value: &AttributeValue) -> FieldType {
    match value {
        AttributeValue::Int(_) | AttributeValue::Bool(_) => FieldType::Integer,
        AttributeValue::String(_) => FieldType::String,
        AttributeValue::Float(_) | AttributeValue::Null => FieldType::Real,
    }
}

/// Overlay the feature's attributes on its source properties, keeping the
/// source text of every value the layer did not change
fn merge_properties(mut properties: JsonObject, feature: &Feature) -> JsonObject {
    for (name, value) in &feature.properties {
        let unchanged = properties
            .get(name)
            .and_then(json_to_attribute)
            .is_some_and(|old| old == *value);
        if !unchanged {
            properties.insert(name.clone(), attribute_to_json(value));
        }
    }
    properties
}

/// Scalar JSON values as attributes; arrays and objects have no attribute form
fn json_to_attribute(value: &JsonValue) -> Option<AttributeValue> {
    let value = match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        JsonValue::String(s) => AttributeValue::String(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => return None,
    };
    Some(value)
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "properties": {"GEOID": "06075010100", "ALAND": 12345},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature",
             "properties": {"GEOID": "06075010200", "ALAND": 678},
             "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
        ]
    }"#;

    fn write_tracts() -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(TRACTS.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn test_open_infers_fields() {
        let tmp = write_tracts();
        let layer = GeoJsonLayer::open(tmp.path()).unwrap();

        assert_eq!(layer.feature_count(), 2);
        assert!(layer.has_field("GEOID"));
        assert!(layer.has_field("ALAND"));
        assert_eq!(layer.matching("GEOID", "06075010200"), vec![1]);
    }

    #[test]
    fn test_sync_persists_new_fields() {
        let tmp = write_tracts();
        {
            let mut layer = GeoJsonLayer::open(tmp.path()).unwrap();
            layer.create_field(FieldDefn::real("greenArea")).unwrap();
            layer.set_field(0, "greenArea", AttributeValue::Float(100.0)).unwrap();
            layer.persist(0).unwrap();
            layer.sync().unwrap();
        }

        let mut reopened = GeoJsonLayer::open(tmp.path()).unwrap();
        assert!(reopened.has_field("greenArea"));
        assert_eq!(
            reopened.feature(0).unwrap().get_property("greenArea"),
            Some(&AttributeValue::Float(100.0))
        );
        assert!(reopened.create_field(FieldDefn::real("greenArea")).is_err());
    }

    #[test]
    fn test_sync_keeps_source_members() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(
            br#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "id": "tract-1", "bbox": [0, 0, 1, 1],
                     "source": "census",
                     "properties": {"GEOID": "A", "tags": [1, 2], "meta": {"year": 2010},
                                    "ALAND": 18446744073709551615},
                     "geometry": {"type": "Polygon",
                                  "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}
                ]
            }"#,
        )
        .unwrap();

        {
            let mut layer = GeoJsonLayer::open(tmp.path()).unwrap();
            assert!(layer.has_field("tags"));
            layer.create_field(FieldDefn::real("greenArea")).unwrap();
            layer.set_field(0, "greenArea", AttributeValue::Float(25.0)).unwrap();
            layer.persist(0).unwrap();
            layer.sync().unwrap();
        }

        let text = std::fs::read_to_string(tmp.path()).unwrap();
        let fc = match text.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(fc) => fc,
            other => panic!("unexpected {:?}", other),
        };
        let feature = &fc.features[0];
        assert_eq!(feature.id, Some(Id::String("tract-1".into())));
        assert_eq!(feature.bbox, Some(vec![0.0, 0.0, 1.0, 1.0]));
        assert_eq!(
            feature.foreign_members.as_ref().unwrap().get("source"),
            Some(&JsonValue::from("census"))
        );

        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props.get("tags"), Some(&serde_json::json!([1, 2])));
        assert_eq!(props.get("meta"), Some(&serde_json::json!({"year": 2010})));
        assert_eq!(props.get("ALAND"), Some(&serde_json::json!(u64::MAX)));
        assert_eq!(props.get("GEOID"), Some(&JsonValue::from("A")));
        assert_eq!(props.get("greenArea"), Some(&JsonValue::from(25.0)));
    }

    #[test]
    fn test_open_missing_file() {
        let err = GeoJsonLayer::open("/no/such/tracts.geojson").unwrap_err();
        assert!(matches!(err, Error::MissingFile { .. }));
    }
}
