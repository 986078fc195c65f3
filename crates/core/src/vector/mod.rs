//! Vector features and writable feature layers
//!
//! [`FeatureLayer`] is the seam between the zonal pipeline and whatever
//! vector dataset holds the zones. [`MemoryLayer`] is the in-memory
//! implementation; [`GeoJsonLayer`](crate::io::GeoJsonLayer) persists one to
//! disk.

use crate::error::{Error, Result};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Key representation used for attribute filters.
    ///
    /// Tract GEOIDs and ZCTA codes arrive as strings or integers depending on
    /// the source, so both compare by their text form.
    pub fn as_key(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Int(i) => Some(i.to_string()),
            AttributeValue::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::Bool(_) | AttributeValue::Null => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<Option<f64>> for AttributeValue {
    /// Undefined statistics become `Null`, never zero
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => AttributeValue::Float(v),
            _ => AttributeValue::Null,
        }
    }
}

/// Declared field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Real,
    Integer,
    String,
}

/// A field declaration: name plus type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefn {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDefn {
    pub fn real(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Real,
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Text form of the feature's key attribute
    pub fn key(&self, key_field: &str) -> Option<String> {
        self.get_property(key_field).and_then(AttributeValue::as_key)
    }
}

/// A writable layer of features, as exposed by a vector dataset opened in
/// update mode.
pub trait FeatureLayer {
    /// Declared fields, in declaration order
    fn fields(&self) -> &[FieldDefn];

    /// Declare a new field.
    ///
    /// # Errors
    /// [`Error::FieldExists`] when a field with the same name is declared.
    fn create_field(&mut self, field: FieldDefn) -> Result<()>;

    fn feature_count(&self) -> usize;

    fn feature(&self, index: usize) -> Option<&Feature>;

    /// Set one declared field on one feature
    fn set_field(&mut self, index: usize, name: &str, value: AttributeValue) -> Result<()>;

    /// Commit a modified feature back to the layer
    fn persist(&mut self, index: usize) -> Result<()>;

    /// Flush all persisted features to the backing store
    fn sync(&mut self) -> Result<()>;

    fn has_field(&self, name: &str) -> bool {
        self.fields().iter().any(|f| f.name == name)
    }

    /// Indices of features whose `key_field` equals `key` (attribute filter)
    fn matching(&self, key_field: &str, key: &str) -> Vec<usize> {
        (0..self.feature_count())
            .filter(|&i| {
                self.feature(i)
                    .and_then(|f| f.key(key_field))
                    .is_some_and(|k| k == key)
            })
            .collect()
    }

    /// Distinct key values in first-seen order
    fn keys(&self, key_field: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        (0..self.feature_count())
            .filter_map(|i| self.feature(i).and_then(|f| f.key(key_field)))
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }
}

/// In-memory feature layer
#[derive(Debug, Clone, Default)]
pub struct MemoryLayer {
    fields: Vec<FieldDefn>,
    features: Vec<Feature>,
    dirty: Vec<bool>,
}

impl MemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer over existing features with already-declared fields
    pub fn from_features(fields: Vec<FieldDefn>, features: Vec<Feature>) -> Self {
        let dirty = vec![false; features.len()];
        Self {
            fields,
            features,
            dirty,
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
        self.dirty.push(false);
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.features.len() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "feature index {} out of range ({} features)",
                index,
                self.features.len()
            )))
        }
    }
}

impl FeatureLayer for MemoryLayer {
    fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    fn create_field(&mut self, field: FieldDefn) -> Result<()> {
        if self.has_field(&field.name) {
            return Err(Error::FieldExists { name: field.name });
        }
        self.fields.push(field);
        Ok(())
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    fn set_field(&mut self, index: usize, name: &str, value: AttributeValue) -> Result<()> {
        self.check_index(index)?;
        if !self.has_field(name) {
            return Err(Error::UnknownField { name: name.into() });
        }
        self.features[index].set_property(name, value);
        Ok(())
    }

    fn persist(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.dirty[index] = true;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let persisted = self.dirty.iter().filter(|&&d| d).count();
        tracing::debug!("Synced {} persisted features", persisted);
        self.dirty.iter_mut().for_each(|d| *d = false);
        Ok(())
    }
}
