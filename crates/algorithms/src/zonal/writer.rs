//! Feature attribute writer
//!
//! Applies per-zone values to every feature sharing the zone key. Writes are
//! idempotent: fields that already exist are reused and re-running a write
//! overwrites the previous values.

use greentrend_core::vector::{AttributeValue, FeatureLayer, FieldDefn};
use greentrend_core::{Error, Result};

/// Field name and value pairs for one zone
pub type FieldValues = Vec<(String, AttributeValue)>;

/// Writes zone attributes onto a feature layer
pub struct AttributeWriter<'a, L: FeatureLayer + ?Sized> {
    layer: &'a mut L,
    key_field: String,
}

impl<'a, L: FeatureLayer + ?Sized> AttributeWriter<'a, L> {
    pub fn new(layer: &'a mut L, key_field: impl Into<String>) -> Self {
        Self {
            layer,
            key_field: key_field.into(),
        }
    }

    pub fn layer(&self) -> &L {
        &*self.layer
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Declare every field, skipping the ones the layer already has.
    ///
    /// # Returns
    /// Number of newly created fields
    pub fn ensure_fields(&mut self, fields: &[FieldDefn]) -> Result<usize> {
        let mut created = 0;
        for field in fields {
            match self.layer.create_field(field.clone()) {
                Ok(()) => created += 1,
                Err(Error::FieldExists { name }) => {
                    tracing::debug!("Field {} already exists", name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Set `values` on every feature whose key equals `key`, then persist them.
    ///
    /// # Returns
    /// Number of features written
    ///
    /// # Errors
    /// [`Error::Geometry`] when no feature carries the key.
    pub fn write(&mut self, key: &str, values: &[(String, AttributeValue)]) -> Result<usize> {
        let targets = self.layer.matching(&self.key_field, key);
        if targets.is_empty() {
            return Err(Error::geometry(
                key,
                format!("no feature matches {} = {}", self.key_field, key),
            ));
        }

        for &index in &targets {
            for (name, value) in values {
                self.layer.set_field(index, name, value.clone())?;
            }
            self.layer.persist(index)?;
        }
        Ok(targets.len())
    }

    /// Flush all persisted features
    pub fn finish(self) -> Result<()> {
        self.layer.sync()
    }
}
