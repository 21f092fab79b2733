//! Spatial frame: the GeoDataFrame-like input structure for imputation.
//!
//! A [`GeoFrame`] is an ordered collection of [`Feature`]s, each carrying an
//! optional geometry and named attributes. Row order is significant and is
//! preserved by every operation in this crate.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DataError;

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
    /// Numeric view of the value: `Float`/`Int` convert, everything else
    /// (including `Null`) is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// A spatial unit: geometry plus attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Unit geometry (typically a polygon)
    pub geometry: Option<Geometry<f64>>,
    /// Unit attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional unit ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Ordered collection of spatial units
#[derive(Debug, Clone, Default)]
pub struct GeoFrame {
    pub features: Vec<Feature>,
}

impl GeoFrame {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Whether any feature carries the named attribute.
    pub fn has_column(&self, name: &str) -> bool {
        self.features.iter().any(|f| f.properties.contains_key(name))
    }

    /// Extract a numeric column in row order.
    ///
    /// `Null` and absent attributes become `None` (missing). Any non-numeric,
    /// non-null value fails with [`DataError::NotNumeric`]; a column present
    /// in no feature at all fails with [`DataError::MissingColumn`].
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, DataError> {
        if !self.has_column(name) {
            return Err(DataError::MissingColumn { name: name.into() });
        }

        let mut out = Vec::with_capacity(self.features.len());
        for (row, feature) in self.features.iter().enumerate() {
            match feature.get_property(name) {
                None | Some(AttributeValue::Null) => out.push(None),
                Some(value) => match value.as_f64() {
                    Some(v) => out.push(Some(v)),
                    None => {
                        return Err(DataError::NotNumeric {
                            name: name.into(),
                            row,
                        });
                    }
                },
            }
        }
        Ok(out)
    }
}

impl IntoIterator for GeoFrame {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<Feature> for GeoFrame {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
