//! Vector feature model
//!
//! - `FeatureId`: stable, ordered feature identity
//! - `AttributeValue`: scalar attribute types
//! - `Feature`: geometry + attributes
//! - `FeatureCollection`: ordered collection of features

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier for a feature.
///
/// Identity is opaque to the engine but ordered: deterministic tie-breaking
/// throughout the cluster engine relies on the ascending `Ord` of ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

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
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// A geographic feature with geometry and attributes.
///
/// Features are never mutated by the cluster engine; results are reported
/// through parallel output records keyed by `FeatureId`.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature identity, unique within a collection handed to the engine
    pub id: FeatureId,
    /// Feature geometry (`None` = null geometry)
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry<f64>) -> Self {
        Self {
            id: id.into(),
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    /// Create a feature with no geometry
    pub fn without_geometry(id: impl Into<FeatureId>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            properties: HashMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Builder-style attribute assignment
    pub fn with_property(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.set_property(key, value);
        self
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Numeric value of an attribute, if present and numeric
    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(AttributeValue::as_f64)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
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

    /// Iterate feature ids in collection order
    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.features.iter().map(|f| &f.id)
    }

    /// Linear lookup by id
    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| &f.id == id)
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
