//! GeoJSON read/write for feature collections
//!
//! Feature ids are taken from the GeoJSON `id` member when present,
//! otherwise from the feature's position in the file, so identity is stable
//! across repeated reads of the same file.

use std::fs;
use std::path::Path;

use geojson::{feature::Id, GeoJson};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::feature::{AttributeValue, Feature, FeatureCollection, FeatureId};

/// Read a feature collection from a GeoJSON file.
pub fn read_geojson(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path)?;
    from_geojson_str(&text)
}

/// Parse a feature collection from GeoJSON text.
pub fn from_geojson_str(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| Error::Format(e.to_string()))?;

    let fc = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        other => {
            return Err(Error::Format(format!(
                "expected a FeatureCollection, got {}",
                match other {
                    GeoJson::Geometry(_) => "a bare Geometry",
                    GeoJson::Feature(_) => "a single Feature",
                    GeoJson::FeatureCollection(_) => unreachable!(),
                }
            )))
        }
    };

    let mut out = FeatureCollection::new();
    for (index, gj_feature) in fc.features.into_iter().enumerate() {
        let id = match &gj_feature.id {
            Some(Id::String(s)) => FeatureId::new(s.clone()),
            Some(Id::Number(n)) => FeatureId::new(n.to_string()),
            None => FeatureId::new(index.to_string()),
        };

        let geometry = match gj_feature.geometry {
            Some(g) => Some(
                geo_types::Geometry::<f64>::try_from(g.value)
                    .map_err(|e| Error::Format(format!("feature {}: {}", id, e)))?,
            ),
            None => None,
        };

        let mut feature = Feature {
            id,
            geometry,
            properties: Default::default(),
        };
        if let Some(props) = gj_feature.properties {
            for (key, value) in props {
                feature.set_property(key, attribute_from_json(value));
            }
        }
        out.push(feature);
    }

    Ok(out)
}

/// Write a feature collection to a GeoJSON file.
pub fn write_geojson(path: impl AsRef<Path>, features: &FeatureCollection) -> Result<()> {
    fs::write(path, to_geojson_string(features)?)?;
    Ok(())
}

/// Serialize a feature collection to GeoJSON text.
pub fn to_geojson_string(features: &FeatureCollection) -> Result<String> {
    let gj_features: Vec<geojson::Feature> = features
        .iter()
        .map(|f| {
            let mut props = Map::new();
            let mut keys: Vec<&String> = f.properties.keys().collect();
            keys.sort();
            for key in keys {
                props.insert(key.clone(), attribute_to_json(&f.properties[key]));
            }

            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: Some(Id::String(f.id.as_str().to_string())),
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    let fc = geojson::FeatureCollection {
        bbox: None,
        features: gj_features,
        foreign_members: None,
    };

    Ok(GeoJson::FeatureCollection(fc).to_string())
}

fn attribute_from_json(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::Int(i)
            } else {
                AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => AttributeValue::String(s),
        // Nested values are not part of the attribute model; keep them
        // round-trippable as text.
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::from(*i),
        AttributeValue::Float(f) => Value::from(*f),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}
