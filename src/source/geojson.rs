//! GeoJSON file driver.
//!
//! Opens `.geojson`/`.json` files holding a FeatureCollection. The
//! attribute schema is inferred from the feature properties: integers
//! stay integers until a fractional value shows up, booleans map to
//! integers, anything mixed or structured becomes a string. The layer
//! is named after the file stem.

use std::path::Path;

use crate::source::memory::{Geom, MemoryDataset, MemoryFeature, MemoryLayer, Value};
use crate::source::{Dataset, Driver, FieldKind, FieldSchema};

pub struct GeoJsonDriver;

impl Driver for GeoJsonDriver {
    fn open(&self, locator: &str) -> Option<Box<dyn Dataset>> {
        let path = Path::new(locator);
        let extension = path.extension()?.to_str()?.to_lowercase();
        if extension != "geojson" && extension != "json" {
            return None;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("could not read {locator}: {e}");
                return None;
            }
        };
        let layer_name = path.file_stem()?.to_str()?.to_string();
        match parse_feature_collection(&raw, &layer_name) {
            Ok(layer) => Some(Box::new(MemoryDataset::new(vec![layer]))),
            Err(e) => {
                tracing::debug!("{locator} is not a usable FeatureCollection: {e}");
                None
            }
        }
    }
}

fn parse_feature_collection(raw: &str, layer_name: &str) -> Result<MemoryLayer, String> {
    let root: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if root.get("type").and_then(|t| t.as_str()) != Some("FeatureCollection") {
        return Err("root object is not a FeatureCollection".to_string());
    }
    let features = root
        .get("features")
        .and_then(|f| f.as_array())
        .ok_or_else(|| "FeatureCollection has no features array".to_string())?;

    // First pass: field order and kinds across all features. Nulls do
    // not pin a kind; a field that only ever holds null ends up string.
    let mut field_names: Vec<String> = Vec::new();
    let mut kinds: Vec<Option<FieldKind>> = Vec::new();
    for feature in features {
        let Some(properties) = feature.get("properties").and_then(|p| p.as_object()) else {
            continue;
        };
        for (name, value) in properties {
            let kind = json_kind(value);
            match field_names.iter().position(|n| n == name) {
                Some(i) => kinds[i] = merge_kinds(kinds[i], kind),
                None => {
                    field_names.push(name.clone());
                    kinds.push(kind);
                }
            }
        }
    }

    let fields: Vec<FieldSchema> = field_names
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| FieldSchema {
            name: name.clone(),
            kind: kind.unwrap_or(FieldKind::String),
        })
        .collect();

    // Second pass: feature records in field order.
    let mut records = Vec::with_capacity(features.len());
    for feature in features {
        let properties = feature.get("properties").and_then(|p| p.as_object());
        let values = field_names
            .iter()
            .map(|name| match properties.and_then(|p| p.get(name)) {
                Some(v) => json_value(v),
                None => Value::Null,
            })
            .collect();
        let geometry = feature.get("geometry").and_then(json_geometry);
        records.push(MemoryFeature { values, geometry });
    }

    Ok(MemoryLayer::new(layer_name, fields, records))
}

fn json_kind(value: &serde_json::Value) -> Option<FieldKind> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(_) => Some(FieldKind::Integer),
        serde_json::Value::Number(n) if n.is_i64() => Some(FieldKind::Integer),
        serde_json::Value::Number(_) => Some(FieldKind::Real),
        _ => Some(FieldKind::String),
    }
}

fn merge_kinds(seen: Option<FieldKind>, new: Option<FieldKind>) -> Option<FieldKind> {
    match (seen, new) {
        (None, k) | (k, None) => k,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(FieldKind::Integer), Some(FieldKind::Real))
        | (Some(FieldKind::Real), Some(FieldKind::Integer)) => Some(FieldKind::Real),
        _ => Some(FieldKind::String),
    }
}

fn json_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(*b as i64),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn json_geometry(geometry: &serde_json::Value) -> Option<Geom> {
    let coordinates = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Point" => {
            let (x, y) = json_position(coordinates)?;
            Some(Geom::Point(x, y))
        }
        "LineString" => Some(Geom::LineString(json_positions(coordinates)?)),
        "Polygon" => {
            let rings = coordinates
                .as_array()?
                .iter()
                .map(json_positions)
                .collect::<Option<Vec<_>>>()?;
            Some(Geom::Polygon(rings))
        }
        other => {
            tracing::debug!("unsupported GeoJSON geometry type {other}");
            None
        }
    }
}

fn json_position(value: &serde_json::Value) -> Option<(f64, f64)> {
    let pair = value.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}

fn json_positions(value: &serde_json::Value) -> Option<Vec<(f64, f64)>> {
    value.as_array()?.iter().map(json_position).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FeatureLayer;
    use std::io::Write;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": 1, "name": "first", "width": 2.5},
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
            },
            {
                "type": "Feature",
                "properties": {"id": 2, "name": "second", "width": 3},
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}
            }
        ]
    }"#;

    #[test]
    fn infers_fields_and_reads_features() {
        let mut layer = parse_feature_collection(COLLECTION, "roads").unwrap();
        let fields = layer.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "id");
        assert_eq!(fields[0].kind, FieldKind::Integer);
        assert_eq!(fields[2].name, "width");
        // 2.5 in the first feature forces the field to real
        assert_eq!(fields[2].kind, FieldKind::Real);

        let first = layer.next_feature().unwrap();
        assert_eq!(first.integer_value(0), 1);
        assert_eq!(first.string_value(1), "first");
        assert!(first.geometry().is_some());
    }

    #[test]
    fn rejects_non_collections() {
        assert!(parse_feature_collection("{\"type\": \"Feature\"}", "x").is_err());
        assert!(parse_feature_collection("not json", "x").is_err());
    }

    #[test]
    fn driver_opens_geojson_files_only() {
        let mut file = tempfile::Builder::new()
            .suffix(".geojson")
            .tempfile()
            .unwrap();
        file.write_all(COLLECTION.as_bytes()).unwrap();
        let locator = file.path().to_str().unwrap().to_string();

        let mut dataset = GeoJsonDriver.open(&locator).unwrap();
        let stem = std::path::Path::new(&locator)
            .file_stem()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(dataset.layer(&stem).is_some());
        assert!(GeoJsonDriver.open("/tmp/nope.shp").is_none());
    }
}
