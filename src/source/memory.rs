//! In-memory source driver.
//!
//! Datasets are built in code and behave like any other driver:
//! resettable cursors, attribute filters, WKB-exporting geometries.
//! Tests and demos use this driver; the GeoJSON file driver reuses its
//! layer and feature types as its in-memory representation.

use std::collections::HashMap;

use crate::source::filter::{self, Predicate};
use crate::source::{
    ByteOrder, Dataset, Driver, DriverError, Feature, FeatureLayer, FieldKind, FieldSchema,
    Geometry,
};

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Real(f64),
}

/// Vector geometry supported by the built-in drivers.
#[derive(Debug, Clone, PartialEq)]
pub enum Geom {
    Point(f64, f64),
    LineString(Vec<(f64, f64)>),
    Polygon(Vec<Vec<(f64, f64)>>),
}

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;

impl Geometry for Geom {
    fn wkb_size(&self) -> usize {
        match self {
            Geom::Point(_, _) => 1 + 4 + 16,
            Geom::LineString(points) => 1 + 4 + 4 + 16 * points.len(),
            Geom::Polygon(rings) => {
                1 + 4 + 4 + rings.iter().map(|r| 4 + 16 * r.len()).sum::<usize>()
            }
        }
    }

    fn write_wkb(&self, order: ByteOrder, out: &mut [u8]) -> Result<(), String> {
        if out.len() != self.wkb_size() {
            return Err(format!(
                "WKB buffer has {} bytes, geometry needs {}",
                out.len(),
                self.wkb_size()
            ));
        }
        let mut w = WkbWriter::new(order, out);
        match self {
            Geom::Point(x, y) => {
                w.header(WKB_POINT);
                w.f64(*x);
                w.f64(*y);
            }
            Geom::LineString(points) => {
                w.header(WKB_LINESTRING);
                w.u32(points.len() as u32);
                for (x, y) in points {
                    w.f64(*x);
                    w.f64(*y);
                }
            }
            Geom::Polygon(rings) => {
                w.header(WKB_POLYGON);
                w.u32(rings.len() as u32);
                for ring in rings {
                    w.u32(ring.len() as u32);
                    for (x, y) in ring {
                        w.f64(*x);
                        w.f64(*y);
                    }
                }
            }
        }
        Ok(())
    }
}

struct WkbWriter<'a> {
    out: &'a mut [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> WkbWriter<'a> {
    fn new(order: ByteOrder, out: &'a mut [u8]) -> Self {
        Self {
            out,
            pos: 0,
            little_endian: order == ByteOrder::LittleEndian,
        }
    }

    fn header(&mut self, geom_type: u32) {
        self.out[self.pos] = if self.little_endian { 1 } else { 0 };
        self.pos += 1;
        self.u32(geom_type);
    }

    fn u32(&mut self, v: u32) {
        let bytes = if self.little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.out[self.pos..self.pos + 4].copy_from_slice(&bytes);
        self.pos += 4;
    }

    fn f64(&mut self, v: f64) {
        let bytes = if self.little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        self.out[self.pos..self.pos + 8].copy_from_slice(&bytes);
        self.pos += 8;
    }
}

/// One record of a memory layer.
#[derive(Debug, Clone)]
pub struct MemoryFeature {
    pub values: Vec<Value>,
    pub geometry: Option<Geom>,
}

impl Feature for MemoryFeature {
    fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(Value::Null) | None)
    }

    fn string_value(&self, index: usize) -> String {
        match self.values.get(index) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Integer(i)) => i.to_string(),
            Some(Value::Real(r)) => r.to_string(),
            _ => String::new(),
        }
    }

    fn integer_value(&self, index: usize) -> i64 {
        match self.values.get(index) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Real(r)) => *r as i64,
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn real_value(&self, index: usize) -> f64 {
        match self.values.get(index) {
            Some(Value::Real(r)) => *r,
            Some(Value::Integer(i)) => *i as f64,
            Some(Value::String(s)) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn geometry(&self) -> Option<&dyn Geometry> {
        self.geometry.as_ref().map(|g| g as &dyn Geometry)
    }
}

/// A named layer holding its schema and features.
#[derive(Debug, Clone)]
pub struct MemoryLayer {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub features: Vec<MemoryFeature>,
    pub geometry_fields: usize,
    cursor: usize,
    active_filter: Option<(usize, Predicate)>,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>, features: Vec<MemoryFeature>) -> Self {
        Self {
            name: name.into(),
            fields,
            features,
            geometry_fields: 1,
            cursor: 0,
            active_filter: None,
        }
    }

    /// Override the declared geometry field count, for sources that
    /// carry none or several.
    pub fn with_geometry_fields(mut self, count: usize) -> Self {
        self.geometry_fields = count;
        self
    }
}

impl FeatureLayer for MemoryLayer {
    fn reset_reading(&mut self) {
        self.cursor = 0;
    }

    fn set_attribute_filter(&mut self, filter: &str) -> Result<(), DriverError> {
        let predicate = filter::parse(filter).map_err(DriverError::new)?;
        let index = self
            .fields
            .iter()
            .position(|f| f.name.to_lowercase() == predicate.field)
            .ok_or_else(|| {
                DriverError::new(format!("unknown field \"{}\" in filter", predicate.field))
            })?;
        self.active_filter = Some((index, predicate));
        self.cursor = 0;
        Ok(())
    }

    fn geometry_field_count(&self) -> usize {
        self.geometry_fields
    }

    fn fields(&self) -> Vec<FieldSchema> {
        self.fields.clone()
    }

    fn next_feature(&mut self) -> Option<Box<dyn Feature + '_>> {
        while self.cursor < self.features.len() {
            let index = self.cursor;
            self.cursor += 1;
            let feature = &self.features[index];
            let matches = match &self.active_filter {
                Some((index, predicate)) => feature
                    .values
                    .get(*index)
                    .map(|v| predicate.matches(v))
                    .unwrap_or(false),
                None => true,
            };
            if matches {
                return Some(Box::new(feature.clone()));
            }
        }
        None
    }
}

/// A dataset of named layers.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    pub layers: Vec<MemoryLayer>,
}

impl MemoryDataset {
    pub fn new(layers: Vec<MemoryLayer>) -> Self {
        Self { layers }
    }
}

impl Dataset for MemoryDataset {
    fn layer(&mut self, name: &str) -> Option<&mut dyn FeatureLayer> {
        self.layers
            .iter_mut()
            .find(|l| l.name == name)
            .map(|l| l as &mut dyn FeatureLayer)
    }
}

/// Driver serving pre-registered datasets by locator.
#[derive(Default)]
pub struct MemoryDriver {
    datasets: HashMap<String, MemoryDataset>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, locator: impl Into<String>, dataset: MemoryDataset) -> Self {
        self.datasets.insert(locator.into(), dataset);
        self
    }
}

impl Driver for MemoryDriver {
    fn open(&self, locator: &str) -> Option<Box<dyn Dataset>> {
        self.datasets
            .get(locator)
            .cloned()
            .map(|d| Box::new(d) as Box<dyn Dataset>)
    }
}

/// Shorthand for building a field schema.
pub fn field(name: &str, kind: FieldKind) -> FieldSchema {
    FieldSchema {
        name: name.to_string(),
        kind,
    }
}
