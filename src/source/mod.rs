//! Source dataset abstraction.
//!
//! The engine reads features through this driver boundary: a [`Driver`]
//! opens a dataset from a locator string, a [`Dataset`] resolves named
//! layers, and a [`FeatureLayer`] exposes field schemas and a feature
//! cursor. The shipped drivers are [`geojson::GeoJsonDriver`] for
//! GeoJSON FeatureCollection files and [`memory::MemoryDataset`] for
//! datasets built in code.

pub mod filter;
pub mod geojson;
pub mod memory;

/// Kind of a source attribute field.
///
/// The `Other` variant carries the driver's numeric type tag so
/// unsupported kinds can be reported precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Real,
    Geometry,
    Other(i32),
}

impl FieldKind {
    /// Numeric tag used when reporting unsupported kinds.
    pub fn tag(self) -> i32 {
        match self {
            FieldKind::String => 0,
            FieldKind::Integer => 1,
            FieldKind::Real => 2,
            FieldKind::Geometry => 3,
            FieldKind::Other(tag) => tag,
        }
    }
}

/// Schema of one source attribute field, as reported by the driver.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
}

/// A source field resolved by the engine: lower-cased name, position in
/// the source record, and kind.
#[derive(Debug, Clone)]
pub struct SourceField {
    pub name: String,
    pub index: usize,
    pub kind: FieldKind,
}

/// Error reported by a driver operation, e.g. a rejected attribute
/// filter. The message is the driver's last error text when it has one.
#[derive(Debug, Clone, Default)]
pub struct DriverError {
    pub message: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Byte order for WKB export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// A feature geometry that can export itself as Well-Known Binary.
pub trait Geometry {
    /// Number of bytes the WKB encoding occupies.
    fn wkb_size(&self) -> usize;

    /// Write the WKB encoding into `out`, which is `wkb_size()` bytes.
    fn write_wkb(&self, order: ByteOrder, out: &mut [u8]) -> Result<(), String>;
}

/// One source record. Field access is by zero-based index in the kinds
/// the layer's schema declares.
pub trait Feature: Send {
    fn is_null(&self, index: usize) -> bool;
    fn string_value(&self, index: usize) -> String;
    fn integer_value(&self, index: usize) -> i64;
    fn real_value(&self, index: usize) -> f64;
    fn geometry(&self) -> Option<&dyn Geometry>;
}

/// A named layer within a dataset: schema plus a resettable,
/// filterable feature cursor.
pub trait FeatureLayer: Send {
    /// Reset the cursor to the first feature.
    fn reset_reading(&mut self);

    /// Restrict the cursor to features matching an attribute filter.
    fn set_attribute_filter(&mut self, filter: &str) -> Result<(), DriverError>;

    /// Number of geometry fields the layer's schema declares.
    fn geometry_field_count(&self) -> usize;

    /// Attribute field definitions, in record order.
    fn fields(&self) -> Vec<FieldSchema>;

    /// Advance the cursor. `None` once exhausted.
    fn next_feature(&mut self) -> Option<Box<dyn Feature + '_>>;
}

/// An open dataset.
pub trait Dataset: Send {
    /// Resolve a layer by name.
    fn layer(&mut self, name: &str) -> Option<&mut dyn FeatureLayer>;
}

/// A format driver: opens datasets it recognizes, declines the rest.
pub trait Driver: Send + Sync {
    fn open(&self, locator: &str) -> Option<Box<dyn Dataset>>;
}

/// An ordered set of drivers tried in turn, OGR-style.
pub struct DriverRegistry {
    drivers: Vec<Box<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new(drivers: Vec<Box<dyn Driver>>) -> Self {
        Self { drivers }
    }

    /// Registry with the built-in file drivers.
    pub fn with_builtin_drivers() -> Self {
        Self::new(vec![Box::new(geojson::GeoJsonDriver)])
    }

    /// Open `locator` with the first driver that accepts it.
    pub fn open(&self, locator: &str) -> Option<Box<dyn Dataset>> {
        self.drivers.iter().find_map(|d| d.open(locator))
    }
}

impl Driver for DriverRegistry {
    fn open(&self, locator: &str) -> Option<Box<dyn Dataset>> {
        DriverRegistry::open(self, locator)
    }
}
