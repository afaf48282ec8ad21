//! Error types for geopull.

use thiserror::Error;

/// Errors surfaced by the synchronization engine.
///
/// Every variant carries enough context to render the one-line job
/// message clients see when a pull fails.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown layer \"{0}\"")]
    UnknownLayer(String),

    #[error("could not open dataset for layer \"{layer}\"")]
    DatasetOpen { layer: String },

    #[error("source layer \"{source_layer}\" in dataset for layer \"{layer}\" not found")]
    SourceLayerNotFound { layer: String, source_layer: String },

    #[error("the filter for layer \"{layer}\" is invalid: {reason} (the applied filter was [ {filter} ])")]
    InvalidFilter {
        layer: String,
        filter: String,
        reason: String,
    },

    #[error("the source for layer \"{layer}\" provides {count} geometry fields, only sources with one geometry field are supported")]
    GeometryFieldCount { layer: String, count: usize },

    #[error("target table \"{schema}\".\"{table}\" does not exist or has no columns")]
    TargetTableMissing { schema: String, table: String },

    #[error("got no primary key for layer \"{layer}\"")]
    NoPrimaryKey { layer: String },

    #[error("layer \"{layer}\" has multiple geometry columns, only one is supported")]
    MultipleGeometryColumns { layer: String },

    #[error("layer \"{layer}\" has no geometry column in the target table")]
    NoGeometryColumn { layer: String },

    #[error("the source for layer \"{layer}\" is missing the following fields required by the primary key: {}", columns.join(", "))]
    MissingPrimaryKeyFields { layer: String, columns: Vec<String> },

    #[error("unsupported source field type: {tag}")]
    UnsupportedFieldKind { tag: i32 },

    #[error("could not export the geometry from feature #{feature}: {reason}")]
    GeometryExport { feature: u64, reason: String },

    #[error("could not start a database transaction")]
    BeginTransaction,

    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error("the job queue has been closed")]
    QueueClosed,

    #[error("the job queue is full")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_primary_key_fields_lists_columns() {
        let err = Error::MissingPrimaryKeyFields {
            layer: "roads".into(),
            columns: vec!["id".into(), "segment".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("roads"));
        assert!(msg.contains("id, segment"));
    }

    #[test]
    fn invalid_filter_embeds_filter_text() {
        let err = Error::InvalidFilter {
            layer: "roads".into(),
            filter: "nope =".into(),
            reason: "expected a literal after the operator".into(),
        };
        assert!(err.to_string().contains("[ nope = ]"));
    }
}
