//! The pull algorithm.
//!
//! One pull reads every feature of a source layer into a scratch table
//! and reconciles the scratch table against the live target table with
//! three statements: UPDATE rows that changed, INSERT rows whose
//! primary key is new, DELETE rows whose primary key disappeared. All
//! of it happens inside a single transaction; a failure at any point
//! rolls the whole job back.

use std::collections::HashMap;

use tokio_postgres::types::{ToSql, Type};

use crate::config::Layer;
use crate::db::{self, Database, TargetField};
use crate::error::{Error, Result};
use crate::geometry;
use crate::job::JobStats;
use crate::source::{Driver, Feature, FieldKind, SourceField};
use crate::sql;

/// One column written at ingest.
#[derive(Debug)]
pub struct InsertColumn {
    pub field: TargetField,
    /// Source field backing the column. `None` for the geometry
    /// column, which is encoded from the feature geometry instead.
    pub source: Option<SourceField>,
}

/// The partitioning of target columns for one pull.
#[derive(Debug)]
pub struct ColumnPlan {
    /// All primary-key columns. Never empty.
    pub primary_key: Vec<String>,
    /// All non-key columns, copied by the UPDATE statement.
    pub update: Vec<String>,
    /// The single geometry column.
    pub geometry: String,
    /// Columns written at ingest: the geometry column plus every
    /// target column backed by a source field. Type names are kept for
    /// the placeholder casts.
    pub insert: Vec<InsertColumn>,
}

/// Partition the target columns against the source field set.
///
/// Source fields are keyed by lower-cased name; the target side is
/// matched verbatim, which is where the mixed-case limitation of the
/// engine comes from.
pub fn plan_columns(
    layer_name: &str,
    target_fields: &[TargetField],
    source_fields: &HashMap<String, SourceField>,
) -> Result<ColumnPlan> {
    let mut primary_key = Vec::new();
    let mut update = Vec::new();
    let mut geometry: Option<String> = None;
    let mut insert: Vec<InsertColumn> = Vec::new();

    for field in target_fields {
        if field.is_primary_key {
            primary_key.push(field.name.clone());
        } else {
            update.push(field.name.clone());
        }
        if field.pg_type == "geometry" {
            if geometry.is_some() {
                return Err(Error::MultipleGeometryColumns {
                    layer: layer_name.to_string(),
                });
            }
            geometry = Some(field.name.clone());
            insert.push(InsertColumn {
                field: field.clone(),
                source: None,
            });
        } else if let Some(source) = source_fields.get(&field.name) {
            insert.push(InsertColumn {
                field: field.clone(),
                source: Some(source.clone()),
            });
        }
    }

    let geometry = geometry.ok_or_else(|| Error::NoGeometryColumn {
        layer: layer_name.to_string(),
    })?;
    if primary_key.is_empty() {
        return Err(Error::NoPrimaryKey {
            layer: layer_name.to_string(),
        });
    }
    let missing: Vec<String> = primary_key
        .iter()
        .filter(|column| !source_fields.contains_key(column.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingPrimaryKeyFields {
            layer: layer_name.to_string(),
            columns: missing,
        });
    }

    Ok(ColumnPlan {
        primary_key,
        update,
        geometry,
        insert,
    })
}

/// Render one attribute value for the streaming insert, `None` for
/// SQL NULL. Formatting follows the source field's declared kind.
fn field_value(feature: &dyn Feature, field: &SourceField) -> Result<Option<String>> {
    if feature.is_null(field.index) {
        return Ok(None);
    }
    match field.kind {
        FieldKind::String => Ok(Some(feature.string_value(field.index))),
        FieldKind::Integer => Ok(Some(feature.integer_value(field.index).to_string())),
        // f64 Display is shortest-round-trip, enough for a double
        FieldKind::Real => Ok(Some(feature.real_value(field.index).to_string())),
        other => Err(Error::UnsupportedFieldKind { tag: other.tag() }),
    }
}

/// Execute one pull job. The target table is only ever mutated through
/// the transaction committed at the end; every error path leaves it
/// untouched.
pub async fn pull(
    database: &mut Database,
    driver: &dyn Driver,
    layer: &Layer,
    job_id: &str,
    filter: Option<&str>,
) -> Result<JobStats> {
    match filter {
        Some(filter) => {
            tracing::info!("pulling layer \"{}\" using filter \"{filter}\"", layer.name)
        }
        None => tracing::info!("pulling layer \"{}\"", layer.name),
    }

    let mut dataset = driver
        .open(&layer.source)
        .ok_or_else(|| Error::DatasetOpen {
            layer: layer.name.clone(),
        })?;
    let source_layer =
        dataset
            .layer(&layer.source_layer)
            .ok_or_else(|| Error::SourceLayerNotFound {
                layer: layer.name.clone(),
                source_layer: layer.source_layer.clone(),
            })?;
    source_layer.reset_reading();

    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        source_layer
            .set_attribute_filter(filter)
            .map_err(|e| Error::InvalidFilter {
                layer: layer.name.clone(),
                filter: filter.to_string(),
                reason: e
                    .message
                    .unwrap_or_else(|| "the driver rejected the filter".to_string()),
            })?;
    }

    let geometry_fields = source_layer.geometry_field_count();
    if geometry_fields != 1 {
        return Err(Error::GeometryFieldCount {
            layer: layer.name.clone(),
            count: geometry_fields,
        });
    }

    // Source field names are folded to lower case to line up with
    // PostgreSQL's default identifier folding.
    let mut source_fields: HashMap<String, SourceField> = HashMap::new();
    for (index, field) in source_layer.fields().iter().enumerate() {
        let name = field.name.to_lowercase();
        tracing::debug!("source layer provides column {name}");
        source_fields.insert(
            name.clone(),
            SourceField {
                name,
                index,
                kind: field.kind,
            },
        );
    }

    let tx = database.begin().await?;

    // Introspect and plan first: a source that cannot satisfy the
    // primary key must fail before anything is written.
    let target_fields =
        db::table_fields(&tx, &layer.target_schema, &layer.target_table).await?;
    let plan = plan_columns(&layer.name, &target_fields, &source_fields)?;

    let scratch = format!("geopull_{job_id}");
    tx.execute(
        sql::create_scratch_table(&scratch, &layer.target_schema, &layer.target_table).as_str(),
        &[],
    )
    .await?;

    let insert_specs: Vec<(String, String)> = plan
        .insert
        .iter()
        .map(|c| (c.field.name.clone(), c.field.pg_type.clone()))
        .collect();
    let insert_sql = sql::streaming_insert(&scratch, &insert_specs);
    tracing::debug!("{insert_sql}");
    // Every parameter rides as text; the ::type casts in the statement
    // do the parsing server-side.
    let param_types = vec![Type::TEXT; plan.insert.len()];
    let statement = tx.prepare_typed(&insert_sql, &param_types).await?;

    let mut stats = JobStats::default();
    while let Some(feature) = source_layer.next_feature() {
        let mut values: Vec<Option<String>> = Vec::with_capacity(plan.insert.len());
        for column in &plan.insert {
            match &column.source {
                None => match feature.geometry() {
                    Some(geom) => {
                        let hex = geometry::geometry_to_hex(geom).map_err(|reason| {
                            Error::GeometryExport {
                                feature: stats.pulled,
                                reason,
                            }
                        })?;
                        values.push(Some(hex));
                    }
                    None => values.push(None),
                },
                Some(source) => values.push(field_value(feature.as_ref(), source)?),
            }
        }
        drop(feature);
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        tx.execute(&statement, &params).await?;
        stats.pulled += 1;
    }

    // Update only rows with actual differences to keep row triggers
    // from firing on no-op updates.
    stats.updated = if plan.update.is_empty() {
        0
    } else {
        tx.execute(
            sql::update_changed(
                &layer.target_schema,
                &layer.target_table,
                &scratch,
                &plan.primary_key,
                &plan.update,
            )
            .as_str(),
            &[],
        )
        .await?
    };

    let insert_names: Vec<String> = plan.insert.iter().map(|c| c.field.name.clone()).collect();
    stats.created = tx
        .execute(
            sql::insert_missing(
                &layer.target_schema,
                &layer.target_table,
                &scratch,
                &insert_names,
                &plan.primary_key,
            )
            .as_str(),
            &[],
        )
        .await?;

    // A filtered pull only sees a slice of the source; deleting rows
    // outside that slice is almost never what the operator wants.
    let delete_gated = filter.is_some_and(|f| !f.is_empty()) && !layer.allow_filtered_delete;
    stats.deleted = if delete_gated {
        tracing::info!(
            "skipping the delete step for layer \"{}\": a filter is active",
            layer.name
        );
        0
    } else {
        tx.execute(
            sql::delete_removed(
                &layer.target_schema,
                &layer.target_table,
                &scratch,
                &plan.primary_key,
            )
            .as_str(),
            &[],
        )
        .await?
    };

    tx.commit().await?;

    tracing::info!(
        "layer \"{}\": pulled={} created={} updated={} deleted={}",
        layer.name,
        stats.pulled,
        stats.created,
        stats.updated,
        stats.deleted
    );
    Ok(stats)
}
