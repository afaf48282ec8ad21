//! Database connection handling and target-table introspection.
//!
//! Each worker owns exactly one [`Database`]; connections and the
//! statements prepared on them are never shared across workers.

use tokio_postgres::{Client, GenericClient, NoTls, Transaction};

use crate::error::{Error, Result};
use crate::sql;

/// A worker's exclusive database handle.
pub struct Database {
    conninfo: String,
    client: Option<Client>,
}

impl Database {
    pub fn new(conninfo: impl Into<String>) -> Self {
        Self {
            conninfo: conninfo.into(),
            client: None,
        }
    }

    /// Ensure a live connection. Returns `true` when the handle is
    /// usable, `false` when connecting failed; the caller decides how
    /// to back off.
    pub async fn reconnect(&mut self) -> bool {
        if let Some(client) = &self.client {
            if !client.is_closed() {
                return true;
            }
            tracing::info!("database connection lost, reconnecting");
        }
        match tokio_postgres::connect(&self.conninfo, NoTls).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!("database connection terminated: {e}");
                    }
                });
                self.client = Some(client);
                true
            }
            Err(e) => {
                tracing::warn!("could not connect to the database: {e}");
                self.client = None;
                false
            }
        }
    }

    /// Begin a transaction on the current connection.
    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        let Some(client) = self.client.as_mut() else {
            return Err(Error::BeginTransaction);
        };
        client.transaction().await.map_err(|e| {
            tracing::error!("failed to begin a transaction: {e}");
            Error::BeginTransaction
        })
    }
}

/// One column of the target table, as reported by the catalog.
#[derive(Debug, Clone)]
pub struct TargetField {
    pub name: String,
    pub pg_type: String,
    pub is_primary_key: bool,
}

/// List the target table's columns with type name and primary-key
/// flag, in attribute order.
pub async fn table_fields<C: GenericClient>(
    client: &C,
    schema: &str,
    table: &str,
) -> Result<Vec<TargetField>> {
    let rows = client
        .query(sql::TABLE_FIELDS_QUERY, &[&schema, &table])
        .await?;
    if rows.is_empty() {
        return Err(Error::TargetTableMissing {
            schema: schema.to_string(),
            table: table.to_string(),
        });
    }
    Ok(rows
        .iter()
        .map(|row| TargetField {
            name: row.get(0),
            pg_type: row.get(1),
            is_primary_key: row.get(2),
        })
        .collect())
}
