//! Identifier quoting and SQL synthesis.
//!
//! All statements the engine runs against the target database are
//! assembled here. Only identifiers and catalog-reported type names are
//! ever interpolated into SQL text; data values always travel as
//! statement parameters.

/// Quote an SQL identifier, doubling any embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render a schema-qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Join a list of identifiers, quoting each.
pub fn join_quoted(idents: &[String], separator: &str) -> String {
    idents
        .iter()
        .map(|i| quote_ident(i))
        .collect::<Vec<_>>()
        .join(separator)
}

/// CREATE a session-local scratch table mirroring the target table's
/// columns but none of its constraints, indexes or defaults. The table
/// is dropped together with the surrounding transaction.
pub fn create_scratch_table(scratch: &str, schema: &str, table: &str) -> String {
    format!(
        "create temporary table {} on commit drop as select * from {} limit 0",
        quote_ident(scratch),
        qualified_table(schema, table)
    )
}

/// Parameterized INSERT into the scratch table with one placeholder per
/// insert column, each cast to the target column's type so the
/// text-encoded parameters are parsed server-side.
pub fn streaming_insert(scratch: &str, columns: &[(String, String)]) -> String {
    let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (_, pg_type))| format!("${}::{}", i + 1, pg_type))
        .collect();
    format!(
        "insert into {} ({}) values ({})",
        quote_ident(scratch),
        join_quoted(&names, ", "),
        placeholders.join(", ")
    )
}

/// UPDATE target rows that match a scratch row on all primary-key
/// columns (NULL-safe) and differ in at least one non-key column
/// (NULL-safe again). Touching only changed rows keeps row triggers
/// from firing on no-op updates.
pub fn update_changed(
    schema: &str,
    table: &str,
    scratch: &str,
    pk_columns: &[String],
    update_columns: &[String],
) -> String {
    let assignments: Vec<String> = update_columns
        .iter()
        .map(|c| {
            format!(
                "{} = {}.{}",
                quote_ident(c),
                quote_ident(scratch),
                quote_ident(c)
            )
        })
        .collect();
    let matches: Vec<String> = pk_columns
        .iter()
        .map(|c| {
            format!(
                "{}.{} is not distinct from {}.{}",
                quote_ident(table),
                quote_ident(c),
                quote_ident(scratch),
                quote_ident(c)
            )
        })
        .collect();
    let differs: Vec<String> = update_columns
        .iter()
        .map(|c| {
            format!(
                "({}.{} is distinct from {}.{})",
                quote_ident(table),
                quote_ident(c),
                quote_ident(scratch),
                quote_ident(c)
            )
        })
        .collect();
    format!(
        "update {} set {} from {} where ({}) and ({})",
        qualified_table(schema, table),
        assignments.join(", "),
        quote_ident(scratch),
        matches.join(" and "),
        differs.join(" or ")
    )
}

/// INSERT scratch rows whose primary-key tuple is absent from the
/// target, using the same column projection as the streaming insert.
pub fn insert_missing(
    schema: &str,
    table: &str,
    scratch: &str,
    insert_columns: &[String],
    pk_columns: &[String],
) -> String {
    format!(
        "insert into {} ({}) select {} from {} where ({}) not in (select {} from {})",
        qualified_table(schema, table),
        join_quoted(insert_columns, ", "),
        join_quoted(insert_columns, ", "),
        quote_ident(scratch),
        join_quoted(pk_columns, ", "),
        join_quoted(pk_columns, ", "),
        qualified_table(schema, table)
    )
}

/// DELETE target rows whose primary-key tuple is absent from the
/// scratch table.
pub fn delete_removed(
    schema: &str,
    table: &str,
    scratch: &str,
    pk_columns: &[String],
) -> String {
    format!(
        "delete from {} where ({}) not in (select {} from {})",
        qualified_table(schema, table),
        join_quoted(pk_columns, ", "),
        join_quoted(pk_columns, ", "),
        quote_ident(scratch)
    )
}

/// Catalog query listing the target table's columns with type name and
/// primary-key flag, in attribute order. Parameters: $1 schema, $2
/// table name.
pub const TABLE_FIELDS_QUERY: &str = "\
select a.attname, t.typname, coalesce(i.indisprimary, false) \
from pg_catalog.pg_attribute a \
join pg_catalog.pg_class c on c.oid = a.attrelid \
join pg_catalog.pg_namespace n on n.oid = c.relnamespace \
join pg_catalog.pg_type t on t.oid = a.atttypid \
left join pg_catalog.pg_index i \
  on i.indrelid = c.oid and a.attnum = any(i.indkey) and i.indisprimary \
where n.nspname = $1 and c.relname = $2 \
  and a.attnum > 0 and not a.attisdropped \
order by a.attnum";
