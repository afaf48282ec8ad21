//! End-to-end pull scenarios against a real PostGIS database.
//!
//! These tests need a PostgreSQL server with the PostGIS extension and
//! permission to create tables. Point `GEOPULL_TEST_DB` at it, e.g.
//! `host=localhost user=postgres password=postgres dbname=geopull_test`;
//! when the variable is unset every test skips with a notice.

use geopull::config::Layer;
use geopull::db::Database;
use geopull::pull::pull;
use geopull::source::memory::{field, Geom, MemoryDataset, MemoryDriver, MemoryFeature, Value};
use geopull::source::{ByteOrder, FieldKind, Geometry};
use geopull::Error;
use tokio_postgres::{Client, NoTls};

struct TestDb {
    client: Client,
    database: Database,
    table: String,
}

impl TestDb {
    /// Connect and create a fresh target table, or `None` when no test
    /// database is configured.
    async fn setup(table: &str) -> Option<TestDb> {
        let Ok(conninfo) = std::env::var("GEOPULL_TEST_DB") else {
            eprintln!("GEOPULL_TEST_DB is not set, skipping end-to-end test");
            return None;
        };
        let (client, connection) = tokio_postgres::connect(&conninfo, NoTls)
            .await
            .expect("failed to connect to the test database");
        tokio::spawn(async move {
            let _ = connection.await;
        });

        client
            .batch_execute("create extension if not exists postgis")
            .await
            .expect("failed to ensure the postgis extension");
        client
            .batch_execute(&format!(
                "drop table if exists public.{table}; \
                 create table public.{table} \
                 (id integer primary key, name varchar, geom geometry)"
            ))
            .await
            .expect("failed to create the target table");

        let mut database = Database::new(conninfo);
        assert!(database.reconnect().await);
        Some(TestDb {
            client,
            database,
            table: table.to_string(),
        })
    }

    fn layer(&self) -> Layer {
        Layer {
            name: "roads".to_string(),
            source: "mem://roads".to_string(),
            source_layer: "roads".to_string(),
            target_schema: "public".to_string(),
            target_table: self.table.clone(),
            allow_filtered_delete: false,
        }
    }

    async fn rows(&self) -> Vec<(i32, Option<String>)> {
        self.client
            .query(
                &format!("select id, name from public.{} order by id", self.table),
                &[],
            )
            .await
            .unwrap()
            .iter()
            .map(|row| (row.get(0), row.get(1)))
            .collect()
    }
}

fn roads(rows: &[(i64, Option<&str>, (f64, f64))]) -> MemoryDriver {
    let features = rows
        .iter()
        .map(|(id, name, (x, y))| MemoryFeature {
            values: vec![
                Value::Integer(*id),
                name.map(|n| Value::String(n.to_string())).unwrap_or(Value::Null),
            ],
            geometry: Some(Geom::Point(*x, *y)),
        })
        .collect();
    let layer = geopull::source::memory::MemoryLayer::new(
        "roads",
        vec![field("ID", FieldKind::Integer), field("NAME", FieldKind::String)],
        features,
    );
    MemoryDriver::new().register("mem://roads", MemoryDataset::new(vec![layer]))
}

#[tokio::test]
async fn initial_import_creates_every_row() {
    let Some(mut db) = TestDb::setup("geopull_e2e_initial").await else {
        return;
    };
    let driver = roads(&[
        (1, Some("a"), (1.0, 1.0)),
        (2, Some("b"), (2.0, 2.0)),
        (3, Some("c"), (3.0, 3.0)),
    ]);
    let layer = db.layer();

    let stats = pull(&mut db.database, &driver, &layer, "e2e_initial_1", None)
        .await
        .unwrap();
    assert_eq!(stats.pulled, 3);
    assert_eq!(stats.created, 3);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.deleted, 0);
    assert_eq!(
        db.rows().await,
        vec![
            (1, Some("a".to_string())),
            (2, Some("b".to_string())),
            (3, Some("c".to_string())),
        ]
    );

    // running the same job again is a no-op
    let stats = pull(&mut db.database, &driver, &layer, "e2e_initial_2", None)
        .await
        .unwrap();
    assert_eq!(stats.pulled, 3);
    assert_eq!(stats.created, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.deleted, 0);
}

#[tokio::test]
async fn diff_creates_updates_and_deletes_minimally() {
    let Some(mut db) = TestDb::setup("geopull_e2e_diff").await else {
        return;
    };
    let layer = db.layer();

    let driver = roads(&[(1, Some("a"), (1.0, 1.0)), (2, Some("b"), (2.0, 2.0))]);
    pull(&mut db.database, &driver, &layer, "e2e_diff_1", None)
        .await
        .unwrap();

    // source moved on: row 1 gone, row 2 unchanged, row 3 new
    let driver = roads(&[(2, Some("b"), (2.0, 2.0)), (3, Some("c"), (3.0, 3.0))]);
    let stats = pull(&mut db.database, &driver, &layer, "e2e_diff_2", None)
        .await
        .unwrap();
    assert_eq!(stats.pulled, 2);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.deleted, 1);
    assert_eq!(
        db.rows().await,
        vec![(2, Some("b".to_string())), (3, Some("c".to_string()))]
    );

    // a changed attribute updates exactly one row
    let driver = roads(&[(2, Some("B"), (2.0, 2.0)), (3, Some("c"), (3.0, 3.0))]);
    let stats = pull(&mut db.database, &driver, &layer, "e2e_diff_3", None)
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.created, 0);
    assert_eq!(stats.deleted, 0);
}

#[tokio::test]
async fn null_values_diff_null_safely() {
    let Some(mut db) = TestDb::setup("geopull_e2e_nulls").await else {
        return;
    };
    let layer = db.layer();

    let driver = roads(&[(1, None, (1.0, 1.0))]);
    pull(&mut db.database, &driver, &layer, "e2e_nulls_1", None)
        .await
        .unwrap();

    // identical NULL row: no update
    let stats = pull(&mut db.database, &driver, &layer, "e2e_nulls_2", None)
        .await
        .unwrap();
    assert_eq!(stats.updated, 0);

    // NULL -> value flips exactly one row
    let driver = roads(&[(1, Some("named"), (1.0, 1.0))]);
    let stats = pull(&mut db.database, &driver, &layer, "e2e_nulls_3", None)
        .await
        .unwrap();
    assert_eq!(stats.updated, 1);
    assert_eq!(db.rows().await, vec![(1, Some("named".to_string()))]);
}

#[tokio::test]
async fn invalid_filter_fails_and_leaves_target_unchanged() {
    let Some(mut db) = TestDb::setup("geopull_e2e_filter").await else {
        return;
    };
    let layer = db.layer();

    let driver = roads(&[(1, Some("a"), (1.0, 1.0))]);
    pull(&mut db.database, &driver, &layer, "e2e_filter_1", None)
        .await
        .unwrap();

    let driver = roads(&[(2, Some("b"), (2.0, 2.0))]);
    let err = pull(&mut db.database, &driver, &layer, "e2e_filter_2", Some("nope ="))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter { .. }));
    assert!(err.to_string().contains("nope ="));
    assert_eq!(db.rows().await, vec![(1, Some("a".to_string()))]);
}

#[tokio::test]
async fn filtered_pull_skips_the_delete_step() {
    let Some(mut db) = TestDb::setup("geopull_e2e_gate").await else {
        return;
    };
    let layer = db.layer();

    let driver = roads(&[(1, Some("a"), (1.0, 1.0)), (2, Some("b"), (2.0, 2.0))]);
    pull(&mut db.database, &driver, &layer, "e2e_gate_1", None)
        .await
        .unwrap();

    // the filter narrows the pull to row 2; row 1 must survive
    let stats = pull(&mut db.database, &driver, &layer, "e2e_gate_2", Some("id = 2"))
        .await
        .unwrap();
    assert_eq!(stats.pulled, 1);
    assert_eq!(stats.deleted, 0);
    assert_eq!(db.rows().await.len(), 2);
}

#[tokio::test]
async fn source_missing_primary_key_fails_before_writing() {
    let Some(mut db) = TestDb::setup("geopull_e2e_nopk").await else {
        return;
    };
    let layer = db.layer();

    let features = vec![MemoryFeature {
        values: vec![Value::String("a".to_string())],
        geometry: Some(Geom::Point(1.0, 1.0)),
    }];
    let source_layer = geopull::source::memory::MemoryLayer::new(
        "roads",
        vec![field("name", FieldKind::String)],
        features,
    );
    let driver =
        MemoryDriver::new().register("mem://roads", MemoryDataset::new(vec![source_layer]));

    let err = pull(&mut db.database, &driver, &layer, "e2e_nopk_1", None)
        .await
        .unwrap_err();
    match err {
        Error::MissingPrimaryKeyFields { columns, .. } => assert_eq!(columns, vec!["id"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(db.rows().await.is_empty());
}

#[tokio::test]
async fn geometry_round_trips_through_hex_wkb() {
    let Some(mut db) = TestDb::setup("geopull_e2e_geom").await else {
        return;
    };
    let layer = db.layer();

    let driver = roads(&[(1, Some("point"), (1.0, 2.0))]);
    pull(&mut db.database, &driver, &layer, "e2e_geom_1", None)
        .await
        .unwrap();

    let row = db
        .client
        .query_one(
            &format!(
                "select st_asbinary(geom, 'NDR') from public.{} where id = 1",
                db.table
            ),
            &[],
        )
        .await
        .unwrap();
    let stored: Vec<u8> = row.get(0);

    let geom = Geom::Point(1.0, 2.0);
    let mut expected = vec![0u8; geom.wkb_size()];
    geom.write_wkb(ByteOrder::LittleEndian, &mut expected).unwrap();
    assert_eq!(stored, expected);
}
