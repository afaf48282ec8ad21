//! geopull
//!
//! A library and daemon for synchronizing vector geospatial data into
//! PostgreSQL/PostGIS tables.
//!
//! # Features
//!
//! - Differential synchronization: insert new rows, update changed
//!   rows, delete removed rows, inside one transaction per job
//! - Streaming ingest: features are written through a prepared
//!   statement into a session-local scratch table, geometries as
//!   PostGIS hex-WKB
//! - Asynchronous jobs: a bounded queue feeds a pool of workers, each
//!   with its own database connection
//! - Pluggable sources: a driver trait with a built-in GeoJSON file
//!   driver and an in-memory driver for tests
//! - HTTP API: submit pull jobs and poll their state
//!
//! # Daemon usage
//!
//! ```bash
//! geopull --config geopull.yaml
//!
//! # submit a pull for a configured layer
//! curl -X POST localhost:9090/api/pull -d '{"layer": "roads"}' \
//!      -H 'content-type: application/json'
//!
//! # poll the job
//! curl localhost:9090/api/jobs/<id>
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod geometry;
pub mod http;
pub mod job;
pub mod pull;
pub mod queue;
pub mod service;
pub mod source;
pub mod sql;
pub mod worker;

pub use config::{Config, Layer};
pub use error::{Error, Result};
pub use job::{Job, JobHandle, JobStats, JobStatus};
pub use queue::JobQueue;
pub use service::SyncService;
pub use source::DriverRegistry;
