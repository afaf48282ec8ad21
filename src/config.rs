//! Service configuration.
//!
//! Loaded once at startup from a YAML file and read-only afterwards.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

fn default_workers() -> usize {
    2
}

fn default_reconnect_wait_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_age_done_jobs_secs() -> u64 {
    600
}

fn default_listen() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

/// Target database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// tokio-postgres connection string, e.g.
    /// `host=localhost user=geopull dbname=gis`.
    pub connection: String,
}

/// HTTP front-end settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// A synchronizable layer: a source dataset/layer bound to a target
/// table.
#[derive(Debug, Clone, Deserialize)]
pub struct Layer {
    pub name: String,
    /// Driver locator, e.g. a path to a GeoJSON file.
    pub source: String,
    /// Layer name within the source dataset.
    pub source_layer: String,
    #[serde(default = "default_schema")]
    pub target_schema: String,
    pub target_table: String,
    /// Allow the delete step to run even when a job carries an
    /// attribute filter. Off by default: a filtered pull would
    /// otherwise delete every row outside the filter.
    #[serde(default)]
    pub allow_filtered_delete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Number of pull workers, each with its own database connection.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Wait between database reconnection attempts.
    #[serde(default = "default_reconnect_wait_ms")]
    pub db_reconnect_wait_ms: u64,
    /// Maximum number of queued jobs.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long finished and failed jobs stay addressable for polling.
    #[serde(default = "default_max_age_done_jobs_secs")]
    pub max_age_done_jobs_secs: u64,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        let mut seen = std::collections::HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                anyhow::bail!("layer with empty name");
            }
            if layer.target_table.is_empty() {
                anyhow::bail!("layer \"{}\" has no target_table", layer.name);
            }
            if !seen.insert(layer.name.as_str()) {
                anyhow::bail!("duplicate layer name \"{}\"", layer.name);
            }
            // Source field names are folded to lower case, so
            // mixed-case target identifiers can never be matched.
            if layer.target_schema.chars().any(|c| c.is_uppercase())
                || layer.target_table.chars().any(|c| c.is_uppercase())
            {
                tracing::warn!(
                    layer = %layer.name,
                    "target identifiers contain uppercase characters; \
                     mixed-case identifiers are not supported and will not match source fields"
                );
            }
        }
        Ok(())
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn db_reconnect_wait(&self) -> Duration {
        Duration::from_millis(self.db_reconnect_wait_ms)
    }

    pub fn max_age_done_jobs(&self) -> Duration {
        Duration::from_secs(self.max_age_done_jobs_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = "
db:
  connection: host=localhost user=geopull dbname=gis
layers:
  - name: roads
    source: /data/roads.geojson
    source_layer: roads
    target_table: roads
";

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.db_reconnect_wait_ms, 2000);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.http.listen, "127.0.0.1:9090");
        let layer = config.layer("roads").unwrap();
        assert_eq!(layer.target_schema, "public");
        assert!(!layer.allow_filtered_delete);
    }

    #[test]
    fn unknown_layer_lookup_is_none() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        assert!(config.layer("rivers").is_none());
    }

    #[test]
    fn duplicate_layer_names_are_rejected() {
        let yaml = format!(
            "{MINIMAL}  - name: roads\n    source: /data/other.geojson\n    source_layer: x\n    target_table: y\n"
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let yaml = format!("{MINIMAL}workers: 0\n");
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.layers.len(), 1);
    }
}
