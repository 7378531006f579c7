//! Daemon configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoConfig {
    /// Control listen address, `PROTOCOL://host:port`.
    pub listen: String,
    /// Number of staging workers in the cohort.
    pub workers: usize,
    /// Transfer block size in KiB; must be a power of two.
    pub block_size_kib: u64,
    /// Log file; stderr when unset.
    pub output: Option<PathBuf>,
    /// Files younger than this are skipped by deferred staging.
    pub ftio_quiescence_secs: f32,
}

impl Default for CargoConfig {
    fn default() -> Self {
        Self {
            listen: String::from("tcp://127.0.0.1:62000"),
            workers: 4,
            block_size_kib: 512,
            output: None,
            ftio_quiescence_secs: 5.0,
        }
    }
}

impl CargoConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: CargoConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: CargoConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_values() {
        let config = CargoConfig::default();
        assert_eq!(config.listen, "tcp://127.0.0.1:62000");
        assert_eq!(config.workers, 4);
        assert_eq!(config.block_size_kib, 512);
        assert!(config.output.is_none());
        assert_eq!(config.ftio_quiescence_secs, 5.0);
    }

    #[test]
    fn from_file_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
listen = "tcp://0.0.0.0:7000"
workers = 8
block_size_kib = 1024
output = "/var/log/cargod.log"
            "#
        )
        .unwrap();

        let config = CargoConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen, "tcp://0.0.0.0:7000");
        assert_eq!(config.workers, 8);
        assert_eq!(config.block_size_kib, 1024);
        assert_eq!(config.output, Some(PathBuf::from("/var/log/cargod.log")));
        // Unset fields keep their defaults.
        assert_eq!(config.ftio_quiescence_secs, 5.0);
    }

    #[test]
    fn from_file_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(
            file,
            r#"{{ "listen": "tcp://127.0.0.1:9999", "workers": 2 }}"#
        )
        .unwrap();

        let config = CargoConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen, "tcp://127.0.0.1:9999");
        assert_eq!(config.workers, 2);
        assert_eq!(config.block_size_kib, 512);
    }

    #[test]
    fn rejects_unknown_extensions() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "listen: nope").unwrap();
        assert!(CargoConfig::from_file(file.path()).is_err());
    }
}
