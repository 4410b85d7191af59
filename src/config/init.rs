use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::Path;

use super::{
    Config, ServiceConfig, DEFAULT_BASE_URL, DEFAULT_HISTORY_LIMIT, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT,
};
use crate::batch::FailurePolicy;
use crate::config::BatchConfig;
use crate::discrepancy::ValidatorOptions;
use crate::scoring::ScoringConfig;

/// The config `init` writes: every section spelled out with its default so
/// the file doubles as documentation.
pub fn starter_config() -> Config {
    Config {
        service: ServiceConfig {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            timeout: Some(DEFAULT_TIMEOUT.to_string()),
            history_limit: Some(DEFAULT_HISTORY_LIMIT),
            retries: Some(DEFAULT_RETRIES),
        },
        scoring: ScoringConfig::default(),
        batch: Some(BatchConfig {
            on_invalid: FailurePolicy::Abort,
        }),
        validator: ValidatorOptions::default(),
        log_level: Some(super::DEFAULT_LOG_LEVEL.to_string()),
    }
}

/// Write the starter config to `path` atomically.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let yaml = serde_saphyr::to_string(&starter_config())
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    file.write_all(yaml.as_bytes())
        .context("Failed to write config")?;
    file.commit()
        .with_context(|| format!("Failed to save config to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::scoring::Scorer;

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        write_default_config(&path, false).unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config, starter_config());
        assert!(Scorer::new(&config.scoring).is_ok());
    }

    #[test]
    fn test_existing_file_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "log_level: info\n").unwrap();

        let err = write_default_config(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "log_level: info\n");

        write_default_config(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("on_invalid: abort"));
    }
}
