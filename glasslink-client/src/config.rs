use anyhow::{Context, Result};
use directories::ProjectDirs;
use glasslink_core::control::GlassesConfig;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "glasslink.toml";
const LOG_FILE_NAME: &str = "glasslink.log";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("io", "Donovoi", "Glasslink")
        .context("could not determine platform project directories")
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

/// Log file used when `--log-file` is not given
pub fn default_log_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join(LOG_FILE_NAME))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load(path: &Path) -> Result<GlassesConfig> {
    if !path.exists() {
        return Ok(GlassesConfig::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: GlassesConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    if cfg.scan_attempts == 0 {
        anyhow::bail!("scan_attempts must be at least 1 in {}", path.display());
    }
    Ok(cfg)
}

pub fn save(path: &Path, cfg: &GlassesConfig, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    ensure_parent_dir(path)?;
    let raw = toml::to_string_pretty(cfg).context("failed to serialize config to TOML")?;
    fs::write(path, raw).with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("glasslink-{}-{name}", std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = load(&scratch_path("missing")).unwrap();
        assert_eq!(cfg, GlassesConfig::default());
    }

    #[test]
    fn test_save_load_and_overwrite() {
        let path = scratch_path("roundtrip");
        let cfg = GlassesConfig {
            heartbeat_interval: Duration::from_secs(4),
            ..Default::default()
        };

        save(&path, &cfg, true).unwrap();
        assert_eq!(load(&path).unwrap(), cfg);
        assert!(save(&path, &cfg, false).is_err());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_default_log_path() {
        let path = default_log_path().unwrap();
        assert_eq!(path.file_name().unwrap(), LOG_FILE_NAME);
        assert!(path.is_absolute());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let path = scratch_path("zero-attempts");
        let cfg = GlassesConfig {
            scan_attempts: 0,
            ..Default::default()
        };
        save(&path, &cfg, true).unwrap();
        assert!(load(&path).is_err());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
