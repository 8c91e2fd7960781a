use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bridge settings, read from `sos-sysml.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Guest kernel spec name
    pub kernel_name: String,
    /// Guest variables starting with this prefix are pushed along with every `%put`
    pub auxiliary_prefix: String,
    pub discover_auxiliary: bool,
    /// Show the raw text the guest prints for each pushed variable as a host warning
    pub echo_probe_output: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            kernel_name: "SysML".to_string(),
            auxiliary_prefix: "sos".to_string(),
            discover_auxiliary: true,
            echo_probe_output: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sos-sysml.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<BridgeConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: BridgeConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &BridgeConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sos-sysml.toml");
        std::fs::write(&path, "auxiliary_prefix = \"aux\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.auxiliary_prefix, "aux");
        assert_eq!(config.kernel_name, "SysML");
        assert!(config.discover_auxiliary);
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sos-sysml.toml");
        let config = BridgeConfig { echo_probe_output: true, ..BridgeConfig::default() };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &BridgeConfig::default(), true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, BridgeConfig::default());
    }
}
