//! Server configuration from environment variables.

use std::path::PathBuf;

use eyre::eyre;
use regions_core::{ManagerConfig, ResolutionPolicy};

/// Runtime settings of the host harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// `REGIONS_DATA_DIR`: root of the document store.
    pub data_dir: PathBuf,
    /// `TARGET_TPS`: ticks per second.
    pub target_tps: u32,
    /// `AUTOSAVE_TICKS`: ticks between saves of dirty areas. 0 disables autosave.
    pub autosave_ticks: u64,
    /// `REGIONS_RESOLUTION`: `innermost` or `deny-overrides`.
    pub resolution: ResolutionPolicy,
    /// `REGIONS_WORLDS`: comma separated worlds the host has loaded.
    pub worlds: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            target_tps: 20,
            autosave_ticks: 6000,
            resolution: ResolutionPolicy::InnermostOnly,
            worlds: vec!["world".to_owned()],
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("REGIONS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(tps) = lookup("TARGET_TPS") {
            config.target_tps = tps
                .trim()
                .parse()
                .ok()
                .filter(|&tps| tps > 0)
                .ok_or_else(|| eyre!("TARGET_TPS must be a positive integer, got {tps:?}"))?;
        }
        if let Some(ticks) = lookup("AUTOSAVE_TICKS") {
            config.autosave_ticks = ticks
                .trim()
                .parse()
                .map_err(|e| eyre!("AUTOSAVE_TICKS {ticks:?}: {e}"))?;
        }
        if let Some(policy) = lookup("REGIONS_RESOLUTION") {
            config.resolution = ResolutionPolicy::from_key(policy.trim())
                .ok_or_else(|| eyre!("REGIONS_RESOLUTION must be innermost or deny-overrides, got {policy:?}"))?;
        }
        if let Some(worlds) = lookup("REGIONS_WORLDS") {
            config.worlds = worlds
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_owned)
                .collect();
        }

        Ok(config)
    }

    #[must_use]
    pub const fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            resolution: self.resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("REGIONS_DATA_DIR", "/srv/regions"),
            ("TARGET_TPS", "10"),
            ("AUTOSAVE_TICKS", "0"),
            ("REGIONS_RESOLUTION", "deny-overrides"),
            ("REGIONS_WORLDS", "world, world_nether,,"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/regions"));
        assert_eq!(config.target_tps, 10);
        assert_eq!(config.autosave_ticks, 0);
        assert_eq!(config.resolution, ResolutionPolicy::DenyOverrides);
        assert_eq!(config.worlds, vec!["world", "world_nether"]);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("TARGET_TPS", "0")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("TARGET_TPS", "fast")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("REGIONS_RESOLUTION", "outermost")])).is_err());
    }
}
