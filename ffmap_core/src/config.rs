use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::libra::DEFAULT_CANDIDATES;
use crate::schema::CURRENT_VERSION;

/// Resolver settings read from a JSON file. Every field may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Libra database locations, probed in order before the built-in list.
    pub libra_candidates: Vec<PathBuf>,
    /// Directory holding extracted `bg/...` layer files.
    pub game_root: Option<PathBuf>,
    /// Place name to territory id, consulted last in the territory chain.
    pub known_territories: BTreeMap<String, u32>,
    /// Libra place-name id to territory id.
    pub known_place_ids: BTreeMap<u32, u32>,
    pub schema_version: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            libra_candidates: Vec::new(),
            game_root: None,
            known_territories: BTreeMap::new(),
            known_place_ids: BTreeMap::new(),
            schema_version: CURRENT_VERSION.to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading resolver config {}", path.display()))?;
        let config: ResolverConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing resolver config {}", path.display()))?;
        Ok(config)
    }

    /// Configured Libra paths followed by the defaults, without repeats.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        let defaults = DEFAULT_CANDIDATES.iter().map(PathBuf::from);
        for path in self.libra_candidates.iter().cloned().chain(defaults) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resolver.json");
        fs::write(
            &path,
            r#"{"libra_candidates": ["/opt/libra/app_data.sqlite"], "known_territories": {"Old Gridania": 132}}"#,
        )
        .unwrap();

        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config.schema_version, CURRENT_VERSION);
        assert_eq!(config.game_root, None);
        assert_eq!(config.known_territories.get("Old Gridania"), Some(&132));

        let candidates = config.candidate_paths();
        assert_eq!(candidates[0], PathBuf::from("/opt/libra/app_data.sqlite"));
        assert_eq!(candidates.len(), DEFAULT_CANDIDATES.len() + 1);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ResolverConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
