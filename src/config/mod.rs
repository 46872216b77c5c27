//! Configuration management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ranking weights and search bounds.
///
/// A single record, lazily seeded with defaults in storage if absent and read
/// on every ranked query. Mutated only by an administrative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Weight of the logarithmic usage signal.
    pub usage_weight: f64,
    /// Weight of the exponential recency signal.
    pub recency_weight: f64,
    /// Fixed boost for favorited prompts.
    pub favorite_weight: f64,
    /// Fixed boost for pinned prompts (list mode additionally groups pinned
    /// first regardless of score).
    pub pinned_weight: f64,
    /// Recency half-life in days.
    pub half_life_days: f64,
    /// Upper bound on candidates the search path may examine before
    /// truncating to the requested page size. A safety valve for narrow tag
    /// filters; configuration, not a hard constant.
    pub search_rerank_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            usage_weight: 3.0,
            recency_weight: 2.0,
            favorite_weight: 1.0,
            pinned_weight: 0.5,
            half_life_days: 14.0,
            search_rerank_limit: 200,
        }
    }
}

/// Main configuration for promptvault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Owner identity used by the CLI (a single-user installation).
    pub owner_id: String,
    /// Optional ranking overrides applied when seeding a fresh database.
    pub ranking: Option<RankingConfig>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    /// Database path.
    db_path: Option<String>,
    /// Owner identity.
    owner_id: Option<String>,
    /// Ranking section.
    ranking: Option<RankingConfig>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("promptvault.db"),
            owner_id: "local".to_string(),
            ranking: None,
        }
    }
}

impl VaultConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::storage("read_config_file", e))?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| Error::storage("parse_config_file", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/promptvault/config.toml` on
    /// Unix) and falls back to defaults with the database placed in the
    /// platform data dir.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let config_path = base_dirs
            .config_dir()
            .join("promptvault")
            .join("config.toml");
        if config_path.exists() {
            if let Ok(config) = Self::load_from_file(&config_path) {
                return config;
            }
        }

        let mut config = Self::default();
        config.db_path = base_dirs
            .data_dir()
            .join("promptvault")
            .join("promptvault.db");
        config
    }

    /// Converts a `ConfigFile` to `VaultConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(db_path) = file.db_path {
            config.db_path = PathBuf::from(db_path);
        }
        if let Some(owner_id) = file.owner_id {
            config.owner_id = owner_id;
        }
        config.ranking = file.ranking;

        config
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Sets the owner identity.
    #[must_use]
    pub fn with_owner_id(mut self, owner: impl Into<String>) -> Self {
        self.owner_id = owner.into();
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_ranking_config_defaults() {
        let cfg = RankingConfig::default();
        assert!((cfg.usage_weight - 3.0).abs() < f64::EPSILON);
        assert!((cfg.recency_weight - 2.0).abs() < f64::EPSILON);
        assert!((cfg.favorite_weight - 1.0).abs() < f64::EPSILON);
        assert!((cfg.pinned_weight - 0.5).abs() < f64::EPSILON);
        assert!((cfg.half_life_days - 14.0).abs() < f64::EPSILON);
        assert_eq!(cfg.search_rerank_limit, 200);
    }

    #[test]
    fn test_ranking_config_roundtrips_through_json() {
        let cfg = RankingConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: RankingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
db_path = "/tmp/pv.db"
owner_id = "alice"

[ranking]
usage_weight = 5.0
recency_weight = 2.0
favorite_weight = 1.0
pinned_weight = 0.5
half_life_days = 7.0
search_rerank_limit = 100
"#,
        )
        .unwrap();

        let config = VaultConfig::load_from_file(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/pv.db"));
        assert_eq!(config.owner_id, "alice");
        let ranking = config.ranking.unwrap();
        assert!((ranking.usage_weight - 5.0).abs() < f64::EPSILON);
        assert_eq!(ranking.search_rerank_limit, 100);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let result = VaultConfig::load_from_file(std::path::Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_builders() {
        let config = VaultConfig::new()
            .with_db_path("/tmp/x.db")
            .with_owner_id("bob");
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.owner_id, "bob");
    }
}
