use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::blocking::BlockingKind;
use crate::cluster::CanonicalCriterion;
use crate::error::{DedupError, Result};
use crate::profile::ProfileSet;
use crate::scorer::DEFAULT_MATCH_FLOOR;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Engine configuration, loaded from `~/.config/catalogizer/dedup.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Records considered per run when the request does not set a batch size.
    pub default_batch_size: usize,
    /// Score candidate blocks on the rayon pool.
    pub parallel: bool,
    /// Sub-score at which an attribute is reported as matched.
    pub match_floor: f64,
    pub blocking: BlockingKind,
    pub canonical_order: Vec<CanonicalCriterion>,
    pub profiles: ProfileSet,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
            parallel: true,
            match_floor: DEFAULT_MATCH_FLOOR,
            blocking: BlockingKind::default(),
            canonical_order: CanonicalCriterion::default_order(),
            profiles: ProfileSet::default(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl DedupConfig {
    /// Standard config file path: `~/.config/catalogizer/dedup.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CATALOGIZER_DEDUP_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("catalogizer")
            .join("dedup.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load and validate config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_floor) {
            return Err(DedupError::InvalidProfile(format!(
                "match_floor {} outside [0, 1]",
                self.match_floor
            )));
        }
        self.profiles.validate()
    }

    /// Batch cap for a request; `0` selects the configured default.
    pub fn batch_cap(&self, requested: usize) -> usize {
        match requested {
            0 => self.default_batch_size,
            n => n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = DedupConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.default_batch_size, 10_000);
        assert_eq!(cfg.blocking, BlockingKind::SoundexDecade);
        assert!(cfg.parallel);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dedup.toml");

        let mut cfg = DedupConfig::default();
        cfg.blocking = BlockingKind::Exhaustive;
        cfg.profiles.video.threshold = 0.9;
        cfg.save_to(&path).unwrap();

        let loaded = DedupConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let cfg = DedupConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, DedupConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dedup.toml");
        std::fs::write(
            &path,
            "parallel = false\ncanonical_order = [\"most_complete\"]\n\n[profiles.book]\nthreshold = 0.75\nattributes = [{ attribute = \"title\", weight = 1.0, rule = { kind = \"text\" } }]\n",
        )
        .unwrap();

        let cfg = DedupConfig::load_from(&path).unwrap();
        assert!(!cfg.parallel);
        assert_eq!(cfg.canonical_order, vec![CanonicalCriterion::MostComplete]);
        assert_eq!(cfg.profiles.book.threshold, 0.75);
        assert_eq!(cfg.profiles.video, ProfileSet::default().video);
        assert_eq!(cfg.default_batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_invalid_weights_are_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dedup.toml");
        std::fs::write(
            &path,
            "[profiles.game]\nthreshold = 0.8\nattributes = [{ attribute = \"title\", weight = -0.4, rule = { kind = \"text\" } }]\n",
        )
        .unwrap();

        let err = DedupConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, DedupError::InvalidProfile(_)));
    }

    #[test]
    fn test_batch_cap() {
        let cfg = DedupConfig::default();
        assert_eq!(cfg.batch_cap(0), DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.batch_cap(25), 25);
    }
}
