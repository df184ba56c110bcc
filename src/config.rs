//! Top-level configuration file.
//!
//! A JSON document with optional `ransac`, `accuracy` and `shading` sections;
//! anything left out keeps its default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::{AccuracySettings, RansacSettings, ShadingSettings};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ransac: RansacSettings,
    pub accuracy: AccuracySettings,
    pub shading: ShadingSettings,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sections_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regshade.json");
        fs::write(
            &path,
            r#"{"ransac": {"seed": 3}, "accuracy": {"results_dir": "out/matches"}}"#,
        )
        .unwrap();

        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.ransac.seed, Some(3));
        assert_eq!(cfg.ransac.inlier_threshold, 3.0);
        assert_eq!(cfg.accuracy.results_dir, PathBuf::from("out/matches"));
        assert_eq!(cfg.shading, ShadingSettings::default());
    }

    #[test]
    fn bad_json_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ransac:").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));

        assert!(matches!(
            Config::from_file(dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
