//! Pipeline configuration, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::features::SamplerConfig;
use crate::graph::GraphConfig;
use crate::inference::EngineConfig;
use crate::step::GeometryLoader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Limit on loading one file, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl LoaderConfig {
    /// STEP loader with the configured timeout.
    #[must_use]
    pub fn loader(&self) -> GeometryLoader {
        match self.timeout_ms {
            Some(ms) => GeometryLoader::new().with_timeout(Duration::from_millis(ms)),
            None => GeometryLoader::new(),
        }
    }
}

/// Settings of every pipeline stage.
///
/// ```toml
/// [loader]
/// timeout_ms = 30000
///
/// [sampler]
/// face_u_samples = 10
/// face_v_samples = 10
/// edge_samples = 10
///
/// [inference]
/// max_batch_size = 16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,
    pub sampler: SamplerConfig,
    pub graph: GraphConfig,
    pub inference: EngineConfig,
}

impl PipelineConfig {
    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid
    /// TOML for this layout, or fails [`PipelineConfig::validate`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// # Errors
    ///
    /// See [`PipelineConfig::from_file`].
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for sample counts below 2, a zero
    /// batch size, or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampler;
        for (name, n) in [
            ("sampler.face_u_samples", s.face_u_samples),
            ("sampler.face_v_samples", s.face_v_samples),
            ("sampler.edge_samples", s.edge_samples),
        ] {
            if n < 2 {
                return Err(ConfigError::Invalid(format!("{name} must be at least 2, got {n}")));
            }
        }
        if self.inference.max_batch_size == 0 {
            return Err(ConfigError::Invalid("inference.max_batch_size must be at least 1".into()));
        }
        if self.loader.timeout_ms == Some(0) || self.inference.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.sampler.face_u_samples, 10);
        assert_eq!(config.inference.max_batch_size, 8);
        assert!(config.loader.loader().timeout().is_none());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = PipelineConfig::from_toml(
            "[loader]\ntimeout_ms = 1500\n\n[sampler]\nedge_samples = 16\ncurvature = true\n\n[inference]\nmax_batch_size = 2\n",
        )
        .unwrap();
        assert_eq!(config.sampler.edge_samples, 16);
        assert_eq!(config.sampler.face_u_samples, 10);
        assert!(config.sampler.curvature);
        assert_eq!(config.inference.max_batch_size, 2);
        assert_eq!(config.loader.loader().timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = PipelineConfig::from_toml("[sampler]\nface_u_samples = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = PipelineConfig::from_toml("[inference]\nmax_batch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = PipelineConfig::from_toml("[sampler]\nface_samples = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brepgraph.toml");
        std::fs::write(&path, "[graph]\ncenter_and_scale = false\n").unwrap();
        assert!(!PipelineConfig::from_file(&path).unwrap().graph.center_and_scale);
        let err = PipelineConfig::from_file(&dir.path().join("none.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
