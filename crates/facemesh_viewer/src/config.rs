use std::path::Path;

use anyhow::Context;
use facemesh::{FeatureCatalog, FrameLoopConfig};
use serde::{Deserialize, Serialize};

/// Settings that can be loaded from a JSON file with `--config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub frames: FrameLoopConfig,
    pub catalog: FeatureCatalog,
    /// Pupil disc radius as a fraction of the face width.
    pub pupil_size: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            frames: FrameLoopConfig::default(),
            catalog: FeatureCatalog::default(),
            pupil_size: 0.025,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use facemesh::Color;

    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(ViewerConfig::from_json("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_partial_config_overrides_fields() {
        let config = ViewerConfig::from_json(
            r#"{
                "frames": {"maxFaces": 2, "adapter": {"scale": 0.01}},
                "catalog": {"skinColor": 16777215, "features": []},
                "pupilSize": 0.05
            }"#,
        )
        .unwrap();
        assert_eq!(config.frames.max_faces.get(), 2);
        assert_eq!(config.frames.adapter.scale, 0.01);
        assert_eq!(config.catalog.skin_color, Color::EYE_WHITE);
        assert!(config.catalog.features.is_empty());
        assert_eq!(config.pupil_size, 0.05);
    }

    #[test]
    fn test_zero_max_faces_is_rejected() {
        assert!(ViewerConfig::from_json(r#"{"frames": {"maxFaces": 0}}"#).is_err());
    }

    #[test]
    fn test_unknown_file_is_an_error() {
        assert!(ViewerConfig::load(Path::new("/nonexistent/facemesh.json")).is_err());
    }
}
