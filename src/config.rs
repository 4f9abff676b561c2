//! Pipeline configuration
//!
//! Stored as RON. Every field has a default, so a config file only needs
//! the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::rasterizer::{Color, Fog};

/// Default config file looked up by the demo
pub const CONFIG_FILE: &str = "bonnie-raster.ron";

/// Error type for config loading and saving
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(ron::error::SpannedError),
    SerializeError(ron::Error),
    ValidationError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(e: ron::error::SpannedError) -> Self {
        ConfigError::ParseError(e)
    }
}

impl From<ron::Error> for ConfigError {
    fn from(e: ron::Error) -> Self {
        ConfigError::SerializeError(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            ConfigError::ValidationError(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which planes the renderer clips against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipMode {
    /// Six view-space frustum planes
    #[default]
    Frustum,
    /// Near/far in view space, then the four screen edges after projection
    Frame,
}

/// Span filler arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arithmetic {
    /// Scalar floating point reference
    #[default]
    Float,
    /// Floating point in 4-pixel chunks
    FloatWide,
    /// 16.16 texels, 2.30 reciprocal depth
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    /// Horizontal field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Triangle list capacity; the vertex buffer holds three times as many
    pub max_triangles: usize,
    pub backface_culling: bool,
    pub clip_mode: ClipMode,
    pub arithmetic: Arithmetic,
    pub mipmapping: bool,
    pub background: Color,
    pub fog: Fog,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fov: 90.0,
            near: 0.1,
            far: 100.0,
            max_triangles: 50_000,
            backface_culling: true,
            clip_mode: ClipMode::Frustum,
            arithmetic: Arithmetic::Float,
            mipmapping: true,
            background: Color::new(24, 24, 32),
            fog: Fog::default(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));
        if self.width == 0 || self.height == 0 {
            return fail(format!("viewport {}x{} is empty", self.width, self.height));
        }
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return fail(format!("fov {} outside (0, 180)", self.fov));
        }
        if !(self.near > 0.0 && self.near.is_finite()) {
            return fail(format!("near {} must be positive", self.near));
        }
        if !(self.far > self.near && self.far.is_finite()) {
            return fail(format!("far {} must exceed near {}", self.far, self.near));
        }
        if self.max_triangles == 0 {
            return fail("max_triangles must be non-zero".to_string());
        }
        Ok(())
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_ron_str(&contents)?;
        log::info!("loaded render config from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = RenderConfig::from_ron_str("(width: 64, height: 48, clip_mode: Frame)").unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 48);
        assert_eq!(config.clip_mode, ClipMode::Frame);
        assert_eq!(config.fov, 90.0);
        assert_eq!(config.arithmetic, Arithmetic::Float);
    }

    #[test]
    fn test_rejects_bad_values() {
        for src in [
            "(width: 0)",
            "(fov: 180.0)",
            "(near: 0.0)",
            "(near: 5.0, far: 5.0)",
            "(max_triangles: 0)",
        ] {
            assert!(
                matches!(RenderConfig::from_ron_str(src), Err(ConfigError::ValidationError(_))),
                "{}",
                src
            );
        }
        assert!(matches!(
            RenderConfig::from_ron_str("(width: \"wide\")"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = RenderConfig {
            width: 128,
            arithmetic: Arithmetic::Fixed,
            fog: Fog::new(Color::new(1, 2, 3), 2.0, 9.0),
            ..RenderConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = RenderConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RenderConfig::load(dir.path().join("nope.ron")),
            Err(ConfigError::IoError(_))
        ));
    }
}
