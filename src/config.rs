use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::presentation::QualityHint;
use crate::core::render_loop::TimingPolicy;
use crate::error::{EaselError, Result};

pub const DEFAULT_FPS: f64 = 60.0;

fn default_fps() -> f64 {
    DEFAULT_FPS
}

/// Window creation options
///
/// Unset sizes fall back to the canvas size and an unset name to a generated
/// `easel-<n>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Unique routing identity
    pub name: Option<String>,
    /// Title bar text, defaults to the name
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    pub hint: QualityHint,
    pub refresher: TimingPolicy,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            name: None,
            title: None,
            width: None,
            height: None,
            fps: DEFAULT_FPS,
            hint: QualityHint::default(),
            refresher: TimingPolicy::default(),
        }
    }
}

impl WindowConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_hint(mut self, hint: QualityHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_refresher(mut self, refresher: TimingPolicy) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(EaselError::InvalidConfig(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(EaselError::InvalidConfig(
                "window size must be non-zero".to_string(),
            ));
        }
        if self.name.as_deref().is_some_and(str::is_empty) {
            return Err(EaselError::InvalidConfig(
                "window name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EaselError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EaselError::InvalidConfig(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&text)
    }
}
