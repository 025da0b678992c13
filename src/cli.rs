// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::WindowConfig;
use crate::core::presentation::QualityHint;
use crate::core::render_loop::TimingPolicy;
use crate::error::Result;

#[derive(Parser, Debug, Clone)]
#[command(name = "easel")]
#[command(about = "Animated sketch windows", long_about = None)]
pub struct Cli {
    /// JSON window configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Target frames per second
    #[arg(long)]
    pub fps: Option<f64>,

    /// Scaling quality: low, mid, high or highest
    #[arg(long)]
    pub hint: Option<QualityHint>,

    /// Timing policy: safety or speed
    #[arg(long)]
    pub refresher: Option<TimingPolicy>,

    /// Window name; with several windows a `-<i>` suffix is added
    #[arg(long)]
    pub name: Option<String>,

    /// Number of windows to open
    #[arg(long, default_value_t = 1)]
    pub windows: usize,
}

impl Cli {
    /// Config file (or defaults) with the command-line overrides applied
    pub fn window_config(&self) -> Result<WindowConfig> {
        let mut config = match &self.config {
            Some(path) => WindowConfig::load(path)?,
            None => WindowConfig::default(),
        };
        if let Some(width) = self.width {
            config.width = Some(width);
        }
        if let Some(height) = self.height {
            config.height = Some(height);
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(hint) = self.hint {
            config.hint = hint;
        }
        if let Some(refresher) = self.refresher {
            config.refresher = refresher;
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }
        config.validate()?;
        Ok(config)
    }

    /// Config for the `index`-th window
    pub fn config_for(&self, base: &WindowConfig, index: usize) -> WindowConfig {
        let mut config = base.clone();
        if self.windows > 1 {
            config.name = base.name.as_ref().map(|name| format!("{name}-{index}"));
        }
        config
    }
}
