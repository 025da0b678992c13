pub mod cli;
pub mod config;
pub mod core;
pub mod desktop;
pub mod error;
pub mod headless;
pub mod traits;

pub use crate::config::WindowConfig;
pub use crate::core::{
    argb, rgb, Canvas, DrawContext, EventKind, InputEvent, InputState, KeyInfo, LoopState,
    Modifiers, MouseButton, MouseInfo, PixelBuffer, QualityHint, Route, Sketch, TimingPolicy,
    Window,
};
pub use crate::error::{EaselError, Result};
pub use crate::headless::HeadlessPlatform;
pub use crate::traits::platform::Platform;
