use thiserror::Error;

/// Failures surfaced synchronously to the caller that opens a window.
///
/// Errors raised by frame callbacks or by a single presentation never reach
/// this type; the render loop contains them.
#[derive(Debug, Error)]
pub enum EaselError {
    #[error("window name `{0}` is already registered")]
    NameTaken(String),

    #[error("invalid window configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create platform window: {0}")]
    WindowCreation(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("the platform event loop is no longer running")]
    EventLoopClosed,

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible graphics adapter: {0}")]
    Adapter(String),

    #[error("failed to acquire graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface cannot be configured: {0}")]
    SurfaceUnsupported(String),

    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EaselError>;
