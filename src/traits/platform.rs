use std::sync::Arc;

use crate::core::presentation::{BufferStrategy, QualityHint};
use crate::error::Result;

/// Everything a platform needs to realize one window
#[derive(Debug, Clone, PartialEq)]
pub struct RealizeRequest {
    /// Routing identity of the window
    pub name: String,
    pub title: String,
    /// Device size in physical pixels; the canvas is stretched to fit
    pub width: u32,
    pub height: u32,
    pub hint: QualityHint,
}

/// Realized platform window: its shell plus the surface frames are presented to
pub struct Realized {
    pub shell: Arc<dyn Shell>,
    pub strategy: Box<dyn BufferStrategy>,
}

/// Platform-side handle of one open window
pub trait Shell: Send + Sync {
    /// Current drawable size in physical pixels
    fn device_size(&self) -> (u32, u32);

    /// Ask the platform to tear the window down. Must be safe to call more
    /// than once and from any thread.
    fn request_close(&self);
}

/// Source of platform windows
pub trait Platform {
    /// Create and show a window, returning once it is visible.
    /// Input for the window must be delivered through
    /// [`crate::core::routing::dispatch`] under `request.name`.
    fn realize(&self, request: &RealizeRequest) -> Result<Realized>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixel_buffer::PixelBuffer;
    use crate::core::presentation::{PresentError, SurfaceStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockShell {
        closes: AtomicUsize,
    }

    impl Shell for MockShell {
        fn device_size(&self) -> (u32, u32) {
            (320, 240)
        }

        fn request_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NullStrategy;

    impl BufferStrategy for NullStrategy {
        fn blit(&mut self, _: &PixelBuffer, _: QualityHint) -> std::result::Result<SurfaceStatus, PresentError> {
            Ok(SurfaceStatus::Ok)
        }

        fn show(&mut self) -> std::result::Result<SurfaceStatus, PresentError> {
            Ok(SurfaceStatus::Ok)
        }
    }

    struct MockPlatform;

    impl Platform for MockPlatform {
        fn realize(&self, request: &RealizeRequest) -> Result<Realized> {
            assert_eq!(request.name, "mock");
            Ok(Realized {
                shell: Arc::new(MockShell {
                    closes: AtomicUsize::new(0),
                }),
                strategy: Box::new(NullStrategy),
            })
        }
    }

    #[test]
    fn platform_realizes_shell_and_strategy() {
        let request = RealizeRequest {
            name: "mock".to_string(),
            title: "Mock".to_string(),
            width: 320,
            height: 240,
            hint: QualityHint::Low,
        };
        let mut realized = MockPlatform.realize(&request).unwrap();
        assert_eq!(realized.shell.device_size(), (320, 240));
        assert_eq!(
            realized.strategy.show().unwrap(),
            SurfaceStatus::Ok
        );
        realized.shell.request_close();
        realized.shell.request_close();
    }
}
