//! Offscreen platform: windows without a display.
//!
//! Every presented frame is scaled to the window's device size and kept in a
//! per-window [`FrameLog`], which makes the render loop observable in tests
//! and in batch rendering.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::input::InputEvent;
use crate::core::pixel_buffer::PixelBuffer;
use crate::core::presentation::{BufferStrategy, PresentError, QualityHint, SurfaceStatus};
use crate::core::routing;
use crate::error::Result;
use crate::traits::platform::{Platform, RealizeRequest, Realized, Shell};

/// Presented frames retained per window; older frames are discarded
pub const FRAME_LOG_CAPACITY: usize = 512;

/// Frames shown by one headless window
#[derive(Debug, Default)]
pub struct FrameLog {
    frames: Mutex<VecDeque<PixelBuffer>>,
    shown: AtomicU64,
}

impl FrameLog {
    fn push(&self, frame: PixelBuffer) {
        let mut frames = self.frames.lock();
        if frames.len() == FRAME_LOG_CAPACITY {
            frames.pop_front();
        }
        frames.push_back(frame);
        self.shown.fetch_add(1, Ordering::AcqRel);
    }

    /// Total frames shown, including discarded ones
    pub fn count(&self) -> u64 {
        self.shown.load(Ordering::Acquire)
    }

    /// Retained frames, oldest first
    pub fn frames(&self) -> Vec<PixelBuffer> {
        self.frames.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<PixelBuffer> {
        self.frames.lock().back().cloned()
    }
}

#[derive(Debug)]
struct HeadlessWindow {
    width: u32,
    height: u32,
    log: Arc<FrameLog>,
    open: AtomicBool,
    close_requests: AtomicUsize,
}

/// Platform whose windows live only in memory
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    windows: Arc<Mutex<HashMap<String, Arc<HeadlessWindow>>>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self, name: &str) -> Option<Arc<HeadlessWindow>> {
        self.windows.lock().get(name).cloned()
    }

    /// Frame log of the window realized as `name`
    pub fn frames(&self, name: &str) -> Option<Arc<FrameLog>> {
        self.window(name).map(|w| Arc::clone(&w.log))
    }

    /// Whether the platform window is still up
    pub fn is_open(&self, name: &str) -> bool {
        self.window(name)
            .is_some_and(|w| w.open.load(Ordering::Acquire))
    }

    /// How many times the window's shell was asked to close
    pub fn close_requests(&self, name: &str) -> usize {
        self.window(name)
            .map_or(0, |w| w.close_requests.load(Ordering::Acquire))
    }

    /// Deliver an input event the way the platform event thread would
    pub fn send(&self, name: &str, event: &InputEvent) -> bool {
        self.is_open(name) && routing::dispatch(name, event)
    }

    /// Simulate the user closing the window
    pub fn close_window(&self, name: &str) -> bool {
        let Some(window) = self.window(name) else {
            return false;
        };
        if !window.open.swap(false, Ordering::AcqRel) {
            return false;
        }
        routing::close(name);
        true
    }
}

impl Platform for HeadlessPlatform {
    fn realize(&self, request: &RealizeRequest) -> Result<Realized> {
        let window = Arc::new(HeadlessWindow {
            width: request.width,
            height: request.height,
            log: Arc::new(FrameLog::default()),
            open: AtomicBool::new(true),
            close_requests: AtomicUsize::new(0),
        });
        self.windows
            .lock()
            .insert(request.name.clone(), Arc::clone(&window));

        let strategy = HeadlessStrategy {
            back: vec![0; request.width as usize * request.height as usize],
            width: request.width,
            height: request.height,
            log: Arc::clone(&window.log),
        };
        Ok(Realized {
            shell: Arc::new(HeadlessShell { window }),
            strategy: Box::new(strategy),
        })
    }
}

struct HeadlessShell {
    window: Arc<HeadlessWindow>,
}

impl Shell for HeadlessShell {
    fn device_size(&self) -> (u32, u32) {
        (self.window.width, self.window.height)
    }

    fn request_close(&self) {
        self.window.close_requests.fetch_add(1, Ordering::AcqRel);
        self.window.open.store(false, Ordering::Release);
    }
}

/// Back buffer in memory; `show` appends it to the frame log.
/// Scaling is always nearest-neighbour.
struct HeadlessStrategy {
    back: Vec<u32>,
    width: u32,
    height: u32,
    log: Arc<FrameLog>,
}

impl BufferStrategy for HeadlessStrategy {
    fn blit(&mut self, frame: &PixelBuffer, _hint: QualityHint) -> std::result::Result<SurfaceStatus, PresentError> {
        frame.scale_into(&mut self.back, self.width, self.height);
        Ok(SurfaceStatus::Ok)
    }

    fn show(&mut self) -> std::result::Result<SurfaceStatus, PresentError> {
        let frame = PixelBuffer::from_pixels(self.width, self.height, self.back.clone())
            .ok_or_else(|| PresentError::Unavailable("back buffer size mismatch".to_string()))?;
        self.log.push(frame);
        Ok(SurfaceStatus::Ok)
    }
}
