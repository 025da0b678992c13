pub mod clock;
pub mod gpu_context;
pub mod input;
pub mod input_adapter;
pub mod pixel_buffer;
pub mod presentation;
pub mod render_loop;
pub mod routing;
pub mod surface_renderer;
pub mod window;

pub use clock::{FpsMeter, FramePacer};
pub use gpu_context::GpuContext;
pub use input::{EventKind, InputEvent, InputState, KeyInfo, Modifiers, MouseButton, MouseInfo};
pub use input_adapter::WinitInputAdapter;
pub use pixel_buffer::{argb, channels, rgb, Canvas, DrawContext, PixelBuffer};
pub use presentation::{
    present, BufferStrategy, PresentError, PresentOutcome, QualityHint, SurfaceStatus,
    MAX_PRESENT_ATTEMPTS,
};
pub use render_loop::{LoopState, TimingPolicy};
pub use routing::{EventHandler, EventRoutes, EventSink, Route};
pub use surface_renderer::SurfaceRenderer;
pub use window::{DrawFn, SetupFn, Sketch, Window};
