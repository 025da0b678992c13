use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};
use parking_lot::{Mutex, RwLock};

use super::input::{EventKind, InputEvent, InputState};
use super::pixel_buffer::{Canvas, DrawContext};
use super::presentation::QualityHint;
use super::render_loop::{panic_message, LoopState, LoopStateCell, RenderLoop, TimingPolicy};
use super::routing::{self, EventHandler, EventRoutes, EventSink, Route};
use crate::config::WindowConfig;
use crate::error::{EaselError, Result};
use crate::traits::platform::{Platform, RealizeRequest, Shell};

/// Frame callback: `(context, window, frame number, previous state) -> next state`
pub type DrawFn<S, D> =
    Box<dyn FnMut(&mut DrawContext<'_>, &Window<S>, u64, D) -> anyhow::Result<D> + Send>;

/// One-shot setup callback run before frame 0
pub type SetupFn<S, D> =
    Box<dyn FnOnce(&mut DrawContext<'_>, &Window<S>) -> anyhow::Result<D> + Send>;

/// User behaviour of a window
///
/// `S` is the event state shared with key/mouse handlers, `D` the draw state
/// threaded through the frame callback.
pub struct Sketch<S, D> {
    state: S,
    draw_state: Option<D>,
    setup: Option<SetupFn<S, D>>,
    draw: Option<DrawFn<S, D>>,
    routes: Vec<(Route, EventHandler<S>)>,
}

impl<S, D> Sketch<S, D> {
    /// Sketch with the given event state and no callbacks
    pub fn new(state: S) -> Self {
        Self {
            state,
            draw_state: None,
            setup: None,
            draw: None,
            routes: Vec::new(),
        }
    }

    pub fn draw(
        mut self,
        f: impl FnMut(&mut DrawContext<'_>, &Window<S>, u64, D) -> anyhow::Result<D> + Send + 'static,
    ) -> Self {
        self.draw = Some(Box::new(f));
        self
    }

    pub fn setup(
        mut self,
        f: impl FnOnce(&mut DrawContext<'_>, &Window<S>) -> anyhow::Result<D> + Send + 'static,
    ) -> Self {
        self.setup = Some(Box::new(f));
        self
    }

    /// Explicit initial draw state; takes precedence over the setup result
    pub fn draw_state(mut self, state: D) -> Self {
        self.draw_state = Some(state);
        self
    }

    pub fn on_key(
        mut self,
        ch: char,
        f: impl Fn(&InputEvent, &S) -> S + Send + Sync + 'static,
    ) -> Self {
        self.routes.push((Route::Char(ch), Arc::new(f)));
        self
    }

    pub fn on_event(
        mut self,
        kind: EventKind,
        f: impl Fn(&InputEvent, &S) -> S + Send + Sync + 'static,
    ) -> Self {
        self.routes.push((Route::Event(kind), Arc::new(f)));
        self
    }
}

pub(crate) struct WindowShared<S> {
    name: String,
    width: u32,
    height: u32,
    fps: f64,
    hint: QualityHint,
    policy: TimingPolicy,
    canvas: RwLock<Canvas>,
    active: AtomicBool,
    input: RwLock<InputState>,
    state: Mutex<S>,
    routes: EventRoutes<S>,
    shell: Arc<dyn Shell>,
    frames: AtomicU64,
    fps_bits: AtomicU64,
    loop_state: LoopStateCell,
    render_thread: Mutex<Option<JoinHandle<()>>>,
}

impl<S> WindowShared<S> {
    fn owner(&self) -> *const () {
        self as *const Self as *const ()
    }

    /// Flip `active` off and drop the routing entry. True on the first call only.
    fn deactivate(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        routing::unregister_owned(&self.name, self.owner());
        true
    }
}

impl<S: Send> EventSink for WindowShared<S> {
    fn dispatch(&self, event: &InputEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.input.write().apply(event);
        self.routes.apply(event, &mut self.state.lock());
    }

    fn platform_closed(&self) {
        if self.deactivate() {
            debug!("window `{}`: closed by platform", self.name);
        }
    }
}

/// An open sketch window
///
/// Cheap to clone; all clones refer to the same window. The render loop runs
/// on its own thread and is stopped by [`Window::close`] or by a failing
/// frame callback.
pub struct Window<S> {
    shared: Arc<WindowShared<S>>,
}

impl<S> Clone for Window<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Send + 'static> Window<S> {
    /// Realize a window for `canvas` and start animating it.
    ///
    /// Returns once the platform window is visible, the setup callback has
    /// run and the render thread has been launched.
    pub fn show<D: Default + Send + 'static>(
        platform: &dyn Platform,
        canvas: Canvas,
        config: WindowConfig,
        sketch: Sketch<S, D>,
    ) -> Result<Window<S>> {
        config.validate()?;
        if canvas.width() == 0 || canvas.height() == 0 {
            return Err(EaselError::InvalidConfig(format!(
                "canvas must not be empty, got {}x{}",
                canvas.width(),
                canvas.height()
            )));
        }

        let name = config.name.clone().unwrap_or_else(routing::next_name);
        if routing::is_registered(&name) {
            return Err(EaselError::NameTaken(name));
        }
        let width = config.width.unwrap_or(canvas.width());
        let height = config.height.unwrap_or(canvas.height());

        let realized = platform.realize(&RealizeRequest {
            name: name.clone(),
            title: config.title.clone().unwrap_or_else(|| name.clone()),
            width,
            height,
            hint: config.hint,
        })?;
        debug!("window `{}`: realized at {}x{}", name, width, height);

        let routes = EventRoutes::new();
        for (route, handler) in sketch.routes {
            routes.set(route, handler);
        }

        let shared = Arc::new(WindowShared {
            name,
            width,
            height,
            fps: config.fps,
            hint: config.hint,
            policy: config.refresher,
            canvas: RwLock::new(canvas),
            active: AtomicBool::new(true),
            input: RwLock::new(InputState::default()),
            state: Mutex::new(sketch.state),
            routes,
            shell: realized.shell,
            frames: AtomicU64::new(0),
            fps_bits: AtomicU64::new(0f64.to_bits()),
            loop_state: LoopStateCell::new(),
            render_thread: Mutex::new(None),
        });

        let sink: Arc<dyn EventSink> = shared.clone();
        if let Err(err) = routing::register(&shared.name, sink) {
            shared.shell.request_close();
            return Err(err);
        }
        let window = Window { shared };

        let setup_state = match sketch.setup {
            Some(setup) => match window.run_setup(setup) {
                Some(state) => Some(state),
                None => {
                    window.shared.loop_state.set(LoopState::Stopped);
                    return Ok(window);
                }
            },
            None => None,
        };
        let draw_state = sketch.draw_state.or(setup_state).unwrap_or_default();

        let handle = RenderLoop::new(window.clone(), realized.strategy, sketch.draw, draw_state)
            .spawn()
            .map_err(|err| {
                window.close();
                EaselError::from(err)
            })?;
        *window.shared.render_thread.lock() = Some(handle);

        Ok(window)
    }

    /// Run setup against the current canvas; `None` if it failed
    fn run_setup<D>(&self, setup: SetupFn<S, D>) -> Option<D> {
        let canvas = self.canvas();
        let mut ctx = canvas.draw_context();
        match panic::catch_unwind(AssertUnwindSafe(|| setup(&mut ctx, self))) {
            Ok(Ok(state)) => Some(state),
            Ok(Err(err)) => {
                error!("window `{}`: setup failed: {:?}", self.name(), err);
                None
            }
            Err(payload) => {
                error!(
                    "window `{}`: setup panicked: {}",
                    self.name(),
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }

    /// Register or replace the handler for key presses producing `ch`
    pub fn on_key(&self, ch: char, f: impl Fn(&InputEvent, &S) -> S + Send + Sync + 'static) {
        self.shared.routes.set(Route::Char(ch), Arc::new(f));
    }

    /// Register or replace the handler for every event of `kind`
    pub fn on_event(
        &self,
        kind: EventKind,
        f: impl Fn(&InputEvent, &S) -> S + Send + Sync + 'static,
    ) {
        self.shared.routes.set(Route::Event(kind), Arc::new(f));
    }

    pub fn remove_route(&self, route: Route) -> bool {
        self.shared.routes.remove(route)
    }
}

impl<S> Window<S> {
    /// Routing identity; also the default title
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Declared device width
    pub fn width(&self) -> u32 {
        self.shared.width
    }

    /// Declared device height
    pub fn height(&self) -> u32 {
        self.shared.height
    }

    /// Size the platform currently reports for the drawable area
    pub fn device_size(&self) -> (u32, u32) {
        self.shared.shell.device_size()
    }

    /// Target frame rate
    pub fn fps(&self) -> f64 {
        self.shared.fps
    }

    pub fn hint(&self) -> QualityHint {
        self.shared.hint
    }

    pub fn policy(&self) -> TimingPolicy {
        self.shared.policy
    }

    /// True until the window is closed; never becomes true again
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Current canvas reference
    ///
    /// While the loop runs, its render thread holds this canvas's drawing
    /// context. A frame callback must draw through the context it is given:
    /// calling [`Canvas::draw_context`] or [`Canvas::snapshot`] on this canvas
    /// from inside the callback blocks forever. [`Canvas::try_draw_context`]
    /// returns `None` there instead.
    pub fn canvas(&self) -> Canvas {
        self.shared.canvas.read().clone()
    }

    /// Swap the canvas read and written by later iterations; returns the old one.
    ///
    /// With [`TimingPolicy::Speed`] a running loop keeps using the canvas it
    /// started with.
    pub fn replace_canvas(&self, canvas: Canvas) -> Canvas {
        std::mem::replace(&mut *self.shared.canvas.write(), canvas)
    }

    /// Copy of the latest input snapshot
    pub fn input(&self) -> InputState {
        *self.shared.input.read()
    }

    /// Run `f` on the event state. Must not be called from an event handler.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.shared.state.lock())
    }

    pub fn set_state(&self, state: S) {
        *self.shared.state.lock() = state;
    }

    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.shared.state.lock().clone()
    }

    /// Completed render iterations
    pub fn frame_count(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }

    /// Frame rate measured over the last full second, zero before that
    pub fn measured_fps(&self) -> f64 {
        f64::from_bits(self.shared.fps_bits.load(Ordering::Relaxed))
    }

    pub fn loop_state(&self) -> LoopState {
        self.shared.loop_state.get()
    }

    /// Close the window. Later calls do nothing.
    ///
    /// `active` is cleared and the routing entry released before this
    /// returns; the render loop notices at the end of its current iteration.
    pub fn close(&self) {
        if self.shared.deactivate() {
            debug!("window `{}`: closed", self.shared.name);
            self.shared.shell.request_close();
        }
    }

    /// Wait for the render thread to finish. Returns immediately when called
    /// from the render thread itself or when already joined.
    pub fn join(&self) {
        let mut slot = self.shared.render_thread.lock();
        let is_render_thread = slot
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id());
        if is_render_thread {
            return;
        }
        if let Some(handle) = slot.take() {
            drop(slot);
            if handle.join().is_err() {
                error!("window `{}`: render thread panicked", self.shared.name);
            }
        }
    }

    pub(crate) fn loop_state_cell(&self) -> &LoopStateCell {
        &self.shared.loop_state
    }

    pub(crate) fn complete_frame(&self) {
        self.shared.frames.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_fps(&self, fps: f64) {
        self.shared.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
    }
}

impl<S> std::fmt::Debug for Window<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("name", &self.shared.name)
            .field("width", &self.shared.width)
            .field("height", &self.shared.height)
            .field("active", &self.is_active())
            .field("frames", &self.frame_count())
            .finish()
    }
}
