//! Desktop platform backed by winit and wgpu.
//!
//! winit needs its event loop on the main thread, so [`run`] parks the main
//! thread in the loop and runs the sketch on a thread of its own. Windows are
//! opened by sending requests through an [`EventLoopProxy`]; each opened
//! window gets a [`SurfaceRenderer`] owned by its render thread.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window as WinitWindow, WindowId},
};

use crate::core::input_adapter::WinitInputAdapter;
use crate::core::render_loop::panic_message;
use crate::core::routing;
use crate::core::surface_renderer::SurfaceRenderer;
use crate::error::{EaselError, Result};
use crate::traits::platform::{Platform, RealizeRequest, Realized, Shell};

type OpenReply = mpsc::Sender<Result<Arc<WinitWindow>>>;

/// Requests handled on the event loop thread
pub enum ShellCommand {
    Open {
        request: RealizeRequest,
        reply: OpenReply,
    },
    Close(String),
    /// The sketch function returned
    SketchDone,
}

/// Run `sketch` against the desktop and drive the event loop until the
/// sketch has returned and every window it opened is closed.
///
/// Must be called from the main thread.
pub fn run<F>(sketch: F) -> anyhow::Result<()>
where
    F: FnOnce(Desktop) -> anyhow::Result<()> + Send + 'static,
{
    let event_loop = EventLoop::<ShellCommand>::with_user_event()
        .build()
        .map_err(EaselError::from)?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let proxy = event_loop.create_proxy();
    let desktop = Desktop::new(proxy.clone());
    let sketch_thread = thread::Builder::new()
        .name("easel-sketch".to_string())
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| sketch(desktop)));
            // the loop may already be gone if it failed
            let _ = proxy.send_event(ShellCommand::SketchDone);
            match result {
                Ok(result) => result,
                Err(payload) => Err(anyhow!("sketch panicked: {}", panic_message(payload.as_ref()))),
            }
        })
        .map_err(EaselError::from)?;

    let mut app = ShellApp::default();
    event_loop
        .run_app(&mut app)
        .map_err(EaselError::from)
        .context("event loop terminated abnormally")?;
    info!("event loop finished");

    sketch_thread
        .join()
        .map_err(|_| anyhow!("sketch thread panicked"))?
}

/// Handle for opening windows from the sketch thread
#[derive(Clone)]
pub struct Desktop {
    proxy: Arc<Mutex<EventLoopProxy<ShellCommand>>>,
}

impl Desktop {
    fn new(proxy: EventLoopProxy<ShellCommand>) -> Self {
        Self {
            proxy: Arc::new(Mutex::new(proxy)),
        }
    }

    fn send(&self, command: ShellCommand) -> Result<()> {
        self.proxy
            .lock()
            .send_event(command)
            .map_err(|_| EaselError::EventLoopClosed)
    }
}

impl Platform for Desktop {
    /// Blocks until the event loop has created the window, so it must not be
    /// called from the event loop thread.
    fn realize(&self, request: &RealizeRequest) -> Result<Realized> {
        let (reply, response) = mpsc::channel();
        self.send(ShellCommand::Open {
            request: request.clone(),
            reply,
        })?;
        let window = response.recv().map_err(|_| EaselError::EventLoopClosed)??;

        let strategy = match SurfaceRenderer::new(Arc::clone(&window), request.hint) {
            Ok(strategy) => strategy,
            Err(err) => {
                let _ = self.send(ShellCommand::Close(request.name.clone()));
                return Err(err);
            }
        };

        Ok(Realized {
            shell: Arc::new(DesktopShell {
                name: request.name.clone(),
                window,
                desktop: self.clone(),
            }),
            strategy: Box::new(strategy),
        })
    }
}

struct DesktopShell {
    name: String,
    window: Arc<WinitWindow>,
    desktop: Desktop,
}

impl Shell for DesktopShell {
    fn device_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn request_close(&self) {
        self.window.set_visible(false);
        if self.desktop.send(ShellCommand::Close(self.name.clone())).is_err() {
            debug!("window `{}`: event loop already gone", self.name);
        }
    }
}

struct OpenWindow {
    name: String,
    window: Arc<WinitWindow>,
    input: WinitInputAdapter,
}

#[derive(Default)]
struct ShellApp {
    windows: HashMap<WindowId, OpenWindow>,
    ids: HashMap<String, WindowId>,
    queued: Vec<(RealizeRequest, OpenReply)>,
    resumed: bool,
    sketch_done: bool,
}

impl ShellApp {
    fn open(&mut self, event_loop: &ActiveEventLoop, request: RealizeRequest, reply: OpenReply) {
        let attributes = WinitWindow::default_attributes()
            .with_title(request.title.as_str())
            .with_inner_size(PhysicalSize::new(request.width, request.height))
            .with_resizable(false);

        let result = event_loop
            .create_window(attributes)
            .map(Arc::new)
            .map_err(EaselError::from);
        if let Ok(window) = &result {
            debug!("window `{}`: created {:?}", request.name, window.id());
            self.ids.insert(request.name.clone(), window.id());
            self.windows.insert(
                window.id(),
                OpenWindow {
                    name: request.name.clone(),
                    window: Arc::clone(window),
                    input: WinitInputAdapter::new(),
                },
            );
        }
        if reply.send(result).is_err() {
            warn!("window `{}`: requester went away", request.name);
            self.remove_named(&request.name);
        }
    }

    fn remove(&mut self, id: WindowId) -> Option<OpenWindow> {
        let open = self.windows.remove(&id)?;
        if self.ids.get(&open.name) == Some(&id) {
            self.ids.remove(&open.name);
        }
        Some(open)
    }

    fn remove_named(&mut self, name: &str) {
        if let Some(id) = self.ids.get(name).copied() {
            if let Some(open) = self.remove(id) {
                open.window.set_visible(false);
            }
        }
    }

    fn exit_if_finished(&self, event_loop: &ActiveEventLoop) {
        if self.sketch_done && self.windows.is_empty() && self.queued.is_empty() {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler<ShellCommand> for ShellApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.resumed = true;
        for (request, reply) in std::mem::take(&mut self.queued) {
            self.open(event_loop, request, reply);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, command: ShellCommand) {
        match command {
            ShellCommand::Open { request, reply } => {
                if self.resumed {
                    self.open(event_loop, request, reply);
                } else {
                    self.queued.push((request, reply));
                }
            }
            ShellCommand::Close(name) => self.remove_named(&name),
            ShellCommand::SketchDone => {
                debug!("sketch returned, {} window(s) open", self.windows.len());
                self.sketch_done = true;
            }
        }
        self.exit_if_finished(event_loop);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(open) = self.remove(window_id) {
                    open.window.set_visible(false);
                    routing::close(&open.name);
                    info!("window `{}`: closed by user", open.name);
                }
                self.exit_if_finished(event_loop);
            }
            WindowEvent::Destroyed => {
                if let Some(open) = self.remove(window_id) {
                    routing::close(&open.name);
                }
                self.exit_if_finished(event_loop);
            }
            event => {
                if let Some(open) = self.windows.get_mut(&window_id) {
                    for input in open.input.translate(&event) {
                        routing::dispatch(&open.name, &input);
                    }
                }
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        for (_, open) in self.windows.drain() {
            if routing::close(&open.name) {
                warn!("window `{}`: still open at exit", open.name);
            }
        }
        if !self.queued.is_empty() {
            error!("{} window request(s) never served", self.queued.len());
        }
    }
}
