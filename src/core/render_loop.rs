use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::clock::{millis_since, FpsMeter, FramePacer};
use super::pixel_buffer::DrawContext;
use super::presentation::{present, BufferStrategy, PresentError, PresentOutcome};
use super::window::{DrawFn, Window};

/// How the render loop resolves the window's canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingPolicy {
    /// Take a fresh drawing context from the current canvas every iteration,
    /// so a replaced canvas is picked up on the next frame
    #[default]
    Safety,
    /// Hold one drawing context on the canvas that was current at loop start
    /// for the whole run; replacing the canvas has no effect until the loop
    /// is restarted
    Speed,
}

impl TimingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingPolicy::Safety => "safety",
            TimingPolicy::Speed => "speed",
        }
    }
}

impl fmt::Display for TimingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safety" => Ok(TimingPolicy::Safety),
            "speed" => Ok(TimingPolicy::Speed),
            _ => Err(format!("unknown refresher `{s}` (expected safety or speed)")),
        }
    }
}

/// Lifecycle of a render loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Starting = 0,
    Running = 1,
    Stopped = 2,
}

#[derive(Debug)]
pub(crate) struct LoopStateCell(AtomicU8);

impl LoopStateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LoopState::Starting as u8))
    }

    pub(crate) fn get(&self) -> LoopState {
        match self.0.load(Ordering::Acquire) {
            0 => LoopState::Starting,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Marks the loop stopped when the render thread leaves `run`, unwinding
/// included
struct StopGuard<S>(Window<S>);

impl<S> Drop for StopGuard<S> {
    fn drop(&mut self) {
        self.0.loop_state_cell().set(LoopState::Stopped);
    }
}

/// Per-window animation loop, run on its own thread
pub(crate) struct RenderLoop<S, D> {
    window: Window<S>,
    strategy: Box<dyn BufferStrategy>,
    draw: Option<DrawFn<S, D>>,
    state: Option<D>,
    pacer: FramePacer,
    meter: FpsMeter,
}

impl<S, D> RenderLoop<S, D>
where
    S: Send + 'static,
    D: Send + 'static,
{
    pub(crate) fn new(
        window: Window<S>,
        strategy: Box<dyn BufferStrategy>,
        draw: Option<DrawFn<S, D>>,
        state: D,
    ) -> Self {
        let pacer = FramePacer::new(window.fps());
        Self {
            window,
            strategy,
            draw,
            state: Some(state),
            pacer,
            meter: FpsMeter::new(),
        }
    }

    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("easel-render-{}", self.window.name()))
            .spawn(move || self.run())
    }

    fn run(mut self) {
        let stopped = StopGuard(self.window.clone());
        self.window.loop_state_cell().set(LoopState::Running);
        info!(
            "window `{}`: render loop started ({} fps, {} policy)",
            self.window.name(),
            self.window.fps(),
            self.window.policy()
        );

        match self.window.policy() {
            TimingPolicy::Safety => loop {
                let canvas = self.window.canvas();
                let mut ctx = canvas.draw_context();
                if !self.iterate(&mut ctx) {
                    break;
                }
            },
            TimingPolicy::Speed => {
                let canvas = self.window.canvas();
                let mut ctx = canvas.draw_context();
                while self.iterate(&mut ctx) {}
            }
        }

        drop(stopped);
        info!(
            "window `{}`: render loop stopped after {} frames",
            self.window.name(),
            self.window.frame_count()
        );
    }

    /// One frame: callback, pacing sleep, presentation. Returns whether the
    /// loop should continue.
    fn iterate(&mut self, ctx: &mut DrawContext<'_>) -> bool {
        let started = Instant::now();
        let frame = self.window.frame_count();

        if self.window.is_active() {
            if let Some(draw) = self.draw.as_mut() {
                let Some(previous) = self.state.take() else {
                    return false;
                };
                let window = &self.window;
                match panic::catch_unwind(AssertUnwindSafe(|| draw(ctx, window, frame, previous))) {
                    Ok(Ok(next)) => self.state = Some(next),
                    Ok(Err(err)) => {
                        error!(
                            "window `{}`: frame callback failed on frame {}: {:?}",
                            window.name(),
                            frame,
                            err
                        );
                        return false;
                    }
                    Err(payload) => {
                        error!(
                            "window `{}`: frame callback panicked on frame {}: {}",
                            window.name(),
                            frame,
                            panic_message(payload.as_ref())
                        );
                        return false;
                    }
                }
            }
        }

        let work_done = Instant::now();
        let delay = self.pacer.delay_ms(millis_since(started));
        FramePacer::pause(delay);

        let strategy = self.strategy.as_mut();
        let hint = self.window.hint();
        let presented = panic::catch_unwind(AssertUnwindSafe(|| present(strategy, &**ctx, hint)))
            .unwrap_or_else(|payload| {
                Err(PresentError::Unavailable(format!(
                    "presentation panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match presented {
            Ok(PresentOutcome::Shown { retries: 0 }) => {}
            Ok(PresentOutcome::Shown { retries }) => {
                debug!(
                    "window `{}`: frame {} shown after {} retries",
                    self.window.name(),
                    frame,
                    retries
                );
            }
            Ok(PresentOutcome::Dropped) => {
                warn!(
                    "window `{}`: surface kept losing contents, dropped frame {}",
                    self.window.name(),
                    frame
                );
            }
            Err(err) => {
                error!("window `{}`: presentation failed: {}", self.window.name(), err);
                return false;
            }
        }

        self.pacer.settle(delay, millis_since(work_done));

        if !self.window.is_active() {
            return false;
        }
        self.window.complete_frame();
        if let Some(fps) = self.meter.tick() {
            self.window.record_fps(fps);
        }
        true
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults_to_safety() {
        assert_eq!(TimingPolicy::default(), TimingPolicy::Safety);
    }

    #[test]
    fn policy_parses_and_prints() {
        assert_eq!("speed".parse::<TimingPolicy>(), Ok(TimingPolicy::Speed));
        assert_eq!("Safety".parse::<TimingPolicy>(), Ok(TimingPolicy::Safety));
        assert!("fast".parse::<TimingPolicy>().is_err());
        assert_eq!(TimingPolicy::Speed.to_string(), "speed");
    }

    #[test]
    fn loop_state_cell_round_trips() {
        let cell = LoopStateCell::new();
        assert_eq!(cell.get(), LoopState::Starting);
        cell.set(LoopState::Running);
        assert_eq!(cell.get(), LoopState::Running);
        cell.set(LoopState::Stopped);
        assert_eq!(cell.get(), LoopState::Stopped);
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
