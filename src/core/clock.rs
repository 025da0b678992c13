use std::thread;
use std::time::{Duration, Instant};

/// Frame-rate limiter with overrun compensation
///
/// Each iteration asks for `interval - work - overrun` of sleep, where
/// `overrun` is how much longer the time from end of work to end of
/// presentation took than the delay that was requested. The carried error
/// is zero whenever the previous iteration had no time left to sleep.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval_ms: f64,
    overrun_ms: f64,
}

impl FramePacer {
    /// Pacer for `fps` frames per second
    pub fn new(fps: f64) -> Self {
        Self {
            interval_ms: 1000.0 / fps,
            overrun_ms: 0.0,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn overrun_ms(&self) -> f64 {
        self.overrun_ms
    }

    /// Sleep to request after `work_ms` of work; may be zero or negative
    pub fn delay_ms(&self, work_ms: f64) -> f64 {
        self.interval_ms - work_ms - self.overrun_ms
    }

    /// Record how long the requested delay actually took, measured from the
    /// end of the frame's work to the end of its presentation
    pub fn settle(&mut self, requested_delay_ms: f64, achieved_ms: f64) {
        self.overrun_ms = if requested_delay_ms > 0.0 {
            achieved_ms - requested_delay_ms
        } else {
            0.0
        };
    }

    /// Block the current thread for `delay_ms` if positive. Delays too large
    /// for a `Duration` are skipped.
    pub fn pause(delay_ms: f64) {
        if delay_ms <= 0.0 {
            return;
        }
        match Duration::try_from_secs_f64(delay_ms / 1000.0) {
            Ok(delay) => thread::sleep(delay),
            Err(err) => log::warn!("frame delay of {}ms not slept: {}", delay_ms, err),
        }
    }
}

/// Milliseconds elapsed since `start`
pub fn millis_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Frame-rate meter - averages completed frames over one-second windows
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame; returns the new reading when a window closes
    pub fn tick(&mut self) -> Option<f64> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames as f64 / elapsed;
            self.frames = 0;
            self.window_start = Instant::now();
            Some(self.fps)
        } else {
            None
        }
    }

    /// Last completed reading, zero until the first second has passed
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}
