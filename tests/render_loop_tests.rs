use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use easel::core::presentation::{BufferStrategy, PresentError, QualityHint, SurfaceStatus};
use easel::traits::platform::{Platform, RealizeRequest, Realized, Shell};
use easel::{
    rgb, Canvas, DrawContext, HeadlessPlatform, LoopState, PixelBuffer, Sketch, TimingPolicy,
    Window, WindowConfig,
};
use parking_lot::Mutex;

const RED: u32 = rgb(255, 0, 0);
const BLUE: u32 = rgb(0, 0, 255);

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn is_uniform(frame: &PixelBuffer) -> bool {
    let first = frame.pixels()[0];
    frame.pixels().iter().all(|&p| p == first)
}

struct FixedShell;

impl Shell for FixedShell {
    fn device_size(&self) -> (u32, u32) {
        (8, 8)
    }

    fn request_close(&self) {}
}

/// Strategy whose blit panics after a few good frames
struct BrokenBlit {
    shown: u32,
}

impl BufferStrategy for BrokenBlit {
    fn blit(&mut self, _: &PixelBuffer, _: QualityHint) -> Result<SurfaceStatus, PresentError> {
        if self.shown == 2 {
            panic!("surface driver crashed");
        }
        Ok(SurfaceStatus::Ok)
    }

    fn show(&mut self) -> Result<SurfaceStatus, PresentError> {
        self.shown += 1;
        Ok(SurfaceStatus::Ok)
    }
}

struct BrokenPlatform;

impl Platform for BrokenPlatform {
    fn realize(&self, _: &RealizeRequest) -> easel::Result<Realized> {
        Ok(Realized {
            shell: Arc::new(FixedShell),
            strategy: Box::new(BrokenBlit { shown: 0 }),
        })
    }
}

#[cfg(test)]
mod render_loop_tests {
    use super::*;

    #[test]
    fn test_counter_at_50_fps_for_250ms() {
        let platform = HeadlessPlatform::new();
        let sketch = Sketch::new(()).draw(
            |_: &mut DrawContext<'_>, _: &Window<()>, _: u64, count: u64| Ok(count + 1),
        );
        let window = Window::show(
            &platform,
            Canvas::new(16, 16),
            WindowConfig::named("e2e-50fps").with_fps(50.0),
            sketch,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(250));
        let frames = window.frame_count();
        window.close();
        window.join();

        assert!(
            (10..=14).contains(&frames),
            "expected about 12 frames, got {}",
            frames
        );
    }

    #[test]
    fn test_frame_numbers_are_sequential_from_zero() {
        let platform = HeadlessPlatform::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let sketch = Sketch::new(()).draw(
            move |_: &mut DrawContext<'_>, _: &Window<()>, frame: u64, state: ()| {
                record.lock().push(frame);
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("sequential-frames").with_fps(200.0),
            sketch,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || window.frame_count() >= 30));
        window.close();
        window.join();

        let seen = seen.lock().clone();
        let expected: Vec<u64> = (0..seen.len() as u64).collect();
        assert_eq!(seen, expected);
        let completed = window.frame_count();
        assert!(seen.len() as u64 == completed || seen.len() as u64 == completed + 1);
        assert_eq!(window.loop_state(), LoopState::Stopped);
    }

    #[test]
    fn test_callback_error_stops_loop_but_not_window() {
        let platform = HeadlessPlatform::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&calls);
        let sketch = Sketch::new(()).draw(
            move |_: &mut DrawContext<'_>, _: &Window<()>, frame: u64, state: ()| {
                record.lock().push(frame);
                if frame == 3 {
                    anyhow::bail!("frame {} is broken", frame);
                }
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("callback-error").with_fps(200.0),
            sketch,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            window.loop_state() == LoopState::Stopped
        }));
        window.join();

        assert_eq!(*calls.lock(), vec![0, 1, 2, 3]);
        assert_eq!(window.frame_count(), 3);
        assert!(window.is_active());
        // the failing iteration presents nothing
        assert_eq!(platform.frames("callback-error").unwrap().count(), 3);

        window.close();
        assert!(!window.is_active());
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let platform = HeadlessPlatform::new();
        let sketch = Sketch::new(()).draw(
            |_: &mut DrawContext<'_>, _: &Window<()>, frame: u64, state: ()| {
                if frame == 1 {
                    panic!("deliberate panic in frame callback");
                }
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("callback-panic").with_fps(200.0),
            sketch,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            window.loop_state() == LoopState::Stopped
        }));
        window.join();
        assert_eq!(window.frame_count(), 1);
        assert!(window.is_active());
        window.close();
    }

    #[test]
    fn test_presentation_panic_stops_loop() {
        let window = Window::show(
            &BrokenPlatform,
            Canvas::new(8, 8),
            WindowConfig::named("present-panic").with_fps(200.0),
            Sketch::<(), ()>::new(()),
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            window.loop_state() == LoopState::Stopped
        }));
        window.join();
        assert_eq!(window.loop_state(), LoopState::Stopped);
        // the frame whose presentation failed is not counted
        assert_eq!(window.frame_count(), 2);

        window.close();
        assert!(!window.is_active());
        assert!(!easel::core::routing::is_registered("present-panic"));
    }

    #[test]
    fn test_safety_policy_follows_replaced_canvas() {
        let platform = HeadlessPlatform::new();
        let window = Window::show(
            &platform,
            Canvas::from_buffer(PixelBuffer::filled(4, 4, RED)),
            WindowConfig::named("safety-swap").with_fps(200.0),
            Sketch::<(), ()>::new(()),
        )
        .unwrap();
        let log = platform.frames("safety-swap").unwrap();

        assert!(wait_until(Duration::from_secs(5), || log.count() >= 2));
        assert_eq!(log.last().unwrap().pixels()[0], RED);

        let old = window.replace_canvas(Canvas::from_buffer(PixelBuffer::filled(4, 4, BLUE)));
        assert_eq!(old.snapshot().pixels()[0], RED);

        assert!(wait_until(Duration::from_secs(5), || {
            log.last().is_some_and(|f| f.pixels()[0] == BLUE)
        }));
        window.close();
        window.join();
    }

    #[test]
    fn test_speed_policy_keeps_start_canvas() {
        let platform = HeadlessPlatform::new();
        let drawn_into = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&drawn_into);
        let sketch = Sketch::new(()).draw(
            move |ctx: &mut DrawContext<'_>, _: &Window<()>, _: u64, state: ()| {
                record.lock().push(ctx.get_pixel(0, 0));
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::from_buffer(PixelBuffer::filled(4, 4, RED)),
            WindowConfig::named("speed-swap")
                .with_fps(200.0)
                .with_refresher(TimingPolicy::Speed),
            sketch,
        )
        .unwrap();
        let log = platform.frames("speed-swap").unwrap();
        assert!(wait_until(Duration::from_secs(5), || log.count() >= 2));

        let replacement = Canvas::from_buffer(PixelBuffer::filled(4, 4, BLUE));
        window.replace_canvas(replacement.clone());
        assert!(window.canvas().ptr_eq(&replacement));

        let shown = log.count();
        assert!(wait_until(Duration::from_secs(5), || log.count() >= shown + 10));
        window.close();
        window.join();

        assert!(log.frames().iter().all(|f| f.pixels()[0] == RED));
        assert!(drawn_into.lock().iter().all(|&p| p == Some(RED)));
    }

    #[test]
    fn test_presented_frames_never_mix_generations() {
        let platform = HeadlessPlatform::new();
        // paints the canvas in two halves; a frame must never catch one half
        let sketch = Sketch::new(()).draw(
            |ctx: &mut DrawContext<'_>, _: &Window<()>, frame: u64, state: ()| {
                let color = rgb((frame % 256) as u8, 0, 0);
                let (w, h) = ctx.dimensions();
                ctx.fill_rect(0, 0, w, h / 2, color);
                ctx.fill_rect(0, (h / 2) as i32, w, h - h / 2, color);
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::new(16, 16),
            WindowConfig::named("no-tearing")
                .with_fps(500.0)
                .with_size(32, 32),
            sketch,
        )
        .unwrap();

        let swapper = {
            let window = window.clone();
            thread::spawn(move || {
                for generation in 0..100u8 {
                    let fresh = PixelBuffer::filled(16, 16, rgb(0, generation, 255));
                    window.replace_canvas(Canvas::from_buffer(fresh));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };
        swapper.join().unwrap();
        window.close();
        window.join();

        let frames = platform.frames("no-tearing").unwrap().frames();
        assert!(!frames.is_empty());
        for frame in &frames {
            assert_eq!(frame.dimensions(), (32, 32));
            assert!(is_uniform(frame), "presented frame mixes two generations");
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let platform = HeadlessPlatform::new();
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("close-twice").with_fps(100.0),
            Sketch::<(), ()>::new(()),
        )
        .unwrap();

        window.close();
        window.close();
        assert!(!window.is_active());
        assert!(!easel::core::routing::is_registered("close-twice"));
        assert_eq!(platform.close_requests("close-twice"), 1);

        window.join();
        window.join();
        assert_eq!(window.loop_state(), LoopState::Stopped);
    }

    #[test]
    fn test_average_interval_converges_to_target() {
        let platform = HeadlessPlatform::new();
        let stamps = Arc::new(Mutex::new(Vec::with_capacity(128)));
        let record = Arc::clone(&stamps);
        let sketch = Sketch::new(()).draw(
            move |_: &mut DrawContext<'_>, _: &Window<()>, _: u64, state: ()| {
                record.lock().push(Instant::now());
                Ok(state)
            },
        );
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("average-interval").with_fps(100.0),
            sketch,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(10), || stamps.lock().len() >= 110));
        window.close();
        window.join();

        let stamps = stamps.lock();
        // skip thread start-up
        let first = stamps[5];
        let last = stamps[105];
        let average_ms = last.duration_since(first).as_secs_f64() * 1000.0 / 100.0;
        assert!(
            (average_ms - 10.0).abs() < 1.5,
            "average interval {:.3}ms, expected about 10ms",
            average_ms
        );
    }

    #[test]
    fn test_measured_fps_is_reported() {
        let platform = HeadlessPlatform::new();
        let window = Window::show(
            &platform,
            Canvas::new(8, 8),
            WindowConfig::named("measured-fps").with_fps(60.0),
            Sketch::<(), ()>::new(()),
        )
        .unwrap();

        assert_eq!(window.measured_fps(), 0.0);
        assert!(wait_until(Duration::from_secs(5), || window.measured_fps() > 0.0));
        let fps = window.measured_fps();
        window.close();
        window.join();
        assert!((40.0..=70.0).contains(&fps), "measured {}", fps);
    }
}
