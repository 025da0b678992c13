use std::io::Write;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::info;

use easel::cli::Cli;
use easel::{desktop, rgb, Canvas, DrawContext, Sketch, Window};

// === Constants ===

const CANVAS_WIDTH: u32 = 320;
const CANVAS_HEIGHT: u32 = 240;
const RECT_COUNT: usize = 12;
const BACKGROUND: u32 = rgb(12, 12, 20);
const CURSOR: u32 = rgb(255, 255, 255);

// === Demo sketch ===

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
    size: u32,
    color: u32,
}

/// Draw state: the drifting rectangles plus the last clear request handled
#[derive(Debug, Clone, Default)]
struct Drift {
    rects: Vec<Rect>,
    clears_seen: u64,
}

impl Drift {
    fn seeded(seed: usize) -> Self {
        let rects = (0..RECT_COUNT)
            .map(|i| {
                let k = (seed * RECT_COUNT + i) as f32;
                Rect {
                    x: (k * 53.0) % CANVAS_WIDTH as f32,
                    y: (k * 31.0) % CANVAS_HEIGHT as f32,
                    dx: 0.5 + (k * 0.37) % 2.0,
                    dy: 0.3 + (k * 0.61) % 1.5,
                    size: 6 + (i as u32 * 5) % 18,
                    color: rgb(
                        (80 + i * 13 % 175) as u8,
                        (60 + (seed + i) * 29 % 195) as u8,
                        (120 + i * 41 % 135) as u8,
                    ),
                }
            })
            .collect();
        Self {
            rects,
            clears_seen: 0,
        }
    }
}

fn advance(rect: &mut Rect, width: f32, height: f32) {
    rect.x += rect.dx;
    rect.y += rect.dy;
    let max_x = width - rect.size as f32;
    let max_y = height - rect.size as f32;
    if rect.x < 0.0 || rect.x > max_x {
        rect.dx = -rect.dx;
        rect.x = rect.x.clamp(0.0, max_x);
    }
    if rect.y < 0.0 || rect.y > max_y {
        rect.dy = -rect.dy;
        rect.y = rect.y.clamp(0.0, max_y);
    }
}

fn draw(ctx: &mut DrawContext<'_>, window: &Window<u64>, _frame: u64, mut drift: Drift) -> Result<Drift> {
    let clears = window.state();
    if clears != drift.clears_seen {
        ctx.clear(BACKGROUND);
        drift.clears_seen = clears;
    }

    let (width, height) = (ctx.width() as f32, ctx.height() as f32);
    for rect in &mut drift.rects {
        advance(rect, width, height);
        ctx.fill_rect(rect.x as i32, rect.y as i32, rect.size, rect.size, rect.color);
    }

    // device coordinates to canvas coordinates
    if let Some(pos) = window.input().mouse_pos {
        let x = pos.x * width / window.width() as f32;
        let y = pos.y * height / window.height() as f32;
        ctx.fill_rect(x as i32 - 2, y as i32 - 2, 5, 5, CURSOR);
    }

    Ok(drift)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let cli = Cli::parse();
    let base = cli.window_config()?;

    println!("Easel - press c to clear, close the windows to quit");
    desktop::run(move |platform| {
        let mut windows = Vec::with_capacity(cli.windows);
        for index in 0..cli.windows.max(1) {
            let sketch = Sketch::new(0u64)
                .setup(move |ctx: &mut DrawContext<'_>, _: &Window<u64>| {
                    ctx.clear(BACKGROUND);
                    Ok(Drift::seeded(index))
                })
                .draw(draw)
                .on_key('c', |_, clears| clears + 1);

            let canvas = Canvas::new(CANVAS_WIDTH, CANVAS_HEIGHT);
            let window = Window::show(&platform, canvas, cli.config_for(&base, index), sketch)?;
            info!("opened `{}` at {} fps", window.name(), window.fps());
            windows.push(window);
        }

        for window in &windows {
            window.join();
        }
        Ok(())
    })
}
