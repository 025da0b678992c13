use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Pack a colour into the `0xAARRGGBB` layout used by [`PixelBuffer`]
pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Opaque colour shorthand
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    argb(255, r, g, b)
}

/// Split a packed pixel into `(a, r, g, b)`
pub const fn channels(pixel: u32) -> (u8, u8, u8, u8) {
    ((pixel >> 24) as u8, (pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8)
}

/// Owned RGBA raster - one packed `0xAARRGGBB` word per pixel, row-major
///
/// Dimensions are fixed at creation. Resize, subimage and convolve return a
/// new buffer and leave `self` untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    /// Create a fully transparent buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    /// Create a buffer with every pixel set to `color`
    pub fn filled(width: u32, height: u32, color: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Wrap existing pixel data. Returns `None` when the length does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Raw bytes for upload. On little-endian targets the byte order is BGRA.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    pub fn clear(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Fill an axis-aligned rectangle, clipped to the buffer
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: u32) {
        let x0 = x.max(0) as i64;
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + width as i64).min(self.width as i64);
        let y1 = (y as i64 + height as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.width as usize;
        for row in y0 as usize..y1 as usize {
            self.pixels[row * stride + x0 as usize..row * stride + x1 as usize].fill(color);
        }
    }

    /// Bresenham line, clipped per pixel
    pub fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) {
        let (mut x, mut y) = (x1, y1);
        let dx = (x2 - x).abs();
        let dy = -(y2 - y).abs();
        let sx = if x < x2 { 1 } else { -1 };
        let sy = if y < y2 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Nearest-neighbour scale into `dst`, which must hold `dst_width * dst_height` pixels
    pub fn scale_into(&self, dst: &mut [u32], dst_width: u32, dst_height: u32) {
        debug_assert_eq!(dst.len(), dst_width as usize * dst_height as usize);
        if self.pixels.is_empty() {
            dst.fill(0);
            return;
        }
        let src_w = self.width as u64;
        let src_h = self.height as u64;
        for (dy, row) in dst.chunks_exact_mut(dst_width.max(1) as usize).enumerate() {
            let sy = (dy as u64 * src_h / dst_height as u64) as usize;
            let src_row = &self.pixels[sy * src_w as usize..(sy + 1) * src_w as usize];
            for (dx, out) in row.iter_mut().enumerate() {
                let sx = (dx as u64 * src_w / dst_width as u64) as usize;
                *out = src_row[sx];
            }
        }
    }

    /// New buffer of the given size, nearest-neighbour sampled
    pub fn resize(&self, width: u32, height: u32) -> PixelBuffer {
        let mut out = PixelBuffer::new(width, height);
        self.scale_into(&mut out.pixels, width, height);
        out
    }

    /// Copy a rectangle out of this buffer, clipped to its bounds
    pub fn subimage(&self, x: u32, y: u32, width: u32, height: u32) -> PixelBuffer {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);
        let mut out = PixelBuffer::new(width, height);
        for row in 0..height as usize {
            let src = (y as usize + row) * self.width as usize + x as usize;
            let dst = row * width as usize;
            out.pixels[dst..dst + width as usize]
                .copy_from_slice(&self.pixels[src..src + width as usize]);
        }
        out
    }

    /// Apply a 3x3 kernel (row-major) to the colour channels; alpha is kept.
    /// Edges are clamped.
    pub fn convolve(&self, kernel: &[f32; 9]) -> PixelBuffer {
        let mut out = PixelBuffer::new(self.width, self.height);
        let (w, h) = (self.width as i32, self.height as i32);
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x + k as i32 % 3 - 1).clamp(0, w - 1);
                    let sy = (y + k as i32 / 3 - 1).clamp(0, h - 1);
                    let (_, r, g, b) = channels(self.pixels[(sy * w + sx) as usize]);
                    acc[0] += r as f32 * weight;
                    acc[1] += g as f32 * weight;
                    acc[2] += b as f32 * weight;
                }
                let (a, _, _, _) = channels(self.pixels[(y * w + x) as usize]);
                let [r, g, b] = acc.map(|c| c.round().clamp(0.0, 255.0) as u8);
                out.pixels[(y * w + x) as usize] = argb(a, r, g, b);
            }
        }
        out
    }
}

/// Shared, replaceable handle to a [`PixelBuffer`]
///
/// Cloning the handle shares the buffer. Drawing goes through a
/// [`DrawContext`], and only one context can be alive per buffer.
#[derive(Clone)]
pub struct Canvas {
    buffer: Arc<Mutex<PixelBuffer>>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_buffer(PixelBuffer::new(width, height))
    }

    pub fn from_buffer(buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        Self {
            buffer: Arc::new(Mutex::new(buffer)),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Acquire exclusive drawing access, blocking while another context is alive
    pub fn draw_context(&self) -> DrawContext<'_> {
        DrawContext {
            guard: self.buffer.lock(),
        }
    }

    /// Acquire drawing access only if no other context is alive
    pub fn try_draw_context(&self) -> Option<DrawContext<'_>> {
        self.buffer.try_lock().map(|guard| DrawContext { guard })
    }

    /// Run `f` with a drawing context; the context is released when `f`
    /// returns or unwinds.
    pub fn with_draw<R>(&self, f: impl FnOnce(&mut DrawContext<'_>) -> R) -> R {
        let mut ctx = self.draw_context();
        f(&mut ctx)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> PixelBuffer {
        self.buffer.lock().clone()
    }

    /// Whether both handles refer to the same buffer
    pub fn ptr_eq(&self, other: &Canvas) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

/// Scoped exclusive access to a canvas' pixels, released on drop
pub struct DrawContext<'a> {
    guard: MutexGuard<'a, PixelBuffer>,
}

impl Deref for DrawContext<'_> {
    type Target = PixelBuffer;

    fn deref(&self) -> &PixelBuffer {
        &self.guard
    }
}

impl DerefMut for DrawContext<'_> {
    fn deref_mut(&mut self) -> &mut PixelBuffer {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_split() {
        let c = argb(10, 20, 30, 40);
        assert_eq!(c, 0x0A141E28);
        assert_eq!(channels(c), (10, 20, 30, 40));
        assert_eq!(rgb(255, 0, 0), 0xFFFF0000);
    }

    #[test]
    fn from_pixels_checks_length() {
        assert!(PixelBuffer::from_pixels(2, 2, vec![0; 4]).is_some());
        assert!(PixelBuffer::from_pixels(2, 2, vec![0; 3]).is_none());
    }

    #[test]
    fn set_pixel_ignores_out_of_bounds() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.set_pixel(-1, 0, rgb(1, 1, 1));
        buf.set_pixel(4, 0, rgb(1, 1, 1));
        buf.set_pixel(0, 4, rgb(1, 1, 1));
        assert!(buf.pixels().iter().all(|&p| p == 0));

        buf.set_pixel(3, 3, rgb(9, 9, 9));
        assert_eq!(buf.get_pixel(3, 3), Some(rgb(9, 9, 9)));
        assert_eq!(buf.get_pixel(4, 3), None);
    }

    #[test]
    fn fill_rect_clips() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill_rect(-2, -2, 4, 4, rgb(255, 0, 0));

        assert_eq!(buf.get_pixel(0, 0), Some(rgb(255, 0, 0)));
        assert_eq!(buf.get_pixel(1, 1), Some(rgb(255, 0, 0)));
        assert_eq!(buf.get_pixel(2, 2), Some(0));

        buf.fill_rect(10, 10, 5, 5, rgb(0, 255, 0));
        assert_eq!(buf.pixels().iter().filter(|&&p| p != 0).count(), 4);
    }

    #[test]
    fn line_covers_endpoints() {
        let mut buf = PixelBuffer::new(10, 10);
        buf.line(0, 0, 9, 5, rgb(1, 2, 3));
        assert_eq!(buf.get_pixel(0, 0), Some(rgb(1, 2, 3)));
        assert_eq!(buf.get_pixel(9, 5), Some(rgb(1, 2, 3)));
    }

    #[test]
    fn resize_returns_new_buffer() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.set_pixel(1, 1, rgb(0, 0, 255));
        let big = buf.resize(4, 4);

        assert_eq!(buf.dimensions(), (2, 2));
        assert_eq!(big.dimensions(), (4, 4));
        assert_eq!(big.get_pixel(3, 3), Some(rgb(0, 0, 255)));
        assert_eq!(big.get_pixel(2, 2), Some(rgb(0, 0, 255)));
        assert_eq!(big.get_pixel(1, 1), Some(0));
    }

    #[test]
    fn subimage_clips_to_bounds() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.set_pixel(3, 3, rgb(7, 7, 7));
        let sub = buf.subimage(2, 2, 10, 10);
        assert_eq!(sub.dimensions(), (2, 2));
        assert_eq!(sub.get_pixel(1, 1), Some(rgb(7, 7, 7)));
    }

    #[test]
    fn identity_kernel_keeps_pixels() {
        let mut buf = PixelBuffer::new(3, 3);
        buf.set_pixel(1, 1, argb(128, 200, 100, 50));
        let identity = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(buf.convolve(&identity), buf);
    }

    #[test]
    fn box_blur_spreads_colour() {
        let mut buf = PixelBuffer::filled(3, 3, argb(255, 0, 0, 0));
        buf.set_pixel(1, 1, argb(255, 90, 0, 0));
        let blur = [1.0 / 9.0; 9];
        let out = buf.convolve(&blur);
        let (a, r, _, _) = channels(out.get_pixel(0, 0).unwrap());
        assert_eq!(a, 255);
        assert_eq!(r, 10);
    }

    #[test]
    fn only_one_draw_context_at_a_time() {
        let canvas = Canvas::new(8, 8);
        let ctx = canvas.draw_context();
        assert!(canvas.try_draw_context().is_none());
        drop(ctx);
        assert!(canvas.try_draw_context().is_some());
    }

    #[test]
    fn with_draw_releases_on_panic() {
        let canvas = Canvas::new(8, 8);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            canvas.with_draw(|_| panic!("draw failed"));
        }));
        assert!(result.is_err());
        assert!(canvas.try_draw_context().is_some());
    }

    #[test]
    fn clones_share_pixels() {
        let canvas = Canvas::new(2, 2);
        let other = canvas.clone();
        canvas.with_draw(|ctx| ctx.clear(rgb(5, 5, 5)));

        assert!(canvas.ptr_eq(&other));
        assert_eq!(other.snapshot().get_pixel(0, 0), Some(rgb(5, 5, 5)));
        assert!(!canvas.ptr_eq(&Canvas::new(2, 2)));
    }
}
