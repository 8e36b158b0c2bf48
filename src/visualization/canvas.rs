//! RGBA raster the apps draw into
//!
//! The canvas owns a `Viewport` mapping world coordinates (y up) to pixel
//! coordinates (y down). Writes that fall outside the raster are dropped.

use crate::simulation::states::{Domain, NVec2};

pub type Rgba = [u8; 4];

pub const WHITE: Rgba = [255, 255, 255, 255];
pub const BACKGROUND: Rgba = [18, 18, 24, 255];
pub const GRID: Rgba = [50, 50, 60, 255];
pub const ACCENT: Rgba = [255, 190, 60, 255];
pub const BLUE: Rgba = [80, 150, 255, 255];
pub const RED: Rgba = [240, 80, 80, 255];
pub const GREEN: Rgba = [90, 220, 120, 255];

/// World rectangle shown on the raster
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub world: Domain,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn to_pixel(&self, p: &NVec2) -> (f64, f64) {
        let u = (p.x - self.world.min.x) / self.world.width();
        let v = (p.y - self.world.min.y) / self.world.height();
        (u * self.width as f64, (1.0 - v) * self.height as f64)
    }

    pub fn to_world(&self, px: f64, py: f64) -> NVec2 {
        let u = px / self.width as f64;
        let v = 1.0 - py / self.height as f64;
        NVec2::new(
            self.world.min.x + u * self.world.width(),
            self.world.min.y + v * self.world.height(),
        )
    }

    /// Pixels per world unit along x
    pub fn scale(&self) -> f64 {
        self.width as f64 / self.world.width()
    }
}

pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pixels: Vec<u8>,
    pub viewport: Viewport,
}

impl Canvas {
    pub fn new(width: usize, height: usize, world: Domain) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
            viewport: Viewport { world, width, height },
        }
    }

    /// Rebuild the raster for a new size, keeping the world rectangle
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Canvas::new(width, height, self.viewport.world);
    }

    /// Raw RGBA8 bytes, row-major from the top-left
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    pub fn put_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let i = (y as usize * self.width + x as usize) * 4;
        self.pixels[i..i + 4].copy_from_slice(&color);
    }

    /// Filled disc at a world position with a radius in pixels
    pub fn fill_disc(&mut self, center: &NVec2, radius_px: f64, color: Rgba) {
        let (cx, cy) = self.viewport.to_pixel(center);
        if !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let r = radius_px.max(0.5);
        let (w, h) = (self.width as f64, self.height as f64);
        if !r.is_finite() || cx + r < 0.0 || cy + r < 0.0 || cx - r > w || cy - r > h {
            return;
        }
        let r2 = r * r;
        // only walk the part of the bounding box that lies on the raster
        let (x0, x1) = ((cx - r).max(0.0).floor() as i64, (cx + r).min(w).ceil() as i64);
        let (y0, y1) = ((cy - r).max(0.0).floor() as i64, (cy + r).min(h).ceil() as i64);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.put_pixel(x, y, color);
                }
            }
        }
    }

    /// Liang-Barsky clip of a pixel-space segment to the raster plus a one pixel margin.
    /// `None` when the segment misses the raster.
    fn clip(&self, (x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let (dx, dy) = (x1 - x0, y1 - y0);
        if !(x0.is_finite() && y0.is_finite() && dx.is_finite() && dy.is_finite()) {
            return None;
        }
        let (x_max, y_max) = (self.width as f64 + 1.0, self.height as f64 + 1.0);
        let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
        for (p, q) in [(-dx, x0 + 1.0), (dx, x_max - x0), (-dy, y0 + 1.0), (dy, y_max - y0)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
        // rounding on huge inputs can land slightly outside the box
        let at = |t: f64| ((x0 + t * dx).clamp(-1.0, x_max), (y0 + t * dy).clamp(-1.0, y_max));
        Some((at(t0), at(t1)))
    }

    /// Bresenham line between two pixel positions, clipped to the raster
    fn line_px(&mut self, a: (f64, f64), b: (f64, f64), color: Rgba) {
        let Some(((x0, y0), (x1, y1))) = self.clip(a, b) else {
            return;
        };
        let (mut x, mut y) = (x0.round() as i64, y0.round() as i64);
        let (xe, ye) = (x1.round() as i64, y1.round() as i64);
        let dx = (xe - x).abs();
        let dy = -(ye - y).abs();
        let sx = if x < xe { 1 } else { -1 };
        let sy = if y < ye { 1 } else { -1 };
        let mut err = dx + dy;
        let limit = 4 * (self.width + self.height + 4) as i64;
        for _ in 0..=limit {
            self.put_pixel(x, y, color);
            if x == xe && y == ye {
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

    pub fn draw_line(&mut self, a: &NVec2, b: &NVec2, color: Rgba) {
        let pa = self.viewport.to_pixel(a);
        let pb = self.viewport.to_pixel(b);
        self.line_px(pa, pb, color);
    }

    pub fn draw_polyline<'a, I>(&mut self, points: I, color: Rgba)
    where
        I: IntoIterator<Item = &'a NVec2>,
    {
        let mut prev: Option<&NVec2> = None;
        for p in points {
            if let Some(q) = prev {
                self.draw_line(q, p, color);
            }
            prev = Some(p);
        }
    }

    pub fn draw_rect_outline(&mut self, min: &NVec2, max: &NVec2, color: Rgba) {
        let a = NVec2::new(min.x, max.y);
        let b = NVec2::new(max.x, min.y);
        self.draw_line(min, &a, color);
        self.draw_line(&a, max, color);
        self.draw_line(max, &b, color);
        self.draw_line(&b, min, color);
    }

    /// Arrow from `from` along world vector `vec`, with a small head
    pub fn draw_arrow(&mut self, from: &NVec2, vec: &NVec2, color: Rgba) {
        let len = vec.norm();
        if !len.is_finite() || len < 1e-12 {
            return;
        }
        let tip = from + vec;
        self.draw_line(from, &tip, color);
        let dir = vec / len;
        let normal = NVec2::new(-dir.y, dir.x);
        let head = 0.25 * len;
        let left = tip - head * dir + 0.5 * head * normal;
        let right = tip - head * dir - 0.5 * head * normal;
        self.draw_line(&tip, &left, color);
        self.draw_line(&tip, &right, color);
    }

    /// Light grid lines every `spacing` world units
    pub fn draw_grid(&mut self, spacing: f64, color: Rgba) {
        if spacing <= 0.0 {
            return;
        }
        let w = self.viewport.world;
        let mut x = (w.min.x / spacing).ceil() * spacing;
        while x <= w.max.x {
            self.draw_line(&NVec2::new(x, w.min.y), &NVec2::new(x, w.max.y), color);
            x += spacing;
        }
        let mut y = (w.min.y / spacing).ceil() * spacing;
        while y <= w.max.y {
            self.draw_line(&NVec2::new(w.min.x, y), &NVec2::new(w.max.x, y), color);
            y += spacing;
        }
    }

    /// Copy a full RGBA buffer of matching size (heatmaps)
    pub fn blit(&mut self, rgba: &[u8]) {
        if rgba.len() == self.pixels.len() {
            self.pixels.copy_from_slice(rgba);
        }
    }
}
