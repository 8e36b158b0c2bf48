//! Scalar heatmaps of a velocity field
//!
//! A coarse `ScalarGrid` samples speed or divergence; `rasterize` stretches it
//! to the full canvas with bilinear interpolation and maps values through a
//! fixed color ramp. Signed quantities get a symmetric range so zero sits in
//! the middle of a diverging ramp.

use crate::configuration::config::MetricConfig;
use crate::simulation::fields::VelocityField;
use crate::simulation::states::{Domain, NVec2};
use crate::visualization::canvas::{Canvas, Rgba};

/// Quantity sampled for the heatmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Speed,
    Divergence,
}

impl Metric {
    pub fn from_config(cfg: MetricConfig) -> Option<Self> {
        match cfg {
            MetricConfig::None => None,
            MetricConfig::Speed => Some(Metric::Speed),
            MetricConfig::Divergence => Some(Metric::Divergence),
        }
    }

    /// Can the metric take negative values?
    pub fn signed(self) -> bool {
        matches!(self, Metric::Divergence)
    }

    pub fn ramp(self) -> ColorRamp {
        if self.signed() {
            ColorRamp::CoolWarm
        } else {
            ColorRamp::Viridis
        }
    }
}

/// Fixed color ramps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRamp {
    Viridis,
    CoolWarm,
}

const VIRIDIS: [[f64; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

const COOLWARM: [[f64; 3]; 3] = [
    [59.0, 76.0, 192.0],
    [221.0, 221.0, 221.0],
    [180.0, 4.0, 38.0],
];

impl ColorRamp {
    /// Color at `s` in [0, 1]; out-of-range and NaN inputs are clamped
    pub fn color(self, s: f64) -> Rgba {
        let s = if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 };
        let stops: &[[f64; 3]] = match self {
            ColorRamp::Viridis => &VIRIDIS,
            ColorRamp::CoolWarm => &COOLWARM,
        };
        let scaled = s * (stops.len() - 1) as f64;
        let i = (scaled.floor() as usize).min(stops.len() - 2);
        let f = scaled - i as f64;
        let (a, b) = (stops[i], stops[i + 1]);
        let mix = |k: usize| (a[k] + (b[k] - a[k]) * f).round() as u8;
        [mix(0), mix(1), mix(2), 255]
    }
}

/// Value range used for normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Map a value into [0, 1]
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Coarse `nx` by `ny` grid of samples, row-major from `domain.min`
#[derive(Debug, Clone)]
pub struct ScalarGrid {
    pub nx: usize,
    pub ny: usize,
    pub domain: Domain,
    pub values: Vec<f64>,
}

impl ScalarGrid {
    /// Sample `metric` at the grid nodes (including the domain edges)
    pub fn sample<F>(field: &F, metric: Metric, domain: &Domain, nx: usize, ny: usize, t: f64) -> Self
    where
        F: VelocityField + ?Sized,
    {
        let (nx, ny) = (nx.max(2), ny.max(2));
        let mut values = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let p = NVec2::new(
                    domain.min.x + domain.width() * i as f64 / (nx - 1) as f64,
                    domain.min.y + domain.height() * j as f64 / (ny - 1) as f64,
                );
                let value = match metric {
                    Metric::Speed => field.velocity(&p, t).norm(),
                    Metric::Divergence => field.divergence(&p, t),
                };
                values.push(if value.is_finite() { value } else { 0.0 });
            }
        }
        Self { nx, ny, domain: *domain, values }
    }

    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[j * self.nx + i]
    }

    /// Min/max of the samples. With `signed` the range is symmetric about zero.
    /// Degenerate ranges are widened so normalization never divides by zero.
    pub fn range(&self, signed: bool) -> Range {
        let (mut min, mut max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 0.0;
        }
        if signed {
            let m = min.abs().max(max.abs());
            min = -m;
            max = m;
        }
        if max - min < 1e-12 {
            let pad = if max.abs() > 1e-12 { 0.5 * max.abs() } else { 1.0 };
            min -= pad;
            max += pad;
        }
        Range { min, max }
    }

    /// Bilinear interpolation at fractional grid coordinates
    fn interpolate(&self, gx: f64, gy: f64) -> f64 {
        let gx = gx.clamp(0.0, (self.nx - 1) as f64);
        let gy = gy.clamp(0.0, (self.ny - 1) as f64);
        let i0 = (gx.floor() as usize).min(self.nx - 2);
        let j0 = (gy.floor() as usize).min(self.ny - 2);
        let fx = gx - i0 as f64;
        let fy = gy - j0 as f64;
        let top = self.at(i0, j0) * (1.0 - fx) + self.at(i0 + 1, j0) * fx;
        let bottom = self.at(i0, j0 + 1) * (1.0 - fx) + self.at(i0 + 1, j0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Paint every canvas pixel from the grid
    pub fn rasterize(&self, canvas: &mut Canvas, ramp: ColorRamp, range: Range) {
        let mut rgba = Vec::with_capacity(canvas.width * canvas.height * 4);
        for py in 0..canvas.height {
            for px in 0..canvas.width {
                let w = canvas.viewport.to_world(px as f64 + 0.5, py as f64 + 0.5);
                let gx = (w.x - self.domain.min.x) / self.domain.width() * (self.nx - 1) as f64;
                let gy = (w.y - self.domain.min.y) / self.domain.height() * (self.ny - 1) as f64;
                let value = self.interpolate(gx, gy);
                rgba.extend_from_slice(&ramp.color(range.normalize(value)));
            }
        }
        canvas.blit(&rgba);
    }
}
