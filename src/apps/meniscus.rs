//! Meniscus against a vertical wall
//!
//! Balancing the Laplace pressure of the curved surface against hydrostatic
//! pressure gives the profile of a liquid climbing a wet wall. The app shows
//! the derivation one step at a time next to the resulting profile.

use tracing::info;

use crate::configuration::config::MeniscusConfig;
use crate::simulation::animation::FrameApp;
use crate::simulation::states::{Domain, NVec2};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, BLUE, GRID, WHITE};

/// (title, LaTeX) pairs, in the order they are revealed
pub static DERIVATION_STEPS: [(&str, &str); 7] = [
    (
        "Young-Laplace",
        r"\Delta p = \gamma \kappa, \quad \kappa = \frac{z''}{(1 + z'^2)^{3/2}}",
    ),
    ("Hydrostatics", r"\Delta p = \rho g z"),
    (
        "Balance",
        r"\frac{z''}{(1 + z'^2)^{3/2}} = \frac{z}{\ell_c^2}, \quad \ell_c = \sqrt{\frac{\gamma}{\rho g}}",
    ),
    (
        "First integral",
        r"\frac{d}{dz}\left(-\frac{1}{\sqrt{1 + z'^2}}\right) = \frac{z}{\ell_c^2} \;\Rightarrow\; 1 - \frac{1}{\sqrt{1 + z'^2}} = \frac{z^2}{2 \ell_c^2}",
    ),
    (
        "Height at the wall",
        r"z'(0) = -\cot\theta \;\Rightarrow\; h = \ell_c \sqrt{2 (1 - \sin\theta)}",
    ),
    (
        "Slope",
        r"\frac{dx}{dz} = -\frac{\ell_c (1 - z^2 / 2\ell_c^2)}{z \sqrt{1 - z^2 / 4\ell_c^2}}",
    ),
    (
        "Profile",
        r"x = F(z) - F(h), \quad F(z) = \ell_c \,\mathrm{arccosh}\frac{2 \ell_c}{z} - 2 \ell_c \sqrt{1 - \frac{z^2}{4 \ell_c^2}}",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeniscusParams {
    pub surface_tension: f64, // gamma, N/m
    pub density: f64, // rho, kg/m^3
    pub gravity: f64, // g, m/s^2
    pub contact_angle_deg: f64, // theta, measured inside the liquid
}

impl From<&MeniscusConfig> for MeniscusParams {
    fn from(cfg: &MeniscusConfig) -> Self {
        Self {
            surface_tension: cfg.surface_tension,
            density: cfg.density,
            gravity: cfg.gravity,
            contact_angle_deg: cfg.contact_angle_deg,
        }
    }
}

impl MeniscusParams {
    /// l_c = sqrt(gamma / (rho g))
    pub fn capillary_length(&self) -> f64 {
        (self.surface_tension / (self.density * self.gravity)).sqrt()
    }

    /// Rise at the wall; negative for a non-wetting liquid (theta > 90 deg)
    pub fn wall_height(&self) -> f64 {
        let theta = self.contact_angle_deg.to_radians();
        let rise = self.capillary_length() * (2.0 * (1.0 - theta.sin())).max(0.0).sqrt();
        if theta.cos() < 0.0 {
            -rise
        } else {
            rise
        }
    }

    fn f(&self, z: f64) -> f64 {
        let lc = self.capillary_length();
        let r = 2.0 * lc / z;
        let acosh = (r + (r * r - 1.0).sqrt()).ln();
        lc * acosh - 2.0 * lc * (1.0 - z * z / (4.0 * lc * lc)).max(0.0).sqrt()
    }

    /// `n` samples (x, z) of the surface from the wall (x = 0) outward.
    ///
    /// Heights run from the wall height towards zero; the far end is cut at
    /// one percent of the wall height where the profile is already flat.
    pub fn profile(&self, n: usize) -> Vec<NVec2> {
        let h = self.wall_height();
        let lc = self.capillary_length();
        if n == 0 || !h.is_finite() || !lc.is_finite() || h.abs() < 1e-12 {
            return Vec::new();
        }
        let n = n.max(2);
        let (h_abs, sign) = (h.abs(), h.signum());
        let z_end = 0.01 * h_abs;
        let f_h = self.f(h_abs);
        (0..n)
            .map(|i| {
                let z = h_abs + (z_end - h_abs) * i as f64 / (n - 1) as f64;
                NVec2::new(self.f(z) - f_h, sign * z)
            })
            .collect()
    }
}

pub struct MeniscusApp {
    pub params: MeniscusParams,
    step_interval: f64,
    pub revealed: usize,
    clock: f64,
    profile: Vec<NVec2>,
}

impl MeniscusApp {
    pub fn new(cfg: &MeniscusConfig) -> Self {
        let params = MeniscusParams::from(cfg);
        Self {
            params,
            step_interval: cfg.step_interval,
            revealed: 1,
            clock: 0.0,
            profile: params.profile(200),
        }
    }

    /// World box that fits the profile, in millimetres
    pub fn view_domain(&self) -> Domain {
        let lc = 1e3 * self.params.capillary_length();
        Domain::new(NVec2::new(-0.5 * lc, -3.0 * lc), NVec2::new(6.0 * lc, 3.0 * lc))
    }

    pub fn steps(&self) -> &'static [(&'static str, &'static str)] {
        &DERIVATION_STEPS[..self.revealed]
    }

    pub fn reveal_next(&mut self) {
        if self.revealed < DERIVATION_STEPS.len() {
            self.revealed += 1;
            info!(step = DERIVATION_STEPS[self.revealed - 1].0, "meniscus step revealed");
        }
    }

    pub fn set_params(&mut self, params: MeniscusParams) {
        self.params = params;
        self.profile = params.profile(200);
    }
}

impl FrameApp for MeniscusApp {
    fn name(&self) -> &'static str {
        "meniscus"
    }

    fn update(&mut self, dt: f64) {
        if self.step_interval <= 0.0 {
            return;
        }
        self.clock += dt;
        if self.clock >= self.step_interval {
            self.clock = (self.clock - self.step_interval).min(self.step_interval);
            self.reveal_next();
        }
    }

    fn render(&self, canvas: &mut Canvas) {
        canvas.clear(BACKGROUND);
        let world = self.view_domain();
        // wall and the far-field level
        canvas.draw_line(&NVec2::new(0.0, world.min.y), &NVec2::new(0.0, world.max.y), WHITE);
        canvas.draw_line(&NVec2::new(0.0, 0.0), &NVec2::new(world.max.x, 0.0), GRID);

        let mm: Vec<NVec2> = self.profile.iter().map(|p| 1e3 * *p).collect();
        // liquid below the surface
        for p in &mm {
            canvas.draw_line(p, &NVec2::new(p.x, world.min.y), BLUE);
        }
        canvas.draw_polyline(mm.iter(), ACCENT);
    }

    fn reset(&mut self) {
        self.revealed = 1;
        self.clock = 0.0;
        self.profile = self.params.profile(200);
    }

    fn status(&self) -> String {
        let (title, latex) = DERIVATION_STEPS[self.revealed.clamp(1, DERIVATION_STEPS.len()) - 1];
        format!(
            "step {}/{} {}: {}  l_c = {:.3} mm  h = {:.3} mm",
            self.revealed,
            DERIVATION_STEPS.len(),
            title,
            latex,
            1e3 * self.params.capillary_length(),
            1e3 * self.params.wall_height()
        )
    }

    fn pointer_down(&mut self, _p: NVec2) {
        self.reveal_next();
    }
}
