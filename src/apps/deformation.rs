//! Strain and rotation tensors of a typed displacement field
//!
//! The user enters u, v, w as functions of x, y, z. All nine first partials
//! are taken symbolically and assembled into
//!
//!   strain   e_ij = 1/2 (du_i/dx_j + du_j/dx_i)
//!   rotation w_ij = 1/2 (du_i/dx_j - du_j/dx_i)
//!
//! A component that fails to parse or differentiate is replaced by zero and
//! the rest of the computation carries on; every failure is gathered into one
//! `DeformationError`.

use nalgebra::Matrix3;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::ExpressionError;
use crate::expression::{differentiate, parse, simplify, Bindings, Expr};
use crate::simulation::animation::FrameApp;
use crate::simulation::states::{Domain, NVec2, NVec3};
use crate::visualization::canvas::{Canvas, ACCENT, BACKGROUND, BLUE, GREEN, GRID, RED};

const AXES: [&str; 3] = ["x", "y", "z"];
const COMPONENTS: [&str; 3] = ["u", "v", "w"];

/// All component failures of one recalculation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} component(s) fell back to zero: {}", .failures.len(), describe(.failures))]
pub struct DeformationError {
    pub failures: Vec<(String, ExpressionError)>,
}

fn describe(failures: &[(String, ExpressionError)]) -> String {
    failures.iter().map(|(what, err)| format!("{what}: {err}")).collect::<Vec<_>>().join("; ")
}

/// 3x3 matrix of symbolic entries
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor3 {
    pub entries: [[Expr; 3]; 3],
}

impl Tensor3 {
    fn from_fn<F: FnMut(usize, usize) -> Expr>(mut f: F) -> Self {
        Self {
            entries: std::array::from_fn(|i| std::array::from_fn(|j| f(i, j))),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.entries.iter().flatten().all(Expr::is_zero)
    }

    /// Numeric value at `point`. Entries that cannot be evaluated read as zero.
    pub fn evaluate(&self, point: &NVec3, bindings: &Bindings) -> Matrix3<f64> {
        let lookup = |name: &str| match name {
            "x" => Some(point.x),
            "y" => Some(point.y),
            "z" => Some(point.z),
            _ => bindings.get(name),
        };
        Matrix3::from_fn(|i, j| match self.entries[i][j].eval_with(&lookup) {
            Ok(v) if v.is_finite() => v,
            _ => 0.0,
        })
    }

    /// Sum of the diagonal; for the strain tensor the volumetric strain
    pub fn trace(&self, point: &NVec3, bindings: &Bindings) -> f64 {
        self.evaluate(point, bindings).trace()
    }

    /// LaTeX `bmatrix` of the entries
    pub fn to_latex(&self) -> String {
        let rows: Vec<String> = self
            .entries
            .iter()
            .map(|row| row.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" & "))
            .collect();
        format!("\\begin{{bmatrix}} {} \\end{{bmatrix}}", rows.join(" \\\\ "))
    }
}

/// Result of one recalculation
#[derive(Debug, Clone)]
pub struct Deformation {
    pub displacement: [Expr; 3],
    pub gradient: Tensor3, // gradient[i][j] = du_i/dx_j
    pub strain: Tensor3,
    pub rotation: Tensor3,
}

impl Deformation {
    /// Differentiate `u`, `v`, `w`; failures fall back to zero and are collected
    pub fn compute(u: &str, v: &str, w: &str) -> (Self, Option<DeformationError>) {
        let mut failures = Vec::new();

        let sources = [u, v, w];
        let displacement: [Expr; 3] = std::array::from_fn(|i| match parse(sources[i]) {
            Ok(e) => simplify(&e),
            Err(err) => {
                failures.push((COMPONENTS[i].to_string(), err));
                Expr::num(0.0)
            }
        });

        let gradient = Tensor3::from_fn(|i, j| match differentiate(&displacement[i], AXES[j]) {
            Ok(d) => d,
            Err(err) => {
                failures.push((format!("d{}/d{}", COMPONENTS[i], AXES[j]), err));
                Expr::num(0.0)
            }
        });

        let half = |a: &Expr, b: &Expr, sign: f64| {
            simplify(&Expr::mul(
                Expr::num(0.5),
                Expr::add(a.clone(), Expr::mul(Expr::num(sign), b.clone())),
            ))
        };
        let g = &gradient.entries;
        let strain = Tensor3::from_fn(|i, j| half(&g[i][j], &g[j][i], 1.0));
        let rotation = Tensor3::from_fn(|i, j| half(&g[i][j], &g[j][i], -1.0));

        let error = if failures.is_empty() {
            None
        } else {
            let err = DeformationError { failures };
            warn!("{err}");
            Some(err)
        };

        (Self { displacement, gradient, strain, rotation }, error)
    }

    pub fn displacement_at(&self, point: &NVec3, bindings: &Bindings) -> NVec3 {
        let lookup = |name: &str| match name {
            "x" => Some(point.x),
            "y" => Some(point.y),
            "z" => Some(point.z),
            _ => bindings.get(name),
        };
        NVec3::from_fn(|i, _| match self.displacement[i].eval_with(&lookup) {
            Ok(v) if v.is_finite() => v,
            _ => 0.0,
        })
    }

    /// Original and displaced positions of an `n`^3 lattice spanning `[-extent, extent]`^3
    pub fn deformed_lattice(&self, n: usize, extent: f64, scale: f64, bindings: &Bindings) -> Vec<(NVec3, NVec3)> {
        let n = n.max(2);
        let coord = |k: usize| -extent + 2.0 * extent * k as f64 / (n - 1) as f64;
        let mut out = Vec::with_capacity(n * n * n);
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let p = NVec3::new(coord(i), coord(j), coord(k));
                    out.push((p, p + scale * self.displacement_at(&p, bindings)));
                }
            }
        }
        out
    }
}

/// Canvas rendering of the lattice, slowly turning about the vertical axis
pub struct DeformationApp {
    sources: [String; 3],
    pub deformation: Deformation,
    pub error: Option<DeformationError>,
    bindings: Bindings,
    lattice: usize,
    extent: f64,
    scale: f64,
    pub yaw: f64,
    pitch: f64,
}

impl DeformationApp {
    pub fn new(u: &str, v: &str, w: &str, bindings: Bindings, lattice: usize, extent: f64, scale: f64) -> Self {
        let (deformation, error) = Deformation::compute(u, v, w);
        Self {
            sources: [u.to_string(), v.to_string(), w.to_string()],
            deformation,
            error,
            bindings,
            lattice,
            extent,
            scale,
            yaw: 0.6,
            pitch: 0.45,
        }
    }

    /// World rectangle that fits the rotated lattice
    pub fn view_domain(&self) -> Domain {
        Domain::centered(2.2 * self.extent * (1.0 + self.scale.abs()))
    }

    /// Recalculate from new displacement components
    pub fn recalculate(&mut self, u: &str, v: &str, w: &str) -> Option<&DeformationError> {
        self.sources = [u.to_string(), v.to_string(), w.to_string()];
        let (deformation, error) = Deformation::compute(u, v, w);
        self.deformation = deformation;
        self.error = error;
        info!(strain = %self.deformation.strain.to_latex(), "deformation recalculated");
        self.error.as_ref()
    }

    fn project(&self, p: &NVec3) -> NVec2 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let x = cy * p.x + sy * p.z;
        let z = -sy * p.x + cy * p.z;
        let y = cp * p.y - sp * z;
        NVec2::new(x, y)
    }
}

impl FrameApp for DeformationApp {
    fn name(&self) -> &'static str {
        "deformation"
    }

    fn update(&mut self, dt: f64) {
        self.yaw = (self.yaw + 0.3 * dt) % std::f64::consts::TAU;
    }

    fn render(&self, canvas: &mut Canvas) {
        canvas.clear(BACKGROUND);
        let o = NVec3::zeros();
        let len = 1.5 * self.extent;
        for (axis, color) in [(NVec3::x(), RED), (NVec3::y(), GREEN), (NVec3::z(), BLUE)] {
            canvas.draw_line(&self.project(&o), &self.project(&(len * axis)), color);
        }
        for (p, q) in self.deformation.deformed_lattice(self.lattice, self.extent, self.scale, &self.bindings) {
            let (a, b) = (self.project(&p), self.project(&q));
            canvas.fill_disc(&a, 2.0, GRID);
            canvas.draw_line(&a, &b, GRID);
            canvas.fill_disc(&b, 3.0, ACCENT);
        }
    }

    fn reset(&mut self) {
        let [u, v, w] = self.sources.clone();
        self.recalculate(&u, &v, &w);
        self.yaw = 0.6;
    }

    fn status(&self) -> String {
        let err = match &self.error {
            Some(e) => format!("  [{e}]"),
            None => String::new(),
        };
        format!("strain = {}{}", self.deformation.strain.to_latex(), err)
    }
}
