//! Velocity fields for the flow apps
//!
//! Defines the [`VelocityField`] trait, the enumerated presets, fields typed
//! in by the user, and [`FieldSet`] which superposes any number of terms.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use tracing::warn;

use crate::configuration::config::FlowPreset;
use crate::error::ExpressionError;
use crate::expression::{differentiate, parse, Expr};
use crate::simulation::states::NVec2;

/// Inside this radius the point vortex velocity is defined as zero
pub const VORTEX_CORE_RADIUS: f64 = 0.05;

/// A steady or unsteady 2D velocity field
/// Implementations are pure functions of position and time
pub trait VelocityField {
    fn velocity(&self, p: &NVec2, t: f64) -> NVec2;
    fn divergence(&self, p: &NVec2, t: f64) -> f64;
    fn formula(&self) -> String;
}

/// Central-difference divergence, used where no closed form exists
pub fn finite_difference_divergence<F>(field: &F, p: &NVec2, t: f64, h: f64) -> f64
where
    F: VelocityField + ?Sized,
{
    let dx = NVec2::new(h, 0.0);
    let dy = NVec2::new(0.0, h);
    let du_dx = (field.velocity(&(p + dx), t).x - field.velocity(&(p - dx), t).x) / (2.0 * h);
    let dv_dy = (field.velocity(&(p + dy), t).y - field.velocity(&(p - dy), t).y) / (2.0 * h);
    du_dx + dv_dy
}

/// Scalar knobs shared by all presets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowParams {
    pub strength: f64, // a
    pub rate: f64, // b, or wave number k
    pub omega: f64, // angular frequency
}

impl Default for FlowParams {
    fn default() -> Self {
        Self { strength: 1.0, rate: 0.5, omega: 1.0 }
    }
}

/// One of the fixed presets with its parameters
#[derive(Debug, Clone, Copy)]
pub struct PresetField {
    pub preset: FlowPreset,
    pub params: FlowParams,
}

impl PresetField {
    pub fn new(preset: FlowPreset, params: FlowParams) -> Self {
        Self { preset, params }
    }
}

impl VelocityField for PresetField {
    fn velocity(&self, p: &NVec2, t: f64) -> NVec2 {
        let FlowParams { strength: a, rate: b, omega } = self.params;
        let (x, y) = (p.x, p.y);
        match self.preset {
            FlowPreset::Uniform => NVec2::new(a, 0.0),
            FlowPreset::Rotation => NVec2::new(-a * y, a * x),
            FlowPreset::Shear => NVec2::new(a * y, 0.0),
            FlowPreset::Stagnation => NVec2::new(a * x, -a * y),
            FlowPreset::Vortex => {
                let r2 = x * x + y * y;
                if r2 < VORTEX_CORE_RADIUS * VORTEX_CORE_RADIUS {
                    return NVec2::zeros();
                }
                // circulation a: u_theta = a / (2 pi r)
                let k = a / (2.0 * PI * r2);
                NVec2::new(-k * y, k * x)
            }
            FlowPreset::RadialExpansion => NVec2::new(a * x, a * y),
            FlowPreset::Spiral => NVec2::new(b * x - a * y, a * x + b * y),
            FlowPreset::CompressionWave => NVec2::new(a * (b * x - omega * t).sin(), 0.0),
            FlowPreset::Oscillating => NVec2::new(a, b * (omega * t).sin()),
        }
    }

    fn divergence(&self, p: &NVec2, t: f64) -> f64 {
        let FlowParams { strength: a, rate: b, omega } = self.params;
        match self.preset {
            FlowPreset::Uniform
            | FlowPreset::Rotation
            | FlowPreset::Shear
            | FlowPreset::Stagnation
            | FlowPreset::Vortex
            | FlowPreset::Oscillating => 0.0,
            FlowPreset::RadialExpansion => 2.0 * a,
            FlowPreset::Spiral => 2.0 * b,
            FlowPreset::CompressionWave => a * b * (b * p.x - omega * t).cos(),
        }
    }

    fn formula(&self) -> String {
        let FlowParams { strength: a, rate: b, omega } = self.params;
        match self.preset {
            FlowPreset::Uniform => format!("u = {a}, v = 0"),
            FlowPreset::Rotation => format!("u = -{a}y, v = {a}x"),
            FlowPreset::Shear => format!("u = {a}y, v = 0"),
            FlowPreset::Stagnation => format!("u = {a}x, v = -{a}y"),
            FlowPreset::Vortex => format!("u = -{a}y/(2πr²), v = {a}x/(2πr²)"),
            FlowPreset::RadialExpansion => format!("u = {a}x, v = {a}y"),
            FlowPreset::Spiral => format!("u = {b}x - {a}y, v = {a}x + {b}y"),
            FlowPreset::CompressionWave => format!("u = {a}sin({b}x - {omega}t), v = 0"),
            FlowPreset::Oscillating => format!("u = {a}, v = {b}sin({omega}t)"),
        }
    }
}

/// Velocity typed in by the user as `u(x, y, t)` and `v(x, y, t)`
#[derive(Debug, Clone)]
pub struct ExpressionField {
    u: Expr,
    v: Expr,
    divergence: Option<Expr>, // symbolic du/dx + dv/dy when available
    constants: Vec<(String, f64)>,
}

impl ExpressionField {
    /// Strict constructor: any parse error or unknown symbol is returned
    pub fn new(u: &str, v: &str, constants: &BTreeMap<String, f64>) -> Result<Self, ExpressionError> {
        let u = parse(u)?;
        let v = parse(v)?;
        for name in u.variables().into_iter().chain(v.variables()) {
            if !matches!(name.as_str(), "x" | "y" | "t") && !constants.contains_key(&name) {
                return Err(ExpressionError::UnboundVariable(name));
            }
        }
        Ok(Self::from_exprs(u, v, constants))
    }

    /// Lenient constructor: a component that fails to parse becomes zero and
    /// the first failure is handed back for display
    pub fn lenient(u: &str, v: &str, constants: &BTreeMap<String, f64>) -> (Self, Option<ExpressionError>) {
        let mut first_err = None;
        let mut component = |src: &str| match parse(src) {
            Ok(e) => e,
            Err(err) => {
                warn!("rejected velocity component '{src}': {err}");
                first_err.get_or_insert(err);
                Expr::num(0.0)
            }
        };
        let u = component(u);
        let v = component(v);
        (Self::from_exprs(u, v, constants), first_err)
    }

    fn from_exprs(u: Expr, v: Expr, constants: &BTreeMap<String, f64>) -> Self {
        let divergence = match (differentiate(&u, "x"), differentiate(&v, "y")) {
            (Ok(du), Ok(dv)) => Some(crate::expression::simplify(&Expr::add(du, dv))),
            _ => None,
        };
        Self {
            u,
            v,
            divergence,
            constants: constants.iter().map(|(name, value)| (name.clone(), *value)).collect(),
        }
    }

    pub fn divergence_expr(&self) -> Option<&Expr> {
        self.divergence.as_ref()
    }

    fn eval(&self, e: &Expr, p: &NVec2, t: f64) -> f64 {
        let lookup = |name: &str| match name {
            "x" => Some(p.x),
            "y" => Some(p.y),
            "t" => Some(t),
            _ => self.constants.iter().find(|(n, _)| n == name).map(|(_, v)| *v),
        };
        match e.eval_with(&lookup) {
            Ok(value) if value.is_finite() => value,
            _ => 0.0,
        }
    }
}

impl VelocityField for ExpressionField {
    fn velocity(&self, p: &NVec2, t: f64) -> NVec2 {
        NVec2::new(self.eval(&self.u, p, t), self.eval(&self.v, p, t))
    }

    fn divergence(&self, p: &NVec2, t: f64) -> f64 {
        match &self.divergence {
            Some(d) => self.eval(d, p, t),
            None => finite_difference_divergence(self, p, t, 1e-4),
        }
    }

    fn formula(&self) -> String {
        format!("u = {}, v = {}", self.u, self.v)
    }
}

/// Superposition of velocity field terms
/// Each term implements [`VelocityField`]; velocities and divergences add
pub struct FieldSet {
    terms: Vec<Box<dyn VelocityField + Send + Sync>>,
}

impl FieldSet {
    /// Create an empty field set (zero velocity everywhere)
    pub fn new() -> Self {
        Self {
            terms: Vec::new()
        }
    }

    /// Add a field term
    pub fn with<T>(mut self, term: T) -> Self
    where
        T: VelocityField + Send + Sync + 'static,
    {
        self.terms.push(Box::new(term));
        self
    }

    pub fn push(&mut self, term: Box<dyn VelocityField + Send + Sync>) {
        self.terms.push(term);
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityField for FieldSet {
    fn velocity(&self, p: &NVec2, t: f64) -> NVec2 {
        self.terms.iter().fold(NVec2::zeros(), |acc, term| acc + term.velocity(p, t))
    }

    fn divergence(&self, p: &NVec2, t: f64) -> f64 {
        self.terms.iter().map(|term| term.divergence(p, t)).sum()
    }

    fn formula(&self) -> String {
        if self.terms.is_empty() {
            return "u = 0, v = 0".to_string();
        }
        self.terms.iter().map(|term| term.formula()).collect::<Vec<_>>().join("  +  ")
    }
}
