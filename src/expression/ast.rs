//! Expression tree, numeric evaluation and printing

use std::f64::consts::{E, PI};
use std::fmt;

use crate::error::ExpressionError;

/// Built-in functions of the expression vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl Func {
    /// Resolve a function name as typed by the user. `log` is the natural log.
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" => Func::Asin,
            "acos" => Func::Acos,
            "atan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Log10 => "log10",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Min => "min",
            Func::Max => "max",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }

    /// Apply to already evaluated arguments. `args.len()` is checked by the parser.
    pub fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Func::Sin => a.sin(),
            Func::Cos => a.cos(),
            Func::Tan => a.tan(),
            Func::Asin => a.asin(),
            Func::Acos => a.acos(),
            Func::Atan => a.atan(),
            Func::Sinh => a.sinh(),
            Func::Cosh => a.cosh(),
            Func::Tanh => a.tanh(),
            Func::Exp => a.exp(),
            Func::Ln => a.ln(),
            Func::Log10 => a.log10(),
            Func::Sqrt => a.sqrt(),
            Func::Abs => a.abs(),
            Func::Min => a.min(args[1]),
            Func::Max => a.max(args[1]),
        }
    }
}

/// A parsed expression.
///
/// Constants `pi`/`e` stay symbolic as `Var` so printing and differentiation
/// treat them like any other free symbol; they are resolved at evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// Named values available during evaluation
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    vars: Vec<(String, f64)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bind
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Bind or rebind `name`
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

impl Expr {
    pub fn num(n: f64) -> Self {
        Expr::Num(n)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn neg(a: Expr) -> Self {
        Expr::Neg(Box::new(a))
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::Add(Box::new(a), Box::new(b))
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    pub fn mul(a: Expr, b: Expr) -> Self {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    pub fn div(a: Expr, b: Expr) -> Self {
        Expr::Div(Box::new(a), Box::new(b))
    }

    pub fn pow(a: Expr, b: Expr) -> Self {
        Expr::Pow(Box::new(a), Box::new(b))
    }

    pub fn call(f: Func, arg: Expr) -> Self {
        Expr::Call(f, vec![arg])
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(n) if *n == 0.0)
    }

    /// Does the expression mention `name` anywhere?
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Var(v) => v == name,
            Expr::Neg(a) => a.depends_on(name),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.depends_on(name) || b.depends_on(name)
            }
            Expr::Call(_, args) => args.iter().any(|a| a.depends_on(name)),
        }
    }

    /// Free symbols, sorted and deduplicated (constants excluded)
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(v) => {
                if constant_value(v).is_none() {
                    out.push(v.clone());
                }
            }
            Expr::Neg(a) => a.collect_vars(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.collect_vars(out)),
        }
    }

    /// Evaluate against a set of bindings
    pub fn eval(&self, bindings: &Bindings) -> Result<f64, ExpressionError> {
        self.eval_with(&|name| bindings.get(name))
    }

    /// Evaluate with a lookup closure, avoiding a `Bindings` allocation in hot loops
    pub fn eval_with<F>(&self, lookup: &F) -> Result<f64, ExpressionError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Var(name) => lookup(name)
                .or_else(|| constant_value(name))
                .ok_or_else(|| ExpressionError::UnboundVariable(name.clone()))?,
            Expr::Neg(a) => -a.eval_with(lookup)?,
            Expr::Add(a, b) => a.eval_with(lookup)? + b.eval_with(lookup)?,
            Expr::Sub(a, b) => a.eval_with(lookup)? - b.eval_with(lookup)?,
            Expr::Mul(a, b) => a.eval_with(lookup)? * b.eval_with(lookup)?,
            Expr::Div(a, b) => a.eval_with(lookup)? / b.eval_with(lookup)?,
            Expr::Pow(a, b) => a.eval_with(lookup)?.powf(b.eval_with(lookup)?),
            Expr::Call(f, args) => {
                if args.len() != f.arity() {
                    return Err(ExpressionError::Arity {
                        name: f.name().to_string(),
                        expected: f.arity(),
                        found: args.len(),
                    });
                }
                let mut vals = [0.0; 2];
                for (slot, arg) in vals.iter_mut().zip(args.iter()) {
                    *slot = arg.eval_with(lookup)?;
                }
                f.apply(&vals[..args.len()])
            }
        };
        Ok(value)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(_) => 3,
            Expr::Num(n) if *n < 0.0 => 3,
            Expr::Pow(..) => 4,
            Expr::Num(_) | Expr::Var(_) | Expr::Call(..) => 5,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        let wrap = self.precedence() < min_prec;
        if wrap {
            write!(f, "(")?;
        }
        match self {
            Expr::Num(n) => write_number(f, *n)?,
            Expr::Var(v) => write!(f, "{v}")?,
            Expr::Neg(a) => {
                write!(f, "-")?;
                a.fmt_prec(f, 3)?;
            }
            Expr::Add(a, b) => {
                a.fmt_prec(f, 1)?;
                match b.as_ref() {
                    Expr::Neg(inner) => {
                        write!(f, " - ")?;
                        inner.fmt_prec(f, 2)?;
                    }
                    Expr::Num(n) if *n < 0.0 => {
                        write!(f, " - ")?;
                        write_number(f, -n)?;
                    }
                    _ => {
                        write!(f, " + ")?;
                        b.fmt_prec(f, 1)?;
                    }
                }
            }
            Expr::Sub(a, b) => {
                a.fmt_prec(f, 1)?;
                write!(f, " - ")?;
                b.fmt_prec(f, 2)?;
            }
            Expr::Mul(a, b) => {
                a.fmt_prec(f, 2)?;
                write!(f, "*")?;
                b.fmt_prec(f, 3)?;
            }
            Expr::Div(a, b) => {
                a.fmt_prec(f, 2)?;
                write!(f, "/")?;
                b.fmt_prec(f, 3)?;
            }
            Expr::Pow(a, b) => {
                a.fmt_prec(f, 5)?;
                write!(f, "^")?;
                b.fmt_prec(f, 4)?;
            }
            Expr::Call(func, args) => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt_prec(f, 0)?;
                }
                write!(f, ")")?;
            }
        }
        if wrap {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

/// Named mathematical constants
pub fn constant_value(name: &str) -> Option<f64> {
    match name {
        "pi" | "π" => Some(PI),
        "e" => Some(E),
        _ => None,
    }
}
