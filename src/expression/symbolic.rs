//! Symbolic differentiation and simplification, backed by symbolica
//!
//! An [`Expr`] is printed into symbolica's input syntax with every symbol
//! renamed to an indexed placeholder (`s0`, `s1`, ...), normalized or
//! differentiated there, and the printed result is read back with [`parse`].
//! Symbolica's normal form already collects like terms, so `-k + k` comes back
//! as `0` and `x*x` as `x^2`.
//!
//! Symbolica only differentiates its built-ins (`exp log sin cos` and powers).
//! The rest of the vocabulary is rewritten in terms of those before
//! differentiating. `asin`, `acos` and `atan` have no such form: each call is
//! sent as an opaque symbol `a<k>` and contributes `dE/da_k * f'(g) * dg/dx`.

use symbolica::atom::{Atom, AtomCore};
use symbolica::{symbol, try_parse};
use tracing::debug;

use crate::error::ExpressionError;
use crate::expression::ast::{Expr, Func};
use crate::expression::parser::parse;

/// Placeholder for the symbol being differentiated; `symbol!("dvar")` below must match
const ACTIVE: &str = "dvar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Keep,    // functions pass through unchanged (simplify)
    Rewrite, // functions rewritten into symbolica built-ins (differentiate)
}

/// What [`ACTIVE`] stands for in one rendering
#[derive(Debug, Clone, Copy)]
enum Active<'a> {
    None,
    Symbol(&'a str),
    Opaque(usize),
}

/// Name table for one round trip through symbolica
struct Bridge<'a> {
    mode: Mode,
    active: Active<'a>,
    names: Vec<String>,        // s<i> stands for names[i]
    opaque: Vec<(Func, Expr)>, // a<k> stands for opaque[k].0(opaque[k].1)
}

impl<'a> Bridge<'a> {
    fn new(mode: Mode, active: Active<'a>) -> Self {
        Self {
            mode,
            active,
            names: Vec::new(),
            opaque: Vec::new(),
        }
    }

    fn symbol(&mut self, name: &str) -> String {
        if matches!(self.active, Active::Symbol(a) if a == name) {
            return ACTIVE.to_string();
        }
        let i = match self.names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        };
        format!("s{i}")
    }

    fn opaque(&mut self, func: Func, arg: &Expr) -> String {
        let k = self.opaque.len();
        self.opaque.push((func, arg.clone()));
        if matches!(self.active, Active::Opaque(a) if a == k) {
            ACTIVE.to_string()
        } else {
            format!("a{k}")
        }
    }

    /// Fully parenthesized symbolica source for `expr`
    fn render(&mut self, expr: &Expr) -> Result<String, ExpressionError> {
        let source = match expr {
            Expr::Num(n) => number_source(*n)?,
            Expr::Var(v) => self.symbol(v),
            Expr::Neg(a) => format!("(-{})", self.render(a)?),
            Expr::Add(a, b) => format!("({}+{})", self.render(a)?, self.render(b)?),
            Expr::Sub(a, b) => format!("({}-{})", self.render(a)?, self.render(b)?),
            Expr::Mul(a, b) => format!("({}*{})", self.render(a)?, self.render(b)?),
            Expr::Div(a, b) => format!("({}/{})", self.render(a)?, self.render(b)?),
            Expr::Pow(a, b) => match a.as_ref() {
                Expr::Var(e) if e == "e" && self.mode == Mode::Rewrite => format!("exp({})", self.render(b)?),
                _ => format!("({}^{})", self.render(a)?, self.render(b)?),
            },
            Expr::Call(func, args) => self.render_call(*func, args)?,
        };
        Ok(source)
    }

    fn render_call(&mut self, func: Func, args: &[Expr]) -> Result<String, ExpressionError> {
        if self.mode == Mode::Keep {
            let mut rendered = Vec::with_capacity(args.len());
            for arg in args {
                rendered.push(self.render(arg)?);
            }
            let name = if func == Func::Ln { "log" } else { func.name() };
            return Ok(format!("{name}({})", rendered.join(",")));
        }

        let arg = args.first().ok_or_else(|| ExpressionError::Arity {
            name: func.name().to_string(),
            expected: func.arity(),
            found: 0,
        })?;
        match func {
            Func::Min | Func::Max => return Err(ExpressionError::NotDifferentiable(func.name().to_string())),
            Func::Asin | Func::Acos | Func::Atan => return Ok(self.opaque(func, arg)),
            _ => {}
        }

        let u = self.render(arg)?;
        let source = match func {
            Func::Ln => format!("log({u})"),
            Func::Log10 => format!("(log({u})/log(10))"),
            Func::Tan => format!("(sin({u})/cos({u}))"),
            Func::Sinh => format!("((exp({u})-exp(-{u}))/2)"),
            Func::Cosh => format!("((exp({u})+exp(-{u}))/2)"),
            Func::Tanh => format!("((exp({u})-exp(-{u}))/(exp({u})+exp(-{u})))"),
            Func::Sqrt => format!("({u}^(1/2))"),
            // d|u| = u u' / |u|
            Func::Abs => format!("(({u}^2)^(1/2))"),
            // sin, cos, exp are symbolica built-ins under the same names
            _ => format!("{}({u})", func.name()),
        };
        Ok(source)
    }

    /// Read a symbolica result back into an [`Expr`] over the original names
    fn read(&self, atom: &Atom) -> Result<Expr, ExpressionError> {
        let text = strip_namespaces(&atom.to_string());
        Ok(self.restore(parse(&text)?))
    }

    fn restore(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Num(n) => Expr::Num(n),
            Expr::Var(name) => self.lookup(&name).unwrap_or(Expr::Var(name)),
            Expr::Neg(a) => Expr::neg(self.restore(*a)),
            Expr::Add(a, b) => Expr::add(self.restore(*a), self.restore(*b)),
            Expr::Sub(a, b) => Expr::sub(self.restore(*a), self.restore(*b)),
            Expr::Mul(a, b) => Expr::mul(self.restore(*a), self.restore(*b)),
            Expr::Div(a, b) => Expr::div(self.restore(*a), self.restore(*b)),
            Expr::Pow(a, b) => Expr::pow(self.restore(*a), self.restore(*b)),
            Expr::Call(f, args) => Expr::Call(f, args.into_iter().map(|a| self.restore(a)).collect()),
        }
    }

    fn lookup(&self, placeholder: &str) -> Option<Expr> {
        if placeholder == ACTIVE {
            return match self.active {
                Active::Symbol(name) => Some(Expr::var(name)),
                Active::Opaque(k) => self.opaque_call(k),
                Active::None => None,
            };
        }
        let index = |prefix: char| placeholder.strip_prefix(prefix).and_then(|i| i.parse::<usize>().ok());
        if let Some(i) = index('s') {
            return self.names.get(i).map(|n| Expr::var(n.clone()));
        }
        index('a').and_then(|k| self.opaque_call(k))
    }

    fn opaque_call(&self, k: usize) -> Option<Expr> {
        self.opaque.get(k).map(|(f, arg)| Expr::Call(*f, vec![arg.clone()]))
    }
}

/// Exact rational source for a float, e.g. `0.25` -> `(25/100)`
fn number_source(n: f64) -> Result<String, ExpressionError> {
    if !n.is_finite() {
        return Err(ExpressionError::Symbolic(format!("non-finite constant {n}")));
    }
    // f64 Display never uses exponent notation
    let digits = format!("{}", n.abs());
    let ratio = match digits.split_once('.') {
        Some((int, frac)) => {
            let numerator = format!("{int}{frac}");
            let numerator = numerator.trim_start_matches('0');
            let numerator = if numerator.is_empty() { "0" } else { numerator };
            format!("{numerator}/1{}", "0".repeat(frac.len()))
        }
        None => digits,
    };
    Ok(if n < 0.0 { format!("(-({ratio}))") } else { format!("({ratio})") })
}

/// Drop `namespace::` qualifiers symbolica may print in front of symbols
fn strip_namespaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut ident_start = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(ident_start);
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            ident_start = out.len();
        }
    }
    out
}

fn load(source: &str) -> Result<Atom, ExpressionError> {
    try_parse!(source).map_err(|err| ExpressionError::Symbolic(err.to_string()))
}

/// f'(u) for the calls sent as opaque symbols
fn outer_derivative(func: Func, u: Expr) -> Expr {
    let one_minus_sq = Expr::sub(Expr::num(1.0), Expr::pow(u.clone(), Expr::num(2.0)));
    match func {
        Func::Asin => Expr::pow(one_minus_sq, Expr::num(-0.5)),
        Func::Acos => Expr::neg(Expr::pow(one_minus_sq, Expr::num(-0.5))),
        _ => Expr::div(Expr::num(1.0), Expr::add(Expr::num(1.0), Expr::pow(u, Expr::num(2.0)))),
    }
}

/// Symbolic derivative of `expr` with respect to `var`, simplified
pub fn differentiate(expr: &Expr, var: &str) -> Result<Expr, ExpressionError> {
    if !expr.depends_on(var) {
        return Ok(Expr::num(0.0));
    }

    // opaque calls held fixed
    let mut bridge = Bridge::new(Mode::Rewrite, Active::Symbol(var));
    let atom = load(&bridge.render(expr)?)?;
    let mut total = bridge.read(&atom.derivative(symbol!("dvar")))?;

    // chain rule through each opaque call that depends on `var`
    for (k, (func, arg)) in bridge.opaque.iter().enumerate() {
        if !arg.depends_on(var) {
            continue;
        }
        let mut wrt = Bridge::new(Mode::Rewrite, Active::Opaque(k));
        let atom = load(&wrt.render(expr)?)?;
        let partial = wrt.read(&atom.derivative(symbol!("dvar")))?;
        let inner = differentiate(arg, var)?;
        total = Expr::add(total, Expr::mul(Expr::mul(partial, outer_derivative(*func, arg.clone())), inner));
    }

    Ok(simplify(&total))
}

/// Normalize through symbolica. Anything it cannot take is returned unchanged.
pub fn simplify(expr: &Expr) -> Expr {
    let mut bridge = Bridge::new(Mode::Keep, Active::None);
    let result = bridge
        .render(expr)
        .and_then(|source| load(&source))
        .and_then(|atom| bridge.read(&atom));
    match result {
        Ok(simplified) => simplified,
        Err(err) => {
            debug!(%err, expr = %expr, "expression left unsimplified");
            expr.clone()
        }
    }
}
