//! Typed-in math expressions: parsing, evaluation, symbolic calculus
//!
//! Parsing and evaluation are local; derivatives and simplification go
//! through symbolica.
//!
//! Vocabulary: `+ - * / ^`, parentheses, implicit multiplication, the
//! constants `pi` and `e`, and the functions `sin cos tan asin acos atan sinh
//! cosh tanh exp ln log log10 sqrt abs min max pow`.

pub mod ast;
pub mod parser;
pub mod symbolic;

pub use ast::{Bindings, Expr, Func};
pub use parser::parse;
pub use symbolic::{differentiate, simplify};
