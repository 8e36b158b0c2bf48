//! Tokenizer and recursive-descent parser for typed expressions
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/' | <implicit>) unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident | ident '(' args ')' | '(' sum ')'
//! ```
//!
//! Implicit multiplication applies when a factor is directly followed by a
//! number, an identifier or `(`, so `2x`, `3(x + 1)` and `(x)(y)` all parse.

use crate::error::ExpressionError;
use crate::expression::ast::{Expr, Func};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent only when digits follow, so `2e` stays `2 * e`
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::UnexpectedToken { found: text.clone(), pos: start })?;
            out.push(Token { tok: Tok::Num(value), pos: start });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            out.push(Token { tok: Tok::Ident(text), pos: start });
            continue;
        }

        let tok = match c {
            '+' | '-' | '*' | '/' | '^' => Tok::Op(c),
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            ',' => Tok::Comma,
            _ => return Err(ExpressionError::UnexpectedChar { ch: c, pos: i }),
        };
        out.push(Token { tok, pos: i });
        i += 1;
    }

    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Tok) -> Result<(), ExpressionError> {
        match self.next() {
            Some(t) if t.tok == want => Ok(()),
            Some(t) => Err(unexpected(&t)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.product()?;
        while let Some(Tok::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.product()?;
            lhs = if op == '+' { Expr::add(lhs, rhs) } else { Expr::sub(lhs, rhs) };
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Tok::Op('*')) => {
                    self.pos += 1;
                    lhs = Expr::mul(lhs, self.unary()?);
                }
                Some(Tok::Op('/')) => {
                    self.pos += 1;
                    lhs = Expr::div(lhs, self.unary()?);
                }
                Some(Tok::Num(_)) | Some(Tok::Ident(_)) | Some(Tok::LParen) => {
                    lhs = Expr::mul(lhs, self.power()?);
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Tok::Op('-')) => {
                self.pos += 1;
                Ok(Expr::neg(self.unary()?))
            }
            Some(Tok::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.primary()?;
        if let Some(Tok::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.next().ok_or(ExpressionError::UnexpectedEnd)?;
        match token.tok {
            Tok::Num(n) => Ok(Expr::Num(n)),
            Tok::LParen => {
                let inner = self.sum()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::Ident(name) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    let args = self.args()?;
                    return build_call(name, args);
                }
                Ok(Expr::Var(name))
            }
            _ => Err(unexpected(&token)),
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>, ExpressionError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Tok::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.sum()?);
            match self.next() {
                Some(Token { tok: Tok::Comma, .. }) => continue,
                Some(Token { tok: Tok::RParen, .. }) => break,
                Some(t) => return Err(unexpected(&t)),
                None => return Err(ExpressionError::UnexpectedEnd),
            }
        }
        Ok(args)
    }
}

fn build_call(name: String, mut args: Vec<Expr>) -> Result<Expr, ExpressionError> {
    if name == "pow" {
        if args.len() != 2 {
            return Err(ExpressionError::Arity { name, expected: 2, found: args.len() });
        }
        let exponent = args.pop().unwrap_or(Expr::Num(1.0));
        let base = args.pop().unwrap_or(Expr::Num(0.0));
        return Ok(Expr::pow(base, exponent));
    }
    let func = Func::from_name(&name).ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
    if args.len() != func.arity() {
        return Err(ExpressionError::Arity { name, expected: func.arity(), found: args.len() });
    }
    Ok(Expr::Call(func, args))
}

fn unexpected(t: &Token) -> ExpressionError {
    let found = match &t.tok {
        Tok::Num(n) => n.to_string(),
        Tok::Ident(s) => s.clone(),
        Tok::Op(c) => c.to_string(),
        Tok::LParen => "(".to_string(),
        Tok::RParen => ")".to_string(),
        Tok::Comma => ",".to_string(),
    };
    ExpressionError::UnexpectedToken { found, pos: t.pos }
}

/// Parse a complete expression; trailing input is an error.
pub fn parse(src: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExpressionError::UnexpectedEnd);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.sum()?;
    match parser.next() {
        None => Ok(expr),
        Some(t) => Err(unexpected(&t)),
    }
}
