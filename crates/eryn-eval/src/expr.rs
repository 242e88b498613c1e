//! A small recursive-descent parser for the expression language `Evaluator`
//! accepts: literals, array/object literals, template-string
//! interpolation, dotted/bracket accessor chains rooted at `context`,
//! `local`, or `shared`, comparisons, and `&&`/`||`/`!`. No arithmetic:
//! literal + dotted-accessor + comparison only, not a general expression
//! language.

use crate::error::{EvalError, EvalResult};

/// The root an accessor chain is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    Context,
    Local,
    Shared,
}

/// One step in an accessor chain: `.field` or `[expr]`.
#[derive(Debug, Clone)]
pub enum Accessor {
    Field(String),
    Index(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A piece of a template literal: either a literal run of text or an
/// interpolated `${expr}`.
#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(String),
    Interpolate(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    TemplateLiteral(Vec<TemplatePart>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// A path rooted at `context`/`local`/`shared` or a bare name (which
    /// resolves, per this crate's `Evaluator`, as a key directly on
    /// `local` — the form the compiler's iterator localization pass
    /// produces).
    Path { root: Root, bare_name: Option<String>, chain: Vec<Accessor> },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
}

impl Expr {
    /// Whether this node (and everything under it) is allowed in `strict`
    /// mode: a literal, or a dotted-accessor chain rooted at
    /// `context`/`local`/`shared`. Operators and bare-name paths are
    /// rejected.
    #[must_use]
    pub fn is_strict_allowed(&self) -> bool {
        match self {
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => true,
            Self::TemplateLiteral(parts) => parts.iter().all(|p| match p {
                TemplatePart::Text(_) => true,
                TemplatePart::Interpolate(e) => e.is_strict_allowed(),
            }),
            Self::Array(items) => items.iter().all(Expr::is_strict_allowed),
            Self::Object(fields) => fields.iter().all(|(_, v)| v.is_strict_allowed()),
            Self::Path { bare_name, chain, .. } => {
                bare_name.is_none() && chain.iter().all(|a| !matches!(a, Accessor::Index(e) if !e.is_strict_allowed()))
            }
            Self::Not(_) | Self::And(..) | Self::Or(..) | Self::Compare(..) => false,
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

/// Parses a complete expression from `source`, requiring the whole input
/// to be consumed.
pub fn parse(source: &str) -> EvalResult<Expr> {
    let mut parser = Parser { src: source, bytes: source.as_bytes(), pos: 0 };
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(EvalError::TrailingInput(parser.src[parser.pos..].to_string()));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn bump_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.bump_str("||") {
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_not()?;
        loop {
            self.skip_ws();
            if self.bump_str("&&") {
                let right = self.parse_not()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_not(&mut self) -> EvalResult<Expr> {
        self.skip_ws();
        if self.bump_str("!") {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> EvalResult<Expr> {
        let left = self.parse_primary()?;
        self.skip_ws();
        let op = if self.bump_str("==") {
            CompareOp::Eq
        } else if self.bump_str("!=") {
            CompareOp::Ne
        } else if self.bump_str(">=") {
            CompareOp::Ge
        } else if self.bump_str("<=") {
            CompareOp::Le
        } else if self.bump_str(">") {
            CompareOp::Gt
        } else if self.bump_str("<") {
            CompareOp::Lt
        } else {
            return Ok(left);
        };
        let right = self.parse_primary()?;
        Ok(Expr::Compare(Box::new(left), op, Box::new(right)))
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        self.skip_ws();
        match self.peek().ok_or(EvalError::UnexpectedEof)? {
            b'(' => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.skip_ws();
                if !self.bump_str(")") {
                    return Err(EvalError::Expected(")"));
                }
                Ok(inner)
            }
            b'[' => self.parse_array(),
            b'{' => self.parse_object(),
            b'\'' | b'"' => Ok(Expr::Str(self.parse_quoted_string()?)),
            b'`' => self.parse_template_literal(),
            b'-' | b'0'..=b'9' => self.parse_number(),
            _ => self.parse_keyword_or_path(),
        }
    }

    fn parse_array(&mut self) -> EvalResult<Expr> {
        self.pos += 1; // '['
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Expr::Array(items));
        }
        loop {
            items.push(self.parse_or()?);
            self.skip_ws();
            if self.bump_str(",") {
                continue;
            }
            if self.bump_str("]") {
                return Ok(Expr::Array(items));
            }
            return Err(EvalError::Expected("]"));
        }
    }

    fn parse_object(&mut self) -> EvalResult<Expr> {
        self.pos += 1; // '{'
        let mut fields = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Expr::Object(fields));
        }
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some(b'\'' | b'"') => self.parse_quoted_string()?,
                _ => self.parse_identifier()?,
            };
            self.skip_ws();
            if !self.bump_str(":") {
                return Err(EvalError::Expected(":"));
            }
            let value = self.parse_or()?;
            fields.push((key, value));
            self.skip_ws();
            if self.bump_str(",") {
                continue;
            }
            if self.bump_str("}") {
                return Ok(Expr::Object(fields));
            }
            return Err(EvalError::Expected("}"));
        }
    }

    fn parse_quoted_string(&mut self) -> EvalResult<String> {
        let quote = self.peek().ok_or(EvalError::UnexpectedEof)?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or(EvalError::UnexpectedEof)?;
            if c == quote {
                self.pos += 1;
                return Ok(out);
            }
            if c == b'\\' {
                self.pos += 1;
                let escaped = self.peek().ok_or(EvalError::UnexpectedEof)?;
                out.push(match escaped {
                    b'n' => '\n',
                    b't' => '\t',
                    b'r' => '\r',
                    other => other as char,
                });
                self.pos += 1;
            } else {
                let ch = self.src[self.pos..].chars().next().unwrap();
                out.push(ch);
                self.pos += ch.len_utf8();
            }
        }
    }

    fn parse_template_literal(&mut self) -> EvalResult<Expr> {
        self.pos += 1; // '`'
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            let c = self.peek().ok_or(EvalError::UnexpectedEof)?;
            if c == b'`' {
                self.pos += 1;
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                return Ok(Expr::TemplateLiteral(parts));
            }
            if c == b'$' && self.bytes.get(self.pos + 1) == Some(&b'{') {
                if !text.is_empty() {
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                }
                self.pos += 2;
                let inner = self.parse_or()?;
                self.skip_ws();
                if !self.bump_str("}") {
                    return Err(EvalError::Expected("}"));
                }
                parts.push(TemplatePart::Interpolate(Box::new(inner)));
                continue;
            }
            let ch = self.src[self.pos..].chars().next().unwrap();
            text.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    fn parse_number(&mut self) -> EvalResult<Expr> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.bytes.get(self.pos + 1), Some(b'0'..=b'9')) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>().map(Expr::Float).map_err(|_| EvalError::InvalidNumber(text.to_string()))
        } else {
            text.parse::<i64>().map(Expr::Int).map_err(|_| EvalError::InvalidNumber(text.to_string()))
        }
    }

    fn parse_identifier(&mut self) -> EvalResult<String> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'$') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(EvalError::UnexpectedChar(self.peek().map_or('\0', |b| b as char), self.pos));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_keyword_or_path(&mut self) -> EvalResult<Expr> {
        let name = self.parse_identifier()?;
        match name.as_str() {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            "null" | "undefined" => return Ok(Expr::Null),
            _ => {}
        }
        let (root, bare_name) = match name.as_str() {
            "context" => (Root::Context, None),
            "local" => (Root::Local, None),
            "shared" => (Root::Shared, None),
            _ => (Root::Local, Some(name)),
        };
        let chain = self.parse_accessor_chain()?;
        Ok(Expr::Path { root, bare_name, chain })
    }

    fn parse_accessor_chain(&mut self) -> EvalResult<Vec<Accessor>> {
        let mut chain = Vec::new();
        loop {
            if self.peek() == Some(b'.') {
                self.pos += 1;
                chain.push(Accessor::Field(self.parse_identifier()?));
            } else if self.peek() == Some(b'[') {
                self.pos += 1;
                self.skip_ws();
                let index = if matches!(self.peek(), Some(b'\'' | b'"')) {
                    Expr::Str(self.parse_quoted_string()?)
                } else {
                    self.parse_or()?
                };
                self.skip_ws();
                if !self.bump_str("]") {
                    return Err(EvalError::Expected("]"));
                }
                chain.push(Accessor::Index(Box::new(index)));
            } else {
                return Ok(chain);
            }
        }
    }
}
