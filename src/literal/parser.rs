//! Safe evaluation of host literal text.
//!
//! Accepts the subset of Python expression syntax that the guest
//! canonicalization routine emits, plus a closed whitelist of constructor
//! calls. Nothing is ever looked up or executed.

use super::lexer::{Dialect, Spanned, Token, lex};
use crate::value::{DataFrame, HostValue, NdArray, Series};
use crate::{Error, Result};

/// Containers nested deeper than this are rejected
pub const MAX_DEPTH: usize = 256;

/// Largest `range` a constructor such as `set(range(n))` will expand
const MAX_RANGE_ITEMS: u64 = 1 << 24;

/// Parse canonical host literal text into a [`HostValue`].
pub fn decode(text: &str) -> Result<HostValue> {
    let source = text.trim();
    let tokens = lex(source, Dialect::Host)?;
    let mut parser = Parser {
        text: source,
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    parser.expect_eof()?;
    Ok(value)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

/// Call arguments: positional, then `name=value`
struct Args {
    positional: Vec<HostValue>,
    keywords: Vec<(String, HostValue)>,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::conversion(self.text, self.offset(), reason)
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", what, self.peek().describe())))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(self.error(format!("unexpected {} after value", other.describe()))),
        }
    }

    fn expression(&mut self) -> Result<HostValue> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        let value = self.sum();
        self.depth -= 1;
        value
    }

    /// `real (+|-) imag` is the only binary operation a literal may contain
    fn sum(&mut self) -> Result<HostValue> {
        let mut left = self.unary()?;
        loop {
            let negate = match self.peek() {
                Token::Plus => false,
                Token::Minus => true,
                _ => return Ok(left),
            };
            let at = self.offset();
            self.pos += 1;
            let right = self.unary()?;
            left = match (real_part(&left), right) {
                (Some((re, im)), HostValue::Complex { re: rr, im: ri }) => {
                    let sign = if negate { -1.0 } else { 1.0 };
                    HostValue::Complex {
                        re: re + sign * rr,
                        im: im + sign * ri,
                    }
                }
                _ => {
                    return Err(Error::conversion(
                        self.text,
                        at,
                        "operators may only join a real and an imaginary part",
                    ));
                }
            };
        }
    }

    /// A run of signs folded into one, so `---1` never recurses
    fn unary(&mut self) -> Result<HostValue> {
        let mut negate = false;
        let mut signed = false;
        loop {
            match self.peek() {
                Token::Minus => negate = !negate,
                Token::Plus => {}
                _ => break,
            }
            signed = true;
            self.pos += 1;
        }

        // sign and magnitude together, so i64::MIN is reachable
        if let Token::Int(magnitude) = self.peek() {
            let magnitude = *magnitude as i128;
            let at = self.offset();
            self.pos += 1;
            let value = if negate { -magnitude } else { magnitude };
            return i64::try_from(value)
                .map(HostValue::Int)
                .map_err(|_| Error::conversion(self.text, at, "integer literal out of range"));
        }

        let at = self.offset();
        let operand = self.primary()?;
        if !signed {
            return Ok(operand);
        }
        let op = if negate { '-' } else { '+' };
        match operand {
            HostValue::Int(i) if negate => i
                .checked_neg()
                .map(HostValue::Int)
                .ok_or_else(|| Error::conversion(self.text, at, "integer literal out of range")),
            HostValue::Float(f) if negate => Ok(HostValue::Float(-f)),
            HostValue::Complex { re, im } if negate => Ok(HostValue::Complex { re: -re, im: -im }),
            v @ (HostValue::Int(_) | HostValue::Float(_) | HostValue::Complex { .. }) => Ok(v),
            other => Err(Error::conversion(
                self.text,
                at,
                format!("bad operand type for unary {}: '{}'", op, other.type_name()),
            )),
        }
    }

    fn primary(&mut self) -> Result<HostValue> {
        let start = self.offset();
        match self.advance() {
            Token::Int(magnitude) => i64::try_from(magnitude)
                .map(HostValue::Int)
                .map_err(|_| Error::conversion(self.text, start, "integer literal out of range")),
            Token::Float(f) => Ok(HostValue::Float(f)),
            Token::Imag(f) => Ok(HostValue::Complex { re: 0.0, im: f }),
            Token::Str(mut s) => {
                // implicit concatenation of adjacent literals
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(HostValue::Str(s))
            }
            Token::LBracket => Ok(HostValue::List(self.items(&Token::RBracket, "']'")?)),
            Token::LParen => self.parenthesized(),
            Token::LBrace => self.braced(),
            Token::Ident(name) => match name.as_str() {
                "True" => Ok(HostValue::Bool(true)),
                "False" => Ok(HostValue::Bool(false)),
                "None" => Ok(HostValue::None),
                _ => {
                    let mut path = name;
                    while self.peek() == &Token::Dot {
                        self.pos += 1;
                        match self.advance() {
                            Token::Ident(part) => {
                                path.push('.');
                                path.push_str(&part);
                            }
                            other => {
                                return Err(self.error(format!("expected name after '.', found {}", other.describe())));
                            }
                        }
                    }
                    if self.peek() != &Token::LParen {
                        return Err(Error::conversion(
                            self.text,
                            start,
                            format!("name '{}' is not a literal", path),
                        ));
                    }
                    self.pos += 1;
                    let args = self.arguments()?;
                    self.call(&path, args, start)
                }
            },
            other => Err(Error::conversion(
                self.text,
                start,
                format!("unexpected {}", other.describe()),
            )),
        }
    }

    /// Comma separated values up to `close`; trailing comma allowed
    fn items(&mut self, close: &Token, what: &str) -> Result<Vec<HostValue>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, what)?;
                return Ok(items);
            }
        }
    }

    fn parenthesized(&mut self) -> Result<HostValue> {
        if self.eat(&Token::RParen) {
            return Ok(HostValue::Tuple(Vec::new()));
        }
        let first = self.expression()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }
        self.expect(&Token::Comma, "',' or ')'")?;
        let mut items = vec![first];
        items.extend(self.items(&Token::RParen, "')'")?);
        Ok(HostValue::Tuple(items))
    }

    fn braced(&mut self) -> Result<HostValue> {
        if self.eat(&Token::RBrace) {
            return Ok(HostValue::Dict(Vec::new()));
        }
        let key_at = self.offset();
        let first = self.expression()?;

        if !self.eat(&Token::Colon) {
            let mut items = vec![first];
            if self.eat(&Token::Comma) {
                items.extend(self.items(&Token::RBrace, "'}'")?);
            } else {
                self.expect(&Token::RBrace, "',' or '}'")?;
            }
            return self.make_set(items, key_at);
        }

        let mut pairs = Vec::new();
        let mut key = first;
        let mut at = key_at;
        loop {
            let value = self.expression()?;
            self.insert_pair(&mut pairs, key, value, at)?;
            if !self.eat(&Token::Comma) || self.peek() == &Token::RBrace {
                self.expect(&Token::RBrace, "',' or '}'")?;
                return Ok(HostValue::Dict(pairs));
            }
            at = self.offset();
            key = self.expression()?;
            self.expect(&Token::Colon, "':'")?;
        }
    }

    fn insert_pair(
        &self,
        pairs: &mut Vec<(HostValue, HostValue)>,
        key: HostValue,
        value: HostValue,
        at: usize,
    ) -> Result<()> {
        if !key.is_hashable() {
            return Err(Error::conversion(
                self.text,
                at,
                format!("unhashable type: '{}'", key.type_name()),
            ));
        }
        // a repeated key keeps its first position and takes the last value
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => pairs.push((key, value)),
        }
        Ok(())
    }

    fn make_set(&self, items: Vec<HostValue>, at: usize) -> Result<HostValue> {
        let mut unique: Vec<HostValue> = Vec::with_capacity(items.len());
        for item in items {
            if !item.is_hashable() {
                return Err(Error::conversion(
                    self.text,
                    at,
                    format!("unhashable type: '{}'", item.type_name()),
                ));
            }
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(HostValue::Set(unique))
    }

    fn arguments(&mut self) -> Result<Args> {
        let mut args = Args {
            positional: Vec::new(),
            keywords: Vec::new(),
        };
        loop {
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Assign) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                args.keywords.push((name, self.expression()?));
            } else if !args.keywords.is_empty() {
                return Err(self.error("positional argument follows keyword argument"));
            } else {
                args.positional.push(self.expression()?);
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RParen, "')'")?;
                return Ok(args);
            }
        }
    }

    fn call(&self, path: &str, args: Args, at: usize) -> Result<HostValue> {
        let fail = |reason: String| Error::conversion(self.text, at, reason);
        let name = match path {
            "numpy.matrix" | "np.matrix" => "matrix",
            "numpy.array" | "np.array" => "array",
            "pandas.DataFrame" | "pd.DataFrame" => "DataFrame",
            "pandas.Series" | "pd.Series" => "Series",
            other => other,
        };
        let allowed_keywords: &[&str] = match name {
            "DataFrame" | "Series" => &["index"],
            _ => &[],
        };
        if let Some((kw, _)) = args.keywords.iter().find(|(k, _)| !allowed_keywords.contains(&k.as_str())) {
            return Err(fail(format!("{}() got an unexpected keyword argument '{}'", name, kw)));
        }
        let arity = |min: usize, max: usize| -> Result<()> {
            let n = args.positional.len();
            if n < min || n > max {
                Err(fail(format!("{}() takes {} to {} arguments ({} given)", name, min, max, n)))
            } else {
                Ok(())
            }
        };
        let p = &args.positional;

        match name {
            "range" => {
                arity(1, 3)?;
                let mut ints = Vec::with_capacity(p.len());
                for v in p {
                    match v {
                        HostValue::Int(i) => ints.push(*i),
                        other => return Err(fail(format!("range() expects integers, got '{}'", other.type_name()))),
                    }
                }
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(fail("range expected at least 1 argument, got 0".to_string())),
                };
                if step == 0 {
                    return Err(fail("range() arg 3 must not be zero".to_string()));
                }
                Ok(HostValue::Range { start, stop, step })
            }
            "complex" => {
                arity(0, 2)?;
                let part = |v: Option<&HostValue>| -> Result<(f64, f64)> {
                    match v {
                        None => Ok((0.0, 0.0)),
                        Some(v) => real_part(v).ok_or_else(|| {
                            fail(format!("complex() argument must be a number, not '{}'", v.type_name()))
                        }),
                    }
                };
                let (ar, ai) = part(p.first())?;
                let (br, bi) = part(p.get(1))?;
                Ok(HostValue::Complex { re: ar - bi, im: ai + br })
            }
            "float" => {
                arity(0, 1)?;
                match p.first() {
                    None => Ok(HostValue::Float(0.0)),
                    Some(HostValue::Int(i)) => Ok(HostValue::Float(*i as f64)),
                    Some(HostValue::Float(f)) => Ok(HostValue::Float(*f)),
                    Some(HostValue::Str(s)) => parse_float_text(s)
                        .map(HostValue::Float)
                        .ok_or_else(|| fail(format!("could not convert string to float: {:?}", s))),
                    Some(other) => Err(fail(format!("float() argument must be a string or a number, not '{}'", other.type_name()))),
                }
            }
            "set" => {
                arity(0, 1)?;
                let items = match p.first() {
                    None => Vec::new(),
                    Some(v) => iterate(v).ok_or_else(|| fail(format!("'{}' object is not iterable", v.type_name())))?,
                };
                self.make_set(items, at)
            }
            "matrix" => {
                arity(1, 1)?;
                let array = NdArray::from_nested(&p[0]).map_err(|e| fail(e.to_string()))?;
                let shape = match array.ndim() {
                    0 => vec![1, 1],
                    1 => vec![1, array.size()],
                    2 => array.shape().to_vec(),
                    n => return Err(fail(format!("matrix must be 2-dimensional, got {} dimensions", n))),
                };
                NdArray::new(shape, array.data().to_vec())
                    .map(HostValue::Matrix)
                    .map_err(|e| fail(e.to_string()))
            }
            "array" => {
                arity(1, 1)?;
                NdArray::from_nested(&p[0])
                    .map(HostValue::Array)
                    .map_err(|e| fail(e.to_string()))
            }
            "DataFrame" => {
                arity(0, 1)?;
                let columns = match p.first() {
                    None => Vec::new(),
                    Some(HostValue::Dict(pairs)) => {
                        let mut columns = Vec::with_capacity(pairs.len());
                        for (k, v) in pairs {
                            let cells = iterate(v).ok_or_else(|| {
                                fail(format!("column {} must be a list, not '{}'", k, v.type_name()))
                            })?;
                            columns.push((k.key_text(), cells));
                        }
                        columns
                    }
                    Some(other) => return Err(fail(format!("DataFrame() expects a dict of columns, not '{}'", other.type_name()))),
                };
                let frame = match keyword(&args, "index") {
                    Some(index) => {
                        let index = iterate(index).ok_or_else(|| fail("index must be a list".to_string()))?;
                        DataFrame::new(columns, index)
                    }
                    None => DataFrame::from_columns(columns),
                };
                frame.map(HostValue::DataFrame).map_err(|e| fail(e.to_string()))
            }
            "Series" => {
                arity(0, 1)?;
                let values = match p.first() {
                    None => Vec::new(),
                    Some(v) => iterate(v).ok_or_else(|| fail(format!("Series() expects a list, not '{}'", v.type_name())))?,
                };
                match keyword(&args, "index") {
                    Some(index) => {
                        let index = iterate(index).ok_or_else(|| fail("index must be a list".to_string()))?;
                        Series::new(index, values)
                            .map(HostValue::Series)
                            .map_err(|e| fail(e.to_string()))
                    }
                    None => Ok(HostValue::Series(Series::from_values(values))),
                }
            }
            other => Err(fail(format!("call to '{}' is not a literal", other))),
        }
    }
}

fn keyword<'a>(args: &'a Args, name: &str) -> Option<&'a HostValue> {
    args.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

/// (real, imaginary) of a numeric value
fn real_part(value: &HostValue) -> Option<(f64, f64)> {
    match value {
        HostValue::Int(i) => Some((*i as f64, 0.0)),
        HostValue::Float(f) => Some((*f, 0.0)),
        HostValue::Complex { re, im } => Some((*re, *im)),
        _ => None,
    }
}

/// Elements of an iterable literal
fn iterate(value: &HostValue) -> Option<Vec<HostValue>> {
    match value {
        HostValue::List(items) | HostValue::Tuple(items) | HostValue::Set(items) => Some(items.clone()),
        HostValue::Range { start, stop, step } => {
            if HostValue::range_len(*start, *stop, *step) > MAX_RANGE_ITEMS {
                return None;
            }
            Some(
                HostValue::range_values(*start, *stop, *step)
                    .into_iter()
                    .map(HostValue::Int)
                    .collect(),
            )
        }
        HostValue::Str(s) => Some(s.chars().map(|c| HostValue::Str(c.to_string())).collect()),
        HostValue::Dict(pairs) => Some(pairs.iter().map(|(k, _)| k.clone()).collect()),
        _ => None,
    }
}

/// `float("nan")`, `float(" -Infinity ")`, `float("1.5")`
fn parse_float_text(s: &str) -> Option<f64> {
    let t = s.trim().to_ascii_lowercase();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(&t)),
    };
    let magnitude = match body {
        "nan" => f64::NAN,
        "inf" | "infinity" => f64::INFINITY,
        digits => digits.replace('_', "").parse::<f64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}
