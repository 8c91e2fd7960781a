//! Reader for the guest expression subset the encoder emits.
//!
//! This evaluates encoder output the way the guest kernel would, without a
//! guest kernel: literals, `Float::` constants, `Set[...]`, `N[...]`,
//! `Complex(re, im)`, ranges, `N.step(last, step).to_a` and
//! `Sysml::DataFrame.new(...)`. Anything else is rejected.

use super::GuestValue;
use crate::literal::{Dialect, MAX_DEPTH, Spanned, Token, lex};
use crate::{Error, Result};

/// Largest `N.step(last, step).to_a` the reader will materialize
const MAX_STEP_ITEMS: i128 = 1 << 24;

/// Evaluate guest literal source into a [`GuestValue`].
pub fn read(text: &str) -> Result<GuestValue> {
    let tokens = lex(text, Dialect::Guest)?;
    let mut reader = Reader { text, tokens, pos: 0, depth: 0 };
    let value = reader.value()?;
    match reader.peek() {
        Token::Eof => Ok(value),
        other => Err(reader.error(format!("unexpected {} after value", other.describe()))),
    }
}

struct Reader<'a> {
    text: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Reader<'_> {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
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

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::conversion(self.text, self.offset(), reason)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_name(&mut self, name: &str) -> Result<()> {
        match self.peek() {
            Token::Ident(found) if found == name => {
                self.pos += 1;
                Ok(())
            }
            other => Err(self.error(format!("expected '{}', found {}", name, other.describe()))),
        }
    }

    fn value(&mut self) -> Result<GuestValue> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = self.primary();
        self.depth -= 1;
        value
    }

    fn primary(&mut self) -> Result<GuestValue> {
        let start = self.pos;
        match self.advance() {
            Token::Minus => {
                if let Token::Int(magnitude) = self.peek() {
                    let magnitude = *magnitude;
                    self.pos += 1;
                    return self.integer_literal(-(magnitude as i128), start);
                }
                match self.value()? {
                    GuestValue::Integer(i) => i
                        .checked_neg()
                        .map(GuestValue::Integer)
                        .ok_or_else(|| self.error("integer out of range")),
                    GuestValue::Float(f) => Ok(GuestValue::Float(-f)),
                    _ => {
                        self.pos = start;
                        Err(self.error("unary minus applies to numbers only"))
                    }
                }
            }
            Token::Int(magnitude) => self.integer_literal(magnitude as i128, start),
            Token::Float(f) => Ok(GuestValue::Float(f)),
            Token::Str(s) => Ok(GuestValue::Str(s)),
            Token::LBracket => Ok(GuestValue::Array(self.items(Token::RBracket)?)),
            Token::LBrace => self.hash(),
            Token::LParen => self.range(),
            Token::Ident(name) => self.named(&name, start),
            other => {
                self.pos = start;
                Err(self.error(format!("unexpected {}", other.describe())))
            }
        }
    }

    /// An integer literal, optionally followed by `.step(last, step).to_a`
    fn integer_literal(&mut self, value: i128, start: usize) -> Result<GuestValue> {
        let Ok(first) = i64::try_from(value) else {
            self.pos = start;
            return Err(self.error("integer out of range"));
        };
        let stepped = self.peek() == &Token::Dot
            && matches!(self.tokens.get(self.pos + 1).map(|s| &s.token), Some(Token::Ident(m)) if m == "step");
        if !stepped {
            return Ok(GuestValue::Integer(first));
        }
        self.pos += 2;
        self.expect(Token::LParen)?;
        let last = self.integer()?;
        self.expect(Token::Comma)?;
        let at = self.offset();
        let step = self.integer()?;
        self.expect(Token::RParen)?;
        self.expect(Token::Dot)?;
        self.expect_name("to_a")?;
        if step == 0 {
            return Err(Error::conversion(self.text, at, "step can't be 0"));
        }

        let (first, last, step) = (first as i128, last as i128, step as i128);
        let count = if step > 0 {
            if last < first { 0 } else { (last - first) / step + 1 }
        } else if last > first {
            0
        } else {
            (first - last) / -step + 1
        };
        if count > MAX_STEP_ITEMS {
            return Err(Error::conversion(self.text, at, "stepped range too large to expand"));
        }
        // every element lies between first and last, so each fits i64
        let items = (0..count)
            .map(|k| GuestValue::Integer((first + k * step) as i64))
            .collect();
        Ok(GuestValue::Array(items))
    }

    fn named(&mut self, name: &str, start: usize) -> Result<GuestValue> {
        match name {
            "nil" => Ok(GuestValue::Nil),
            "true" => Ok(GuestValue::Bool(true)),
            "false" => Ok(GuestValue::Bool(false)),
            "Float" => {
                self.expect(Token::PathSep)?;
                match self.advance() {
                    Token::Ident(c) if c == "NAN" => Ok(GuestValue::Float(f64::NAN)),
                    Token::Ident(c) if c == "INFINITY" => Ok(GuestValue::Float(f64::INFINITY)),
                    _ => {
                        self.pos -= 1;
                        Err(self.error("unknown Float constant"))
                    }
                }
            }
            "Complex" => {
                self.expect(Token::LParen)?;
                let re = self.real()?;
                self.expect(Token::Comma)?;
                let im = self.real()?;
                self.expect(Token::RParen)?;
                Ok(GuestValue::Complex(re, im))
            }
            "Set" => {
                self.expect(Token::LBracket)?;
                let mut unique: Vec<GuestValue> = Vec::new();
                for item in self.items(Token::RBracket)? {
                    if !unique.iter().any(|u| u.same_as(&item)) {
                        unique.push(item);
                    }
                }
                Ok(GuestValue::Set(unique))
            }
            "N" => self.matrix(),
            "Sysml" => self.dataframe(),
            _ => {
                self.pos = start;
                Err(self.error(format!("undefined name '{}'", name)))
            }
        }
    }

    fn real(&mut self) -> Result<f64> {
        match self.value()? {
            GuestValue::Integer(i) => Ok(i as f64),
            GuestValue::Float(f) => Ok(f),
            _ => Err(self.error("expected a real number")),
        }
    }

    /// Comma separated values up to `close`; a trailing comma is allowed
    fn items(&mut self, close: Token) -> Result<Vec<GuestValue>> {
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.value()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn hash(&mut self) -> Result<GuestValue> {
        let mut pairs: Vec<(GuestValue, GuestValue)> = Vec::new();
        while !self.eat(&Token::RBrace) {
            let key = self.value()?;
            self.expect(Token::FatArrow)?;
            let value = self.value()?;
            match pairs.iter_mut().find(|(k, _)| k.same_as(&key)) {
                Some(slot) => slot.1 = value,
                None => pairs.push((key, value)),
            }
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace)?;
                break;
            }
        }
        Ok(GuestValue::Hash(pairs))
    }

    fn range(&mut self) -> Result<GuestValue> {
        let first = self.integer()?;
        let exclusive = match self.advance() {
            Token::DotDot => false,
            Token::DotDotDot => true,
            _ => {
                self.pos -= 1;
                return Err(self.error("expected '..' or '...' in range"));
            }
        };
        let last = self.integer()?;
        self.expect(Token::RParen)?;
        Ok(GuestValue::Range { first, last, exclusive })
    }

    fn integer(&mut self) -> Result<i64> {
        match self.value()? {
            GuestValue::Integer(i) => Ok(i),
            _ => Err(self.error("expected an integer")),
        }
    }

    fn matrix(&mut self) -> Result<GuestValue> {
        self.expect(Token::LBracket)?;
        let at = self.offset();
        let mut rows = Vec::new();
        for row in self.items(Token::RBracket)? {
            match row {
                GuestValue::Array(cells) => rows.push(cells),
                scalar => rows.push(vec![scalar]),
            }
        }
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::conversion(self.text, at, "matrix rows differ in length"));
        }
        Ok(GuestValue::Matrix(rows))
    }

    fn dataframe(&mut self) -> Result<GuestValue> {
        self.expect(Token::PathSep)?;
        self.expect_name("DataFrame")?;
        self.expect(Token::Dot)?;
        self.expect_name("new")?;
        self.expect(Token::LParen)?;
        let at = self.offset();
        self.expect(Token::LBrace)?;
        let GuestValue::Hash(columns) = self.hash()? else {
            return Err(Error::conversion(self.text, at, "expected a column hash"));
        };

        let mut index = None;
        if self.eat(&Token::Comma) {
            self.expect_name("index")?;
            self.expect(Token::Colon)?;
            match self.value()? {
                GuestValue::Array(labels) => index = Some(labels),
                _ => return Err(self.error("index must be an array")),
            }
        }
        self.expect(Token::RParen)?;

        let mut vectors = Vec::with_capacity(columns.len());
        for (name, cells) in columns {
            match cells {
                GuestValue::Array(cells) => vectors.push((name.to_s(), cells)),
                _ => return Err(Error::conversion(self.text, at, "column values must be arrays")),
            }
        }
        let rows = vectors.first().map(|(_, c)| c.len()).unwrap_or(0);
        let index = index.unwrap_or_else(|| (0..rows as i64).map(GuestValue::Integer).collect());
        if vectors.iter().any(|(_, c)| c.len() != index.len()) {
            return Err(Error::conversion(self.text, at, "column length does not match index"));
        }
        Ok(GuestValue::DataFrame { vectors, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::guest::canonicalize;
    use crate::literal::decode;
    use crate::value::{DataFrame, HostValue, Series};

    /// Host value through the guest and back
    fn cycle(value: &HostValue) -> HostValue {
        let guest = read(&encode(value)).unwrap();
        decode(&canonicalize(&guest)).unwrap()
    }

    #[test]
    fn test_read_literals() {
        assert_eq!(read("nil").unwrap(), GuestValue::Nil);
        assert_eq!(read("-Float::INFINITY").unwrap(), GuestValue::Float(f64::NEG_INFINITY));
        assert_eq!(read("Complex(1.0,-2)").unwrap(), GuestValue::Complex(1.0, -2.0));
        assert_eq!(
            read("(1..4)").unwrap(),
            GuestValue::Range { first: 1, last: 4, exclusive: false }
        );
        assert_eq!(
            read(r#"{"a" => 1,"a" => 2}"#).unwrap(),
            GuestValue::Hash(vec![(GuestValue::Str("a".to_string()), GuestValue::Integer(2))])
        );
        assert_eq!(read("Set[1,1,2]").unwrap().size(), Some(2));
    }

    #[test]
    fn test_read_rejects_arbitrary_code() {
        assert!(read("system(\"ls\")").is_err());
        assert!(read("`ls`").is_err());
        assert!(read("N[[1,2],[3]]").is_err());
        assert!(read("[1] [2]").is_err());
    }

    #[test]
    fn test_read_dataframe() {
        let df = read(r#"Sysml::DataFrame.new({"a"=>[1,2],"b"=>[3,4]},index:["x","y"])"#).unwrap();
        assert_eq!(df.size(), Some(4));
        assert_eq!(df.class_name(), "Sysml::DataFrame");
        assert!(read(r#"Sysml::DataFrame.new({"a"=>[1,2]},index:["x"])"#).is_err());
    }

    #[test]
    fn test_scalars_survive_the_cycle() {
        for value in [
            HostValue::Int(123),
            HostValue::Int(-9),
            HostValue::Int(i64::MIN),
            HostValue::Int(i64::MAX),
            HostValue::Float(1.5e-5),
            HostValue::Float(1e20),
            HostValue::Float(f64::INFINITY),
            HostValue::Bool(false),
            HostValue::None,
            HostValue::str("1\"23"),
            HostValue::str("#{danger} \\ \t"),
            HostValue::Complex { re: 1.0, im: 2.0 },
        ] {
            assert_eq!(cycle(&value), value, "value {}", value);
        }
        match cycle(&HostValue::Float(f64::NAN)) {
            HostValue::Float(f) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {other:?}"),
        }
    }

    #[test]
    fn test_containers_survive_the_cycle() {
        let nested = HostValue::dict([
            ("a", HostValue::dict([("b", HostValue::Int(123))])),
            ("c", HostValue::Bool(true)),
        ]);
        assert_eq!(cycle(&nested), nested);

        let set = HostValue::Set(vec![HostValue::Int(1), HostValue::Int(2), HostValue::str("3")]);
        assert_eq!(cycle(&set), set);

        assert_eq!(cycle(&HostValue::List(vec![])), HostValue::List(vec![]));
        assert_eq!(
            cycle(&HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(2)])),
            HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])
        );
        assert_eq!(
            cycle(&HostValue::Range { start: 0, stop: 5, step: 1 }),
            HostValue::Range { start: 0, stop: 5, step: 1 }
        );
    }

    #[test]
    fn test_stepped_ranges_arrive_as_lists() {
        let ints = |v: &[i64]| HostValue::List(v.iter().copied().map(HostValue::Int).collect());
        assert_eq!(cycle(&HostValue::Range { start: 0, stop: 10, step: 3 }), ints(&[0, 3, 6, 9]));
        assert_eq!(cycle(&HostValue::Range { start: 10, stop: 0, step: -4 }), ints(&[10, 6, 2]));
        assert_eq!(cycle(&HostValue::Range { start: -3, stop: 4, step: 3 }), ints(&[-3, 0, 3]));
        assert_eq!(cycle(&HostValue::Range { start: 5, stop: 0, step: 2 }), ints(&[]));
    }

    #[test]
    fn test_read_step_bounds() {
        assert_eq!(read("5.step(1,2).to_a").unwrap(), GuestValue::Array(vec![]));
        assert!(read("0.step(10,0).to_a").is_err());
        assert!(read("0.step(1000000000000,1).to_a").is_err());
        assert!(read("0.step(10,2)").is_err());
        assert!(read("9223372036854775808").is_err());
        assert_eq!(read("-9223372036854775808").unwrap(), GuestValue::Integer(i64::MIN));
    }

    #[test]
    fn test_numpy_and_pandas_shapes_survive() {
        let ints = |v: &[i64]| v.iter().copied().map(HostValue::Int).collect::<Vec<_>>();
        let matrix = HostValue::matrix(vec![ints(&[1, 2]), ints(&[3, 4])]).unwrap();
        let back = cycle(&matrix);
        assert_eq!(back.shape(), Some(vec![2, 2]));
        assert_eq!(back, matrix);

        let columns: Vec<(String, Vec<HostValue>)> = (0..10)
            .map(|c| (format!("c{c}"), (0..100).map(|r| HostValue::Int(r * c)).collect()))
            .collect();
        let df = HostValue::DataFrame(DataFrame::from_columns(columns).unwrap());
        let guest = read(&encode(&df)).unwrap();
        assert_eq!(guest.size(), Some(1000));
        assert_eq!(decode(&canonicalize(&guest)).unwrap(), df);

        let series = Series::from_values(vec![HostValue::Float(0.5), HostValue::Float(1.5)]);
        let back = cycle(&HostValue::Series(series));
        assert_eq!(back, HostValue::dict([("0", HostValue::Float(0.5)), ("1", HostValue::Float(1.5))]));
    }

    #[test]
    fn test_unsupported_value_arrives_as_string() {
        let widget = HostValue::opaque("Widget", "<Widget object>");
        assert_eq!(cycle(&widget), HostValue::str("Unsupported datatype <Widget object>"));
    }
}
