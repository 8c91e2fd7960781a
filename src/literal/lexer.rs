use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unsigned magnitude; the sign is a separate token
    Int(u64),
    Float(f64),
    /// Imaginary literal (`2j`), host only
    Imag(f64),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Identifiers and keywords - distinguished in the parser
    Ident(String),
    // Punctuation
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    // Guest only
    DotDot,
    DotDotDot,
    PathSep,  // ::
    FatArrow, // =>
    // End of input
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Int(i) => format!("integer {}", i),
            Token::Float(f) => format!("float {}", f),
            Token::Imag(f) => format!("imaginary {}j", f),
            Token::Str(_) => "string".to_string(),
            Token::Ident(name) => format!("name '{}'", name),
            Token::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Which literal grammar is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Python literal syntax produced by the guest's canonicalization routine
    Host,
    /// The guest kernel's expression syntax produced by the encoder
    Guest,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    /// Character offset into the source
    pub offset: usize,
}

pub fn lex(src: &str, dialect: Dialect) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = src.chars().collect();
    let mut lexer = Lexer { src, chars, pos: 0, dialect };
    let mut tokens = Vec::new();

    loop {
        lexer.skip_trivia();
        let offset = lexer.pos;
        let Some(c) = lexer.peek(0) else {
            tokens.push(Spanned { token: Token::Eof, offset });
            return Ok(tokens);
        };

        let token = if c.is_ascii_digit() || (c == '.' && dialect == Dialect::Host && lexer.peek_is_digit(1)) {
            lexer.number()?
        } else if c == '"' || c == '\'' {
            lexer.pos += 1;
            lexer.string(c, false)?
        } else if (c == 'r' || c == 'R') && dialect == Dialect::Host && matches!(lexer.peek(1), Some('"') | Some('\'')) {
            let quote = lexer.peek(1).unwrap_or('"');
            lexer.pos += 2;
            lexer.string(quote, true)?
        } else if c.is_alphabetic() || c == '_' {
            lexer.ident()
        } else {
            lexer.punct(c)?
        };
        tokens.push(Spanned { token, offset });
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
    dialect: Dialect,
}

impl Lexer<'_> {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn peek_is_digit(&self, ahead: usize) -> bool {
        self.peek(ahead).is_some_and(|c| c.is_ascii_digit())
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> Error {
        Error::conversion(self.src, offset, reason)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek(0) {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while self.peek(0).is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Token::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn punct(&mut self, c: char) -> Result<Token> {
        let guest = self.dialect == Dialect::Guest;
        let (token, width) = match c {
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '{' => (Token::LBrace, 1),
            '}' => (Token::RBrace, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            ':' if guest && self.peek(1) == Some(':') => (Token::PathSep, 2),
            ':' => (Token::Colon, 1),
            '=' if guest && self.peek(1) == Some('>') => (Token::FatArrow, 2),
            '=' => (Token::Assign, 1),
            '.' if guest && self.peek(1) == Some('.') && self.peek(2) == Some('.') => (Token::DotDotDot, 3),
            '.' if guest && self.peek(1) == Some('.') => (Token::DotDot, 2),
            '.' => (Token::Dot, 1),
            other => return Err(self.error(self.pos, format!("unexpected character {:?}", other))),
        };
        self.pos += width;
        Ok(token)
    }

    fn digits(&mut self, radix: u32, out: &mut String) {
        while let Some(c) = self.peek(0) {
            if c.is_digit(radix) {
                out.push(c);
            } else if c != '_' {
                break;
            }
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;

        if self.peek(0) == Some('0') {
            let radix = match self.peek(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let mut digits = String::new();
                self.digits(radix, &mut digits);
                return u64::from_str_radix(&digits, radix)
                    .map(Token::Int)
                    .map_err(|_| self.error(start, "invalid integer literal"));
            }
        }

        let mut text = String::new();
        let mut is_float = false;
        self.digits(10, &mut text);

        if self.peek(0) == Some('.') {
            let fraction_follows = self.peek_is_digit(1);
            let trailing_dot = self.dialect == Dialect::Host
                && self.peek(1) != Some('.')
                && !self.peek(1).is_some_and(|c| c.is_alphabetic() || c == '_');
            if fraction_follows || trailing_dot {
                is_float = true;
                self.pos += 1;
                text.push('.');
                self.digits(10, &mut text);
            }
        }

        if matches!(self.peek(0), Some('e') | Some('E')) {
            let signed = matches!(self.peek(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_is_digit(digit_at) {
                is_float = true;
                text.push('e');
                if signed {
                    text.push(self.peek(1).unwrap_or('+'));
                }
                self.pos += digit_at;
                self.digits(10, &mut text);
            }
        }

        if self.dialect == Dialect::Host && matches!(self.peek(0), Some('j') | Some('J')) {
            self.pos += 1;
            return text
                .parse::<f64>()
                .map(Token::Imag)
                .map_err(|_| self.error(start, "invalid imaginary literal"));
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(start, "invalid float literal"))
        } else {
            text.parse::<u64>()
                .map(Token::Int)
                .map_err(|_| self.error(start, "integer literal out of range"))
        }
    }

    fn hex_escape(&mut self, len: usize, start: usize) -> Result<char> {
        let digits: String = (0..len).filter_map(|i| self.peek(i)).collect();
        if digits.len() != len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.error(start, "truncated \\x/\\u escape"));
        }
        self.pos += len;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(start, "invalid code point in escape"))
    }

    fn braced_escape(&mut self, start: usize) -> Result<char> {
        // \u{1F600}
        self.pos += 1;
        let mut digits = String::new();
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '}' {
                return u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(start, "invalid code point in escape"));
            }
            digits.push(c);
        }
        Err(self.error(start, "unterminated \\u{...} escape"))
    }

    fn octal_escape(&mut self, first: char) -> char {
        let mut value = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek(0).and_then(|c| c.to_digit(8)) {
                Some(d) => {
                    value = value * 8 + d;
                    self.pos += 1;
                }
                None => break,
            }
        }
        char::from_u32(value).unwrap_or('\0')
    }

    /// Read a string body; the opening quote is already consumed.
    fn string(&mut self, quote: char, raw: bool) -> Result<Token> {
        let start = self.pos.saturating_sub(1);
        let mut s = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(self.error(start, "unterminated string literal"));
            };
            self.pos += 1;
            if c == quote {
                return Ok(Token::Str(s));
            }
            if c != '\\' {
                s.push(c);
                continue;
            }
            let Some(e) = self.peek(0) else {
                return Err(self.error(start, "unterminated escape in string"));
            };
            self.pos += 1;

            if raw {
                s.push('\\');
                s.push(e);
                continue;
            }
            // Guest single-quoted strings only know \\ and \'
            if self.dialect == Dialect::Guest && quote == '\'' {
                if e != '\\' && e != '\'' {
                    s.push('\\');
                }
                s.push(e);
                continue;
            }

            match e {
                '\\' | '\'' | '"' => s.push(e),
                'n' => s.push('\n'),
                't' => s.push('\t'),
                'r' => s.push('\r'),
                'a' => s.push('\u{07}'),
                'b' => s.push('\u{08}'),
                'f' => s.push('\u{0c}'),
                'v' => s.push('\u{0b}'),
                // guest `inspect` escapes, also accepted on the host side
                'e' => s.push('\u{1b}'),
                '#' | '$' | '@' => s.push(e),
                '\n' => {}
                '0'..='7' => s.push(self.octal_escape(e)),
                'x' => s.push(self.hex_escape(2, start)?),
                'u' if self.peek(0) == Some('{') => s.push(self.braced_escape(start)?),
                'u' => s.push(self.hex_escape(4, start)?),
                'U' if self.dialect == Dialect::Host => s.push(self.hex_escape(8, start)?),
                's' if self.dialect == Dialect::Guest => s.push(' '),
                other if self.dialect == Dialect::Guest => s.push(other),
                other => {
                    s.push('\\');
                    s.push(other);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str, dialect: Dialect) -> Vec<Token> {
        lex(src, dialect).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_host_numbers() {
        assert_eq!(
            tokens("1_000 0x1F 2.5 1e-05 3j .5", Dialect::Host),
            vec![
                Token::Int(1000),
                Token::Int(31),
                Token::Float(2.5),
                Token::Float(1e-5),
                Token::Imag(3.0),
                Token::Float(0.5),
                Token::Eof,
            ]
        );
        assert_eq!(
            tokens("-9223372036854775808", Dialect::Host),
            vec![Token::Minus, Token::Int(9_223_372_036_854_775_808), Token::Eof]
        );
        assert!(lex("99999999999999999999", Dialect::Host).is_err());
    }

    #[test]
    fn test_guest_ranges_do_not_become_floats() {
        assert_eq!(
            tokens("(1..5) (1...5)", Dialect::Guest),
            vec![
                Token::LParen,
                Token::Int(1),
                Token::DotDot,
                Token::Int(5),
                Token::RParen,
                Token::LParen,
                Token::Int(1),
                Token::DotDotDot,
                Token::Int(5),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_guest_punctuation() {
        assert_eq!(
            tokens("{\"a\" => Float::NAN}", Dialect::Guest),
            vec![
                Token::LBrace,
                Token::Str("a".to_string()),
                Token::FatArrow,
                Token::Ident("Float".to_string()),
                Token::PathSep,
                Token::Ident("NAN".to_string()),
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#"'a\'b' "1\"23" "\e\#{x}" '\q'"#, Dialect::Host),
            vec![
                Token::Str("a'b".to_string()),
                Token::Str("1\"23".to_string()),
                Token::Str("\u{1b}#{x}".to_string()),
                Token::Str("\\q".to_string()),
                Token::Eof,
            ]
        );
        assert_eq!(
            tokens(r#"'C:\dir' "\u{263a}\q""#, Dialect::Guest),
            vec![
                Token::Str("C:\\dir".to_string()),
                Token::Str("\u{263a}q".to_string()),
                Token::Eof,
            ]
        );
        assert_eq!(tokens(r"r'\d+'", Dialect::Host)[0], Token::Str("\\d+".to_string()));
    }

    #[test]
    fn test_unterminated_string_reports_offset() {
        let err = lex("[1, 'abc", Dialect::Host).unwrap_err();
        match err {
            Error::Conversion { offset, reason, .. } => {
                assert_eq!(offset, 4);
                assert!(reason.contains("unterminated"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
