//! Literal grammar surface
//!
//! Both directions of the transfer are plain source text:
//! - The guest kernel parses what the encoder writes (`Dialect::Guest`)
//! - The host parses what the guest's canonicalization routine prints (`Dialect::Host`)
//!
//! Decoding is safe literal evaluation; see [`parser`].

pub mod lexer;
pub mod parser;

pub use lexer::{Dialect, Spanned, Token, lex};
pub use parser::{MAX_DEPTH, decode};
