//! Program parsing logic
//!
//! The assembly language is line based, so this only lexes single lines. The
//! parsing is handled by the `nom` library.

use nom::bytes::complete::take_while1;
use nom::combinator::verify;
use nom::IResult;

pub(crate) mod line;
pub(crate) mod literal;

pub(crate) use line::{parse_line, LineContent, Operand};

fn is_identifier_char(c: char) -> bool {
    is_start_identifier_char(c) || c.is_ascii_digit()
}

fn is_start_identifier_char(c: char) -> bool {
    c == '_' || c.is_ascii_lowercase() || c.is_ascii_uppercase()
}

/// Parse a C-like identifier
pub(crate) fn parse_identifier(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_identifier_char), |f: &str| {
        f.chars()
            .next()
            .filter(|&c| is_start_identifier_char(c))
            .is_some()
    })(input)
}
