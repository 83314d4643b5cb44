//! Parse number literals.
//!
//! It parses base 10 and base 16 (prefixed by `0x`) literals, with an
//! optional sign. Range checks happen later, when the value is emitted.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::one_of,
    combinator::{map_res, opt},
    IResult,
};

/// Parse a decimal number
fn from_decimal(input: &str) -> Result<i64, std::num::ParseIntError> {
    input.parse()
}

/// Check if character is a decimal digit
fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// Parse a hexadecimal number
fn from_hexadecimal(input: &str) -> Result<i64, std::num::ParseIntError> {
    i64::from_str_radix(input, 16)
}

/// Check if character is a hexadecimal digit
fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

/// Extract a hexadecimal literal
fn take_hexadecimal_literal(input: &str) -> IResult<&str, &str> {
    let (input, _) = tag_no_case("0x")(input)?;
    take_while1(is_hex_digit)(input)
}

/// Parse a number literal
pub(crate) fn parse_literal(input: &str) -> IResult<&str, i64> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, value) = alt((
        map_res(take_hexadecimal_literal, from_hexadecimal),
        map_res(take_while1(is_digit), from_decimal),
    ))(input)?;

    let value = if sign == Some('-') { -value } else { value };
    Ok((input, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_decimal_test() {
        assert_eq!(from_decimal("16"), Ok(16));
        assert_eq!(from_decimal("65536"), Ok(65536)); // Range is checked later
        assert!(from_decimal("foo").is_err());
    }

    #[test]
    fn from_hexadecimal_test() {
        assert_eq!(from_hexadecimal("4F"), Ok(0x4f));
        assert_eq!(from_hexadecimal("4f"), Ok(0x4f)); // Lower case works
        assert_eq!(from_hexadecimal("ffff"), Ok(0xffff));
        assert!(from_hexadecimal("foo").is_err());
    }

    #[test]
    fn take_hexadecimal_literal_test() {
        assert_eq!(take_hexadecimal_literal("0x4F"), Ok(("", "4F")));
        assert_eq!(take_hexadecimal_literal("0X4f"), Ok(("", "4f")));
        assert!(take_hexadecimal_literal("0xinvalid").is_err()); // Invalid
        assert!(take_hexadecimal_literal("ffff").is_err()); // No prefix
    }

    #[test]
    fn parse_literal_test() {
        assert_eq!(parse_literal("42"), Ok(("", 42)));
        assert_eq!(parse_literal("+42"), Ok(("", 42)));
        assert_eq!(parse_literal("-42"), Ok(("", -42)));
        assert_eq!(parse_literal("0x2a"), Ok(("", 0x2a)));
        assert_eq!(parse_literal("-0x10"), Ok(("", -16)));
        assert_eq!(parse_literal("12 # comment"), Ok((" # comment", 12)));
        assert!(parse_literal("-").is_err());
        assert!(parse_literal("abc").is_err());
    }
}
