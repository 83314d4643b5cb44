//! Program line parsing
//!
//! Each source line holds exactly one kind of content. The kinds are tried in
//! order, and a kind only matches if it consumes the whole line (trailing
//! spaces and `#` comments excepted):
//!
//!  1. empty or comment-only line
//!  2. `OFFSET <literal>` directive
//!  3. raw value, either a literal or a `:label` reference
//!  4. instruction, a mnemonic followed by its operands
//!  5. label declaration, `name:`
//!
//! Like the rest of the parser, this does zero copy over the source line.

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, space0, space1},
    combinator::{eof, map, opt, rest, value},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use super::{literal::parse_literal, parse_identifier};

/// An operand, either inline or as a raw value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operand<'a> {
    /// A number literal, not range-checked yet
    Literal(i64),
    /// A reference to a label, written `:name`
    Label(&'a str),
}

impl std::fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Label(label) => write!(f, ":{label}"),
        }
    }
}

/// Holds the content of a line
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LineContent<'a> {
    /// Nothing but spaces or a comment
    Empty,

    /// Moves the emission address forward
    Offset(i64),

    /// A word emitted as is
    Value(Operand<'a>),

    /// An instruction, with its mnemonic and list of operands
    Instruction {
        mnemonic: &'a str,
        operands: Vec<Operand<'a>>,
    },

    /// Declares a label at the current address
    Label(&'a str),
}

impl std::fmt::Display for LineContent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Offset(offset) => write!(f, "OFFSET {offset}"),
            Self::Value(operand) => write!(f, "{operand}"),
            Self::Instruction { mnemonic, operands } => {
                write!(f, "{mnemonic}")?;

                let mut first = true; // Commas go between operands only
                for operand in operands {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, " {operand}")?;
                    first = false;
                }
                Ok(())
            }
            Self::Label(label) => write!(f, "{label}:"),
        }
    }
}

/// Parses an inline comment, up to the end of the line
fn parse_comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), rest)(input)
}

/// Parses the end of a line: spaces and an optional comment
fn parse_end(input: &str) -> IResult<&str, ()> {
    value((), tuple((space0, opt(parse_comment), eof)))(input)
}

/// Parses an operand
fn parse_operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(preceded(char(':'), parse_identifier), Operand::Label),
        map(parse_literal, Operand::Literal),
    ))(input)
}

fn parse_empty_line(input: &str) -> IResult<&str, LineContent> {
    value(LineContent::Empty, parse_end)(input)
}

fn parse_offset_line(input: &str) -> IResult<&str, LineContent> {
    let (input, _) = tag_no_case("OFFSET")(input)?;
    let (input, _) = space1(input)?;
    let (input, offset) = terminated(parse_literal, parse_end)(input)?;
    Ok((input, LineContent::Offset(offset)))
}

fn parse_value_line(input: &str) -> IResult<&str, LineContent> {
    map(terminated(parse_operand, parse_end), LineContent::Value)(input)
}

fn parse_instruction_line(input: &str) -> IResult<&str, LineContent> {
    let (input, mnemonic) = parse_identifier(input)?;
    let (input, operands) = opt(preceded(
        space1,
        separated_list1(delimited(space0, char(','), space0), parse_operand),
    ))(input)?;
    let (input, ()) = parse_end(input)?;
    let operands = operands.unwrap_or_default();
    Ok((input, LineContent::Instruction { mnemonic, operands }))
}

fn parse_label_line(input: &str) -> IResult<&str, LineContent> {
    let (input, label) = parse_identifier(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = char(':')(input)?;
    let (input, ()) = parse_end(input)?;
    Ok((input, LineContent::Label(label)))
}

/// Parses a whole line
pub(crate) fn parse_line(input: &str) -> IResult<&str, LineContent> {
    preceded(
        space0,
        alt((
            parse_empty_line,
            parse_offset_line,
            parse_value_line,
            parse_instruction_line,
            parse_label_line,
        )),
    )(input)
}
