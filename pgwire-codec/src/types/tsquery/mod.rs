//! `tsquery`, a text search query.
//!
//! A query is a tree of lexemes combined with `!`, `&`, `|` and the phrase operator `<N>`.
//!
//! ```text
//!              And
//!            ┏━━┻━━┓
//!         'fat'   Phrase(1)
//!               ┏━━━┻━━━┓
//!             'cat'    Not
//!                       ┃
//!                     'rat'
//! ```
//!
//! [`Display`][fmt::Display] writes the textual form understood by postgres. [`TsQuery::parse`]
//! reads it back, see its docs for the limitation.
use std::{fmt, ops, str::FromStr};

use crate::error::{FormatError, OutOfRangeError};

mod parse;

/// A `tsquery` node.
///
/// [`Empty`][TsQuery::Empty] is only valid as the root of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TsQuery {
    Empty,
    Lexeme(TsQueryLexeme),
    Not(Box<TsQuery>),
    And(Box<TsQuery>, Box<TsQuery>),
    Or(Box<TsQuery>, Box<TsQuery>),
    /// `left <distance> right`, `right` follows `left` by exactly `distance` lexemes.
    Phrase {
        left: Box<TsQuery>,
        distance: u16,
        right: Box<TsQuery>,
    },
}

impl TsQuery {
    pub fn lexeme(text: impl Into<String>) -> Self {
        Self::Lexeme(TsQueryLexeme::new(text))
    }

    pub fn not(child: TsQuery) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn and(left: TsQuery, right: TsQuery) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: TsQuery, right: TsQuery) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn phrase(left: TsQuery, distance: u16, right: TsQuery) -> Self {
        Self::Phrase { left: Box::new(left), distance, right: Box::new(right) }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Parse textual `tsquery`.
    ///
    /// Client side parsing cannot fully replicate postgres, prefer `to_tsquery` on the server.
    /// Consecutive `|` are combined as soon as the next `|` is seen, so `a | b | c` is
    /// `(a | b) | c`, and a weight annotation at the very end of input skips the final
    /// reduction of `!`, `&` and `<N>`, making `!a:*` an error.
    pub fn parse(input: &str) -> Result<TsQuery, FormatError> {
        parse::parse(input)
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, first: bool) -> fmt::Result {
        match self {
            TsQuery::Empty => Ok(()),
            TsQuery::Lexeme(lexeme) => write!(f, "{lexeme}"),
            TsQuery::Not(child) => {
                f.write_str("!")?;
                let group = !matches!(**child, TsQuery::Lexeme(_));
                if group {
                    f.write_str("( ")?;
                }
                child.fmt_node(f, true)?;
                if group {
                    f.write_str(" )")?;
                }
                Ok(())
            }
            TsQuery::And(left, right) => {
                left.fmt_node(f, false)?;
                f.write_str(" & ")?;
                right.fmt_node(f, false)
            }
            TsQuery::Or(left, right) => {
                if !first {
                    f.write_str("( ")?;
                }
                left.fmt_node(f, false)?;
                f.write_str(" | ")?;
                right.fmt_node(f, false)?;
                if !first {
                    f.write_str(" )")?;
                }
                Ok(())
            }
            TsQuery::Phrase { left, distance, right } => {
                if !first {
                    f.write_str("( ")?;
                }
                left.fmt_node(f, false)?;
                match distance {
                    1 => f.write_str(" <-> ")?,
                    n => {
                        f.write_str(" <")?;
                        f.write_str(itoa::Buffer::new().format(*n))?;
                        f.write_str("> ")?;
                    }
                }
                right.fmt_node(f, false)?;
                if !first {
                    f.write_str(" )")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, true)
    }
}

impl FromStr for TsQuery {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse(s)
    }
}

impl From<TsQueryLexeme> for TsQuery {
    fn from(value: TsQueryLexeme) -> Self {
        Self::Lexeme(value)
    }
}

/// Leaf of a [`TsQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsQueryLexeme {
    text: String,
    weight: Weight,
    prefix: bool,
}

impl TsQueryLexeme {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), weight: Weight::NONE, prefix: false }
    }

    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    /// Match lexemes starting with this text, written as `:*`.
    pub fn with_prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix
    }
}

impl fmt::Display for TsQueryLexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_quoted(&self.text, f)?;
        if self.prefix || !self.weight.is_empty() {
            f.write_str(":")?;
        }
        if self.prefix {
            f.write_str("*")?;
        }
        for (weight, ch) in [(Weight::A, "A"), (Weight::B, "B"), (Weight::C, "C"), (Weight::D, "D")] {
            if self.weight.contains(weight) {
                f.write_str(ch)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn write_quoted(text: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("'")?;
    for ch in text.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("''")?,
            ch => write!(f, "{ch}")?,
        }
    }
    f.write_str("'")
}

/// Lexeme weight bitmask, any combination of `A`, `B`, `C` and `D`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weight(u8);

impl Weight {
    pub const NONE: Weight = Weight(0);
    pub const D: Weight = Weight(1);
    pub const C: Weight = Weight(2);
    pub const B: Weight = Weight(4);
    pub const A: Weight = Weight(8);

    /// Only the low 4 bits are valid.
    pub fn from_bits(bits: u8) -> Result<Weight, OutOfRangeError> {
        if bits >> 4 != 0 {
            return Err(OutOfRangeError::new(format!("illegal tsquery weight bits {bits:#x}")));
        }
        Ok(Weight(bits))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Weight) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl ops::BitOr for Weight {
    type Output = Weight;

    fn bitor(self, rhs: Self) -> Self::Output {
        Weight(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Weight {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lex(s: &str) -> TsQuery {
        TsQuery::lexeme(s)
    }

    #[test]
    fn display() {
        assert_eq!(TsQuery::and(lex("cat"), lex("dog")).to_string(), "'cat' & 'dog'");
        assert_eq!(TsQuery::not(TsQuery::or(lex("a"), lex("b"))).to_string(), "!( 'a' | 'b' )");
        assert_eq!(TsQuery::phrase(lex("a"), 1, lex("b")).to_string(), "'a' <-> 'b'");
        assert_eq!(
            TsQuery::and(TsQuery::phrase(lex("a"), 3, lex("b")), lex("c")).to_string(),
            "( 'a' <3> 'b' ) & 'c'"
        );
        assert_eq!(TsQuery::Empty.to_string(), "");

        let lexeme = TsQueryLexeme::new("it's\\").with_weight(Weight::A | Weight::C).with_prefix(true);
        assert_eq!(TsQuery::from(lexeme).to_string(), "'it''s\\\\':*AC");
    }

    #[test]
    fn weight_bits() {
        assert_eq!(Weight::from_bits(15).unwrap(), Weight::A | Weight::B | Weight::C | Weight::D);
        assert!(Weight::from_bits(16).is_err());
        assert!(!Weight::NONE.contains(Weight::NONE));
    }
}
