use std::fmt;

use crate::error::OutOfRangeError;

/// Maximum number of positions a single lexeme can carry on the wire.
pub const MAX_POSITIONS: usize = 256;

/// `tsvector`, a document prepared for text search.
///
/// Lexemes keep the order they were given in, or the order postgres sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsVector {
    lexemes: Vec<TsVectorLexeme>,
}

impl TsVector {
    pub fn new(lexemes: Vec<TsVectorLexeme>) -> Self {
        Self { lexemes }
    }

    pub fn lexemes(&self) -> &[TsVectorLexeme] {
        &self.lexemes
    }

    pub fn len(&self) -> usize {
        self.lexemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TsVectorLexeme> {
        self.lexemes.iter()
    }

    pub fn into_inner(self) -> Vec<TsVectorLexeme> {
        self.lexemes
    }
}

impl<'a> IntoIterator for &'a TsVector {
    type Item = &'a TsVectorLexeme;
    type IntoIter = std::slice::Iter<'a, TsVectorLexeme>;

    fn into_iter(self) -> Self::IntoIter {
        self.lexemes.iter()
    }
}

impl FromIterator<TsVectorLexeme> for TsVector {
    fn from_iter<T: IntoIterator<Item = TsVectorLexeme>>(iter: T) -> Self {
        Self { lexemes: iter.into_iter().collect() }
    }
}

impl fmt::Display for TsVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lexeme) in self.lexemes.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{lexeme}")?;
        }
        Ok(())
    }
}

/// A lexeme with its positions within the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsVectorLexeme {
    text: String,
    positions: Vec<WordEntryPos>,
}

impl TsVectorLexeme {
    /// Returns error if there are more than [`MAX_POSITIONS`] positions.
    pub fn new(
        text: impl Into<String>,
        positions: Vec<WordEntryPos>,
    ) -> Result<Self, OutOfRangeError> {
        if positions.len() > MAX_POSITIONS {
            return Err(OutOfRangeError::new(format!(
                "lexeme has {} positions, maximum is {MAX_POSITIONS}",
                positions.len()
            )));
        }
        Ok(Self { text: text.into(), positions })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn positions(&self) -> &[WordEntryPos] {
        &self.positions
    }
}

impl fmt::Display for TsVectorLexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::tsquery::write_quoted(&self.text, f)?;
        for (i, pos) in self.positions.iter().enumerate() {
            f.write_str(if i == 0 { ":" } else { "," })?;
            write!(f, "{pos}")?;
        }
        Ok(())
    }
}

/// Weight of a single lexeme position, stored in the top 2 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PosWeight {
    #[default]
    D = 0,
    C = 1,
    B = 2,
    A = 3,
}

/// Packed lexeme position, 14 bits of position and 2 bits of [`PosWeight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordEntryPos(u16);

impl WordEntryPos {
    /// Largest representable position, larger positions are clamped.
    pub const MAX_POS: u16 = (1 << 14) - 1;

    /// Position `0` is not valid.
    pub fn new(pos: u16, weight: PosWeight) -> Result<Self, OutOfRangeError> {
        if pos == 0 {
            return Err(OutOfRangeError::new("lexeme position 0 is not valid"));
        }
        Ok(Self(((weight as u16) << 14) | pos.min(Self::MAX_POS)))
    }

    /// Packed wire representation.
    pub const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub const fn pos(&self) -> u16 {
        self.0 & Self::MAX_POS
    }

    pub const fn weight(&self) -> PosWeight {
        match self.0 >> 14 {
            3 => PosWeight::A,
            2 => PosWeight::B,
            1 => PosWeight::C,
            _ => PosWeight::D,
        }
    }
}

impl fmt::Display for WordEntryPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(itoa::Buffer::new().format(self.pos()))?;
        match self.weight() {
            PosWeight::A => f.write_str("A"),
            PosWeight::B => f.write_str("B"),
            PosWeight::C => f.write_str("C"),
            PosWeight::D => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn word_entry_pos() {
        let pos = WordEntryPos::new(3, PosWeight::A).unwrap();
        assert_eq!(pos.raw(), 0xC003);
        assert_eq!(pos.pos(), 3);
        assert_eq!(pos.weight(), PosWeight::A);

        let clamped = WordEntryPos::new(20_000, PosWeight::C).unwrap();
        assert_eq!(clamped.pos(), WordEntryPos::MAX_POS);
        assert_eq!(clamped.weight(), PosWeight::C);

        assert!(WordEntryPos::new(0, PosWeight::D).is_err());
    }

    #[test]
    fn position_limit() {
        let pos = WordEntryPos::new(1, PosWeight::D).unwrap();
        assert!(TsVectorLexeme::new("a", vec![pos; MAX_POSITIONS]).is_ok());
        assert!(TsVectorLexeme::new("a", vec![pos; MAX_POSITIONS + 1]).is_err());
    }

    #[test]
    fn display() {
        let vector = TsVector::new(vec![
            TsVectorLexeme::new("fat", vec![WordEntryPos::new(2, PosWeight::A).unwrap()]).unwrap(),
            TsVectorLexeme::new("it's", vec![]).unwrap(),
        ]);
        assert_eq!(vector.to_string(), "'fat':2A 'it''s'");
    }
}
