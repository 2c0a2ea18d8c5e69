use std::{fmt, str::FromStr};

use crate::error::FormatError;

/// `pg_lsn`, position within the write-ahead log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lsn(pub u64);

impl Lsn {
    pub const INVALID: Lsn = Lsn(0);

    /// Parse postgres `XXX/XXX` notation.
    pub fn parse(s: &str) -> Result<Lsn, FormatError> {
        let Some((hi, lo)) = s.split_once('/') else {
            return Err(FormatError::new("missing `/` in lsn", s.len()));
        };
        let hi = u32::from_str_radix(hi, 16)
            .map_err(|_| FormatError::new("invalid lsn high half", 0))?;
        let lo = u32::from_str_radix(lo, 16)
            .map_err(|_| FormatError::new("invalid lsn low half", hi_len(s)))?;
        Ok(Lsn(((hi as u64) << 32) | lo as u64))
    }
}

fn hi_len(s: &str) -> usize {
    s.find('/').map(|i| i + 1).unwrap_or(0)
}

impl FromStr for Lsn {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lsn::parse(s)
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Lsn(value)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", (self.0 >> 32) as u32, self.0 as u32)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lsn_parse() {
        let lsn = Lsn::parse("16/B374D848").unwrap();
        assert_eq!(lsn.0, 0x16_B374_D848);
        assert_eq!(lsn.to_string(), "16/B374D848");
        assert_eq!(Lsn(0).to_string(), "0/0");
        assert!(Lsn::parse("16B374D848").is_err());
        assert!(Lsn::parse("1/G").is_err());
        assert!(Lsn(1) < Lsn(0x1_0000_0000));
    }
}
