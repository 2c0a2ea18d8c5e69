use std::fmt;

/// Range flag bits as sent by postgres.
pub(crate) mod flags {
    pub const EMPTY: u8 = 0x01;
    pub const LB_INC: u8 = 0x02;
    pub const UB_INC: u8 = 0x04;
    pub const LB_INF: u8 = 0x08;
    pub const UB_INF: u8 = 0x10;
}

/// One side of a [`Range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RangeBound<T> {
    Inclusive(T),
    Exclusive(T),
    Unbounded,
}

impl<T> RangeBound<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Inclusive(v) | Self::Exclusive(v) => Some(v),
            Self::Unbounded => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RangeBound<U> {
        match self {
            Self::Inclusive(v) => RangeBound::Inclusive(f(v)),
            Self::Exclusive(v) => RangeBound::Exclusive(f(v)),
            Self::Unbounded => RangeBound::Unbounded,
        }
    }
}

/// Postgres range over element `T`, for example `int4range` is `Range<i32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Range<T> {
    Empty,
    NonEmpty {
        lower: RangeBound<T>,
        upper: RangeBound<T>,
    },
}

impl<T> Range<T> {
    pub fn new(lower: RangeBound<T>, upper: RangeBound<T>) -> Self {
        Self::NonEmpty { lower, upper }
    }

    /// `[lower,upper)`, the canonical form of discrete ranges.
    pub fn half_open(lower: T, upper: T) -> Self {
        Self::new(RangeBound::Inclusive(lower), RangeBound::Exclusive(upper))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn lower(&self) -> Option<&RangeBound<T>> {
        match self {
            Self::Empty => None,
            Self::NonEmpty { lower, .. } => Some(lower),
        }
    }

    pub fn upper(&self) -> Option<&RangeBound<T>> {
        match self {
            Self::Empty => None,
            Self::NonEmpty { upper, .. } => Some(upper),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Range<U> {
        match self {
            Self::Empty => Range::Empty,
            Self::NonEmpty { lower, upper } => Range::NonEmpty {
                lower: lower.map(&mut f),
                upper: upper.map(&mut f),
            },
        }
    }

    pub(crate) fn flags(&self) -> u8 {
        let Self::NonEmpty { lower, upper } = self else {
            return flags::EMPTY;
        };
        let lower = match lower {
            RangeBound::Inclusive(_) => flags::LB_INC,
            RangeBound::Exclusive(_) => 0,
            RangeBound::Unbounded => flags::LB_INF,
        };
        let upper = match upper {
            RangeBound::Inclusive(_) => flags::UB_INC,
            RangeBound::Exclusive(_) => 0,
            RangeBound::Unbounded => flags::UB_INF,
        };
        lower | upper
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::NonEmpty { lower, upper } = self else {
            return f.write_str("empty");
        };
        match lower {
            RangeBound::Inclusive(v) => write!(f, "[{v},")?,
            RangeBound::Exclusive(v) => write!(f, "({v},")?,
            RangeBound::Unbounded => f.write_str("(,")?,
        }
        match upper {
            RangeBound::Inclusive(v) => write!(f, "{v}]"),
            RangeBound::Exclusive(v) => write!(f, "{v})"),
            RangeBound::Unbounded => f.write_str(")"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_and_display() {
        let range = Range::half_open(1, 5);
        assert_eq!(range.flags(), flags::LB_INC);
        assert_eq!(range.to_string(), "[1,5)");

        let range = Range::new(RangeBound::Unbounded, RangeBound::Inclusive(9));
        assert_eq!(range.flags(), flags::LB_INF | flags::UB_INC);
        assert_eq!(range.to_string(), "(,9]");

        assert_eq!(Range::<i32>::Empty.flags(), flags::EMPTY);
        assert_eq!(Range::<i32>::Empty.to_string(), "empty");
        assert_eq!(Range::half_open(1, 2).map(i64::from), Range::half_open(1i64, 2i64));
    }
}
