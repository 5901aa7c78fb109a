//! Index forms accepted by sequence and text adapters.

use super::wrong_type;
use crate::error::{Error, Result};
use crate::value::{RangeSpec, Value};

/// A position or sub-range of an indexed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqIndex {
    /// One element; negative counts from the end.
    At(i64),
    /// A range literal.
    Range(RangeSpec),
    /// `start, length`; a negative start counts from the end.
    Span { start: i64, len: i64 },
}

impl SeqIndex {
    /// Reads an index from call arguments: an integer, a range, or a start
    /// and a length.
    pub(crate) fn from_args(receiver: &str, operation: &str, args: &[Value]) -> Result<SeqIndex> {
        match args {
            [Value::Int(i)] => Ok(SeqIndex::At(*i)),
            [Value::Range(r)] => Ok(SeqIndex::Range(*r)),
            [Value::Int(start), Value::Int(len)] => Ok(SeqIndex::Span {
                start: *start,
                len: *len,
            }),
            [other] => Err(wrong_type(receiver, "integer or range", other)),
            [Value::Int(_), other] | [other, _] => Err(wrong_type(receiver, "integer", other)),
            _ => Err(Error::InvalidArgumentCount {
                receiver: receiver.to_string(),
                operation: operation.to_string(),
                expected: "1..2".to_string(),
                got: args.len(),
            }),
        }
    }
}

impl From<i64> for SeqIndex {
    fn from(i: i64) -> Self {
        SeqIndex::At(i)
    }
}

impl From<i32> for SeqIndex {
    fn from(i: i32) -> Self {
        SeqIndex::At(i64::from(i))
    }
}

impl From<RangeSpec> for SeqIndex {
    fn from(r: RangeSpec) -> Self {
        SeqIndex::Range(r)
    }
}

impl From<std::ops::Range<i64>> for SeqIndex {
    fn from(r: std::ops::Range<i64>) -> Self {
        SeqIndex::Range(r.into())
    }
}

impl From<std::ops::RangeInclusive<i64>> for SeqIndex {
    fn from(r: std::ops::RangeInclusive<i64>) -> Self {
        SeqIndex::Range(r.into())
    }
}

impl From<std::ops::RangeFrom<i64>> for SeqIndex {
    fn from(r: std::ops::RangeFrom<i64>) -> Self {
        SeqIndex::Range(r.into())
    }
}

impl From<(i64, i64)> for SeqIndex {
    fn from((start, len): (i64, i64)) -> Self {
        SeqIndex::Span { start, len }
    }
}

/// Maps a possibly negative index onto `0..count`.
pub(crate) fn normalize(index: i64, count: usize) -> Option<usize> {
    let count = count as i64;
    let pos = if index < 0 { index + count } else { index };
    (0..count).contains(&pos).then_some(pos as usize)
}

/// Resolves `start, len` against `count` elements. `None` if the length is
/// negative or the start lies outside `0..=count`.
pub(crate) fn resolve_span(start: i64, len: i64, count: usize) -> Option<(usize, usize)> {
    if len < 0 {
        return None;
    }
    let count_i = count as i64;
    let loc = if start < 0 { start + count_i } else { start };
    if loc < 0 || loc > count_i {
        return None;
    }
    Some((loc as usize, len.min(count_i - loc) as usize))
}

/// Resolves a range or span to `(location, length)`; `None` when it starts
/// out of bounds. A single index yields a length of one.
pub(crate) fn resolve(index: SeqIndex, count: usize) -> Option<(usize, usize)> {
    match index {
        SeqIndex::At(i) => normalize(i, count).map(|i| (i, 1)),
        SeqIndex::Range(r) => r.resolve(count),
        SeqIndex::Span { start, len } => resolve_span(start, len, count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(0, 3), Some(0));
        assert_eq!(normalize(-1, 3), Some(2));
        assert_eq!(normalize(-3, 3), Some(0));
        assert_eq!(normalize(-4, 3), None);
        assert_eq!(normalize(3, 3), None);
        assert_eq!(normalize(0, 0), None);
    }

    #[test]
    fn test_resolve_span() {
        assert_eq!(resolve_span(1, 2, 5), Some((1, 2)));
        assert_eq!(resolve_span(4, 10, 5), Some((4, 1)));
        assert_eq!(resolve_span(5, 1, 5), Some((5, 0)));
        assert_eq!(resolve_span(-2, 5, 5), Some((3, 2)));
        assert_eq!(resolve_span(6, 1, 5), None);
        assert_eq!(resolve_span(1, -1, 5), None);
    }

    #[test]
    fn test_from_args() {
        assert_eq!(SeqIndex::from_args("NSArray", "[]", &[Value::Int(2)]).unwrap(), SeqIndex::At(2));
        assert_eq!(
            SeqIndex::from_args("NSArray", "[]", &[Value::Int(1), Value::Int(2)]).unwrap(),
            SeqIndex::Span { start: 1, len: 2 }
        );
        assert!(matches!(
            SeqIndex::from_args("NSArray", "[]", &[Value::from("a")]),
            Err(Error::InvalidIndexType { expected: "integer or range", .. })
        ));
        assert!(matches!(
            SeqIndex::from_args("NSArray", "[]", &[]),
            Err(Error::InvalidArgumentCount { got: 0, .. })
        ));
    }
}
