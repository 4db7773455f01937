//! Half-open character intervals over a document's text.

use serde::{Deserialize, Serialize};

use crate::{PackError, PackResult};

/// An immutable half-open interval `[begin, end)` over document text.
///
/// Offsets are byte offsets into the owning pack's text. Spans are totally
/// ordered by `begin` first and `end` second, so `Span(0, 5) < Span(0, 6) < Span(1, 1)`.
///
/// An annotation never mutates its span in place; it is replaced wholesale
/// through the owning store so that span-keyed indices stay consistent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "RawSpan", into = "RawSpan")]
pub struct Span {
    begin: usize,
    end: usize,
}

/// Wire form of a span; converted through [`Span::new`] so invalid input is rejected.
#[derive(Serialize, Deserialize)]
struct RawSpan {
    begin: usize,
    end: usize,
}

impl Span {
    /// Create a span, failing with [`PackError::InvalidSpan`] if `end < begin`.
    pub fn new(begin: usize, end: usize) -> PackResult<Self> {
        if end < begin {
            return Err(PackError::InvalidSpan { begin, end });
        }
        Ok(Self { begin, end })
    }

    /// The smallest span starting at `begin`, used as a lower range bound.
    pub(crate) fn point(begin: usize) -> Self {
        Self { begin, end: begin }
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Returns true if `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// Returns true if the two spans share at least one offset.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.begin < other.end && other.begin < self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{})", self.begin, self.end)
    }
}

impl TryFrom<RawSpan> for Span {
    type Error = PackError;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        Span::new(raw.begin, raw.end)
    }
}

impl From<Span> for RawSpan {
    fn from(span: Span) -> Self {
        RawSpan {
            begin: span.begin,
            end: span.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn span(begin: usize, end: usize) -> Span {
        Span::new(begin, end).unwrap()
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        assert_eq!(
            Span::new(5, 3),
            Err(PackError::InvalidSpan { begin: 5, end: 3 })
        );
        assert!(Span::new(3, 3).is_ok());
    }

    #[test]
    fn test_total_order_examples() {
        assert!(span(0, 5) < span(0, 6));
        assert!(span(0, 6) < span(1, 1));
        assert!(span(0, 5) < span(1, 1));
    }

    #[test]
    fn test_contains_and_overlaps() {
        let outer = span(2, 10);
        assert!(outer.contains(&span(2, 10)));
        assert!(outer.contains(&span(4, 6)));
        assert!(!outer.contains(&span(1, 6)));

        assert!(outer.overlaps(&span(9, 12)));
        assert!(!outer.overlaps(&span(10, 12)));
        assert!(!span(3, 3).overlaps(&span(3, 3)));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Span = ron::from_str("(begin: 1, end: 4)").unwrap();
        assert_eq!(ok, span(1, 4));

        let bad: Result<Span, _> = ron::from_str("(begin: 4, end: 1)");
        assert!(bad.is_err());
    }

    fn arb_span() -> impl Strategy<Value = Span> {
        (0usize..50, 0usize..50).prop_map(|(begin, len)| span(begin, begin + len))
    }

    proptest! {
        #[test]
        fn prop_irreflexive(a in arb_span()) {
            prop_assert!(!(a < a));
        }

        #[test]
        fn prop_antisymmetric(a in arb_span(), b in arb_span()) {
            prop_assert!(!(a < b && b < a));
            if !(a < b) && !(b < a) {
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn prop_transitive(a in arb_span(), b in arb_span(), c in arb_span()) {
            if a < b && b < c {
                prop_assert!(a < c);
            }
        }

        #[test]
        fn prop_begin_is_primary_key(a in arb_span(), b in arb_span()) {
            if a.begin() < b.begin() {
                prop_assert!(a < b);
            }
        }
    }
}
