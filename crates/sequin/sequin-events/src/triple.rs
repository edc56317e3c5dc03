#![forbid(unsafe_code)]

// Offset between `a` and `b`. With `c = a + b` the three fields are
// correlated, so a snapshot mixing two writes breaks the relation.
pub const SPREAD: usize = 100;

/// Three correlated words: `b == a + SPREAD` and `c == a + b`.
///
/// Wider than a machine word, so a seqlock reader that skipped the sequence
/// check would sooner or later observe fields from two different stores.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triple {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl Triple {
    /// The `n`th triple: `(n, n + 100, 2n + 100)`.
    #[inline]
    pub fn new(n: usize) -> Self {
        Self {
            a: n,
            b: n.wrapping_add(SPREAD),
            c: n.wrapping_mul(2).wrapping_add(SPREAD),
        }
    }

    /// `true` when the fields satisfy the correlation, i.e. the value was
    /// written as a whole.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.b == self.a.wrapping_add(SPREAD) && self.c == self.a.wrapping_add(self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn new_is_consistent() {
        for n in [0, 1, 7, 1_000_000, usize::MAX / 2] {
            assert!(Triple::new(n).is_consistent(), "n = {n}");
        }
    }

    #[test]
    fn mixed_fields_are_detected() {
        let x = Triple::new(10);
        let y = Triple::new(11);
        assert!(!Triple { a: x.a, b: y.b, c: y.c }.is_consistent());
        assert!(!Triple { a: y.a, b: y.b, c: x.c }.is_consistent());
        assert!(!Triple { a: x.a, b: x.b, c: y.c }.is_consistent());
    }

    #[test]
    fn default_is_not_a_published_value() {
        // the all-zero triple fails the relation, which lets tests tell
        // "nothing stored yet" apart from "stored n = 0"
        assert!(!Triple::default().is_consistent());
    }

    #[test]
    fn triple_is_three_words() {
        assert_eq!(size_of::<Triple>(), 3 * size_of::<usize>());
    }
}
