//! Byte membership tests used by the matcher.

use std::cmp::Ordering;

use super::ast::ByteClass;

/// Test whether `byte` is a member of `class`, honouring negation.
pub fn class_matches(class: ByteClass, negated: bool, byte: u8) -> bool {
    let base = match class {
        ByteClass::Digit => byte.is_ascii_digit(),
        ByteClass::Letter => byte.is_ascii_alphabetic(),
        ByteClass::Upper => byte.is_ascii_uppercase(),
        ByteClass::Lower => byte.is_ascii_lowercase(),
        ByteClass::Whitespace => matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c),
        ByteClass::Any => true,
    };
    if negated { !base } else { base }
}

/// Byte-wise comparison over the shorter of the two lengths.
///
/// A candidate shorter than the bound is compared only as far as it goes, so
/// `"2"` sits between `"10"` and `"255"`.
fn prefix_cmp(candidate: &[u8], bound: &[u8]) -> Ordering {
    let n = candidate.len().min(bound.len());
    candidate[..n].cmp(&bound[..n])
}

/// Test whether `candidate` falls between `lo` and `hi` inclusive.
pub fn range_contains(candidate: &[u8], lo: &[u8], hi: &[u8]) -> bool {
    prefix_cmp(candidate, lo) != Ordering::Less && prefix_cmp(candidate, hi) != Ordering::Greater
}

/// Test whether `byte` may appear in the text matched by `not 'literal'`.
pub fn outside_literal(literal: &[u8], byte: u8) -> bool {
    !literal.contains(&byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_matches_ascii_digits() {
        assert!(class_matches(ByteClass::Digit, false, b'7'));
        assert!(!class_matches(ByteClass::Digit, false, b'x'));
    }

    #[test]
    fn negated_digit_matches_everything_else() {
        assert!(class_matches(ByteClass::Digit, true, b'x'));
        assert!(!class_matches(ByteClass::Digit, true, b'0'));
    }

    #[test]
    fn letter_case_classes() {
        assert!(class_matches(ByteClass::Letter, false, b'q'));
        assert!(class_matches(ByteClass::Upper, false, b'Q'));
        assert!(!class_matches(ByteClass::Upper, false, b'q'));
        assert!(class_matches(ByteClass::Lower, false, b'q'));
        assert!(!class_matches(ByteClass::Letter, false, 0xc3));
    }

    #[test]
    fn whitespace_set() {
        for b in [b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c] {
            assert!(class_matches(ByteClass::Whitespace, false, b), "expected whitespace: {b}");
        }
        assert!(!class_matches(ByteClass::Whitespace, false, b'_'));
    }

    #[test]
    fn any_matches_every_byte() {
        assert!(class_matches(ByteClass::Any, false, 0));
        assert!(class_matches(ByteClass::Any, false, 0xff));
        assert!(!class_matches(ByteClass::Any, true, b'a'));
    }

    #[test]
    fn single_byte_range() {
        assert!(range_contains(b"a", b"a", b"z"));
        assert!(range_contains(b"m", b"a", b"z"));
        assert!(range_contains(b"z", b"a", b"z"));
        assert!(!range_contains(b"A", b"a", b"z"));
    }

    #[test]
    fn multi_byte_range_compares_prefixes() {
        assert!(range_contains(b"25", b"10", b"255"));
        assert!(range_contains(b"2", b"10", b"255"));
        assert!(!range_contains(b"26", b"10", b"255"));
        assert!(!range_contains(b"09", b"10", b"255"));
    }

    #[test]
    fn outside_literal_rejects_literal_bytes() {
        assert!(outside_literal(b"yay", b' '));
        assert!(!outside_literal(b"yay", b'a'));
        assert!(!outside_literal(b"yay", b'y'));
    }
}
