//! Printable-only rendering of radio-decoded text.

use std::fmt::Write;

/// Width of one `<0xhh>` escape.
const ESCAPE_LEN: usize = 6;

/// Render arbitrary bytes as printable ASCII.
///
/// Input is cut at `max_len` bytes. Control bytes and bytes at or above 0x80
/// are replaced with `<0xhh>`; everything else passes through. The result
/// never exceeds `max_len` bytes and never ends in a bare space. An escape
/// that would not fit is dropped whole rather than split.
pub fn to_safe_text(raw: &[u8], max_len: usize) -> String {
    let input = &raw[..raw.len().min(max_len)];
    let mut safe = String::with_capacity(input.len());

    for &byte in input {
        if !(b' '..0x80).contains(&byte) {
            if safe.len() + ESCAPE_LEN > max_len {
                break;
            }
            // Writing into a String cannot fail
            let _ = write!(safe, "<0x{:02x}>", byte);
        } else {
            if safe.len() + 1 > max_len {
                break;
            }
            safe.push(byte as char);
        }
    }

    // Whatever ended up last, a space there is escaped or dropped
    while safe.ends_with(' ') {
        safe.pop();
        if safe.len() + ESCAPE_LEN <= max_len {
            safe.push_str("<0x20>");
        }
    }

    safe
}

/// Drop trailing carriage returns and newlines.
pub fn strip_trailing_line_endings(text: &[u8]) -> &[u8] {
    let end = text
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_text_passes_through() {
        assert_eq!(to_safe_text(b"!4500.00N/09300.00W>", 500), "!4500.00N/09300.00W>");
    }

    #[test]
    fn control_and_high_bytes_are_escaped() {
        assert_eq!(to_safe_text(b"a\x00b\x7fc\xb0", 500), "a<0x00>b\x7fc<0xb0>");
        assert_eq!(to_safe_text(b"line\r\n", 500), "line<0x0d><0x0a>");
    }

    #[test]
    fn only_the_last_space_is_escaped() {
        assert_eq!(to_safe_text(b"a b ", 500), "a b<0x20>");
        assert_eq!(to_safe_text(b" ", 500), "<0x20>");
    }

    #[test]
    fn input_is_truncated_before_processing() {
        // The space is last only after truncation
        assert_eq!(to_safe_text(b"ab cd", 3), "ab");
        assert_eq!(to_safe_text(b"abcdef", 4), "abcd");
    }

    #[test]
    fn output_never_exceeds_bound() {
        let noisy: Vec<u8> = (0u8..=255).collect();
        for max_len in [0, 1, 5, 6, 7, 40, 255, 500] {
            let safe = to_safe_text(&noisy, max_len);
            assert!(safe.len() <= max_len, "{} > {}", safe.len(), max_len);
            assert!(safe.bytes().all(|b| (b' '..=0x7f).contains(&b)));
        }
    }

    #[test]
    fn escapes_are_not_split() {
        assert_eq!(to_safe_text(b"ab\x01", 7), "ab");
        assert_eq!(to_safe_text(b"ab\x01", 8), "ab<0x01>");
    }

    #[test]
    fn space_left_last_by_a_dropped_escape_is_escaped() {
        let once = to_safe_text(b"a \x01", 7);
        assert_eq!(once, "a<0x20>");
        assert_eq!(to_safe_text(once.as_bytes(), 7), once);

        // No room for the escape either
        assert_eq!(to_safe_text(b"abcd \x01", 8), "abcd");
        assert_eq!(to_safe_text(b"ab  \x01", 8), "ab<0x20>");
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let once = to_safe_text(b"N0CALL>APRS:\x1c\xffhello \r\n ", 500);
        let twice = to_safe_text(once.as_bytes(), 500);
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_only_trailing_line_endings() {
        assert_eq!(strip_trailing_line_endings(b"abc\r\n\n"), b"abc");
        assert_eq!(strip_trailing_line_endings(b"a\rb\n"), b"a\rb");
        assert_eq!(strip_trailing_line_endings(b"\r\n"), b"");
        assert_eq!(strip_trailing_line_endings(b""), b"");
    }
}
