//! Logging utilities for peer-supplied strings and raw frames so logs stay single-line.
//! Escapes control characters that otherwise break log readability.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Truncates very long strings (over `MAX_PREVIEW` chars) with an ellipsis to cap log noise.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape and cut `input` to at most `max_bytes`, never splitting a UTF-8 sequence.
/// Truncated output ends in `...`.
pub fn truncate_for_log(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return escape_log(input);
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !input.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = escape_log(&input[..cut]);
    out.push_str("...");
    out
}

/// Lowercase hex of the first `max` bytes of a frame, for trace logging.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    data.iter()
        .take(max)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_truncates() {
        let s = "Line1\nLine2\r\tEnd";
        let esc = escape_log(s);
        assert_eq!(esc, "Line1\\nLine2\\r\\tEnd");
    }

    #[test]
    fn truncate_does_not_split_multibyte_char() {
        // "é" is two bytes; a cut at byte 6 would land inside it.
        let s = "abcdeé1234";
        let out = truncate_for_log(s, 9);
        assert_eq!(out, "abcde...");
    }

    #[test]
    fn short_input_is_only_escaped() {
        assert_eq!(truncate_for_log("hi\n", 10), "hi\\n");
    }

    #[test]
    fn hex_snippet_caps_length() {
        assert_eq!(hex_snippet(&[0x94, 0xc3, 0x00, 0x05], 2), "94c3");
    }
}
