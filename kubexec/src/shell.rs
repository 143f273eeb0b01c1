//! POSIX shell quoting for the command lines kubexec hands to `bash -c`.

use std::borrow::Cow;

/// Bytes that never need quoting.
fn is_inert(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b',' | b'.' | b'/' | b'_' | b'-' | b'+' | b'=' | b':' | b'@')
}

/// Returns `arg` unchanged if it is safe to use as a single shell word, otherwise wraps it in single quotes. Embedded
/// single quotes become `'\''`.
pub fn quote(arg: &str) -> Cow<str> {
    if !arg.is_empty() && arg.bytes().all(is_inert) {
        return Cow::Borrowed(arg);
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str(r"'\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    Cow::Owned(out)
}
