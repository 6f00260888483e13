//! Printable width of block content.
//!
//! Block lines may carry style escape sequences (colors, bold, hyperlinks) and wide or
//! zero-width characters. The cursor bookkeeping in the flush needs the number of terminal
//! columns a line actually occupies, which is neither its byte length nor its char count.

use std::borrow::Cow;
use unicode_width::UnicodeWidthChar;

const ESC: u8 = 0x1B;

/// Returns the number of terminal columns `line` occupies once printed.
///
/// Escape sequences contribute nothing, wide characters count as two columns and
/// combining marks as zero.
///
/// ```
/// use blockterm::rendering::width::printable_width;
///
/// assert_eq!(printable_width("Hello"), 5);
/// assert_eq!(printable_width("\x1b[1;31mHello\x1b[0m"), 5);
/// assert_eq!(printable_width("日本"), 4);
/// ```
pub fn printable_width(line: &str) -> usize {
    strip_escapes(line)
        .chars()
        .map(|c| c.width().unwrap_or(0))
        .sum()
}

/// Removes terminal escape sequences from `s`.
///
/// Borrows when `s` contains no escape byte.
pub fn strip_escapes(s: &str) -> Cow<'_, str> {
    if !s.as_bytes().contains(&ESC) {
        return Cow::Borrowed(s);
    }

    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESC {
            i = skip_sequence(bytes, i);
        } else {
            // ESC is ASCII, so slicing at ESC positions stays on char boundaries.
            let start = i;
            while i < bytes.len() && bytes[i] != ESC {
                i += 1;
            }
            out.push_str(&s[start..i]);
        }
    }
    Cow::Owned(out)
}

/// `pos` points at an ESC byte; returns the index just past the sequence.
fn skip_sequence(bytes: &[u8], pos: usize) -> usize {
    let Some(&kind) = bytes.get(pos + 1) else {
        return bytes.len();
    };
    match kind {
        b'[' => skip_csi(bytes, pos + 2),
        b']' | b'P' | b'^' | b'_' => skip_string(bytes, pos + 2),
        // two byte sequences like `ESC =`; a multi-byte char after ESC is left alone
        k if k.is_ascii() => pos + 2,
        _ => pos + 1,
    }
}

fn skip_csi(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            0x40..=0x7E => return i + 1,
            0x20..=0x3F => i += 1,
            _ => return i,
        }
    }
    bytes.len()
}

/// OSC, DCS, PM and APC end with BEL or `ESC \`.
fn skip_string(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            0x07 => return i + 1,
            ESC if bytes.get(i + 1) == Some(&b'\\') => return i + 2,
            _ => i += 1,
        }
    }
    bytes.len()
}
