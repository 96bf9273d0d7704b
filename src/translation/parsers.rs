pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Recognize an opening `$tag$` (or `$$`) at `start`.
///
/// Returns the tag and the index of the closing `$` of the opener. Tags cannot start with a
/// digit, which keeps `$1` out of this path.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

/// Whether `$tag$` closes at `idx`.
pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let start = idx + 1;
    let end = start + tag.len();
    bytes.get(start..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scan a named-marker identifier starting at `start` (just past the `:`).
///
/// Accepts dotted paths like `user.address.city`; a trailing `.` is left out. Returns the
/// exclusive end index.
pub(super) fn scan_identifier(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start).copied().is_some_and(is_ident_start) {
        return None;
    }
    let mut idx = start + 1;
    loop {
        while bytes.get(idx).copied().is_some_and(is_ident_continue) {
            idx += 1;
        }
        let dotted = bytes.get(idx) == Some(&b'.')
            && bytes.get(idx + 1).copied().is_some_and(is_ident_continue);
        if !dotted {
            return Some(idx);
        }
        idx += 1;
    }
}
