use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Walks SQL text and yields `(index, byte)` for bytes that are live SQL.
///
/// String literals, quoted identifiers, line and nested block comments, and dollar-quoted
/// bodies are stepped over silently. Callers that consume more than one byte (an identifier,
/// a `::` cast) move the cursor with [`SqlScanner::skip_to`].
pub(super) struct SqlScanner<'a> {
    bytes: &'a [u8],
    idx: usize,
    state: State,
}

impl<'a> SqlScanner<'a> {
    pub(super) fn new(sql: &'a str) -> Self {
        Self {
            bytes: sql.as_bytes(),
            idx: 0,
            state: State::Normal,
        }
    }

    pub(super) fn skip_to(&mut self, idx: usize) {
        self.idx = idx;
    }
}

impl Iterator for SqlScanner<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.idx < self.bytes.len() {
            let idx = self.idx;
            let b = self.bytes[idx];
            self.idx += 1;
            match self.state {
                State::Normal => match b {
                    b'\'' => self.state = State::SingleQuoted,
                    b'"' => self.state = State::DoubleQuoted,
                    _ if is_line_comment_start(self.bytes, idx) => {
                        self.state = State::LineComment;
                        self.idx = idx + 2;
                    }
                    _ if is_block_comment_start(self.bytes, idx) => {
                        self.state = State::BlockComment(1);
                        self.idx = idx + 2;
                    }
                    b'$' => {
                        if let Some((tag, close)) = try_start_dollar_quote(self.bytes, idx) {
                            self.state = State::DollarQuoted(tag);
                            self.idx = close + 1;
                        } else {
                            return Some((idx, b));
                        }
                    }
                    _ => return Some((idx, b)),
                },
                State::SingleQuoted => {
                    if b == b'\'' {
                        if self.bytes.get(idx + 1) == Some(&b'\'') {
                            self.idx = idx + 2; // skip escaped quote
                        } else {
                            self.state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if self.bytes.get(idx + 1) == Some(&b'"') {
                            self.idx = idx + 2; // skip escaped quote
                        } else {
                            self.state = State::Normal;
                        }
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        self.state = State::Normal;
                    }
                }
                State::BlockComment(depth) => {
                    if is_block_comment_start(self.bytes, idx) {
                        self.state = State::BlockComment(depth + 1);
                        self.idx = idx + 2;
                    } else if is_block_comment_end(self.bytes, idx) {
                        self.state = if depth == 1 {
                            State::Normal
                        } else {
                            State::BlockComment(depth - 1)
                        };
                        self.idx = idx + 2;
                    }
                }
                State::DollarQuoted(ref tag) => {
                    if b == b'$' && matches_tag(self.bytes, idx, tag) {
                        self.idx = idx + tag.len() + 2;
                        self.state = State::Normal;
                    }
                }
            }
        }
        None
    }
}

pub(super) fn next_is_digit(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx + 1).is_some_and(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(sql: &str) -> String {
        SqlScanner::new(sql).map(|(_, b)| b as char).collect()
    }

    #[test]
    fn skips_literals_and_comments() {
        assert_eq!(live("a ':b' c"), "a  c");
        assert_eq!(live("a 'it''s' b"), "a  b");
        assert_eq!(live("a \"x:y\" b"), "a  b");
        assert_eq!(live("a -- :b\nc"), "a c");
        assert_eq!(live("a /* x /* y */ z */ b"), "a  b");
    }

    #[test]
    fn skips_dollar_quoted_bodies() {
        assert_eq!(live("$fn$ :x $fn$ y"), " y");
        assert_eq!(live("$1 + $2"), "$1 + $2");
    }
}
