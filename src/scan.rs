const BOM: &[u8] = b"\xEF\xBB\xBF";
const COMMENT_BYTE: u8 = b'#';

/// A logical line of a robots.txt file: comments stripped, surrounding
/// whitespace trimmed, never empty.
#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) struct Line<'a> {
    /// 1-based physical line number.
    pub number: usize,
    pub text: &'a [u8],
    /// The physical line exceeded the length limit and was cut short.
    pub too_long: bool,
}

/// Splits a document into logical lines.
///
/// The scanner never fails. Bytes are passed through untouched, so invalid
/// UTF-8 or control characters simply end up as literal bytes in the line.
pub(crate) struct Scanner<'a> {
    rest: &'a [u8],
    number: usize,
    max_line_len: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(doc: &'a [u8], max_line_len: usize) -> Self {
        Self {
            rest: doc.strip_prefix(BOM).unwrap_or(doc),
            number: 0,
            max_line_len,
        }
    }

    /// Cut off the next physical line, accepting `\n`, `\r\n` or a lone `\r`
    /// as the terminator.
    fn next_physical(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }

        let rest = self.rest;
        match rest.iter().position(|b| *b == b'\n' || *b == b'\r') {
            Some(end) => {
                let skip = match &rest[end..] {
                    [b'\r', b'\n', ..] => 2,
                    _ => 1,
                };
                self.rest = &rest[end + skip..];
                Some(&rest[..end])
            }
            None => {
                self.rest = b"";
                Some(rest)
            }
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(raw) = self.next_physical() {
            self.number += 1;

            let too_long = raw.len() > self.max_line_len;
            let raw = if too_long {
                &raw[..self.max_line_len]
            } else {
                raw
            };

            let text = strip_comment(raw).trim_ascii();
            if text.is_empty() && !too_long {
                continue;
            }

            return Some(Line {
                number: self.number,
                text,
                too_long,
            });
        }
        None
    }
}

fn strip_comment(line: &[u8]) -> &[u8] {
    match line.iter().position(|b| *b == COMMENT_BYTE) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Cut a document down to at most `max_bytes`. If the cut lands inside a
/// line, that partial line is dropped as well. Returns the kept bytes and
/// whether anything was cut.
pub(crate) fn truncate(doc: &[u8], max_bytes: usize) -> (&[u8], bool) {
    if doc.len() <= max_bytes {
        return (doc, false);
    }

    let kept = &doc[..max_bytes];
    if doc[max_bytes] == b'\n' || doc[max_bytes] == b'\r' {
        return (kept, true);
    }
    match kept.iter().rposition(|b| *b == b'\n' || *b == b'\r') {
        Some(pos) => (&kept[..=pos], true),
        None => (b"", true),
    }
}
