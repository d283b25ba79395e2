use serde_derive::{Deserialize, Serialize};

const EOW_BYTE: u8 = b'$';
const WILDCARD_BYTE: u8 = b'*';
const SLASH_BYTE: u8 = b'/';

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
enum Matcher {
    /// The empty pattern. It matches every path with length zero.
    Everything,
    /// A pattern that does not start with `/`. It can never match.
    Nothing,
    /// Literal segments separated by wildcards. The first segment must match
    /// at the start of the path, every following segment somewhere after the
    /// previous one. An anchored pattern must consume the whole path.
    Segments {
        head: Vec<u8>,
        tail: Vec<Vec<u8>>,
        anchored: bool,
    },
}

/// A rule path compiled for matching.
///
/// `*` matches any run of bytes, including none. `$` anchors the match to the
/// end of the path, but only as the final byte of the pattern; anywhere else
/// it is an ordinary byte. Matching is byte-wise and case sensitive, and no
/// percent-decoding happens on either side, so patterns and paths must be
/// given in the same encoding.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CompiledPattern {
    len: usize,
    matcher: Matcher,
}

impl CompiledPattern {
    pub fn compile<T: AsRef<[u8]>>(raw: T) -> Self {
        let raw = raw.as_ref();
        let matcher = match raw.first() {
            None => Matcher::Everything,
            Some(&SLASH_BYTE) => {
                let (body, anchored) = match raw.split_last() {
                    Some((&EOW_BYTE, body)) => (body, true),
                    _ => (raw, false),
                };

                let mut parts = body.split(|b| *b == WILDCARD_BYTE);
                let head = parts.next().unwrap_or_default().to_vec();
                // Repeated wildcards leave empty segments behind; they add
                // nothing except a trailing one, which makes an anchored
                // pattern accept any ending.
                let mut tail: Vec<Vec<u8>> = vec![];
                for part in parts {
                    if part.is_empty() && tail.last().map_or(false, |t| t.is_empty()) {
                        continue;
                    }
                    if let Some(last) = tail.last() {
                        if last.is_empty() {
                            tail.pop();
                        }
                    }
                    tail.push(part.to_vec());
                }

                Matcher::Segments {
                    head,
                    tail,
                    anchored,
                }
            }
            Some(_) => Matcher::Nothing,
        };

        Self {
            len: raw.len(),
            matcher,
        }
    }

    /// Length of the raw pattern text. Longer patterns win over shorter ones
    /// no matter how much of the path their wildcards cover.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A pattern that can never match anything.
    pub fn is_invalid(&self) -> bool {
        self.matcher == Matcher::Nothing
    }

    /// Match the pattern against `path`, returning the match length on
    /// success.
    pub fn matches<T: AsRef<[u8]>>(&self, path: T) -> Option<usize> {
        let path = path.as_ref();
        let matched = match &self.matcher {
            Matcher::Everything => true,
            Matcher::Nothing => false,
            Matcher::Segments {
                head,
                tail,
                anchored,
            } => match_segments(path, head, tail, *anchored),
        };

        if matched {
            Some(self.len)
        } else {
            None
        }
    }
}

fn match_segments(path: &[u8], head: &[u8], tail: &[Vec<u8>], anchored: bool) -> bool {
    if !path.starts_with(head) {
        return false;
    }

    let last = match tail.split_last() {
        None if anchored => return path.len() == head.len(),
        None => return true,
        Some((last, _)) if anchored => last,
        // Without an anchor the whole pattern is a prefix search; the
        // leftmost occurrence of every segment leaves the most room for
        // the ones after it.
        Some(_) => return find_in_order(path, head.len(), tail).is_some(),
    };

    let middle = &tail[..tail.len() - 1];
    let pos = match find_in_order(path, head.len(), middle) {
        Some(pos) => pos,
        None => return false,
    };

    // The final segment must sit at the very end of the path, after
    // everything matched so far.
    path.len() >= pos + last.len() && path.ends_with(last)
}

/// Find each segment in turn, starting from `pos`. Returns the position
/// right after the last segment.
fn find_in_order(path: &[u8], mut pos: usize, segments: &[Vec<u8>]) -> Option<usize> {
    for segment in segments {
        pos += find(&path[pos..], segment)? + segment.len();
    }
    Some(pos)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
