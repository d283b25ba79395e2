use super::report::{Group, PathRule, Verdict};
use std::borrow::Cow;

const WILDCARD_AGENT: &str = "*";

/// The rules of the group (or groups) that apply to one user agent.
///
/// Selecting the group is done once, so checking many paths for the same
/// agent only pays for rule matching.
#[derive(Debug, Clone)]
pub struct AgentRules<'a> {
    rules: Vec<&'a PathRule>,
}

impl<'a> AgentRules<'a> {
    /// Pick the groups that apply to `user_agent`.
    ///
    /// Only the product token of the agent is considered: everything before
    /// the first space or `/`, lower-cased. A group applies when one of its
    /// names occurs in that token, and the group with the longest such name
    /// wins. Groups that repeat the winning name are merged in document
    /// order. When no name matches, the `*` groups apply, and when there are
    /// none of those either there are no rules at all.
    pub(crate) fn select(groups: &'a [Group], user_agent: &str) -> Self {
        let token = product_token(user_agent);

        let specificity = |group: &Group| {
            group
                .user_agents
                .iter()
                .filter(|a| !a.is_empty() && *a != WILDCARD_AGENT)
                .filter(|a| token.contains(a.as_str()))
                .map(|a| a.len())
                .max()
        };

        let best = groups.iter().filter_map(specificity).max();
        let selected: Vec<&Group> = match best {
            Some(best) => groups
                .iter()
                .filter(|g| specificity(g) == Some(best))
                .collect(),
            None => groups
                .iter()
                .filter(|g| g.user_agents.iter().any(|a| a == WILDCARD_AGENT))
                .collect(),
        };

        let mut rules: Vec<&PathRule> = selected.iter().flat_map(|g| g.rules.iter()).collect();
        rules.sort_by_key(|r| r.source_order);

        tracing::trace!(
            user_agent,
            token = %token,
            groups = selected.len(),
            rules = rules.len(),
            "selected rules"
        );

        Self { rules }
    }

    /// The rule that decides `path`, if any.
    ///
    /// The longest matching pattern wins. On equal length `Allow` beats
    /// `Disallow`, and after that the later rule wins.
    pub fn matching_rule<T: AsRef<[u8]>>(&self, path: T) -> Option<&'a PathRule> {
        let path = path.as_ref();
        let path: &[u8] = if path.is_empty() { b"/" } else { path };

        self.rules
            .iter()
            .filter_map(|rule| rule.pattern.matches(path).map(|len| (len, *rule)))
            .max_by_key(|(len, rule)| (*len, rule.verdict == Verdict::Allow, rule.source_order))
            .map(|(_, rule)| rule)
    }

    /// Match whether the rules allow or disallow the target path.
    ///
    /// Paths no rule matches are allowed. So are paths whose best match is
    /// an empty pattern: an empty `Disallow` allows everything.
    pub fn allow<T: AsRef<[u8]>>(&self, path: T) -> bool {
        let verdict = match self.matching_rule(path) {
            Some(rule) if !rule.pattern.is_empty() => rule.verdict,
            _ => Verdict::Allow,
        };
        tracing::trace!(?verdict, "resolved path");
        verdict == Verdict::Allow
    }

    pub fn rules(&self) -> &[&'a PathRule] {
        &self.rules
    }
}

/// The product name of a user agent string, e.g. `googlebot` for
/// `Googlebot/2.1 (+http://www.google.com/bot.html)`.
pub(crate) fn product_token(user_agent: &str) -> String {
    let user_agent = user_agent.trim();
    let end = user_agent
        .find(|c: char| c == '/' || c.is_whitespace())
        .unwrap_or(user_agent.len());
    user_agent[..end].to_lowercase()
}

/// The name a `User-agent` line registers its group under. A `*` followed
/// by nothing or by whitespace is the wildcard; anything else is cut down to
/// its product token so it compares like a runtime agent.
pub(crate) fn agent_name(value: &str) -> String {
    let value = value.trim();
    match value.strip_prefix(WILDCARD_AGENT) {
        Some(rest) if rest.chars().next().map_or(true, char::is_whitespace) => {
            WILDCARD_AGENT.to_string()
        }
        _ => product_token(value),
    }
}

/// Extract the path, params and query from a URL. Anything that is already
/// a path is returned as is. The fragment is dropped and the result always
/// starts with `/`.
pub(crate) fn path_of(url: &[u8]) -> Cow<'_, [u8]> {
    let is_path_start = |b: &u8| *b == b'/' || *b == b'?' || *b == b';';

    let search_start = if url.starts_with(b"//") { 2 } else { 0 };
    let early_path = position(url, search_start, is_path_start);
    let authority_start = match find_from(url, search_start, b"://") {
        Some(protocol) if early_path.map_or(true, |p| protocol < p) => protocol + 3,
        _ => search_start,
    };

    let path_start = match position(url, authority_start, is_path_start) {
        Some(start) => start,
        None => return Cow::Borrowed(b"/"),
    };

    let hash = position(url, search_start, |b| *b == b'#');
    if matches!(hash, Some(h) if h < path_start) {
        return Cow::Borrowed(b"/");
    }

    let path = &url[path_start..hash.unwrap_or(url.len())];
    if path.first() == Some(&b'/') {
        Cow::Borrowed(path)
    } else {
        let mut owned = Vec::with_capacity(path.len() + 1);
        owned.push(b'/');
        owned.extend_from_slice(path);
        Cow::Owned(owned)
    }
}

fn position<P: Fn(&u8) -> bool>(bytes: &[u8], from: usize, predicate: P) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(predicate)
        .map(|p| p + from)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
