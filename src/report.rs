use super::pattern::CompiledPattern;
use super::resolve::{self, AgentRules};
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    Disallow,
}

/// An `Allow` or `Disallow` line belonging to a group.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: CompiledPattern,
    pub verdict: Verdict,
    /// Position of the rule among all rules of the document. Later rules
    /// break ties between otherwise equal matches.
    pub source_order: usize,
    pub line: usize,
}

/// A run of `User-agent` lines and the rules that follow them.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Lower-cased agent names. Never empty.
    pub user_agents: Vec<String>,
    pub rules: Vec<PathRule>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A non-empty line without a `field: value` shape.
    Malformed,
    UnknownField(String),
    /// An `Allow` or `Disallow` line before any `User-agent` line.
    RuleOutsideGroup,
    /// A non-empty rule path that does not start with `/`.
    InvalidPattern,
    LineTooLong,
    ContentTruncated,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct LineDiagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

/// Everything the parser noticed but did not act on.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub unknown_directives: usize,
    pub malformed_lines: usize,
    pub rules_outside_group: usize,
    pub invalid_patterns: usize,
    pub truncated: bool,
    pub lines: Vec<LineDiagnostic>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, line: usize, kind: DiagnosticKind) {
        match kind {
            DiagnosticKind::Malformed => self.malformed_lines += 1,
            DiagnosticKind::UnknownField(..) => self.unknown_directives += 1,
            DiagnosticKind::RuleOutsideGroup => self.rules_outside_group += 1,
            DiagnosticKind::InvalidPattern => self.invalid_patterns += 1,
            DiagnosticKind::ContentTruncated => self.truncated = true,
            DiagnosticKind::LineTooLong => (),
        }
        self.lines.push(LineDiagnostic { line, kind });
    }
}

/// The result of parsing a robots.txt file. A report is never modified
/// after parsing, so it can be shared freely and queried any number of
/// times.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Report {
    pub(crate) valid_directive_count: usize,
    pub(crate) groups: Vec<Group>,
    pub(crate) sitemaps: Vec<String>,
    pub(crate) crawl_delays: Vec<String>,
    pub(crate) diagnostics: Diagnostics,
}

impl Report {
    /// Number of well-formed `User-agent`, `Allow` and `Disallow` lines.
    pub fn valid_directive_count(&self) -> usize {
        self.valid_directive_count
    }

    /// A document is valid if it has at least one well-formed
    /// `User-agent`, `Allow` or `Disallow` line.
    pub fn is_valid(&self) -> bool {
        self.valid_directive_count > 0
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// `Sitemap` values in document order. They apply to the whole file,
    /// regardless of the group they appear in.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Raw `Crawl-delay` values in document order.
    pub fn crawl_delays(&self) -> &[String] {
        &self.crawl_delays
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The smallest crawl delay in seconds. Values that are not
    /// non-negative numbers are skipped.
    #[cfg(feature = "crawl-delay")]
    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delays
            .iter()
            .flat_map(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Select the rules that apply to `user_agent`. The selection can be
    /// reused to check many paths.
    pub fn rules_for(&self, user_agent: &str) -> AgentRules<'_> {
        AgentRules::select(&self.groups, user_agent)
    }

    /// Decide whether `user_agent` may fetch `url`, which may be a full URL
    /// or just a path.
    pub fn is_allowed<T: AsRef<[u8]>>(&self, user_agent: &str, url: T) -> bool {
        let path = resolve::path_of(url.as_ref());
        self.rules_for(user_agent).allow(&path[..])
    }
}
