use super::error::Result;
use super::pattern::CompiledPattern;
use super::report::{DiagnosticKind, Group, PathRule, Report, Verdict};
use super::resolve;
use super::scan::{self, Line, Scanner};
use futures_util::io::{AsyncRead, AsyncReadExt};
use serde_derive::{Deserialize, Serialize};

const UA_FIELD: &[u8] = b"user-agent";
const ALLOW_FIELD: &[u8] = b"allow";
const DISALLOW_FIELD: &[u8] = b"disallow";
const SITEMAP_FIELD: &[u8] = b"sitemap";
const DELAY_FIELD: &[u8] = b"crawl-delay";

/// 500 KiB.
const DEFAULT_MAX_BYTES: usize = 500 * 1024;
/// Eight times the longest URL most browsers accept.
const DEFAULT_MAX_LINE_LEN: usize = 2083 * 8;

#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) enum Field {
    UserAgent,
    Allow,
    Disallow,
    Sitemap,
    CrawlDelay,
    Unknown(String),
}

/// One `field: value` line.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct Directive<'a> {
    pub field: Field,
    pub raw_field: &'a [u8],
    pub value: &'a [u8],
    pub line: usize,
}

impl<'a> Directive<'a> {
    /// Whether the directive counts towards the validity of a document.
    fn is_counted(&self) -> bool {
        matches!(self.field, Field::UserAgent | Field::Allow | Field::Disallow)
    }
}

/// Split a line at its first colon. Lines without a colon, or with nothing
/// before it, are not directives.
pub(crate) fn lex<'a>(line: Line<'a>) -> Option<Directive<'a>> {
    let colon = line.text.iter().position(|b| *b == b':')?;
    let raw_field = line.text[..colon].trim_ascii();
    if raw_field.is_empty() {
        return None;
    }
    let value = line.text[colon + 1..].trim_ascii();

    let lower = raw_field.to_ascii_lowercase();
    let field = match &lower[..] {
        DISALLOW_FIELD => Field::Disallow,
        UA_FIELD => Field::UserAgent,
        ALLOW_FIELD => Field::Allow,
        SITEMAP_FIELD => Field::Sitemap,
        DELAY_FIELD => Field::CrawlDelay,
        _ => Field::Unknown(String::from_utf8_lossy(&lower).into_owned()),
    };

    Some(Directive {
        field,
        raw_field,
        value,
        line: line.number,
    })
}

/// Assembles groups from a stream of directives.
///
/// Consecutive `User-agent` lines share one group. The first rule line
/// closes the list of agents, and the next `User-agent` line opens a new
/// group. Rules before the first `User-agent` line have no group and are
/// dropped.
struct GroupBuilder {
    parsing_agents: bool,
    groups: Vec<Group>,
    next_rule: usize,
    report: Report,
}

impl GroupBuilder {
    fn new() -> Self {
        Self {
            parsing_agents: false,
            groups: vec![],
            next_rule: 0,
            report: Report::default(),
        }
    }

    fn push(&mut self, directive: Directive) {
        if directive.is_counted() {
            self.report.valid_directive_count += 1;
        }

        match &directive.field {
            Field::UserAgent => {
                let agent = resolve::agent_name(&String::from_utf8_lossy(directive.value));
                match self.groups.last_mut() {
                    Some(group) if self.parsing_agents => group.user_agents.push(agent),
                    _ => {
                        self.groups.push(Group {
                            user_agents: vec![agent],
                            rules: vec![],
                        });
                        self.parsing_agents = true;
                    }
                }
            }
            Field::Allow => self.push_rule(Verdict::Allow, &directive),
            Field::Disallow => self.push_rule(Verdict::Disallow, &directive),
            Field::Sitemap => self
                .report
                .sitemaps
                .push(String::from_utf8_lossy(directive.value).into_owned()),
            Field::CrawlDelay => self
                .report
                .crawl_delays
                .push(String::from_utf8_lossy(directive.value).into_owned()),
            Field::Unknown(name) => {
                tracing::debug!(line = directive.line, field = %name, "ignoring unknown directive");
                let raw_field = String::from_utf8_lossy(directive.raw_field).into_owned();
                self.report
                    .diagnostics
                    .record(directive.line, DiagnosticKind::UnknownField(raw_field));
            }
        }
    }

    fn push_rule(&mut self, verdict: Verdict, directive: &Directive) {
        let pattern = CompiledPattern::compile(directive.value);
        if pattern.is_invalid() {
            tracing::debug!(line = directive.line, "rule path does not start with '/'");
            self.report
                .diagnostics
                .record(directive.line, DiagnosticKind::InvalidPattern);
        }

        let group = match self.groups.last_mut() {
            Some(group) => group,
            None => {
                tracing::debug!(line = directive.line, "ignoring rule outside of any group");
                self.report
                    .diagnostics
                    .record(directive.line, DiagnosticKind::RuleOutsideGroup);
                return;
            }
        };

        group.rules.push(PathRule {
            pattern,
            verdict,
            source_order: self.next_rule,
            line: directive.line,
        });
        self.next_rule += 1;
        self.parsing_agents = false;
    }

    fn finish(mut self) -> Report {
        self.report.groups = self.groups;
        self.report
    }
}

/// A parser takes an input robots.txt file and outputs a [`Report`], which
/// can answer any number of allow/disallow queries.
///
/// The parser only holds limits on how much input it looks at. Anything
/// past them is cut off and noted in the report's diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parser {
    max_bytes: usize,
    max_line_len: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reading the document after this many bytes.
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Cut every line down to at most this many bytes.
    pub fn max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Parse a robots.txt file. Any input is accepted; what cannot be
    /// understood is skipped and noted in the diagnostics.
    pub fn parse<T: AsRef<[u8]>>(&self, doc: T) -> Report {
        let (doc, truncated) = scan::truncate(doc.as_ref(), self.max_bytes);
        let mut builder = GroupBuilder::new();
        let mut last_line = 0;

        for line in Scanner::new(doc, self.max_line_len) {
            last_line = line.number;
            if line.too_long {
                tracing::warn!(
                    line = line.number,
                    max = self.max_line_len,
                    "line too long, truncated"
                );
                builder
                    .report
                    .diagnostics
                    .record(line.number, DiagnosticKind::LineTooLong);
            }
            if line.text.is_empty() {
                continue;
            }

            match lex(line) {
                Some(directive) => builder.push(directive),
                None => {
                    tracing::debug!(line = line.number, "ignoring malformed line");
                    builder
                        .report
                        .diagnostics
                        .record(line.number, DiagnosticKind::Malformed);
                }
            }
        }

        if truncated {
            tracing::warn!(max = self.max_bytes, "robots.txt too large, truncated");
            builder
                .report
                .diagnostics
                .record(last_line + 1, DiagnosticKind::ContentTruncated);
        }

        builder.finish()
    }

    /// Read a robots.txt file from `reader` and parse it. At most one byte
    /// more than the size limit is read.
    pub async fn parse_reader<R: AsyncRead + Unpin>(&self, reader: R) -> Result<Report> {
        let limit = self.max_bytes.saturating_add(1) as u64;
        let mut buf = vec![];
        reader.take(limit).read_to_end(&mut buf).await?;
        Ok(self.parse(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::LineDiagnostic;

    fn lex_str(text: &str) -> Option<Directive<'_>> {
        lex(Line {
            number: 1,
            text: text.as_bytes(),
            too_long: false,
        })
    }

    #[test]
    fn test_lex_known_fields() {
        let test_cases = vec![
            ("User-agent: *", Field::UserAgent, "*"),
            ("USER-AGENT:   ImABot", Field::UserAgent, "ImABot"),
            ("Allow: /", Field::Allow, "/"),
            ("alLOW:/abc/def", Field::Allow, "/abc/def"),
            ("Disallow: /*/foo", Field::Disallow, "/*/foo"),
            ("disallow :", Field::Disallow, ""),
            ("Sitemap: http://a.com/s.xml", Field::Sitemap, "http://a.com/s.xml"),
            ("Crawl-Delay: 20", Field::CrawlDelay, "20"),
        ];

        for (i, field, value) in test_cases {
            let directive = lex_str(i).unwrap();
            assert_eq!(directive.field, field, "{}", i);
            assert_eq!(directive.value, value.as_bytes(), "{}", i);
        }
    }

    #[test]
    fn test_lex_unknown() {
        let directive = lex_str("Useragent: *").unwrap();
        assert_eq!(directive.field, Field::Unknown("useragent".into()));
        assert_eq!(directive.raw_field, b"Useragent");

        assert_eq!(
            lex_str("disalow: /").unwrap().field,
            Field::Unknown("disalow".into())
        );
    }

    #[test]
    fn test_lex_malformed() {
        for i in vec!["Disallow /", ": /", "  :", "nothing"] {
            assert_eq!(lex_str(i), None, "{}", i);
        }
    }

    #[test]
    fn test_groups() {
        let report = Parser::new().parse(
            r#"
            User-agent: jones-bot
            Disallow: /

            User-agent: jones
            Sitemap: http://example.com/a.xml
            User-agent: FooBar
            Allow: /
            Disallow: /x

            User-agent: *
            Disallow: /
            "#,
        );

        let groups = report.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].user_agents, vec!["jones-bot"]);
        assert_eq!(groups[1].user_agents, vec!["jones", "foobar"]);
        assert_eq!(groups[2].user_agents, vec!["*"]);
        assert_eq!(groups[1].rules.len(), 2);
        assert_eq!(groups[1].rules[1].verdict, Verdict::Disallow);
        assert_eq!(groups[1].rules[1].source_order, 2);
        assert_eq!(groups[1].rules[1].line, 9);
        assert_eq!(report.sitemaps(), &["http://example.com/a.xml".to_string()]);
        assert_eq!(report.valid_directive_count(), 8);
    }

    #[test]
    fn test_agent_names() {
        let report = Parser::new().parse(
            "User-agent: Googlebot/2.1\nUser-agent: * bots\nUser-agent: fake bot\nDisallow: /",
        );
        assert_eq!(report.groups()[0].user_agents, vec!["googlebot", "*", "fake"]);
    }

    #[test]
    fn test_rules_outside_group() {
        let report = Parser::new().parse("Disallow: /\nAllow: /a\nUser-agent: *\nDisallow: /b");
        assert_eq!(report.groups().len(), 1);
        assert_eq!(report.groups()[0].rules.len(), 1);
        assert_eq!(report.diagnostics().rules_outside_group, 2);
        // Still well-formed lines.
        assert_eq!(report.valid_directive_count(), 4);
    }

    #[test]
    fn test_trailing_agents_without_rules() {
        let report = Parser::new().parse("User-agent: a\nDisallow: /\nUser-agent: b");
        assert_eq!(report.groups().len(), 2);
        assert!(report.groups()[1].rules.is_empty());
    }

    #[test]
    fn test_counts_and_diagnostics() {
        let report = Parser::new().parse(
            "User-agent: *\nFoo-Bar: baz\nno colon here\nDisallow: images\n\
             Sitemap: /s.xml\nCrawl-delay: 5\n",
        );
        assert_eq!(report.valid_directive_count(), 2);
        assert_eq!(report.crawl_delays(), &["5".to_string()]);

        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics.unknown_directives, 1);
        assert_eq!(diagnostics.malformed_lines, 1);
        assert_eq!(diagnostics.invalid_patterns, 1);
        assert_eq!(
            diagnostics.lines,
            vec![
                LineDiagnostic {
                    line: 2,
                    kind: DiagnosticKind::UnknownField("Foo-Bar".into())
                },
                LineDiagnostic {
                    line: 3,
                    kind: DiagnosticKind::Malformed
                },
                LineDiagnostic {
                    line: 4,
                    kind: DiagnosticKind::InvalidPattern
                },
            ]
        );
    }

    #[test]
    fn test_max_bytes() {
        let doc = "User-agent: *\nDisallow: /a\nDisallow: /b\n";
        let report = Parser::new().max_bytes(30).parse(doc);
        assert_eq!(report.groups()[0].rules.len(), 1);
        assert!(report.diagnostics().truncated);
        assert_eq!(
            report.diagnostics().lines.last().map(|d| d.line),
            Some(3)
        );

        let report = Parser::new().max_bytes(doc.len()).parse(doc);
        assert_eq!(report.groups()[0].rules.len(), 2);
        assert!(!report.diagnostics().truncated);

        // The cut lands on the `\r` right after a complete rule.
        let doc = "User-agent: *\r\nDisallow: /a\r\nDisallow: /b\r\n";
        let report = Parser::new().max_bytes(27).parse(doc);
        assert_eq!(report.groups()[0].rules.len(), 1);
        assert!(report.diagnostics().truncated);
    }

    #[test]
    fn test_max_line_len() {
        let report = Parser::new()
            .max_line_len(15)
            .parse("User-agent: *\nDisallow: /abcdefgh\n");
        assert_eq!(report.groups()[0].rules[0].pattern.len(), 5);
        assert_eq!(
            report.diagnostics().lines,
            vec![LineDiagnostic {
                line: 2,
                kind: DiagnosticKind::LineTooLong
            }]
        );
    }

    #[test]
    fn test_parse_reader() {
        tokio_test::block_on(async {
            let doc = "User-agent: *\nDisallow: /a\nDisallow: /b\n".as_bytes();

            let report = Parser::new().parse_reader(doc).await.unwrap();
            assert_eq!(report, Parser::new().parse(doc));

            let report = Parser::new().max_bytes(30).parse_reader(doc).await.unwrap();
            assert!(report.diagnostics().truncated);
            assert_eq!(report.groups()[0].rules.len(), 1);
        });
    }
}
