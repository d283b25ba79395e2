//! A parser and resolver for robots.txt files.
//!
//! A document is parsed once into a [`Report`], which groups the rules by
//! user agent and can then decide, for any user agent and URL, whether the
//! URL may be fetched. Parsing never fails: whatever cannot be understood
//! is skipped and noted in the report's [`Diagnostics`].
//!
//! ```
//! let robots = "User-agent: *\nDisallow: /private\nAllow: /private/public";
//!
//! assert!(robotrules::is_allowed(robots, "FooBot/1.0", "https://example.com/"));
//! assert!(!robotrules::is_allowed(robots, "FooBot/1.0", "/private/data"));
//! assert!(robotrules::is_allowed(robots, "FooBot/1.0", "/private/public/data"));
//! assert!(robotrules::is_valid(robots));
//! ```
//!
//! Patterns and paths are compared byte for byte. Percent-encoding is not
//! normalized on either side, so callers should pass paths encoded the same
//! way the robots.txt file encodes its rules.

mod error;
mod parse;
mod pattern;
mod report;
mod resolve;
mod scan;

pub use error::{Error, Result};
pub use parse::Parser;
pub use pattern::CompiledPattern;
pub use report::{DiagnosticKind, Diagnostics, Group, LineDiagnostic, PathRule, Report, Verdict};
pub use resolve::AgentRules;

/// Parse a robots.txt file with the default limits.
pub fn parse<T: AsRef<[u8]>>(robots_txt: T) -> Report {
    Parser::default().parse(robots_txt)
}

/// Whether `user_agent` may fetch `url` according to `robots_txt`. The URL
/// may be absolute or just a path. Anything the rules do not cover is
/// allowed.
pub fn is_allowed<T, U>(robots_txt: T, user_agent: &str, url: U) -> bool
where
    T: AsRef<[u8]>,
    U: AsRef<[u8]>,
{
    parse(robots_txt).is_allowed(user_agent, url)
}

/// Whether `robots_txt` is empty or has at least one well-formed
/// `User-agent`, `Allow` or `Disallow` line.
pub fn is_valid<T: AsRef<[u8]>>(robots_txt: T) -> bool {
    let robots_txt = robots_txt.as_ref();
    robots_txt.is_empty() || parse(robots_txt).is_valid()
}
