//! npm-style version ranges on top of `semver::VersionReq`.
//!
//! `engines.node` uses npm range syntax, which differs from Cargo's in a few
//! places: comparators are space separated, `||` joins alternatives, hyphen
//! ranges exist, and a bare version is exact rather than caret.

use regex::Regex;
use semver::{Version, VersionReq};
use std::sync::OnceLock;

/// A parsed range: the union of its alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRange {
    alternatives: Vec<VersionReq>,
}

/// Reason a range failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeError(pub String);

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl NodeRange {
    /// Parse an npm range.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RangeError("empty range".to_string()));
        }

        let alternatives = input
            .split("||")
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NodeRange { alternatives })
    }

    /// Whether `version` satisfies any alternative.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

fn hyphen_range() -> &'static Regex {
    static HYPHEN: OnceLock<Regex> = OnceLock::new();
    HYPHEN.get_or_init(|| {
        Regex::new(r"^(\S+)\s+-\s+(\S+)$").expect("hyphen range pattern is valid")
    })
}

fn parse_alternative(raw: &str) -> Result<VersionReq, RangeError> {
    let raw = raw.trim();
    if raw.is_empty() || is_all_wildcard(strip_v(raw)) {
        return Ok(VersionReq::STAR);
    }

    let cargo_req = match hyphen_range().captures(raw) {
        Some(caps) => format!(
            ">={}, <={}",
            strip_v(&caps[1]),
            strip_v(&caps[2])
        ),
        None => {
            let parts = comparators(raw)?;
            if parts.is_empty() {
                return Ok(VersionReq::STAR);
            }
            parts.join(", ")
        }
    };

    VersionReq::parse(&cargo_req).map_err(|e| RangeError(format!("{:?}: {}", raw, e)))
}

/// Split a comparator set, gluing detached operators (`>= 16`) to their
/// version and making bare versions exact.
fn comparators(raw: &str) -> Result<Vec<String>, RangeError> {
    let mut out = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in raw.split_whitespace() {
        if is_operator(token) {
            if pending_op.is_some() {
                return Err(RangeError(format!("{:?}: dangling operator", raw)));
            }
            pending_op = Some(token);
            continue;
        }

        let (op, version) = match pending_op.take() {
            Some(op) => (op, token),
            None => split_operator(token),
        };
        let version = strip_v(version);
        // `x.x.x` alongside other comparators adds no bound
        if op.is_empty() && is_all_wildcard(version) {
            continue;
        }

        let op = if op.is_empty() && !has_wildcard(version) {
            "="
        } else {
            op
        };
        out.push(format!("{}{}", op, version));
    }

    if pending_op.is_some() {
        return Err(RangeError(format!("{:?}: dangling operator", raw)));
    }
    Ok(out)
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

fn is_operator(token: &str) -> bool {
    OPERATORS.contains(&token)
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

fn is_wildcard(part: &str) -> bool {
    part == "*" || part.eq_ignore_ascii_case("x")
}

/// `*`, `x`, `x.x`, `*.*.*` and friends: every component is a wildcard.
fn is_all_wildcard(version: &str) -> bool {
    version.split('.').all(is_wildcard)
}

fn has_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(is_wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_bare_version_is_exact() {
        let range = NodeRange::parse("16.17.1").unwrap();
        assert!(range.matches(&v("16.17.1")));
        assert!(!range.matches(&v("16.18.0")));
    }

    #[test]
    fn test_bare_major_is_major_line() {
        let range = NodeRange::parse("16").unwrap();
        assert!(range.matches(&v("16.0.0")));
        assert!(range.matches(&v("16.20.2")));
        assert!(!range.matches(&v("17.0.0")));
    }

    #[test]
    fn test_x_wildcard() {
        let range = NodeRange::parse("16.x").unwrap();
        assert!(range.matches(&v("16.17.1")));
        assert!(!range.matches(&v("18.0.0")));

        for all in ["x.x.x", "*.*.*", "X.x", "v*", "x.x.x || 14"] {
            let range = NodeRange::parse(all).unwrap();
            assert!(range.matches(&v("16.17.1")), "{} should match anything", all);
        }

        let bounded = NodeRange::parse(">=16 x.x.x").unwrap();
        assert!(bounded.matches(&v("16.17.1")));
        assert!(!bounded.matches(&v("14.19.3")));
    }

    #[test]
    fn test_space_separated_comparators() {
        let range = NodeRange::parse(">=16 <17").unwrap();
        assert!(range.matches(&v("16.17.1")));
        assert!(!range.matches(&v("17.0.0")));

        let detached = NodeRange::parse(">= 16.0.0 < 17.0.0").unwrap();
        assert!(detached.matches(&v("16.17.1")));
    }

    #[test]
    fn test_alternatives() {
        let range = NodeRange::parse("^14.19.0 || ^16.17.0").unwrap();
        assert!(range.matches(&v("14.19.3")));
        assert!(range.matches(&v("16.18.1")));
        assert!(!range.matches(&v("15.0.0")));
    }

    #[test]
    fn test_hyphen_range() {
        let range = NodeRange::parse("14.0.0 - 16.17.1").unwrap();
        assert!(range.matches(&v("16.17.1")));
        assert!(!range.matches(&v("16.18.0")));
    }

    #[test]
    fn test_leading_v() {
        let range = NodeRange::parse(">=v16.17.0").unwrap();
        assert!(range.matches(&v("16.17.1")));
    }

    #[test]
    fn test_star() {
        assert!(NodeRange::parse("*").unwrap().matches(&v("20.0.0")));
    }

    #[test]
    fn test_malformed_ranges() {
        assert!(NodeRange::parse("").is_err());
        assert!(NodeRange::parse("BAD_NEWS_BEARS").is_err());
        assert!(NodeRange::parse(">=").is_err());
        assert!(NodeRange::parse("lts/*").is_err());
    }
}
