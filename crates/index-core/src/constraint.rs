use semver::{Version, VersionReq};

use crate::error::{IndexError, IndexResult};

const OPERATOR_CHARS: &[char] = &['=', '<', '>', '~', '^', '!'];

/// Version constraint evaluated against the versions recorded for a name.
///
/// Alternatives are separated by `||`; within an alternative every term must
/// hold. Terms are comparators (`=`, `!=`, `<`, `<=`, `>`, `>=`, `~`, `^`),
/// wildcards (`*`, `1.x`), or bare versions, which match exactly. `a - b` is
/// the inclusive range `>=a, <=b`. Terms may be separated by commas or
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    alternatives: Vec<Vec<Term>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Require(VersionReq),
    Exclude(VersionReq),
}

impl Term {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Require(req) => req.matches(version),
            Self::Exclude(req) => !req.matches(version),
        }
    }
}

impl Constraint {
    /// Wildcard constraint used when no version is requested.
    pub fn wildcard() -> Self {
        Self {
            alternatives: vec![vec![Term::Require(VersionReq::STAR)]],
        }
    }

    pub fn parse(raw: &str) -> IndexResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::wildcard());
        }
        let invalid = |reason: String| IndexError::InvalidConstraint {
            constraint: raw.to_string(),
            reason,
        };
        let alternatives = trimmed
            .split("||")
            .map(|alt| parse_alternative(alt.trim()).map_err(invalid))
            .collect::<IndexResult<Vec<_>>>()?;
        Ok(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|terms| terms.iter().all(|term| term.matches(version)))
    }
}

fn parse_alternative(alt: &str) -> Result<Vec<Term>, String> {
    if alt.is_empty() {
        return Err("empty alternative".into());
    }
    if let Some((lower, upper)) = alt.split_once(" - ") {
        let (lower, upper) = (lower.trim(), upper.trim());
        if lower.is_empty() || upper.is_empty() || upper.contains(" - ") {
            return Err(format!("malformed range `{alt}`"));
        }
        return Ok(vec![
            Term::Require(parse_req(&format!(">={}", strip_v(lower)))?),
            Term::Require(parse_req(&format!("<={}", strip_v(upper)))?),
        ]);
    }
    comparators(alt).iter().map(|token| parse_term(token)).collect()
}

/// Splits on commas and whitespace, keeping an operator attached to the
/// version that follows it (`>= 1.0` is one comparator).
fn comparators(alt: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;
    for token in alt
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        if token.chars().all(|ch| OPERATOR_CHARS.contains(&ch)) {
            pending_op = Some(token);
        } else {
            out.push(token);
        }
    }
    out.extend(pending_op);
    out
}

fn parse_term(token: &str) -> Result<Term, String> {
    let split = token
        .find(|ch: char| !OPERATOR_CHARS.contains(&ch))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = strip_v(version);
    match op {
        "!=" => Ok(Term::Exclude(parse_req(&format!("={version}"))?)),
        "" if !is_wildcard(version) => Ok(Term::Require(parse_req(&format!("={version}"))?)),
        _ => Ok(Term::Require(parse_req(&format!("{op}{version}"))?)),
    }
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn parse_req(text: &str) -> Result<VersionReq, String> {
    VersionReq::parse(text).map_err(|err| format!("`{text}`: {err}"))
}

/// Parses a recorded version key, tolerating a single leading `v`.
pub fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(strip_v(raw.trim())).ok()
}
