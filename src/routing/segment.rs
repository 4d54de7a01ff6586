//! Segment patterns.
//!
//! A route path is split on `/` into segments:
//! - `$name` binds exactly one path segment under `name`
//! - `$` (splat) binds the rest of the path under `*`
//! - anything else must match literally (case-sensitive)

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Binding name used by splat segments.
pub const SPLAT: &str = "*";

/// One parsed segment of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Dynamic(String),
    Splat,
}

/// Match priority of a segment. Lower ranks are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SegmentRank {
    Literal,
    Dynamic,
    Splat,
}

/// Errors raised while parsing a route path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("empty segment in {0:?}")]
    Empty(String),

    #[error("invalid parameter name {0:?}")]
    InvalidParam(String),

    #[error("splat must be the last segment of {0:?}")]
    SplatNotLast(String),
}

impl Segment {
    /// Parse a single segment (no slashes).
    pub fn parse(raw: &str) -> Result<Self, SegmentError> {
        if raw.is_empty() {
            return Err(SegmentError::Empty(raw.to_string()));
        }

        match raw.strip_prefix('$') {
            Some("") => Ok(Segment::Splat),
            Some(name) => {
                if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    Ok(Segment::Dynamic(name.to_string()))
                } else {
                    Err(SegmentError::InvalidParam(name.to_string()))
                }
            }
            None => Ok(Segment::Literal(raw.to_string())),
        }
    }

    pub fn rank(&self) -> SegmentRank {
        match self {
            Segment::Literal(_) => SegmentRank::Literal,
            Segment::Dynamic(_) => SegmentRank::Dynamic,
            Segment::Splat => SegmentRank::Splat,
        }
    }

    /// Name this segment binds, if any.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Dynamic(name) => Some(name),
            Segment::Splat => Some(SPLAT),
        }
    }

    /// Shape of the segment with parameter names erased.
    ///
    /// `$slug` and `$id` have the same shape: siblings with equal shapes
    /// can never be told apart by the matcher.
    pub(crate) fn shape(&self) -> &str {
        match self {
            Segment::Literal(literal) => literal,
            Segment::Dynamic(_) => "$",
            Segment::Splat => "$*",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(literal) => f.write_str(literal),
            Segment::Dynamic(name) => write!(f, "${}", name),
            Segment::Splat => f.write_str("$"),
        }
    }
}

/// Parse a route path into segments.
///
/// Leading and trailing slashes are ignored; an empty path yields no
/// segments (index routes and pathless layouts).
pub fn parse_pattern(path: &str) -> Result<Vec<Segment>, SegmentError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for raw in trimmed.split('/') {
        if raw.is_empty() {
            return Err(SegmentError::Empty(path.to_string()));
        }
        if matches!(segments.last(), Some(Segment::Splat)) {
            return Err(SegmentError::SplatNotLast(path.to_string()));
        }
        segments.push(Segment::parse(raw)?);
    }
    Ok(segments)
}

/// Compare two patterns by match priority, segment by segment.
pub fn compare_patterns(a: &[Segment], b: &[Segment]) -> Ordering {
    a.iter()
        .map(Segment::rank)
        .cmp(b.iter().map(Segment::rank))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments() {
        assert_eq!(Segment::parse("posts").unwrap(), Segment::Literal("posts".into()));
        assert_eq!(Segment::parse("$slug").unwrap(), Segment::Dynamic("slug".into()));
        assert_eq!(Segment::parse("$").unwrap(), Segment::Splat);
        assert!(matches!(
            Segment::parse("$bad-name"),
            Err(SegmentError::InvalidParam(_))
        ));
    }

    #[test]
    fn test_parse_pattern() {
        assert!(parse_pattern("").unwrap().is_empty());
        assert!(parse_pattern("/").unwrap().is_empty());

        let pattern = parse_pattern("/posts/$slug/").unwrap();
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern[1].param_name(), Some("slug"));

        assert!(matches!(
            parse_pattern("files/$/tail"),
            Err(SegmentError::SplatNotLast(_))
        ));
        assert!(matches!(parse_pattern("a//b"), Err(SegmentError::Empty(_))));
    }

    #[test]
    fn test_literal_outranks_dynamic() {
        let literal = parse_pattern("new").unwrap();
        let dynamic = parse_pattern("$slug").unwrap();
        let splat = parse_pattern("$").unwrap();
        assert_eq!(compare_patterns(&literal, &dynamic), Ordering::Less);
        assert_eq!(compare_patterns(&dynamic, &splat), Ordering::Less);

        // "$a/edit" beats "$a/$b" on the second segment
        let edit = parse_pattern("$a/edit").unwrap();
        let both = parse_pattern("$a/$b").unwrap();
        assert_eq!(compare_patterns(&edit, &both), Ordering::Less);
    }

    #[test]
    fn test_display_round_trip() {
        let pattern = parse_pattern("posts/$slug/$").unwrap();
        let shown: Vec<String> = pattern.iter().map(|s| s.to_string()).collect();
        assert_eq!(shown.join("/"), "posts/$slug/$");
    }
}
