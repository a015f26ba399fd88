//! Resource paths and pattern matching
//!
//! Resources are slash-separated paths: `/api/chats/4f1c`
//! Each segment must match: [a-zA-Z0-9_-]+
//!
//! Patterns may use `:name` placeholder segments:
//! - `/api/chats/:chatId` matches `/api/chats/4f1c` but not `/api/chats`
//! - `/api/chats` matches only `/api/chats`
//!
//! A placeholder stands for exactly one segment, so a pattern and a path only
//! match when they have the same number of segments.

use std::fmt;
use thiserror::Error;

/// Valid characters for a path segment
fn is_valid_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Validate a single segment
fn is_valid_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_valid_segment_char)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("resource path cannot be empty")]
    Empty,

    #[error("resource path must start with '/': {0}")]
    NotAbsolute(String),

    #[error("invalid segment '{0}': must match [a-zA-Z0-9_-]+")]
    InvalidSegment(String),

    #[error("invalid placeholder '{0}': expected ':name'")]
    InvalidPlaceholder(String),

    #[error("empty segment in resource path")]
    EmptySegment,
}

/// Split an absolute path into its raw segments.
///
/// `/` is the root and has no segments.
fn split_absolute(path: &str) -> Result<Vec<&str>, ResourceError> {
    if path.is_empty() {
        return Err(ResourceError::Empty);
    }

    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| ResourceError::NotAbsolute(path.to_string()))?;

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ResourceError::EmptySegment);
    }

    Ok(parts)
}

/// A validated, concrete resource path (no placeholders)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Parse and validate a concrete path
    pub fn parse(path: &str) -> Result<Self, ResourceError> {
        let mut segments = Vec::new();

        for part in split_absolute(path)? {
            if !is_valid_segment(part) {
                return Err(ResourceError::InvalidSegment(part.to_string()));
            }
            segments.push(part.to_string());
        }

        Ok(Self { segments })
    }

    /// Build a path by appending one segment to this one
    pub fn child(&self, segment: &str) -> Result<Self, ResourceError> {
        if !is_valid_segment(segment) {
            return Err(ResourceError::InvalidSegment(segment.to_string()));
        }

        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Get a specific segment by index
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// One segment of a resource pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PatternSegment {
    /// Must equal the path segment exactly
    Literal(String),
    /// Matches any single path segment; holds the placeholder name
    Placeholder(String),
}

/// A resource pattern that may contain `:name` placeholder segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePattern {
    segments: Vec<PatternSegment>,
}

impl ResourcePattern {
    /// Parse a resource pattern such as `/api/chats/:chatId`
    pub fn parse(pattern: &str) -> Result<Self, ResourceError> {
        let mut segments = Vec::new();

        for part in split_absolute(pattern)? {
            if let Some(name) = part.strip_prefix(':') {
                if !is_valid_segment(name) {
                    return Err(ResourceError::InvalidPlaceholder(part.to_string()));
                }
                segments.push(PatternSegment::Placeholder(name.to_string()));
            } else if is_valid_segment(part) {
                segments.push(PatternSegment::Literal(part.to_string()));
            } else {
                return Err(ResourceError::InvalidSegment(part.to_string()));
            }
        }

        Ok(Self { segments })
    }

    /// Check if this pattern matches a concrete path
    pub fn matches(&self, path: &ResourcePath) -> bool {
        if self.segments.len() != path.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(&path.segments)
            .all(|(pattern, actual)| match pattern {
                PatternSegment::Literal(expected) => expected == actual,
                PatternSegment::Placeholder(_) => true,
            })
    }

    /// Names of the placeholders, in order
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PatternSegment::Placeholder(name) => Some(name.as_str()),
                PatternSegment::Literal(_) => None,
            })
            .collect()
    }

    /// Check if this pattern contains any placeholder
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PatternSegment::Placeholder(_)))
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            match segment {
                PatternSegment::Literal(s) => write!(f, "/{}", s)?,
                PatternSegment::Placeholder(name) => write!(f, "/:{}", name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_valid() {
        assert!(ResourcePath::parse("/").is_ok());
        assert!(ResourcePath::parse("/api").is_ok());
        assert!(ResourcePath::parse("/api/chats").is_ok());
        assert!(ResourcePath::parse("/api/chats/2b0e6a0e-8d8f-4c43-9a57-9d1f0f3c2f10").is_ok());
        assert!(ResourcePath::parse("/api/chat_rooms/room-1").is_ok());
    }

    #[test]
    fn test_path_parse_invalid() {
        assert_eq!(ResourcePath::parse(""), Err(ResourceError::Empty));
        assert!(matches!(
            ResourcePath::parse("api/chats"),
            Err(ResourceError::NotAbsolute(_))
        ));
        assert_eq!(
            ResourcePath::parse("/api//chats"),
            Err(ResourceError::EmptySegment)
        );
        assert_eq!(ResourcePath::parse("/api/chats/"), Err(ResourceError::EmptySegment));
        assert!(ResourcePath::parse("/api/:chatId").is_err()); // Placeholders are pattern-only
        assert!(ResourcePath::parse("/api/chat s").is_err());
    }

    #[test]
    fn test_path_display_roundtrip() {
        let path = ResourcePath::parse("/api/chats/abc").unwrap();
        assert_eq!(path.to_string(), "/api/chats/abc");
        assert_eq!(ResourcePath::parse("/").unwrap().to_string(), "/");
    }

    #[test]
    fn test_path_child() {
        let base = ResourcePath::parse("/api/chats").unwrap();
        let child = base.child("abc").unwrap();
        assert_eq!(child.to_string(), "/api/chats/abc");
        assert_eq!(child.segment_count(), 3);
        assert_eq!(child.segment(2), Some("abc"));
        assert!(base.child("a/b").is_err());
    }

    #[test]
    fn test_pattern_parse_valid() {
        assert!(ResourcePattern::parse("/api/chats").is_ok());
        assert!(ResourcePattern::parse("/api/chats/:chatId").is_ok());
        assert!(ResourcePattern::parse("/:a/:b").is_ok());
    }

    #[test]
    fn test_pattern_parse_invalid() {
        assert!(ResourcePattern::parse("").is_err());
        assert!(matches!(
            ResourcePattern::parse("/api/:"),
            Err(ResourceError::InvalidPlaceholder(_))
        ));
        assert!(matches!(
            ResourcePattern::parse("/api/*"),
            Err(ResourceError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_pattern_matching() {
        let collection = ResourcePattern::parse("/api/chats").unwrap();
        let item = ResourcePattern::parse("/api/chats/:chatId").unwrap();

        let list = ResourcePath::parse("/api/chats").unwrap();
        let one = ResourcePath::parse("/api/chats/abc123").unwrap();
        let nested = ResourcePath::parse("/api/chats/abc123/extra").unwrap();
        let other = ResourcePath::parse("/api/users/abc123").unwrap();

        assert!(collection.matches(&list));
        assert!(!collection.matches(&one));

        assert!(item.matches(&one));
        assert!(!item.matches(&list));
        assert!(!item.matches(&nested)); // Placeholder is a single segment
        assert!(!item.matches(&other));
    }

    #[test]
    fn test_pattern_no_prefix_match() {
        // "/api/chat" must not match "/api/chats"
        let pattern = ResourcePattern::parse("/api/chat").unwrap();
        let path = ResourcePath::parse("/api/chats").unwrap();
        assert!(!pattern.matches(&path));
    }

    #[test]
    fn test_pattern_display_and_placeholders() {
        let pattern = ResourcePattern::parse("/api/chats/:chatId").unwrap();
        assert_eq!(pattern.to_string(), "/api/chats/:chatId");
        assert_eq!(pattern.placeholders(), vec!["chatId"]);
        assert!(pattern.has_placeholders());
        assert!(!ResourcePattern::parse("/api/chats").unwrap().has_placeholders());
    }
}
