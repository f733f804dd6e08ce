//! Ant-style path patterns for authentication exclusions.
//!
//! - `**` matches zero or more whole path segments
//! - `*` matches any run of characters within one segment
//! - `?` matches exactly one character within one segment
//!
//! Empty segments are ignored, so `/health` and `/health/` match the same
//! patterns.

/// Ordered list of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    patterns: Vec<String>,
}

impl PathMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First pattern matching `path`, if any.
    pub fn find_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| matches_pattern(pattern, path))
            .map(String::as_str)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.find_match(path).is_some()
    }
}

/// Whether `path` matches a single Ant-style `pattern`.
pub fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = segments(pattern).collect();
    let path: Vec<&str> = segments(path).collect();
    match_segments(&pattern, &path)
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|segment| !segment.is_empty())
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            (0..=path.len()).any(|skip| path.get(skip..).is_some_and(|tail| match_segments(rest, tail)))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((first, tail)) => match_segment(segment, first) && match_segments(rest, tail),
            None => false,
        },
    }
}

fn match_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_chars(&pattern, &text)
}

fn match_chars(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'*', rest)) => {
            (0..=text.len()).any(|skip| text.get(skip..).is_some_and(|tail| match_chars(rest, tail)))
        }
        Some((&'?', rest)) => text
            .split_first()
            .is_some_and(|(_, tail)| match_chars(rest, tail)),
        Some((c, rest)) => text
            .split_first()
            .is_some_and(|(t, tail)| t == c && match_chars(rest, tail)),
    }
}
