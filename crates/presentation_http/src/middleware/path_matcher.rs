//! Glob matching for request paths
//!
//! `*` matches any run of characters (including `/`), everything else is
//! literal. Patterns are compiled once into a single anchored regex set.

use regex::RegexSet;

/// Matches request paths against a list of globs
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<String>,
    set: RegexSet,
}

impl PathMatcher {
    /// Compile a list of globs
    ///
    /// # Errors
    ///
    /// Fails only if the combined pattern exceeds the regex size limit.
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = RegexSet::new(patterns.iter().map(|p| glob_to_regex(p)))?;
        Ok(Self { patterns, set })
    }

    /// A matcher that matches nothing
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Whether any glob matches `path`
    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    /// Source globs
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn glob_to_regex(glob: &str) -> String {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}
