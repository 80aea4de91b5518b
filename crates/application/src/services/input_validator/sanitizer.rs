//! Allow-list markup sanitizer
//!
//! Strips every markup tag whose name is not on the allow-list, and re-emits
//! allowed tags bare (lowercase name, no attributes). Tag removal is repeated
//! until nothing changes, so fragments such as `<scr<b>ipt>` cannot reassemble
//! into a tag once the inner one is gone.

use std::{borrow::Cow, collections::HashSet, sync::LazyLock};

use regex::{Captures, Regex};

/// `<name ...>` / `</name ...>` (groups 1 and 2), or `<!...>` / `<?...>`
#[allow(clippy::expect_used)] // Infallible with a valid static pattern
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)[^<>]*>|<[!?][^<>]*>")
        .expect("Failed to compile tag pattern")
});

/// Tags kept by default: inline emphasis and simple lists
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "u", "p", "br", "ul", "ol", "li", "code",
];

/// Removes markup and control characters from untrusted text
#[derive(Debug, Clone)]
pub struct MarkupSanitizer {
    allowed_tags: HashSet<String>,
}

impl MarkupSanitizer {
    /// Create a sanitizer keeping only the given tag names
    pub fn new<I, S>(allowed_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_tags: allowed_tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Create a sanitizer that removes every tag
    pub fn strip_all() -> Self {
        Self {
            allowed_tags: HashSet::new(),
        }
    }

    /// Sanitize one string
    ///
    /// Idempotent, and leaves clean text (including any non-ASCII content)
    /// untouched.
    pub fn sanitize(&self, text: &str) -> String {
        let mut current = strip_control_chars(text).into_owned();
        loop {
            match self.strip_tags_once(&current) {
                Cow::Borrowed(_) => return current,
                Cow::Owned(next) if next == current => return current,
                Cow::Owned(next) => current = next,
            }
        }
    }

    fn strip_tags_once<'a>(&self, text: &'a str) -> Cow<'a, str> {
        TAG_PATTERN.replace_all(text, |caps: &Captures<'_>| {
            let Some(name) = caps.get(2) else {
                return String::new();
            };
            let name = name.as_str().to_ascii_lowercase();
            if !self.allowed_tags.contains(&name) {
                return String::new();
            }
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if closing {
                format!("</{name}>")
            } else {
                format!("<{name}>")
            }
        })
    }
}

impl Default for MarkupSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_TAGS)
    }
}

/// Remove control characters except line breaks and tabs
fn strip_control_chars(text: &str) -> Cow<'_, str> {
    let is_stripped = |c: char| c.is_control() && !matches!(c, '\n' | '\r' | '\t');
    if text.chars().any(is_stripped) {
        Cow::Owned(text.chars().filter(|c| !is_stripped(*c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}
