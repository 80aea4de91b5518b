//! Injection detectors
//!
//! One detector per [`ThreatCategory`]. All built-in detectors are linear-time
//! scans: `regex` never backtracks and the path traversal tokens go through a
//! single Aho-Corasick automaton, so very long inputs cannot blow up.

use std::{borrow::Cow, sync::LazyLock};

use aho_corasick::AhoCorasick;
use domain::ThreatCategory;
use regex::{Regex, RegexSet};

use crate::error::ApplicationError;

/// A scanner for one category of injection attack
#[cfg_attr(test, mockall::automock)]
pub trait ThreatDetector: Send + Sync + std::fmt::Debug {
    /// Category reported when this detector fires
    fn category(&self) -> ThreatCategory;

    /// Returns `Ok(true)` when `text` is safe for this category
    fn is_safe(&self, text: &str) -> Result<bool, ApplicationError>;
}

const SQL_PATTERNS: &[&str] = &[
    // quote (optionally closing a paren/statement) directly before a keyword
    r#"(?i)['"`]\s*(?:\)\s*)*(?:;|--|#|/\*)?\s*(?:drop|union|select|insert|update|delete|alter|create|truncate|exec(?:ute)?|grant|revoke|shutdown)\b"#,
    r"(?i)\bunion\b(?:\s+all)?\s+select\b",
    r"(?i);\s*(?:drop|select|insert|update|delete|alter|create|truncate|exec(?:ute)?|shutdown|declare)\b",
    r"(?i)\b(?:drop|truncate)\s+(?:table|database|schema)\b",
    // comment right after a closing quote
    r#"['"]\s*(?:--|#|/\*)"#,
    r"(?i)\bwaitfor\s+delay\b|\bpg_sleep\s*\(|\bbenchmark\s*\(|\bsleep\s*\(\s*\d",
];

#[allow(clippy::expect_used)] // Infallible with valid static patterns
static SQL_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(SQL_PATTERNS).expect("Failed to compile SQL patterns"));

/// `OR x=x` / `' AND 'a'='a'` style tautologies; sides compared in code
#[allow(clippy::expect_used)] // Infallible with a valid static pattern
static SQL_TAUTOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:or|and)\b\s*['"]?(\w+)['"]?\s*=\s*['"]?(\w+)"#)
        .expect("Failed to compile tautology pattern")
});

const XSS_PATTERNS: &[&str] = &[
    r"(?i)<\s*/?\s*script\b",
    r"(?i)\b(?:java|vb|live)script\s*:",
    r"(?i)\bon(?:error|load|unload|beforeunload|click|dblclick|contextmenu|auxclick|mouse[a-z]*|key[a-z]*|focus(?:in|out)?|blur|change|submit|reset|select|abort|resize|scroll|input|invalid|toggle|wheel|drag[a-z]*|drop|copy|cut|paste|touch[a-z]*|pointer[a-z]*|animation[a-z]*|transition[a-z]*|begin|end|message|hashchange|popstate|pageshow|pagehide|play|pause|ended)\s*=",
    r"(?i)<\s*(?:iframe|frame|frameset|object|embed|applet|base|meta|link|svg|math)\b",
    r"(?i)\bdata\s*:\s*text/html",
    r"(?i)\bsrcdoc\s*=",
    r"(?i)\bexpression\s*\(",
];

#[allow(clippy::expect_used)] // Infallible with valid static patterns
static XSS_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(XSS_PATTERNS).expect("Failed to compile XSS patterns"));

const COMMAND_PATTERNS: &[&str] = &[
    // separators, pipes and background operators; a line break also ends a command
    r"[;|&\n\r]",
    r"`",
    r"\$[({]",
    r"(?i)>\s*/(?:dev|etc|tmp|var|proc)/",
];

#[allow(clippy::expect_used)] // Infallible with valid static patterns
static COMMAND_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(COMMAND_PATTERNS).expect("Failed to compile command injection patterns")
});

/// Matched against the input and each percent-decoded form of it
const TRAVERSAL_TOKENS: &[&str] = &[
    "../",
    "..\\",
    // overlong UTF-8 and unicode dot forms
    "%c0%ae%c0%ae",
    "..%c0%af",
    "..%c1%9c",
    "%uff0e%uff0e",
];

/// Percent-decoding passes before giving up (single and double encoding)
const DECODE_ROUNDS: usize = 2;

#[allow(clippy::expect_used)] // Infallible with valid static patterns
static TRAVERSAL_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(TRAVERSAL_TOKENS)
        .expect("Failed to build traversal matcher")
});

/// Flags SQL keywords next to quotes, stacked statements, comments and
/// boolean tautologies
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlInjectionDetector;

impl SqlInjectionDetector {
    /// Returns true when `text` shows no SQL injection markers
    pub fn scan(text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        if SQL_SET.is_match(text) {
            return false;
        }
        !SQL_TAUTOLOGY
            .captures_iter(text)
            .any(|caps| caps[1].eq_ignore_ascii_case(&caps[2]))
    }
}

impl ThreatDetector for SqlInjectionDetector {
    fn category(&self) -> ThreatCategory {
        ThreatCategory::SqlInjection
    }

    fn is_safe(&self, text: &str) -> Result<bool, ApplicationError> {
        Ok(Self::scan(text))
    }
}

/// Flags script tags, `javascript:` URIs, inline event handlers and embeds
#[derive(Debug, Clone, Copy, Default)]
pub struct XssDetector;

impl XssDetector {
    /// Returns true when `text` shows no XSS markers
    pub fn scan(text: &str) -> bool {
        text.is_empty() || !XSS_SET.is_match(text)
    }
}

impl ThreatDetector for XssDetector {
    fn category(&self) -> ThreatCategory {
        ThreatCategory::Xss
    }

    fn is_safe(&self, text: &str) -> Result<bool, ApplicationError> {
        Ok(Self::scan(text))
    }
}

/// Flags shell separators, pipes, line breaks, command substitution and
/// redirection into system paths
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInjectionDetector;

impl CommandInjectionDetector {
    /// Returns true when `text` shows no command injection markers
    pub fn scan(text: &str) -> bool {
        text.is_empty() || !COMMAND_SET.is_match(text)
    }
}

impl ThreatDetector for CommandInjectionDetector {
    fn category(&self) -> ThreatCategory {
        ThreatCategory::CommandInjection
    }

    fn is_safe(&self, text: &str) -> Result<bool, ApplicationError> {
        Ok(Self::scan(text))
    }
}

/// Flags `../`, `..\` and their single/double URL-encoded forms
///
/// The text is percent-decoded up to twice, so partly encoded sequences such
/// as `%2e./` or `.%252e/` are caught as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTraversalDetector;

impl PathTraversalDetector {
    /// Returns true when `text` contains no traversal sequence
    pub fn scan(text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        if TRAVERSAL_MATCHER.is_match(text) {
            return false;
        }

        let mut current = Cow::Borrowed(text.as_bytes());
        for _ in 0..DECODE_ROUNDS {
            if !current.contains(&b'%') {
                break;
            }
            let decoded = urlencoding::decode_binary(&current).into_owned();
            if TRAVERSAL_MATCHER.is_match(&decoded) {
                return false;
            }
            current = Cow::Owned(decoded);
        }
        true
    }
}

impl ThreatDetector for PathTraversalDetector {
    fn category(&self) -> ThreatCategory {
        ThreatCategory::PathTraversal
    }

    fn is_safe(&self, text: &str) -> Result<bool, ApplicationError> {
        Ok(Self::scan(text))
    }
}

/// The built-in detectors in their fixed evaluation order
pub fn default_detectors() -> Vec<Box<dyn ThreatDetector>> {
    vec![
        Box::new(SqlInjectionDetector),
        Box::new(XssDetector),
        Box::new(CommandInjectionDetector),
        Box::new(PathTraversalDetector),
    ]
}
