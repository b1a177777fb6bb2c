//! Sanitizer Adapter
//!
//! Normalises rich-text comment bodies into canonical markup before matching:
//!
//! - Forbidden tags are removed together with their content
//! - Allowed tags are kept in canonical form (lowercase, balanced, only safe
//!   `href` attributes on links)
//! - Every other tag is unwrapped, keeping its text
//! - Text runs are entity-decoded, NFKC-folded, stripped of control and
//!   zero-width characters, whitespace-collapsed, then re-escaped
//!
//! The transform is pure and idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
//! [`text_content`] recovers the matchable text from canonical markup.

pub mod html;

use std::collections::HashSet;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::config::SanitizerConfig;
use html::Token;

/// Elements that never have content or a closing tag
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr"];

/// Elements whose boundaries separate words in the extracted text
const BLOCK_TAGS: &[&str] = &[
    "blockquote", "br", "div", "hr", "li", "ol", "p", "pre", "ul",
];

/// URL schemes accepted in `<a href>`
const SAFE_URL_SCHEMES: &[&str] = &["http:", "https:", "mailto:"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizationError {
    #[error("Input too large: {len} bytes exceeds limit of {max} bytes")]
    InputTooLarge { len: usize, max: usize },
}

impl SanitizationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputTooLarge { .. } => "INPUT_TOO_LARGE",
        }
    }
}

/// Configured rich-text normaliser. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    allowed: HashSet<String>,
    forbidden: HashSet<String>,
    max_input_bytes: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&SanitizerConfig::default())
    }
}

impl Sanitizer {
    pub fn new(config: &SanitizerConfig) -> Self {
        let lower = |tags: &[String]| -> HashSet<String> {
            tags.iter().map(|t| t.to_ascii_lowercase()).collect()
        };
        Self {
            allowed: lower(&config.allowed_tags),
            forbidden: lower(&config.forbidden_tags),
            max_input_bytes: config.max_input_bytes,
        }
    }

    /// Produce canonical markup for `input`.
    pub fn sanitize(&self, input: &str) -> Result<String, SanitizationError> {
        if input.len() > self.max_input_bytes {
            return Err(SanitizationError::InputTooLarge {
                len: input.len(),
                max: self.max_input_bytes,
            });
        }

        let mut out = Canonical::with_capacity(input.len());
        // (tag, nesting depth) of the forbidden element being skipped
        let mut skipping: Option<(String, usize)> = None;

        for token in html::tokenize(input) {
            if let Some((skip_name, depth)) = skipping.as_mut() {
                match &token {
                    Token::StartTag { name, self_closing: false, .. }
                        if name.as_str() == skip_name.as_str() =>
                    {
                        *depth += 1;
                    }
                    Token::EndTag { name } if name.as_str() == skip_name.as_str() => {
                        *depth -= 1;
                    }
                    _ => {}
                }
                if *depth == 0 {
                    skipping = None;
                }
                continue;
            }

            match token {
                Token::Text(text) => out.push_text(&text),
                Token::StartTag { name, attrs, self_closing } => {
                    let void = VOID_TAGS.contains(&name.as_str());
                    if self.forbidden.contains(&name) {
                        if !self_closing && !void {
                            skipping = Some((name, 1));
                        }
                    } else if self.allowed.contains(&name) {
                        let href = if name == "a" { safe_href(&attrs) } else { None };
                        out.open(name, href, void);
                    }
                }
                Token::EndTag { name } => {
                    if self.allowed.contains(&name) && !VOID_TAGS.contains(&name.as_str()) {
                        out.close(&name);
                    }
                }
            }
        }

        Ok(out.finish())
    }
}

/// Keep an `href` only when it is relative or uses a safe scheme.
fn safe_href(attrs: &[(String, String)]) -> Option<String> {
    let (_, value) = attrs.iter().find(|(name, _)| name == "href")?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let lowered = value.to_ascii_lowercase();
    let scheme_end = lowered.find(|c: char| c == ':' || c == '/' || c == '?' || c == '#');
    let has_scheme = matches!(scheme_end, Some(i) if lowered.as_bytes()[i] == b':');
    if !has_scheme || SAFE_URL_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Output builder that buffers text until the next emitted tag so runs that
/// span unwrapped or dropped tags normalise as one.
struct Canonical {
    out: String,
    pending: String,
    open: Vec<String>,
}

impl Canonical {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            pending: String::new(),
            open: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    fn flush(&mut self, at_end: bool) {
        if self.pending.is_empty() {
            return;
        }
        let mut text = normalize_text(&self.pending);
        self.pending.clear();

        if self.out.is_empty() {
            text = text.trim_start().to_string();
        }
        if at_end {
            text.truncate(text.trim_end().len());
        }
        html::escape_text(&text, &mut self.out);
    }

    fn open(&mut self, name: String, href: Option<String>, void: bool) {
        self.flush(false);
        self.out.push('<');
        self.out.push_str(&name);
        if let Some(href) = href {
            self.out.push_str(" href=\"");
            html::escape_attr(&href, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');
        if !void {
            self.open.push(name);
        }
    }

    /// Close `name` and anything opened inside it. Unmatched end tags are dropped.
    fn close(&mut self, name: &str) {
        let Some(idx) = self.open.iter().rposition(|n| n == name) else {
            return;
        };
        self.flush(false);
        for tag in self.open.drain(idx..).rev() {
            self.out.push_str("</");
            self.out.push_str(&tag);
            self.out.push('>');
        }
    }

    fn finish(mut self) -> String {
        self.flush(true);
        for tag in self.open.drain(..).rev() {
            self.out.push_str("</");
            self.out.push_str(&tag);
            self.out.push('>');
        }
        self.out
    }
}

/// NFKC-fold, drop control and zero-width characters, collapse whitespace runs.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;

    for c in text.nfkc() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
            continue;
        }
        if c.is_control() || is_invisible(c) {
            continue;
        }
        out.push(c);
        in_space = false;
    }
    out
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'
    )
}

/// Matchable text of canonical markup: tags are removed, block boundaries
/// become spaces, inline boundaries join.
pub fn text_content(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    for token in html::tokenize(markup) {
        match token {
            Token::Text(text) => out.push_str(&text),
            Token::StartTag { name, .. } | Token::EndTag { name } => {
                if BLOCK_TAGS.contains(&name.as_str()) {
                    out.push(' ');
                }
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
