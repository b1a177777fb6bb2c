//! Minimal HTML tokenizer, entity decoder and escapers
//!
//! Only what the sanitizer needs: start/end tags with attributes and
//! entity-decoded text runs. Comments, doctypes and processing instructions
//! are consumed and produce nothing. A `<` that does not open well-formed
//! markup is kept as literal text. The content of raw-text elements
//! (`script`, `style`, `textarea`, ...) is a single text run up to the
//! matching end tag.

use std::borrow::Cow;

use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity};

/// One lexical unit of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Entity-decoded character data
    Text(String),
    StartTag {
        /// Lowercased tag name
        name: String,
        /// Lowercased attribute names with entity-decoded values
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
}

/// Split `input` into tokens. Adjacent text separated only by comments is
/// merged into a single `Text` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut raw_text = String::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(lt) = rest.find('<') else {
            raw_text.push_str(rest);
            break;
        };
        raw_text.push_str(&rest[..lt]);
        pos += lt;

        match parse_markup(&input[pos..]) {
            Some((token, consumed)) => {
                pos += consumed;
                let Some(token) = token else { continue };
                if !raw_text.is_empty() {
                    tokens.push(Token::Text(decode_entities(&raw_text)));
                    raw_text.clear();
                }

                let content = raw_text_content(&token);
                tokens.push(token);
                if let Some((name, kind)) = content {
                    let len = raw_text_len(&input[pos..], &name);
                    let content = &input[pos..pos + len];
                    if !content.is_empty() {
                        tokens.push(Token::Text(match kind {
                            RawText::Escapable => decode_entities(content),
                            RawText::Literal => content.to_string(),
                        }));
                    }
                    pos += len;
                }
            }
            None => {
                raw_text.push('<');
                pos += 1;
            }
        }
    }

    if !raw_text.is_empty() {
        tokens.push(Token::Text(decode_entities(&raw_text)));
    }
    tokens
}

/// How the content of a raw-text element is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawText {
    /// Character references are not decoded
    Literal,
    /// Character references are decoded, markup is not
    Escapable,
}

const RAW_TEXT_TAGS: &[(&str, RawText)] = &[
    ("iframe", RawText::Literal),
    ("noembed", RawText::Literal),
    ("noframes", RawText::Literal),
    ("noscript", RawText::Literal),
    ("script", RawText::Literal),
    ("style", RawText::Literal),
    ("xmp", RawText::Literal),
    ("textarea", RawText::Escapable),
    ("title", RawText::Escapable),
];

/// Raw-text element opened by `token`, if any.
fn raw_text_content(token: &Token) -> Option<(String, RawText)> {
    let Token::StartTag { name, self_closing: false, .. } = token else {
        return None;
    };
    RAW_TEXT_TAGS
        .iter()
        .find(|(tag, _)| *tag == name.as_str())
        .map(|(_, kind)| (name.clone(), *kind))
}

/// Bytes of `s` before the end tag `</name` (any case), or all of `s`.
fn raw_text_len(s: &str, name: &str) -> usize {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(idx) = s[from..].find("</") {
        let at = from + idx;
        let after = &bytes[at + 2..];
        let name_matches = after.len() >= name.len()
            && after[..name.len()].eq_ignore_ascii_case(name.as_bytes())
            && after
                .get(name.len())
                .map_or(true, |b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>');
        if name_matches {
            return at;
        }
        from = at + 2;
    }
    s.len()
}

/// Parse markup at the start of `s` (which begins with `<`).
///
/// Returns the produced token (None for comments and declarations) and the
/// number of bytes consumed, or None when `s` is not markup.
fn parse_markup(s: &str) -> Option<(Option<Token>, usize)> {
    if let Some(body) = s.strip_prefix("<!--") {
        // An unterminated comment swallows the remainder, as browsers do.
        let consumed = body.find("-->").map_or(s.len(), |end| 4 + end + 3);
        return Some((None, consumed));
    }
    if s.starts_with("<!") || s.starts_with("<?") {
        let end = s.find('>')?;
        return Some((None, end + 1));
    }
    if let Some(body) = s.strip_prefix("</") {
        if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return None;
        }
        let name_len = tag_name_len(body);
        let end = body.find('>')?;
        let name = body[..name_len].to_ascii_lowercase();
        return Some((Some(Token::EndTag { name }), 2 + end + 1));
    }

    let body = &s[1..];
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = tag_name_len(body);
    let name = body[..name_len].to_ascii_lowercase();
    let (attrs, self_closing, attr_consumed) = parse_attributes(&body[name_len..])?;

    Some((
        Some(Token::StartTag {
            name,
            attrs,
            self_closing,
        }),
        1 + name_len + attr_consumed,
    ))
}

fn tag_name_len(s: &str) -> usize {
    s.find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(s.len())
}

/// Parse the attribute section of a start tag up to and including `>`.
fn parse_attributes(s: &str) -> Option<(Vec<(String, String)>, bool, usize)> {
    let mut attrs = Vec::new();
    let mut pos = 0;
    let mut self_closing = false;

    loop {
        let rest = &s[pos..];
        let c = rest.chars().next()?;

        if c == '>' {
            return Some((attrs, self_closing, pos + 1));
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if c == '/' {
            self_closing = true;
            pos += 1;
            continue;
        }
        self_closing = false;

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_len].to_ascii_lowercase();
        pos += name_len;

        let after_name = &s[pos..];
        let trimmed = after_name.trim_start();
        if let Some(value_part) = trimmed.strip_prefix('=') {
            pos += after_name.len() - trimmed.len() + 1;
            let value_ws = value_part.len() - value_part.trim_start().len();
            pos += value_ws;
            let value_part = &s[pos..];

            let (raw_value, consumed) = match value_part.chars().next()? {
                quote @ ('"' | '\'') => {
                    let close = value_part[1..].find(quote)?;
                    (&value_part[1..1 + close], close + 2)
                }
                _ => {
                    let len = value_part
                        .find(|c: char| c.is_whitespace() || c == '>')
                        .unwrap_or(value_part.len());
                    (&value_part[..len], len)
                }
            };
            pos += consumed;
            attrs.push((name, decode_entities(raw_value)));
        } else {
            attrs.push((name, String::new()));
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Longest reference body we attempt to resolve
const MAX_ENTITY_LEN: usize = 32;

/// Decode character references against the full HTML5 table. Unknown or
/// malformed references are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        match resolve_entity(rest) {
            Some((value, consumed)) => {
                out.push_str(&value);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve a reference at the start of `s` (which begins with `&`).
fn resolve_entity(s: &str) -> Option<(Cow<'static, str>, usize)> {
    let body = &s[1..];
    let semi = body.find(';')?;
    if semi == 0 || semi > MAX_ENTITY_LEN {
        return None;
    }
    let name = &body[..semi];

    let value = if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        let ch = match char::from_u32(code) {
            Some('\0') | None => '\u{FFFD}',
            Some(c) => c,
        };
        Cow::Owned(ch.to_string())
    } else {
        Cow::Borrowed(
            resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))?,
        )
    };

    Some((value, 1 + semi + 1))
}

/// Escape character data for emission inside an element.
pub fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token {
        Token::StartTag {
            name: name.to_string(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    #[test]
    fn test_tokenize_basic_markup() {
        let tokens = tokenize("you <I>damn</i> fool");
        assert_eq!(
            tokens,
            vec![
                Token::Text("you ".to_string()),
                start("i"),
                Token::Text("damn".to_string()),
                Token::EndTag { name: "i".to_string() },
                Token::Text(" fool".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_attributes() {
        let tokens = tokenize(r#"<a HREF="https://x.test/?a=1&amp;b=2" target=_blank data-x>"#);
        match &tokens[0] {
            Token::StartTag { name, attrs, self_closing } => {
                assert_eq!(name, "a");
                assert!(!self_closing);
                assert_eq!(attrs[0], ("href".to_string(), "https://x.test/?a=1&b=2".to_string()));
                assert_eq!(attrs[1], ("target".to_string(), "_blank".to_string()));
                assert_eq!(attrs[2], ("data-x".to_string(), String::new()));
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn test_self_closing_and_comments() {
        let tokens = tokenize("a<!-- hidden -->b<br/>c");
        assert_eq!(tokens[0], Token::Text("ab".to_string()));
        assert!(matches!(&tokens[1], Token::StartTag { name, self_closing: true, .. } if name == "br"));
        assert_eq!(tokens[2], Token::Text("c".to_string()));
    }

    #[test]
    fn test_stray_angle_brackets_are_text() {
        assert_eq!(tokenize("1 < 2 > 0"), vec![Token::Text("1 < 2 > 0".to_string())]);
        assert_eq!(tokenize("<b unterminated"), vec![Token::Text("<b unterminated".to_string())]);
        assert_eq!(tokenize(r#"<a href="x>"#), vec![Token::Text(r#"<a href="x>"#.to_string())]);
    }

    #[test]
    fn test_unterminated_comment_swallows_rest() {
        assert_eq!(tokenize("keep<!-- gone"), vec![Token::Text("keep".to_string())]);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#100;&#x61;mn"), "damn");
        assert_eq!(decode_entities("&bogus; & &;"), "&bogus; & &;");
        assert_eq!(decode_entities("&#0;"), "\u{FFFD}");
    }

    #[test]
    fn test_decode_html5_named_entities() {
        assert_eq!(decode_entities("caf&eacute; &uuml;ber ma&ntilde;ana"), "café über mañana");
        assert_eq!(decode_entities("a&nbsp;b&hellip;"), "a\u{00A0}b\u{2026}");
        assert_eq!(decode_entities("&rarr; &euro;"), "\u{2192} \u{20AC}");
        assert_eq!(decode_entities("&eacute"), "&eacute");
    }

    #[test]
    fn test_raw_text_elements_do_not_parse_markup() {
        let tokens = tokenize("<style>a<b{}</style> you damn fool");
        assert_eq!(
            tokens,
            vec![
                start("style"),
                Token::Text("a<b{}".to_string()),
                Token::EndTag { name: "style".to_string() },
                Token::Text(" you damn fool".to_string()),
            ]
        );

        let tokens = tokenize("<SCRIPT>if (a</b) {}</Script >x");
        assert_eq!(tokens[1], Token::Text("if (a</b) {}".to_string()));
        assert_eq!(tokens[3], Token::Text("x".to_string()));

        let tokens = tokenize("<textarea>&lt;i&gt; <i>raw</i></textarea>");
        assert_eq!(tokens[1], Token::Text("<i> <i>raw</i>".to_string()));
    }

    #[test]
    fn test_unterminated_raw_text_runs_to_end() {
        assert_eq!(
            tokenize("<script>a < b"),
            vec![start("script"), Token::Text("a < b".to_string())]
        );
    }

    #[test]
    fn test_escape_roundtrip() {
        let original = "a < b & \"c\" > d";
        let mut escaped = String::new();
        escape_attr(original, &mut escaped);
        assert_eq!(decode_entities(&escaped), original);

        let mut text = String::new();
        escape_text("&amp;", &mut text);
        assert_eq!(text, "&amp;amp;");
        assert_eq!(decode_entities(&text), "&amp;");
    }
}
