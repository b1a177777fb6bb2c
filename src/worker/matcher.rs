//! Phrase matching engine
//!
//! Each (tenant, category) phrase set compiles to two automata over the same
//! boundary-aware patterns:
//!
//! - a leftmost-longest alternation, scanned left to right to order matches
//!   by first appearance
//! - a `RegexSet`, so phrases hidden by an overlapping longer match (e.g.
//!   "damn" inside "damn it") are still reported
//!
//! Matching is case-insensitive. A phrase edge that is a word character must
//! sit on a word boundary, so "ass" never matches inside "class".

use std::borrow::Cow;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use tracing::{debug, info};

use super::MatchEngine;
use crate::sanitizer::{normalize_text, text_content};
use crate::types::{
    error_code, InitializationPayload, MatchResult, ProcessPayload, WordListCategory, WorkerError,
};

// ============================================================================
// Locale casing
// ============================================================================

/// Locale-specific case folding applied before case-insensitive matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocaleFold {
    Default,
    /// Turkish / Azerbaijani dotted and dotless i
    Turkic,
}

impl LocaleFold {
    fn for_locale(locale: &str) -> Self {
        let language = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "tr" | "az" => LocaleFold::Turkic,
            _ => LocaleFold::Default,
        }
    }

    fn apply<'a>(&self, s: &'a str) -> Cow<'a, str> {
        match self {
            LocaleFold::Turkic if s.contains(['I', 'İ']) => Cow::Owned(
                s.chars()
                    .map(|c| match c {
                        'I' => 'ı',
                        'İ' => 'i',
                        other => other,
                    })
                    .collect(),
            ),
            _ => Cow::Borrowed(s),
        }
    }
}

// ============================================================================
// Compiled word list
// ============================================================================

/// One tenant's phrase set for one category, ready for matching
#[derive(Debug, Clone)]
pub struct CompiledWordList {
    locale: String,
    version: u64,
    fold: LocaleFold,
    /// Normalised phrases; index aligned with `set`
    phrases: Vec<String>,
    /// Case-folded phrase → index into `phrases`
    lookup: HashMap<String, usize>,
    scanner: Option<Regex>,
    set: Option<RegexSet>,
}

impl CompiledWordList {
    /// Normalise, de-duplicate and compile `phrases`. Blank phrases are ignored.
    pub fn compile(
        locale: &str,
        version: u64,
        phrases: &[String],
        size_limit: usize,
    ) -> Result<Self, regex::Error> {
        let fold = LocaleFold::for_locale(locale);

        let mut normalized: Vec<String> = Vec::with_capacity(phrases.len());
        let mut lookup = HashMap::with_capacity(phrases.len());
        for raw in phrases {
            let phrase = normalize_text(raw).trim().to_string();
            if phrase.is_empty() {
                continue;
            }
            let key = match_key(&fold.apply(&phrase));
            if lookup.contains_key(&key) {
                continue;
            }
            lookup.insert(key, normalized.len());
            normalized.push(phrase);
        }

        let (scanner, set) = if normalized.is_empty() {
            (None, None)
        } else {
            let patterns: Vec<String> = normalized
                .iter()
                .map(|p| phrase_pattern(&fold.apply(p)))
                .collect();

            // Longest first so the scanner prefers "damn it" over "damn" at
            // the same position.
            let mut by_length: Vec<usize> = (0..patterns.len()).collect();
            by_length.sort_by_key(|&i| std::cmp::Reverse(normalized[i].chars().count()));
            let alternation = by_length
                .iter()
                .map(|&i| patterns[i].as_str())
                .collect::<Vec<_>>()
                .join("|");

            let scanner = RegexBuilder::new(&format!("(?:{alternation})"))
                .case_insensitive(true)
                .size_limit(size_limit)
                .build()?;
            let set = RegexSetBuilder::new(&patterns)
                .case_insensitive(true)
                .size_limit(size_limit)
                .build()?;
            (Some(scanner), Some(set))
        };

        Ok(Self {
            locale: locale.to_string(),
            version,
            fold,
            phrases: normalized,
            lookup,
            scanner,
            set,
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Phrases occurring in `text`, ordered by first appearance, each once.
    pub fn find_matches(&self, text: &str) -> Vec<String> {
        let (Some(scanner), Some(set)) = (&self.scanner, &self.set) else {
            return Vec::new();
        };

        let normalized = normalize_text(text);
        let haystack = self.fold.apply(&normalized);

        let mut seen = vec![false; self.phrases.len()];
        let mut found = Vec::new();

        for m in scanner.find_iter(&haystack) {
            if let Some(&idx) = self.lookup.get(&match_key(m.as_str())) {
                if !seen[idx] {
                    seen[idx] = true;
                    found.push(idx);
                }
            }
        }
        for idx in set.matches(&haystack).iter() {
            if !seen[idx] {
                seen[idx] = true;
                found.push(idx);
            }
        }

        found.into_iter().map(|i| self.phrases[i].clone()).collect()
    }
}

/// Case-folded, whitespace-collapsed form used to map matched text back to
/// its phrase
fn match_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Regex for one normalised phrase: literal words joined by `\s+`, anchored
/// on word boundaries wherever the phrase edge is a word character.
fn phrase_pattern(phrase: &str) -> String {
    let body = phrase
        .split(' ')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");

    let starts_word = phrase.chars().next().is_some_and(is_word_char);
    let ends_word = phrase.chars().last().is_some_and(is_word_char);

    format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        body,
        if ends_word { r"\b" } else { "" }
    )
}

// ============================================================================
// Engine
// ============================================================================

/// Default [`MatchEngine`]: per-tenant, per-category compiled word lists
#[derive(Debug)]
pub struct PhraseMatcher {
    lists: HashMap<String, HashMap<WordListCategory, CompiledWordList>>,
    regex_size_limit: usize,
}

impl PhraseMatcher {
    pub fn new(regex_size_limit: usize) -> Self {
        Self {
            lists: HashMap::new(),
            regex_size_limit,
        }
    }

    pub fn list(&self, tenant_id: &str, category: WordListCategory) -> Option<&CompiledWordList> {
        self.lists.get(tenant_id).and_then(|m| m.get(&category))
    }
}

impl MatchEngine for PhraseMatcher {
    fn initialize(&mut self, payload: InitializationPayload) -> Result<u64, WorkerError> {
        // Version 0 is unversioned and always applies.
        if let Some(held) = self.list(&payload.tenant_id, payload.category) {
            if payload.version != 0 && payload.version < held.version() {
                debug!(
                    tenant_id = %payload.tenant_id,
                    category = %payload.category,
                    incoming = payload.version,
                    held = held.version(),
                    "Ignoring stale word list"
                );
                return Ok(held.version());
            }
        }

        let compiled = CompiledWordList::compile(
            &payload.locale,
            payload.version,
            &payload.phrases,
            self.regex_size_limit,
        )
        .map_err(|e| WorkerError::new(error_code::INVALID_PHRASES, e.to_string()))?;

        info!(
            tenant_id = %payload.tenant_id,
            category = %payload.category,
            locale = %payload.locale,
            version = payload.version,
            phrases = compiled.len(),
            "Word list replaced"
        );

        self.lists
            .entry(payload.tenant_id)
            .or_default()
            .insert(payload.category, compiled);
        Ok(payload.version)
    }

    fn process(&mut self, payload: &ProcessPayload) -> Result<MatchResult, WorkerError> {
        let Some(list) = self.list(&payload.tenant_id, payload.category) else {
            return Ok(MatchResult::no_match());
        };
        let text = text_content(&payload.test_string);
        Ok(MatchResult::from_matches(list.find_matches(&text)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::REGEX_SIZE_LIMIT_BYTES;

    fn compile(phrases: &[&str]) -> CompiledWordList {
        compile_for("en", phrases)
    }

    fn compile_for(locale: &str, phrases: &[&str]) -> CompiledWordList {
        let phrases: Vec<String> = phrases.iter().map(|s| s.to_string()).collect();
        CompiledWordList::compile(locale, 1, &phrases, REGEX_SIZE_LIMIT_BYTES).unwrap()
    }

    #[test]
    fn test_case_insensitive_boundary_match() {
        let list = compile(&["damn"]);
        assert_eq!(list.find_matches("you DAMN fool"), vec!["damn"]);
        assert_eq!(list.find_matches("damn!"), vec!["damn"]);
        assert!(list.find_matches("damnation").is_empty());
        assert!(list.find_matches("goddamn").is_empty());
    }

    #[test]
    fn test_ordered_by_first_appearance_and_deduplicated() {
        let list = compile(&["fool", "damn"]);
        assert_eq!(
            list.find_matches("damn you fool, damn it"),
            vec!["damn", "fool"]
        );
    }

    #[test]
    fn test_overlapping_phrases_all_reported() {
        let list = compile(&["damn", "damn it"]);
        assert_eq!(list.find_matches("oh damn it all"), vec!["damn it", "damn"]);
    }

    #[test]
    fn test_multi_word_phrase_spans_whitespace() {
        let list = compile(&["  go   away "]);
        assert_eq!(list.find_matches("please go\n\taway now"), vec!["go away"]);
        assert!(list.find_matches("goaway").is_empty());
    }

    #[test]
    fn test_punctuation_edges() {
        let list = compile(&["$hit", "f*ck"]);
        assert_eq!(list.find_matches("what the f*ck, $hit"), vec!["f*ck", "$hit"]);
        assert!(list.find_matches("$hitty").is_empty());
    }

    #[test]
    fn test_blank_and_duplicate_phrases_ignored() {
        let list = compile(&["", "   ", "Damn", "damn"]);
        assert_eq!(list.len(), 1);
        assert_eq!(list.find_matches("damn"), vec!["Damn"]);
        assert!(compile(&[]).find_matches("anything").is_empty());
    }

    #[test]
    fn test_turkic_casing() {
        let list = compile_for("tr-TR", &["İstanbul"]);
        assert_eq!(list.find_matches("istanbul"), vec!["İstanbul"]);
        assert_eq!(list.locale(), "tr-TR");
    }

    fn init_payload(version: u64, phrases: &[&str]) -> InitializationPayload {
        InitializationPayload {
            tenant_id: "tenantA".to_string(),
            locale: "en".to_string(),
            category: WordListCategory::Banned,
            phrases: phrases.iter().map(|s| s.to_string()).collect(),
            version,
        }
    }

    fn process_payload(category: WordListCategory, text: &str) -> ProcessPayload {
        ProcessPayload {
            tenant_id: "tenantA".to_string(),
            category,
            test_string: text.to_string(),
        }
    }

    #[test]
    fn test_engine_replaces_and_scopes_by_category() {
        let mut engine = PhraseMatcher::new(REGEX_SIZE_LIMIT_BYTES);
        assert_eq!(engine.initialize(init_payload(1, &["damn"])), Ok(1));

        let hit = engine
            .process(&process_payload(WordListCategory::Banned, "you <i>damn</i> fool"))
            .unwrap();
        assert_eq!(hit, MatchResult::from_matches(vec!["damn".to_string()]));

        let other_category = engine
            .process(&process_payload(WordListCategory::Suspect, "damn"))
            .unwrap();
        assert_eq!(other_category, MatchResult::no_match());

        // Full replacement, not a merge
        engine.initialize(init_payload(2, &["heck"])).unwrap();
        let replaced = engine
            .process(&process_payload(WordListCategory::Banned, "damn heck"))
            .unwrap();
        assert_eq!(replaced.matches, vec!["heck"]);
    }

    #[test]
    fn test_engine_ignores_stale_versions() {
        let mut engine = PhraseMatcher::new(REGEX_SIZE_LIMIT_BYTES);
        engine.initialize(init_payload(5, &["new"])).unwrap();
        assert_eq!(engine.initialize(init_payload(3, &["old"])), Ok(5));

        let result = engine
            .process(&process_payload(WordListCategory::Banned, "old new"))
            .unwrap();
        assert_eq!(result.matches, vec!["new"]);
    }

    #[test]
    fn test_engine_rejects_oversized_lists() {
        let mut engine = PhraseMatcher::new(16);
        let err = engine.initialize(init_payload(1, &["a rather long phrase indeed"])).unwrap_err();
        assert_eq!(err.code, error_code::INVALID_PHRASES);
    }
}
