//! Text analysis feeding the generators: keyword extraction, sentence
//! ranking and rough difficulty estimation.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::Difficulty;

pub const MIN_KEYWORD_LEN: usize = 5;
pub const MAX_PROMPT_CONTENT: usize = 1500;
const WORDS_PER_MINUTE: usize = 200;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "always", "among", "an",
    "and", "another", "any", "are", "around", "as", "at", "be", "because", "been", "before",
    "being", "below", "between", "both", "but", "by", "can", "cannot", "could", "did", "does",
    "doing", "down", "during", "each", "either", "every", "few", "for", "from", "further", "had",
    "has", "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his",
    "how", "however", "if", "in", "into", "is", "it", "its", "itself", "just", "many", "may",
    "might", "more", "most", "much", "must", "my", "myself", "neither", "no", "nor", "not", "now",
    "of", "off", "often", "on", "once", "only", "or", "other", "others", "ought", "our", "ours",
    "ourselves", "out", "over", "own", "same", "several", "she", "should", "since", "so", "some",
    "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "therefore", "these", "they", "this", "those", "though", "through", "thus", "to", "too",
    "under", "until", "up", "upon", "very", "was", "we", "were", "what", "whatever", "when",
    "where", "whereas", "whether", "which", "while", "who", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

const IMPORTANCE_KEYWORDS: &[&str] = &[
    "important", "significant", "crucial", "essential", "key", "main", "primary", "fundamental",
    "critical", "major", "principal", "central", "vital",
];

const DEFINITION_MARKERS: &[&str] = &[" is ", " are ", " means ", " refers to ", " defined as ", " known as "];

const CAUSAL_WORDS: &[&str] = &["because", "therefore", "thus", "consequently", "as a result", "due to"];

const COMMON_ENGLISH: &[&str] = &[
    "the", "and", "is", "in", "to", "of", "a", "that", "it", "with", "for", "as", "was", "on",
    "are", "by", "this", "be", "at", "from",
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[^\p{L}\p{N}\s]")
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\s+")
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[^.!?]+[.!?]*")
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Candidate study terms in first-seen order.
///
/// Lower-cases the text, turns punctuation into word breaks and drops short
/// tokens and stopwords. At most `max_terms` are returned.
pub fn extract_keywords(text: &str, max_terms: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = punctuation_re().replace_all(&lowered, " ");

    let mut terms: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        if terms.len() >= max_terms {
            break;
        }
        if token.chars().count() < MIN_KEYWORD_LEN || is_stopword(token) {
            continue;
        }
        if !terms.iter().any(|t| t == token) {
            terms.push(token.to_string());
        }
    }
    terms
}

pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_re()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collapses whitespace, drops unusual symbols and keeps the content short
/// enough for a prompt, cutting on sentence boundaries.
pub fn preprocess_content(content: &str) -> String {
    static ALLOWED: OnceLock<Regex> = OnceLock::new();
    let normalized = whitespace_re().replace_all(content.trim(), " ");
    let cleaned = regex(&ALLOWED, r#"[^\w\s.,!?;:()\-'"]"#).replace_all(&normalized, "");

    if cleaned.chars().count() <= MAX_PROMPT_CONTENT {
        return cleaned.into_owned();
    }

    let mut out = String::new();
    for sentence in split_sentences(&cleaned) {
        if out.chars().count() + sentence.chars().count() + 1 > MAX_PROMPT_CONTENT {
            break;
        }
        out.push_str(&sentence);
        out.push(' ');
    }

    if out.trim().is_empty() {
        return cleaned.chars().take(MAX_PROMPT_CONTENT).collect();
    }
    out.trim().to_string()
}

pub fn sentence_importance(sentence: &str) -> f64 {
    let sentence = sentence.trim();
    if sentence.is_empty() {
        return 0.0;
    }

    let lower = sentence.to_lowercase();
    let word_count = sentence.split_whitespace().count();
    let mut score = 0.0;

    // Prefer medium-length sentences
    if (10..=25).contains(&word_count) {
        score += 2.0;
    } else if (8..=30).contains(&word_count) {
        score += 1.0;
    }

    score += 1.5 * IMPORTANCE_KEYWORDS.iter().filter(|k| lower.contains(*k)).count() as f64;
    score += DEFINITION_MARKERS.iter().filter(|m| lower.contains(*m)).count() as f64;
    score += CAUSAL_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;

    if sentence.chars().any(|c| c.is_ascii_digit()) {
        score += 0.5;
    }

    if word_count < 5 || word_count > 40 {
        score -= 1.0;
    }

    score.max(0.0)
}

/// Sentences ordered by importance, highest first. Ties keep input order.
pub fn rank_sentences(sentences: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = sentences
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| (sentence_importance(s), s))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, s)| s.trim().to_string()).collect()
}

pub fn extract_headers(content: &str) -> Vec<String> {
    static MARKDOWN: OnceLock<Regex> = OnceLock::new();
    static NUMBERED: OnceLock<Regex> = OnceLock::new();
    let markdown = regex(&MARKDOWN, r"(?m)^#+\s+(.+)$");
    let numbered = regex(&NUMBERED, r"(?m)^\d+\.?\s+([A-Z][^.\n]{10,60})$");

    let mut headers: Vec<String> = Vec::new();
    let found = markdown
        .captures_iter(content)
        .chain(numbered.captures_iter(content))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()));

    for header in found {
        if header.is_empty() || header.split_whitespace().count() > 10 || headers.contains(&header) {
            continue;
        }
        headers.push(header);
    }
    headers.truncate(10);
    headers
}

/// Vowel-group approximation with a silent trailing 'e'.
pub fn count_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut count = 0;
    let mut prev_vowel = false;

    for c in word.chars() {
        let vowel = "aeiouy".contains(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }

    if word.ends_with('e') && count > 1 {
        count -= 1;
    }
    count.max(1)
}

pub fn estimate_difficulty(content: &str) -> Difficulty {
    let words: Vec<String> = content.split_whitespace().map(|w| w.to_lowercase()).collect();
    if words.is_empty() {
        return Difficulty::Beginner;
    }
    let sentences = split_sentences(content).len().max(1);

    let avg_sentence_len = words.len() as f64 / sentences as f64;
    let avg_word_len = words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
    let complex = words
        .iter()
        .filter(|w| w.chars().count() >= 7 || count_syllables(w) >= 3)
        .count() as f64
        / words.len() as f64;

    let mut score = 0;
    score += if avg_sentence_len > 20.0 { 2 } else if avg_sentence_len > 15.0 { 1 } else { 0 };
    score += if avg_word_len > 6.0 { 2 } else if avg_word_len > 5.0 { 1 } else { 0 };
    score += if complex > 0.3 { 2 } else if complex > 0.2 { 1 } else { 0 };

    match score {
        s if s >= 4 => Difficulty::Advanced,
        s if s >= 2 => Difficulty::Intermediate,
        _ => Difficulty::Beginner,
    }
}

pub fn is_primarily_english(text: &str) -> bool {
    let words: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
    if words.is_empty() {
        return false;
    }
    let common = words.iter().filter(|w| COMMON_ENGLISH.contains(&w.as_str())).count();
    common as f64 / words.len() as f64 > 0.1
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub char_count: usize,
    pub paragraph_count: usize,
    pub reading_minutes: usize,
    pub difficulty: Difficulty,
    pub headers: Vec<String>,
    pub key_sentences: Vec<String>,
}

pub fn analyze_content(content: &str) -> ContentStats {
    let sentences = split_sentences(content);
    let word_count = content.split_whitespace().count();
    let mut key_sentences = rank_sentences(&sentences);
    key_sentences.truncate(10);

    ContentStats {
        word_count,
        sentence_count: sentences.len(),
        char_count: content.chars().count(),
        paragraph_count: content.split("\n\n").filter(|p| !p.trim().is_empty()).count(),
        reading_minutes: ((word_count as f64 / WORDS_PER_MINUTE as f64).round() as usize).max(1),
        difficulty: estimate_difficulty(content),
        headers: extract_headers(content),
        key_sentences,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Advisory checks on submitted study text. Never blocks generation.
pub fn validate_content(content: &str) -> ContentValidation {
    let mut v = ContentValidation {
        is_valid: true,
        ..Default::default()
    };

    if content.trim().chars().count() < 100 {
        v.is_valid = false;
        v.issues.push("Content is too short. Please provide at least 100 characters.".to_string());
    }
    if content.chars().count() > 50_000 {
        v.warnings.push("Content is very long. Consider breaking it into smaller sections.".to_string());
    }
    if !is_primarily_english(content) {
        v.warnings.push("Content does not look like English; generated material may be weaker.".to_string());
    }
    if split_sentences(content).len() < 5 {
        v.warnings.push("Content has very few sentences. More detail produces better material.".to_string());
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHOTOSYNTHESIS: &str = "Photosynthesis is the process plants use to convert light into chemical energy. \
        Chlorophyll absorbs sunlight inside the chloroplasts. \
        The energy is stored as glucose, which plants consume during respiration.";

    #[test]
    fn test_short_words_yield_no_keywords() {
        assert!(extract_keywords("The cat sat on the mat", 10).is_empty());
    }

    #[test]
    fn test_keywords_in_first_seen_order() {
        let terms = extract_keywords(PHOTOSYNTHESIS, 5);
        assert_eq!(terms, vec!["photosynthesis", "process", "plants", "convert", "light"]);
    }

    #[test]
    fn test_punctuation_separates_words() {
        let terms = extract_keywords("cell-division happens.Mitochondria matter", 10);
        assert_eq!(terms, vec!["division", "happens", "mitochondria", "matter"]);
    }

    #[test]
    fn test_keywords_dedup_and_punctuation() {
        let terms = extract_keywords("Enzymes, enzymes! ENZYMES catalyse reactions; reactions.", 10);
        assert_eq!(terms, vec!["enzymes", "catalyse", "reactions"]);
    }

    #[test]
    fn test_keywords_skip_stopwords() {
        let terms = extract_keywords("Because therefore however between mitochondria", 10);
        assert_eq!(terms, vec!["mitochondria"]);
    }

    #[test]
    fn test_keywords_respect_limit() {
        assert_eq!(extract_keywords(PHOTOSYNTHESIS, 2).len(), 2);
        assert!(extract_keywords(PHOTOSYNTHESIS, 0).is_empty());
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("One fact. Another fact! A question? trailing");
        assert_eq!(s, vec!["One fact.", "Another fact!", "A question?", "trailing"]);
    }

    #[test]
    fn test_preprocess_collapses_whitespace() {
        assert_eq!(preprocess_content("  cells \n\n divide\tquickly  "), "cells divide quickly");
    }

    #[test]
    fn test_preprocess_truncates_on_sentence_boundary() {
        let sentence = "Cells divide through mitosis in many tissues. ";
        let long = sentence.repeat(100);
        let out = preprocess_content(&long);
        assert!(out.chars().count() <= MAX_PROMPT_CONTENT);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn test_rank_prefers_definitions() {
        let sentences = vec![
            "Short one.".to_string(),
            "Osmosis is the essential movement of water across a membrane because of concentration.".to_string(),
        ];
        let ranked = rank_sentences(&sentences);
        assert!(ranked[0].starts_with("Osmosis"));
    }

    #[test]
    fn test_count_syllables() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("table"), 1);
        assert_eq!(count_syllables("banana"), 3);
        assert_eq!(count_syllables("rhythm"), 1);
    }

    #[test]
    fn test_estimate_difficulty() {
        assert_eq!(estimate_difficulty("The cat sat. The dog ran."), Difficulty::Beginner);
        let dense = "Thermodynamically, electrochemical potentials characterize heterogeneous \
                     catalytic mechanisms within multiphase electrolytic configurations.";
        assert_eq!(estimate_difficulty(dense), Difficulty::Advanced);
    }

    #[test]
    fn test_extract_headers() {
        let doc = "# Cell Biology\nIntro text.\n1. Structure of the membrane\n## Cell Biology\n";
        assert_eq!(extract_headers(doc), vec!["Cell Biology", "Structure of the membrane"]);
    }

    #[test]
    fn test_analyze_content() {
        let stats = analyze_content(PHOTOSYNTHESIS);
        assert_eq!(stats.sentence_count, 3);
        assert_eq!(stats.paragraph_count, 1);
        assert_eq!(stats.reading_minutes, 1);
        assert_eq!(stats.key_sentences.len(), 3);
    }

    #[test]
    fn test_validate_content() {
        let short = validate_content("The cat sat on the mat");
        assert!(!short.is_valid);
        assert_eq!(short.issues.len(), 1);

        let long = format!("{} {}", PHOTOSYNTHESIS, PHOTOSYNTHESIS);
        let ok = validate_content(&long);
        assert!(ok.is_valid);
    }
}
