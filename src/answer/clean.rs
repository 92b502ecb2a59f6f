//! Declarative answer normalization.
//!
//! An answer passes through an ordered list of [`CleanStep`]s. Each step is a pure
//! `String -> String` function, so pipelines can be reordered or trimmed in tests.

use crate::ingest::clean::{collapse_whitespace, normalize_numeric_tokens};
use regex::Regex;
use std::sync::LazyLock;

/// Named normalization applied to a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanStep {
    /// Remove hedging, recommendations, citation labels and answer prefixes.
    StripHedges,
    /// Join lines and collapse whitespace into a single paragraph.
    CollapseWhitespace,
    /// Replace a "the policy does not ..." refusal with the qualifying clause that follows
    /// `however`, `but` or `although`, when that clause carries content.
    RecoverQualifiedClause,
    /// Tighten currency, percentage and decimal spacing.
    NormalizeNumbers,
    /// Drop leading list markers and quotes, then uppercase the first letter.
    Capitalize,
    /// Make sure the answer ends in `.`, `!` or `?`.
    TerminateSentence,
    /// Shorten to at most this many characters, at a sentence boundary when possible.
    CapLength(usize),
}

impl CleanStep {
    /// Apply this step.
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::StripHedges => strip_hedges(text),
            Self::CollapseWhitespace => collapse_whitespace(text),
            Self::RecoverQualifiedClause => recover_qualified_clause(text),
            Self::NormalizeNumbers => normalize_numeric_tokens(text),
            Self::Capitalize => capitalize(text),
            Self::TerminateSentence => terminate_sentence(text),
            Self::CapLength(max_chars) => cap_length(text, max_chars),
        }
    }
}

/// Standard pipeline ending with a `max_chars` ceiling.
pub fn default_pipeline(max_chars: usize) -> Vec<CleanStep> {
    vec![
        CleanStep::StripHedges,
        CleanStep::CollapseWhitespace,
        CleanStep::RecoverQualifiedClause,
        CleanStep::NormalizeNumbers,
        CleanStep::Capitalize,
        CleanStep::TerminateSentence,
        CleanStep::CapLength(max_chars),
    ]
}

/// Run `text` through `steps` in order.
pub fn clean_answer(text: &str, steps: &[CleanStep]) -> String {
    steps
        .iter()
        .fold(text.to_string(), |current, step| step.apply(&current))
}

static PASSAGE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\[\s*passage\s+\d+[^\]]*\]").expect("valid passage label pattern")
});
static ANSWER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:answer\s*:\s*|(?:according to|based on|as per) the (?:provided |given )?(?:policy |insurance )?(?:document|context|policy|passages?)\s*,?\s*)",
    )
    .expect("valid answer prefix pattern")
});
static NOT_EXPLICIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)the provided (?:policy )?(?:document|context) does not explicitly mention.*?however,\s*")
        .expect("valid hedge pattern")
});

const HEDGE_OPENERS: [&str; 16] = [
    "typically",
    "usually",
    "generally",
    "in the insurance industry",
    "standard practice",
    "based on industry",
    "based on common",
    "it is recommended",
    "please refer",
    "for detailed",
    "you might",
    "if you're looking",
    "please note",
    "note that",
    "it's important to note",
    "it is important to note",
];

const NEGATIVE_OPENERS: [&str; 3] = ["the policy does not", "this policy does not", "no mention"];

/// Qualifiers tried in order; the capture ends at the first sentence stop.
static QUALIFIED_CLAUSES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    ["however", "but", "although"].map(|word| {
        Regex::new(&format!(r"(?i)\b{word}[,\s]+(.*?)(?:\.(?:\s|$)|$)"))
            .expect("valid qualifier pattern")
    })
});

/// Shortest clause worth keeping over the refusal it qualifies.
const MIN_QUALIFIED_CHARS: usize = 20;

fn strip_hedges(text: &str) -> String {
    let text = PASSAGE_LABEL.replace_all(text, "");
    let text = NOT_EXPLICIT.replace_all(&text, "");
    let text = ANSWER_PREFIX.replace(&text, "");
    let text = text.trim().trim_matches('"').trim();

    let kept: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|sentence| {
            let lowered = sentence.trim_start().to_lowercase();
            !HEDGE_OPENERS
                .iter()
                .any(|opener| lowered.starts_with(opener))
        })
        .collect();
    kept.join(" ")
}

fn recover_qualified_clause(text: &str) -> String {
    let lowered = text.trim_start().to_lowercase();
    if !NEGATIVE_OPENERS
        .iter()
        .any(|opener| lowered.starts_with(opener))
    {
        return text.to_string();
    }
    QUALIFIED_CLAUSES
        .iter()
        .find_map(|pattern| {
            let clause = pattern.captures(text)?.get(1)?.as_str().trim();
            (clause.chars().count() > MIN_QUALIFIED_CHARS).then(|| clause.to_string())
        })
        .unwrap_or_else(|| text.to_string())
}

// Answers opening with a digit or currency sign are left as they are.
fn capitalize(text: &str) -> String {
    let body = text
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '\u{2022}' | '"') || c.is_whitespace());
    let mut chars = body.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
        _ => body.to_string(),
    }
}

fn terminate_sentence(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(['.', '!', '?']) {
        return trimmed.to_string();
    }
    let base = trimmed.trim_end_matches([',', ';', ':', '-']).trim_end();
    format!("{base}.")
}

fn cap_length(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut kept = String::new();
    for sentence in split_sentences(text) {
        let candidate = if kept.is_empty() {
            sentence.to_string()
        } else {
            format!("{kept} {sentence}")
        };
        if candidate.chars().count() > max_chars {
            break;
        }
        kept = candidate;
    }
    if !kept.is_empty() {
        return kept;
    }

    let budget = max_chars.saturating_sub(1);
    let prefix: String = text.chars().take(budget).collect();
    let cut = match prefix.rfind(char::is_whitespace) {
        Some(position) if position > 0 => &prefix[..position],
        _ => prefix.as_str(),
    };
    let cut = cut.trim_end_matches(|c: char| !c.is_alphanumeric());
    format!("{cut}.")
}

const ABBREVIATIONS: [&str; 10] = ["rs", "no", "nos", "e.g", "i.e", "etc", "vs", "dr", "mr", "sr"];

/// Split into sentences at `.`, `!` or `?` followed by whitespace.
///
/// Common abbreviations (`Rs.`, `No.`, `e.g.`) and single capital initials do not end a
/// sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((position, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = iter.peek().is_some_and(|(_, next)| next.is_whitespace());
        if !followed_by_space {
            continue;
        }
        if c == '.' && ends_with_abbreviation(&text[start..position]) {
            continue;
        }
        let end = position + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn ends_with_abbreviation(before: &str) -> bool {
    let word = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(['(', '"']);
    let lowered = word.to_lowercase();
    if ABBREVIATIONS.contains(&lowered.as_str()) {
        return true;
    }
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(first), None) if first.is_uppercase())
}
