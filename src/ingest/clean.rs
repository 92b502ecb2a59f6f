//! Repairs for text extraction artifacts.
//!
//! PDF text extraction fuses words across layout boundaries ("coverageFor", "30days") and
//! scatters numeric tokens ("Rs . 5 , 000", "10 %"). Each repair is an independent pure
//! function; [`clean_passage`] applies them in order.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static FUSED_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").expect("valid fused-case pattern"));
static DIGIT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)([A-Za-z]+)").expect("valid digit-word pattern"));
static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s+%").expect("valid percent pattern"));
static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s*,\s+(\d{3})\b").expect("valid thousands pattern"));
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)\s+\.\s*(\d)").expect("valid decimal pattern"));
static RUPEES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Rs|INR)\s*(\.?)\s*(\d)").expect("valid rupee pattern")
});
static CURRENCY_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([₹$€£])\s+(\d)").expect("valid currency pattern"));
static DURATION_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)\s*-\s*(days?|months?|years?|weeks?)\b").expect("valid duration pattern")
});

const ORDINAL_SUFFIXES: [&str; 4] = ["st", "nd", "rd", "th"];

/// Apply every repair in order.
pub fn clean_passage(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = split_fused_words(&text);
    let text = split_digit_words(&text);
    normalize_numeric_tokens(&text)
}

/// Replace runs of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Insert a space where a lowercase letter runs straight into an uppercase one.
pub fn split_fused_words(text: &str) -> String {
    FUSED_CASE.replace_all(text, "$1 $2").into_owned()
}

/// Insert a space between a number and a following word.
///
/// Ordinal suffixes (`1st`, `22nd`) and single-letter section codes (`80C`, `10D`) are kept.
pub fn split_digit_words(text: &str) -> String {
    DIGIT_WORD
        .replace_all(text, |caps: &Captures<'_>| {
            let digit = &caps[1];
            let word = &caps[2];
            let lowered = word.to_ascii_lowercase();
            let is_ordinal = ORDINAL_SUFFIXES.contains(&lowered.as_str());
            let is_section_code = word.len() == 1 && word.chars().all(|c| c.is_ascii_uppercase());
            if is_ordinal || is_section_code {
                format!("{digit}{word}")
            } else {
                format!("{digit} {word}")
            }
        })
        .into_owned()
}

/// Tighten spacing inside currency, percentage, decimal and duration tokens.
pub fn normalize_numeric_tokens(text: &str) -> String {
    let text = PERCENT.replace_all(text, "$1%");
    let text = DECIMAL.replace_all(&text, "$1.$2");
    let text = THOUSANDS.replace_all(&text, "$1,$2");
    let text = RUPEES.replace_all(&text, |caps: &Captures<'_>| {
        format!("{}{} {}", &caps[1], &caps[2], &caps[3])
    });
    let text = CURRENCY_SYMBOL.replace_all(&text, "$1$2");
    DURATION_DASH.replace_all(&text, "$1-$2").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_of_whitespace() {
        assert_eq!(
            collapse_whitespace("  Sum\n\nassured \t is   payable "),
            "Sum assured is payable"
        );
    }

    #[test]
    fn splits_case_fused_words() {
        assert_eq!(
            split_fused_words("coverageFor hospitalisationExpenses"),
            "coverage For hospitalisation Expenses"
        );
    }

    #[test]
    fn splits_numbers_from_words_but_keeps_codes() {
        assert_eq!(split_digit_words("after 30days"), "after 30 days");
        assert_eq!(split_digit_words("aged 18Years"), "aged 18 Years");
        assert_eq!(split_digit_words("under Section 80C"), "under Section 80C");
        assert_eq!(split_digit_words("the 2nd year"), "the 2nd year");
    }

    #[test]
    fn normalizes_numeric_tokens() {
        assert_eq!(normalize_numeric_tokens("a 10 % discount"), "a 10% discount");
        assert_eq!(normalize_numeric_tokens("Rs . 5, 000"), "Rs. 5,000");
        assert_eq!(normalize_numeric_tokens("INR5000"), "INR 5000");
        assert_eq!(normalize_numeric_tokens("₹ 2,500"), "₹2,500");
        assert_eq!(normalize_numeric_tokens("2 . 5 lakh"), "2.5 lakh");
        assert_eq!(normalize_numeric_tokens("a 30 - day period"), "a 30-day period");
    }

    #[test]
    fn clean_passage_applies_all_steps() {
        let raw = "Minimum entry age is 18years and\nmaximum is 65 years.The premium is Rs . 12, 000";
        assert_eq!(
            clean_passage(raw),
            "Minimum entry age is 18 years and maximum is 65 years.The premium is Rs. 12,000"
        );
    }
}
