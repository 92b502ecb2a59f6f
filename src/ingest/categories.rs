//! Fixed topical taxonomy for policy passages.
//!
//! Every passage is tagged by case-insensitive keyword matching against a per-category lexicon.
//! A passage may match several categories; one that matches nothing is tagged `general`.

use serde::Serialize;
use std::fmt;

/// Closed set of categories a passage can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Waiting and cooling-off periods before cover applies.
    WaitingPeriod,
    /// Pre-existing diseases and conditions.
    PreExisting,
    /// Maternity, childbirth and newborn cover.
    Maternity,
    /// Benefits payable: sum assured, maturity, death benefit.
    Benefits,
    /// Premium amounts, frequency and grace periods.
    Premium,
    /// Optional riders and add-ons.
    Riders,
    /// Exclusions and non-covered events.
    Exclusions,
    /// Tax treatment of premiums and payouts.
    TaxBenefits,
    /// Entry age and eligibility rules.
    Eligibility,
    /// Claims procedure and settlement.
    Claims,
    /// Surrender, policy loans, lapse and revival.
    Surrender,
    /// Anything that matched no other category.
    General,
}

const LEXICON: &[(Category, &[&str])] = &[
    (
        Category::WaitingPeriod,
        &["waiting period", "cooling period", "moratorium", "cooling-off"],
    ),
    (
        Category::PreExisting,
        &["pre-existing", "pre existing", "ped", "prior condition"],
    ),
    (
        Category::Maternity,
        &["maternity", "pregnancy", "childbirth", "newborn", "delivery"],
    ),
    (
        Category::Benefits,
        &[
            "benefit",
            "sum assured",
            "maturity",
            "death benefit",
            "payout",
            "bonus",
        ],
    ),
    (
        Category::Premium,
        &["premium", "installment", "instalment", "grace period", "payment frequency"],
    ),
    (Category::Riders, &["rider", "add-on", "add on", "optional cover"]),
    (
        Category::Exclusions,
        &["exclusion", "excluded", "not covered", "shall not be liable", "suicide"],
    ),
    (
        Category::TaxBenefits,
        &["tax", "80c", "80d", "10(10d)", "income tax"],
    ),
    (
        Category::Eligibility,
        &["entry age", "eligib", "minimum age", "maximum age", "age at entry"],
    ),
    (
        Category::Claims,
        &["claim", "settlement", "cashless", "reimbursement", "intimation"],
    ),
    (
        Category::Surrender,
        &["surrender", "policy loan", "lapse", "revival", "reinstatement", "free look"],
    ),
];

impl Category {
    /// Stable snake_case label used in payloads and prompts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingPeriod => "waiting_period",
            Self::PreExisting => "pre_existing",
            Self::Maternity => "maternity",
            Self::Benefits => "benefits",
            Self::Premium => "premium",
            Self::Riders => "riders",
            Self::Exclusions => "exclusions",
            Self::TaxBenefits => "tax_benefits",
            Self::Eligibility => "eligibility",
            Self::Claims => "claims",
            Self::Surrender => "surrender",
            Self::General => "general",
        }
    }

    /// Parse a label produced by [`Category::as_str`].
    pub fn from_label(label: &str) -> Option<Self> {
        LEXICON
            .iter()
            .map(|(category, _)| *category)
            .chain(std::iter::once(Self::General))
            .find(|category| category.as_str() == label.trim())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag a passage with every category whose lexicon it mentions.
///
/// Short keywords (`ped`, `tax`) only match whole words so that e.g. "stopped" does not count
/// as a pre-existing disease mention.
pub fn categorize(text: &str) -> Vec<Category> {
    let lowered = text.to_lowercase();
    let mut categories: Vec<Category> = LEXICON
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|keyword| mentions(&lowered, keyword))
        })
        .map(|(category, _)| *category)
        .collect();

    if categories.is_empty() {
        categories.push(Category::General);
    }
    categories
}

fn mentions(haystack: &str, keyword: &str) -> bool {
    if keyword.len() > 3 {
        return haystack.contains(keyword);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_can_carry_multiple_categories() {
        let categories = categorize(
            "A waiting period of 36 months applies to Pre-Existing Diseases declared at proposal.",
        );
        assert!(categories.contains(&Category::WaitingPeriod));
        assert!(categories.contains(&Category::PreExisting));
        assert!(!categories.contains(&Category::General));
    }

    #[test]
    fn unmatched_passage_is_general() {
        assert_eq!(
            categorize("The registered office is located in Mumbai."),
            vec![Category::General]
        );
    }

    #[test]
    fn short_keywords_require_word_boundaries() {
        assert_eq!(
            categorize("Payments stopped after the merger was completed."),
            vec![Category::General]
        );
        assert!(categorize("PED cover starts after 48 months").contains(&Category::PreExisting));
    }

    #[test]
    fn labels_round_trip() {
        for category in [Category::TaxBenefits, Category::General, Category::Riders] {
            assert_eq!(Category::from_label(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_label("unknown"), None);
    }
}
