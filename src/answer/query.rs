//! Retrieval-side question expansion.

/// Topic keywords and the retrieval terms appended when a question mentions them.
///
/// The first matching topic wins.
const EXPANSIONS: [(&str, &str); 12] = [
    ("entry age", "minimum maximum entry age eligibility"),
    ("maturity benefit", "maturity benefit sum assured policy term"),
    ("death benefit", "death benefit sum assured nominee"),
    ("rider", "rider add-on additional benefit"),
    ("premium", "premium payment frequency terms"),
    ("policy loan", "policy loan advance surrender"),
    ("free look", "free look period cancellation"),
    ("suicide", "suicide exclusion clause"),
    ("revival", "revival reinstatement lapse"),
    ("tax benefit", "tax benefit 80C 10(10D) deduction"),
    ("waiting period", "waiting period months continuous coverage"),
    ("pre-existing", "pre-existing disease waiting period declared"),
];

/// Retrieval query for `question`: the trimmed question plus related terms for a known topic.
pub fn expand_question(question: &str) -> String {
    let trimmed = question.trim();
    let lowered = trimmed.to_lowercase();
    EXPANSIONS
        .iter()
        .find(|(topic, _)| lowered.contains(topic))
        .map_or_else(
            || trimmed.to_string(),
            |(_, terms)| format!("{trimmed} {terms}"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_topics_are_expanded() {
        assert_eq!(
            expand_question(" What is the Entry Age? "),
            "What is the Entry Age? minimum maximum entry age eligibility"
        );
    }

    #[test]
    fn first_matching_topic_wins() {
        let expanded = expand_question("Is there a rider premium?");
        assert!(expanded.ends_with("rider add-on additional benefit"));
    }

    #[test]
    fn unknown_topics_pass_through() {
        assert_eq!(expand_question("Who is the insurer?"), "Who is the insurer?");
    }
}
