//! Answer acceptance rules and the per-question attempt state machine.

/// Fixed answer returned when the document does not support an answer.
pub const SENTINEL_ANSWER: &str = "This information is not specified in the policy document.";

/// Answers of this many characters or fewer are rejected outright.
pub const MIN_ANSWER_CHARS: usize = 10;

/// Answers containing a generic phrase are rejected below this length.
pub const GENERIC_ANSWER_LIMIT: usize = 100;

/// Phrases marking a non-answer.
pub const GENERIC_PHRASES: [&str; 6] = [
    "not specified",
    "not mentioned",
    "not found",
    "not available",
    "not provided",
    "no information",
];

/// Whether `text` fails the length and genericness rules.
pub fn is_rejected(text: &str) -> bool {
    let trimmed = text.trim();
    let length = trimmed.chars().count();
    if length <= MIN_ANSWER_CHARS {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    let generic = GENERIC_PHRASES.iter().any(|phrase| lowered.contains(phrase));
    generic && length < GENERIC_ANSWER_LIMIT
}

/// Progress of one question through the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// No attempt made yet.
    Pending,
    /// `n` attempts made, all rejected; another one is allowed.
    Retrying(u32),
    /// Latest attempt produced an acceptable answer.
    Accepted,
    /// Every allowed attempt was rejected.
    Exhausted,
}

impl AttemptState {
    /// Whether the loop has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }

    /// 1-based number of the attempt about to run; zero once terminal.
    pub fn next_attempt(self) -> u32 {
        match self {
            Self::Pending => 1,
            Self::Retrying(made) => made + 1,
            Self::Accepted | Self::Exhausted => 0,
        }
    }
}

/// Bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct AttemptPolicy {
    max_attempts: u32,
}

impl AttemptPolicy {
    /// Policy allowing `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Maximum attempts per question.
    pub fn max_attempts(self) -> u32 {
        self.max_attempts
    }

    /// Whether attempt number `attempt`, which produced `text`, should be followed by another.
    pub fn should_retry(self, attempt: u32, text: &str) -> bool {
        is_rejected(text) && attempt < self.max_attempts
    }

    /// State after attempt `state.next_attempt()` finished. `None` marks a failed attempt.
    pub fn advance(self, state: AttemptState, outcome: Option<&str>) -> AttemptState {
        if state.is_terminal() {
            return state;
        }
        let attempt = state.next_attempt();
        let text = outcome.unwrap_or_default();
        if !is_rejected(text) {
            AttemptState::Accepted
        } else if self.should_retry(attempt, text) {
            AttemptState::Retrying(attempt)
        } else {
            AttemptState::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_answers_are_rejected() {
        assert!(is_rejected(""));
        assert!(is_rejected("   Yes.   "));
        assert!(is_rejected("0123456789"));
        assert!(!is_rejected("30 days grace."));
    }

    #[test]
    fn generic_answers_are_rejected_only_when_short() {
        assert!(is_rejected("The answer is not available in the provided document."));
        assert!(is_rejected(SENTINEL_ANSWER));
        let long = "Cosmetic surgery is not mentioned as covered, but reconstructive surgery after \
                    an accident is covered up to the sum insured under section 4.2.";
        assert!(long.len() >= GENERIC_ANSWER_LIMIT);
        assert!(!is_rejected(long));
    }

    #[test]
    fn should_retry_respects_attempt_bound() {
        let policy = AttemptPolicy::new(3);
        assert!(policy.should_retry(1, "Not found."));
        assert!(policy.should_retry(2, "Not found."));
        assert!(!policy.should_retry(3, "Not found."));
        assert!(!policy.should_retry(1, "The grace period is 30 days."));
    }

    #[test]
    fn state_machine_walks_to_exhaustion() {
        let policy = AttemptPolicy::new(3);
        let mut state = AttemptState::Pending;
        let mut attempts = 0;
        while !state.is_terminal() {
            attempts += 1;
            assert_eq!(state.next_attempt(), attempts);
            state = policy.advance(state, None);
        }
        assert_eq!(state, AttemptState::Exhausted);
        assert_eq!(attempts, 3);
    }

    #[test]
    fn state_machine_accepts_on_retry() {
        let policy = AttemptPolicy::new(3);
        let state = policy.advance(AttemptState::Pending, Some("not found"));
        assert_eq!(state, AttemptState::Retrying(1));
        let state = policy.advance(state, Some("Entry age is 18 to 65 years."));
        assert_eq!(state, AttemptState::Accepted);
        assert_eq!(policy.advance(state, None), AttemptState::Accepted);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let policy = AttemptPolicy::new(0);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(
            policy.advance(AttemptState::Pending, Some("no")),
            AttemptState::Exhausted
        );
    }
}
