//! Challenge question extraction.

use regex::Regex;

use crate::config::compile_pattern;
use crate::credentials::Credentials;
use crate::error::{Error, FailureReason, LoginStage, Result};

/// Finds the question keys a challenge page presents.
#[derive(Debug, Clone)]
pub struct QuestionScanner {
    marker: Regex,
}

impl QuestionScanner {
    /// Creates a scanner whose first capture group is a question key.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or has no capture group.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            marker: compile_pattern("challenge.question_pattern", pattern)?,
        })
    }

    /// Returns the question keys in page order, without duplicates.
    #[must_use]
    pub fn scan(&self, html: &str) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for caps in self.marker.captures_iter(html) {
            if let Some(key) = caps.get(1).map(|m| m.as_str())
                && !keys.iter().any(|k| k == key)
            {
                keys.push(key.to_string());
            }
        }
        keys
    }
}

/// Pairs each presented question with the caller's answer.
///
/// Nothing is returned unless every question is answered and the page shows
/// exactly `expected` questions; a partial answer set is never submitted.
pub(crate) fn answer_questions(
    keys: &[String],
    expected: usize,
    credentials: &Credentials,
) -> Result<Vec<(String, String)>> {
    if keys.len() != expected {
        return Err(Error::login_failed(
            LoginStage::Challenge,
            FailureReason::QuestionMismatch {
                expected,
                found: keys.len(),
            },
        ));
    }
    keys.iter()
        .map(|key| {
            credentials
                .answer(key)
                .map(|answer| (key.clone(), answer.to_string()))
                .ok_or_else(|| {
                    Error::login_failed(
                        LoginStage::Challenge,
                        FailureReason::MissingAnswer(key.clone()),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::config::ChallengeForm;

    const PAGE: &str = r#"<form method="post">
<span class="question" id="AnswerQ1.4span">In what year was your mother born?</span>
<input type="password" name="AnswerQ1.4" />
<span class="question" id="AnswerQ2.8span">What was the name of your first pet?</span>
<input type="password" name="AnswerQ2.8" />
</form>"#;

    fn scanner() -> QuestionScanner {
        QuestionScanner::new(&ChallengeForm::default().question_pattern).unwrap()
    }

    fn credentials() -> Credentials {
        Credentials::new("12345678", "987654", "2468")
            .with_answer("AnswerQ1.4", "1950")
            .with_answer("AnswerQ2.8", "Rex")
            .with_answer("AnswerQ3.1", "Springfield")
    }

    #[test]
    fn test_scan_keys_in_page_order() {
        assert_eq!(scanner().scan(PAGE), vec!["AnswerQ1.4", "AnswerQ2.8"]);
    }

    #[test]
    fn test_scan_ignores_duplicates() {
        let page = format!("{PAGE}\n<label for=\"x\" id=\"AnswerQ1.4span\"></label>");
        assert_eq!(scanner().scan(&page).len(), 2);
    }

    #[test]
    fn test_answers_from_superset() {
        let keys = scanner().scan(PAGE);
        let answers = answer_questions(&keys, 2, &credentials()).unwrap();
        assert_eq!(
            answers,
            vec![
                ("AnswerQ1.4".to_string(), "1950".to_string()),
                ("AnswerQ2.8".to_string(), "Rex".to_string()),
            ]
        );
    }

    #[test]
    fn test_question_count_mismatch() {
        let keys = vec!["AnswerQ1.4".to_string()];
        let err = answer_questions(&keys, 2, &credentials()).unwrap_err();
        assert!(matches!(
            err,
            Error::LoginFailed {
                stage: LoginStage::Challenge,
                reason: FailureReason::QuestionMismatch {
                    expected: 2,
                    found: 1
                }
            }
        ));
    }

    #[test]
    fn test_missing_answer() {
        let keys = vec!["AnswerQ1.4".to_string(), "AnswerQ9.9".to_string()];
        let err = answer_questions(&keys, 2, &credentials()).unwrap_err();
        match err {
            Error::LoginFailed {
                reason: FailureReason::MissingAnswer(key),
                ..
            } => assert_eq!(key, "AnswerQ9.9"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
