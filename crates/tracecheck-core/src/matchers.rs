//! Reusable predicates over raw values, used with
//! [`Provenance::matches`](crate::value::Provenance::matches) and the
//! `assert_that`/`expect_that` assertions.

use std::fmt;

use serde_json::Value;

use crate::collaborators::{
    levenshtein, ClassificationRequest, Classifier, ClassifierInput, EmbeddingScorer,
};
use crate::domain::{Result, TracecheckError};
use crate::value::json_kind;

pub trait Matcher {
    fn matches(&self, actual: &Value) -> Result<bool>;

    /// Short human-readable form, used in assertion messages.
    fn describe(&self) -> String;
}

fn expect_str<'a>(actual: &'a Value) -> Result<&'a str> {
    actual.as_str().ok_or(TracecheckError::TypeMismatch {
        expected: "string",
        actual: json_kind(actual),
    })
}

/// Matcher backed by a closure.
pub struct LambdaMatcher<F> {
    name: String,
    predicate: F,
}

impl<F: Fn(&Value) -> bool> LambdaMatcher<F> {
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F: Fn(&Value) -> bool> Matcher for LambdaMatcher<F> {
    fn matches(&self, actual: &Value) -> Result<bool> {
        Ok((self.predicate)(actual))
    }

    fn describe(&self) -> String {
        format!("LambdaMatcher({})", self.name)
    }
}

/// Plain substring containment. Strings only.
#[derive(Debug, Clone)]
pub struct HasSubstring {
    substring: String,
}

impl HasSubstring {
    pub fn new(substring: impl Into<String>) -> Self {
        Self {
            substring: substring.into(),
        }
    }
}

impl Matcher for HasSubstring {
    fn matches(&self, actual: &Value) -> Result<bool> {
        Ok(expect_str(actual)?.contains(&self.substring))
    }

    fn describe(&self) -> String {
        format!("HasSubstring({})", self.substring)
    }
}

/// How [`IsSimilar`] scores two strings.
#[derive(Clone, Copy)]
pub enum SimilarityMetric<'a> {
    Levenshtein,
    Embedding(&'a dyn EmbeddingScorer),
}

impl fmt::Debug for SimilarityMetric<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMetric::Levenshtein => f.write_str("levenshtein"),
            SimilarityMetric::Embedding(_) => f.write_str("embedding"),
        }
    }
}

/// Passes when the similarity score reaches `threshold`.
#[derive(Debug, Clone)]
pub struct IsSimilar<'a> {
    expected: String,
    threshold: f64,
    metric: SimilarityMetric<'a>,
}

impl IsSimilar<'static> {
    pub fn levenshtein(expected: impl Into<String>, threshold: f64) -> Self {
        Self {
            expected: expected.into(),
            threshold,
            metric: SimilarityMetric::Levenshtein,
        }
    }
}

impl<'a> IsSimilar<'a> {
    pub fn embedding(
        expected: impl Into<String>,
        threshold: f64,
        scorer: &'a dyn EmbeddingScorer,
    ) -> Self {
        Self {
            expected: expected.into(),
            threshold,
            metric: SimilarityMetric::Embedding(scorer),
        }
    }
}

impl Matcher for IsSimilar<'_> {
    fn matches(&self, actual: &Value) -> Result<bool> {
        let actual = expect_str(actual)?;
        let score = match self.metric {
            SimilarityMetric::Levenshtein => levenshtein(actual, &self.expected),
            SimilarityMetric::Embedding(scorer) => scorer.similarity(actual, &self.expected)?,
        };
        Ok(score >= self.threshold)
    }

    fn describe(&self) -> String {
        format!(
            "IsSimilar({:?}, {:?} >= {})",
            self.expected, self.metric, self.threshold
        )
    }
}

/// Required agreement between a submission and an expert answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Agreement {
    Fuzzy = 1,
    Strict = 2,
    SuperStrict = 3,
}

const FACTUAL_PROMPT: &str = "You are comparing a submitted answer to an expert answer on a given question. \
Compare the factual content of the submitted answer with the expert answer. Ignore any differences in style, grammar, or punctuation. \
Answer by selecting one of the following options:\n\
(0) There is a disagreement between the submitted answer and the expert answer.\n\
(1) The submitted answer is a subset of the expert answer and is fully consistent with it.\n\
(2) The submitted answer is a superset of the expert answer and is fully consistent with it.\n\
(3) The answers differ, but these differences don't matter from the perspective of factuality.\n\
(4) The submitted answer contains all the same details as the expert answer.";

/// Asks a classifier whether a string agrees factually with an expert
/// answer. Scores 0-4; passes at or above the requested [`Agreement`].
pub struct IsFactuallyEqual<'a> {
    expected: String,
    question: String,
    level: Agreement,
    classifier: &'a dyn Classifier,
}

impl<'a> IsFactuallyEqual<'a> {
    pub fn new(
        expected: impl Into<String>,
        question: impl Into<String>,
        level: Agreement,
        classifier: &'a dyn Classifier,
    ) -> Self {
        Self {
            expected: expected.into(),
            question: question.into(),
            level,
            classifier,
        }
    }
}

impl Matcher for IsFactuallyEqual<'_> {
    fn matches(&self, actual: &Value) -> Result<bool> {
        let actual = expect_str(actual)?;
        let request = ClassificationRequest {
            model: crate::value::string::DEFAULT_CLASSIFIER_MODEL.to_string(),
            prompt: FACTUAL_PROMPT.to_string(),
            options: (0..=4).map(|i| i.to_string()).collect(),
            input: ClassifierInput::Text(format!(
                "[Question]: {}\n[Expert]: {}\n[Submission]: {}",
                self.question, self.expected, actual
            )),
        };
        let answer = self.classifier.classify(&request)?;
        let score: i64 = answer.trim().parse().map_err(|_| {
            TracecheckError::Collaborator(format!("classifier returned invalid score {answer:?}"))
        })?;
        Ok(score >= self.level as i64)
    }

    fn describe(&self) -> String {
        format!("IsFactuallyEqual({:?}, {:?})", self.expected, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lambda_matcher() {
        let positive = LambdaMatcher::new("positive", |v: &Value| v.as_f64().is_some_and(|n| n > 0.0));
        assert!(positive.matches(&json!(3)).unwrap());
        assert!(!positive.matches(&json!(-1)).unwrap());
        assert_eq!(positive.describe(), "LambdaMatcher(positive)");
    }

    #[test]
    fn test_has_substring_rejects_non_strings() {
        let m = HasSubstring::new("wor");
        assert!(m.matches(&json!("hello world")).unwrap());
        assert!(matches!(
            m.matches(&json!(1)),
            Err(TracecheckError::TypeMismatch { expected: "string", .. })
        ));
    }

    #[test]
    fn test_is_similar_levenshtein() {
        let m = IsSimilar::levenshtein("kitten", 0.5);
        assert!(m.matches(&json!("sitting")).unwrap());
        assert!(!IsSimilar::levenshtein("kitten", 0.9)
            .matches(&json!("sitting"))
            .unwrap());
    }

    struct Fixed(f64);

    impl EmbeddingScorer for Fixed {
        fn similarity(&self, _: &str, _: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_is_similar_embedding_uses_scorer() {
        let scorer = Fixed(0.8);
        assert!(IsSimilar::embedding("x", 0.7, &scorer)
            .matches(&json!("y"))
            .unwrap());
        assert!(!IsSimilar::embedding("x", 0.9, &scorer)
            .matches(&json!("y"))
            .unwrap());
    }

    struct Answer(&'static str);

    impl Classifier for Answer {
        fn classify(&self, request: &ClassificationRequest) -> Result<String> {
            assert_eq!(request.options.len(), 5);
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_factual_equality_levels() {
        let three = Answer("3");
        let m = IsFactuallyEqual::new("Bern", "Capital of Switzerland?", Agreement::Strict, &three);
        assert!(m.matches(&json!("Bern is the capital")).unwrap());
        let two = Answer("2");
        let strict = IsFactuallyEqual::new("Bern", "q", Agreement::SuperStrict, &two);
        assert!(!strict.matches(&json!("Bern")).unwrap());
        let garbage = Answer("maybe");
        let broken = IsFactuallyEqual::new("Bern", "q", Agreement::Fuzzy, &garbage);
        assert!(matches!(
            broken.matches(&json!("Bern")),
            Err(TracecheckError::Collaborator(_))
        ));
    }
}
