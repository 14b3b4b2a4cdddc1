//! Rule-based response validation
//!
//! A [`ResponseValidator`] holds a registry of named rules. Callers pass a
//! [`ValidationRules`] set (rule name to parameter) and get back every
//! failure, not just the first one.

pub mod rules;

use crate::events::{AikitEvent, SharedSink, TracingSink};
use crate::protocol::types::NormalizedResponse;
use chrono::{DateTime, Utc};
use rules::RuleResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A validation rule: response text and rule parameter in, verdict out
pub type RuleFn = Arc<dyn Fn(&str, &Value) -> RuleResult + Send + Sync>;

/// Ordered rule set requested for one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ValidationRules {
    rules: Vec<(String, Value)>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a rule by name
    pub fn rule(mut self, name: impl Into<String>, param: impl Into<Value>) -> Self {
        let name = name.into();
        let param = param.into();
        match self.rules.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = param,
            None => self.rules.push((name, param)),
        }
        self
    }

    pub fn max_length(self, limit: usize) -> Self {
        self.rule("maxLength", limit)
    }

    pub fn min_length(self, limit: usize) -> Self {
        self.rule("minLength", limit)
    }

    pub fn must_include<S: AsRef<str>>(self, keywords: &[S]) -> Self {
        self.rule("mustInclude", keyword_list(keywords))
    }

    pub fn must_not_include<S: AsRef<str>>(self, keywords: &[S]) -> Self {
        self.rule("mustNotInclude", keyword_list(keywords))
    }

    /// json, email, url, number or markdown
    pub fn format(self, format: &str) -> Self {
        self.rule("format", format)
    }

    /// korean, english, japanese, chinese or numbers
    pub fn language(self, language: &str) -> Self {
        self.rule("language", language)
    }

    pub fn sentiment(self, sentiment: &str) -> Self {
        self.rule("sentiment", sentiment)
    }

    pub fn regex(self, pattern: &str) -> Self {
        self.rule("regex", pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.rules.iter().map(|(name, param)| (name.as_str(), param))
    }
}

fn keyword_list<S: AsRef<str>>(keywords: &[S]) -> Value {
    Value::Array(
        keywords
            .iter()
            .map(|kw| Value::String(kw.as_ref().to_string()))
            .collect(),
    )
}

impl From<Map<String, Value>> for ValidationRules {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter()
            .fold(ValidationRules::new(), |rules, (name, param)| rules.rule(name, param))
    }
}

impl From<ValidationRules> for Map<String, Value> {
    fn from(rules: ValidationRules) -> Self {
        rules.rules.into_iter().collect()
    }
}

/// Result of validating one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub passed: bool,
    /// One entry per failed rule, in rule order
    pub failure_reasons: Vec<String>,
    /// Requested rules that are not registered
    pub skipped_rules: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

impl ValidationOutcome {
    fn from_failures(failure_reasons: Vec<String>, skipped_rules: Vec<String>) -> Self {
        Self {
            passed: failure_reasons.is_empty(),
            failure_reasons,
            skipped_rules,
            validated_at: Utc::now(),
        }
    }
}

/// Registry of named rules
pub struct ResponseValidator {
    rules: Vec<(String, RuleFn)>,
    events: SharedSink,
}

impl fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("rules", &self.available_rules())
            .finish()
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseValidator {
    /// Validator with every built-in rule registered
    pub fn new() -> Self {
        let mut validator = Self {
            rules: Vec::new(),
            events: Arc::new(TracingSink),
        };

        validator.add_rule("maxLength", rules::max_length);
        validator.add_rule("minLength", rules::min_length);
        validator.add_rule("mustInclude", rules::must_include);
        validator.add_rule("mustNotInclude", rules::must_not_include);
        validator.add_rule("format", rules::format);
        validator.add_rule("language", rules::language);
        validator.add_rule("sentiment", rules::sentiment);
        validator.add_rule("regex", rules::regex);
        validator
    }

    pub fn with_events(mut self, events: SharedSink) -> Self {
        self.events = events;
        self
    }

    /// Register a rule, replacing any rule with the same name
    pub fn add_rule<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(&str, &Value) -> RuleResult + Send + Sync + 'static,
    {
        let name = name.into();
        let rule: RuleFn = Arc::new(rule);
        match self.rules.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = rule,
            None => self.rules.push((name, rule)),
        }
    }

    /// Returns whether a rule was removed
    pub fn remove_rule(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|(existing, _)| existing != name);
        self.rules.len() != before
    }

    pub fn available_rules(&self) -> Vec<String> {
        self.rules.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Run every requested rule against `text`
    pub fn validate(&self, text: &str, requested: &ValidationRules) -> ValidationOutcome {
        let mut failures = Vec::new();
        let mut skipped = Vec::new();

        for (name, param) in requested.iter() {
            let Some((_, rule)) = self.rules.iter().find(|(existing, _)| existing == name) else {
                self.events.emit(&AikitEvent::UnknownRule {
                    rule: name.to_string(),
                });
                skipped.push(name.to_string());
                continue;
            };

            if let Err(reason) = rule(text, param) {
                failures.push(reason);
            }
        }

        ValidationOutcome::from_failures(failures, skipped)
    }

    pub fn validate_response(
        &self,
        response: &NormalizedResponse,
        requested: &ValidationRules,
    ) -> ValidationOutcome {
        self.validate(&response.text, requested)
    }

    /// Run an ad-hoc check; a panicking check counts as a failure
    pub fn validate_custom<F>(&self, text: &str, check: F) -> ValidationOutcome
    where
        F: FnOnce(&str) -> Result<(), Vec<String>>,
    {
        let failures = match catch_unwind(AssertUnwindSafe(|| check(text))) {
            Ok(Ok(())) => Vec::new(),
            Ok(Err(reasons)) if reasons.is_empty() => vec!["Custom validation failed".to_string()],
            Ok(Err(reasons)) => reasons,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                vec![format!("Custom validation error: {}", detail)]
            }
        };

        ValidationOutcome::from_failures(failures, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use serde_json::json;

    #[test]
    fn test_max_length_single_reason() {
        let validator = ResponseValidator::new();
        let outcome = validator.validate("0123456789", &ValidationRules::new().max_length(5));
        assert!(!outcome.passed);
        assert_eq!(outcome.failure_reasons.len(), 1);

        let outcome = validator.validate("0123456789", &ValidationRules::new().max_length(20));
        assert!(outcome.passed);
        assert!(outcome.failure_reasons.is_empty());
    }

    #[test]
    fn test_collects_all_failures_in_order() {
        let validator = ResponseValidator::new();
        let rules = ValidationRules::new()
            .min_length(50)
            .must_include(&["rust"])
            .format("json");

        let outcome = validator.validate("short text", &rules);
        assert_eq!(outcome.failure_reasons.len(), 3);
        assert!(outcome.failure_reasons[0].starts_with("Response below minimum length"));
        assert!(outcome.failure_reasons[2].contains("JSON"));
    }

    #[test]
    fn test_unknown_rule_skipped_with_event() {
        let sink = Arc::new(RecordingSink::new());
        let validator = ResponseValidator::new().with_events(sink.clone());
        let rules = ValidationRules::new().rule("maxWords", 3).max_length(100);

        let outcome = validator.validate("fine", &rules);
        assert!(outcome.passed);
        assert_eq!(outcome.skipped_rules, vec!["maxWords"]);
        assert_eq!(sink.events(), vec![AikitEvent::UnknownRule { rule: "maxWords".into() }]);
    }

    #[test]
    fn test_add_and_remove_rule() {
        let mut validator = ResponseValidator::new();
        validator.add_rule("startsWith", |text: &str, param: &Value| {
            let prefix = param.as_str().unwrap_or_default();
            if text.starts_with(prefix) {
                Ok(())
            } else {
                Err(format!("Response does not start with '{}'", prefix))
            }
        });
        assert!(validator.available_rules().contains(&"startsWith".to_string()));

        let rules = ValidationRules::new().rule("startsWith", "Answer:");
        assert!(validator.validate("Answer: 42", &rules).passed);
        assert!(!validator.validate("42", &rules).passed);

        assert!(validator.remove_rule("startsWith"));
        assert!(!validator.remove_rule("startsWith"));
        assert_eq!(validator.validate("42", &rules).skipped_rules, vec!["startsWith"]);
    }

    #[test]
    fn test_validate_custom() {
        let validator = ResponseValidator::new();
        assert!(validator.validate_custom("ok", |_| Ok(())).passed);

        let outcome = validator.validate_custom("x", |_| Err(vec![]));
        assert_eq!(outcome.failure_reasons, vec!["Custom validation failed"]);

        let outcome = validator.validate_custom("x", |_| panic!("boom"));
        assert_eq!(outcome.failure_reasons, vec!["Custom validation error: boom"]);
    }

    #[test]
    fn test_rules_from_json_object() {
        let rules: ValidationRules =
            serde_json::from_value(json!({"maxLength": 5, "mustInclude": ["a"]})).unwrap();
        assert_eq!(rules.len(), 2);

        let rules = ValidationRules::new().max_length(5).max_length(7);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.iter().next(), Some(("maxLength", &json!(7))));
    }
}
