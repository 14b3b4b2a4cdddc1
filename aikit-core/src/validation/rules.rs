//! Built-in validation rules
//!
//! Each rule is a pure function of the response text and the rule's
//! parameter. A malformed parameter is reported as a failure, never a panic.

use regex::Regex;
use serde_json::Value;

/// `Ok(())` when the text satisfies the rule, otherwise the failure reason
pub type RuleResult = Result<(), String>;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "좋", "훌륭", "멋진",
];
const NEGATIVE_WORDS: &[&str] = &["bad", "poor", "terrible", "awful", "horrible", "나쁜", "끔찍", "최악"];
const NEUTRAL_WORDS: &[&str] = &["okay", "fine", "acceptable", "괜찮", "무난"];

fn expect_count(rule: &str, param: &Value) -> Result<usize, String> {
    param
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| format!("Invalid parameter for {}: expected a non-negative integer", rule))
}

fn expect_str<'a>(rule: &str, param: &'a Value) -> Result<&'a str, String> {
    param
        .as_str()
        .ok_or_else(|| format!("Invalid parameter for {}: expected a string", rule))
}

/// A single keyword or a list of keywords
fn expect_keywords(rule: &str, param: &Value) -> Result<Vec<String>, String> {
    match param {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("Invalid parameter for {}: keywords must be strings", rule))
            })
            .collect(),
        _ => Err(format!("Invalid parameter for {}: expected a list of keywords", rule)),
    }
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("Invalid regex pattern '{}': {}", pattern, e))
}

pub fn max_length(text: &str, param: &Value) -> RuleResult {
    let limit = expect_count("maxLength", param)?;
    let len = text.chars().count();
    if len > limit {
        return Err(format!("Response exceeds maximum length ({} > {})", len, limit));
    }
    Ok(())
}

pub fn min_length(text: &str, param: &Value) -> RuleResult {
    let limit = expect_count("minLength", param)?;
    let len = text.chars().count();
    if len < limit {
        return Err(format!("Response below minimum length ({} < {})", len, limit));
    }
    Ok(())
}

pub fn must_include(text: &str, param: &Value) -> RuleResult {
    let text = text.to_lowercase();
    let missing: Vec<String> = expect_keywords("mustInclude", param)?
        .into_iter()
        .filter(|kw| !text.contains(&kw.to_lowercase()))
        .collect();

    if !missing.is_empty() {
        return Err(format!("Response missing required keywords: {}", missing.join(", ")));
    }
    Ok(())
}

pub fn must_not_include(text: &str, param: &Value) -> RuleResult {
    let text = text.to_lowercase();
    let found: Vec<String> = expect_keywords("mustNotInclude", param)?
        .into_iter()
        .filter(|kw| text.contains(&kw.to_lowercase()))
        .collect();

    if !found.is_empty() {
        return Err(format!("Response contains forbidden keywords: {}", found.join(", ")));
    }
    Ok(())
}

pub fn format(text: &str, param: &Value) -> RuleResult {
    let format = expect_str("format", param)?;
    let (matched, error) = match format.to_lowercase().as_str() {
        "json" => (
            serde_json::from_str::<Value>(text).is_ok(),
            "Response is not valid JSON",
        ),
        "email" => (
            compile(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")?.is_match(text),
            "Response does not contain valid email",
        ),
        "url" => (
            compile(r"https?://[^\s]+")?.is_match(text),
            "Response does not contain valid URL",
        ),
        "number" => (
            text.chars().any(|c| c.is_ascii_digit()),
            "Response does not contain numbers",
        ),
        "markdown" => (
            text.chars().any(|c| matches!(c, '#' | '*' | '_' | '`' | '[' | ']')),
            "Response does not contain markdown formatting",
        ),
        _ => return Err(format!("Unknown format: {}", format)),
    };

    if matched {
        Ok(())
    } else {
        Err(error.to_string())
    }
}

pub fn language(text: &str, param: &Value) -> RuleResult {
    let lang = expect_str("language", param)?;
    let in_script: fn(char) -> bool = match lang.to_lowercase().as_str() {
        "korean" => |c| ('가'..='힣').contains(&c),
        "english" => |c| c.is_ascii_alphabetic(),
        "japanese" => |c| ('ぁ'..='ん').contains(&c) || ('ァ'..='ン').contains(&c),
        "chinese" => |c| ('\u{4e00}'..='\u{9fff}').contains(&c),
        "numbers" => |c| c.is_ascii_digit(),
        _ => return Err(format!("Unknown language: {}", lang)),
    };

    if !text.chars().any(in_script) {
        return Err(format!("Response does not contain {} characters", lang));
    }
    Ok(())
}

/// Keyword heuristic, not a classifier
pub fn sentiment(text: &str, param: &Value) -> RuleResult {
    let expected = expect_str("sentiment", param)?;
    let words: &[&str] = match expected.to_lowercase().as_str() {
        "positive" => POSITIVE_WORDS,
        "negative" => NEGATIVE_WORDS,
        "neutral" => NEUTRAL_WORDS,
        _ => &[],
    };

    let text = text.to_lowercase();
    if !words.iter().any(|word| text.contains(word)) {
        return Err(format!("Response does not match expected sentiment: {}", expected));
    }
    Ok(())
}

pub fn regex(text: &str, param: &Value) -> RuleResult {
    let pattern = expect_str("regex", param)?;
    if !compile(pattern)?.is_match(text) {
        return Err(format!("Response does not match pattern: {}", pattern));
    }
    Ok(())
}
