//! Ordered key/value pattern rules for eligibility report lines.
//!
//! Pure functions, no state: the segmenter decides *where* a pair goes, this
//! module only decides *what* the pair is. Rules are evaluated top to bottom
//! and the first match wins, so specific labelled patterns sit above the
//! generic "anything followed by an amount" catch-alls.

use once_cell::sync::Lazy;
use regex::Regex;

/// Where a rule takes its key from.
#[derive(Debug, Clone, Copy)]
enum KeySource {
    Group(usize),
    Fixed(&'static str),
}

/// A single compiled extraction rule.
pub struct KvRule {
    pub name: &'static str,
    regex: Regex,
    key: KeySource,
    value_group: usize,
}

impl KvRule {
    fn new(name: &'static str, pattern: &str, key: KeySource, value_group: usize) -> Self {
        Self {
            name,
            // Patterns are compile-time constants covered by tests.
            regex: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid rule {}: {}", name, e)),
            key,
            value_group,
        }
    }

    /// Apply this rule alone to a line.
    pub fn apply(&self, text: &str) -> Option<(String, String)> {
        let caps = self.regex.captures(text)?;
        let key = match self.key {
            KeySource::Group(i) => normalize_whitespace(caps.get(i)?.as_str()),
            KeySource::Fixed(label) => label.to_string(),
        };
        let value = normalize_whitespace(caps.get(self.value_group)?.as_str());
        if key.is_empty() || value.is_empty() {
            return None;
        }
        Some((key, value))
    }
}

/// The result of matching a line, including which rule fired.
#[derive(Debug, Clone, PartialEq)]
pub struct KvMatch {
    pub rule: &'static str,
    pub key: String,
    pub value: String,
}

static KV_RULES: Lazy<Vec<KvRule>> = Lazy::new(|| {
    use KeySource::{Fixed, Group};
    vec![
        KvRule::new(
            "remaining",
            r"(?i)^remaining\s*:?\s*(\$[\d,]+(?:\.\d+)?)$",
            Fixed("Remaining"),
            1,
        ),
        KvRule::new(
            "total",
            r"(?i)^total\s*:?\s*(\$[\d,]+(?:\.\d+)?)$",
            Fixed("Total"),
            1,
        ),
        KvRule::new(
            "known_field",
            concat!(
                r"^(Family Maximum|Individual Maximum|Family Deductible|Individual Deductible",
                r"|Lifetime Maximum|Other Insurance\?)(?:\s*:\s*|\s+)",
                r"(\$[\d,]+(?:\.\d+)?|\d+(?:\.\d+)?%|Yes|No|YES|NO)$",
            ),
            Group(1),
            2,
        ),
        KvRule::new(
            "pretreatment",
            r"(?is)^(pretreatment review.*)$",
            Fixed("Pretreatment Review"),
            1,
        ),
        KvRule::new(
            "colon",
            r"(?s)^([A-Z][A-Za-z0-9 \-/()#'&?.,]*?)\s*:\s*(.+)$",
            Group(1),
            2,
        ),
        KvRule::new(
            "wide_gap",
            r"(?s)^([A-Z][A-Za-z0-9 \-/()#'&?.,]*?)\s{2,}(\S.*)$",
            Group(1),
            2,
        ),
        KvRule::new("procedure_code", r"(?s)^(D\d{4})\s+(.+)$", Group(1), 2),
        KvRule::new(
            "amount_or_percent",
            r"(?s)^([A-Z][A-Za-z ]*?)\s+([$%\d].*)$",
            Group(1),
            2,
        ),
        KvRule::new(
            "dash",
            r"(?s)^([A-Z][A-Za-z0-9 /()]*?)\s+-\s+(.+)$",
            Group(1),
            2,
        ),
        KvRule::new(
            "trailing_amount",
            r"(?s)^(.+?)\s+(\$[\d,]+(?:\.\d+)?)$",
            Group(1),
            2,
        ),
        KvRule::new(
            "trailing_percent",
            r"(?s)^(.+?)\s+(\d+(?:\.\d+)?%)$",
            Group(1),
            2,
        ),
        KvRule::new(
            "name_value",
            r"^([A-Z][A-Za-z ]+)\s+([A-Za-z0-9 ,/]+)$",
            Group(1),
            2,
        ),
    ]
});

/// All rules in evaluation order.
pub fn rules() -> &'static [KvRule] {
    &KV_RULES
}

/// Look up a rule by name.
pub fn rule(name: &str) -> Option<&'static KvRule> {
    KV_RULES.iter().find(|r| r.name == name)
}

/// Match a line against the rule table, reporting which rule fired.
pub fn match_kv(text: &str) -> Option<KvMatch> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    KV_RULES.iter().find_map(|rule| {
        rule.apply(text).map(|(key, value)| KvMatch {
            rule: rule.name,
            key,
            value,
        })
    })
}

/// Extract a whitespace-normalized (key, value) pair from a line of text.
pub fn extract_insurance_kv(text: &str) -> Option<(String, String)> {
    match_kv(text).map(|m| (m.key, m.value))
}

/// Collapse runs of whitespace to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
