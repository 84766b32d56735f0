//! Raw segmented data: sections of labelled fields, plus tables.
//!
//! Insertion order is preserved everywhere (`IndexMap`) so that repeated
//! runs over the same document produce identical output and the similarity
//! mapper sees raw keys in document order.

use indexmap::IndexMap;
use serde::Serialize;

/// Pseudo-section holding pairs found before any section heading.
pub const TOP_LEVEL_SECTION: &str = "General";

/// Synthesized section holding the nested benefit groups.
pub const BENEFITS_SECTION: &str = "Benefits";

/// Synthesized section holding procedure code attributes.
pub const PROCEDURE_CODES_SECTION: &str = "Procedure Codes";

/// One column header -> cell value row.
pub type TableRow = IndexMap<String, String>;

/// Ordered rows sharing the same header set.
pub type Table = Vec<TableRow>;

/// A benefit group such as "Individual Calendar Year Deductible".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenefitEntry {
    #[serde(rename = "Remaining", skip_serializing_if = "Option::is_none")]
    pub remaining: Option<String>,
    #[serde(rename = "Total", skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
    #[serde(rename = "Text", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child pairs found on indented lines under the group.
    #[serde(flatten)]
    pub details: IndexMap<String, String>,
}

impl BenefitEntry {
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none()
            && self.total.is_none()
            && self.text.is_none()
            && self.details.is_empty()
    }

    /// The headline amount: Total if known, otherwise the free text.
    pub fn headline(&self) -> Option<&str> {
        self.total.as_deref().or(self.text.as_deref())
    }
}

/// Value stored under a field label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Benefit(BenefitEntry),
    Procedure(IndexMap<String, String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_benefit(&self) -> Option<&BenefitEntry> {
        match self {
            FieldValue::Benefit(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&IndexMap<String, String>> {
        match self {
            FieldValue::Procedure(p) => Some(p),
            _ => None,
        }
    }
}

/// Field label -> value within one section. Labels are unique; a later
/// occurrence overwrites an earlier one.
pub type RawFields = IndexMap<String, FieldValue>;

/// Section name -> fields, accumulated across all pages of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawSections {
    sections: IndexMap<String, RawFields>,
}

impl RawSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: &str, key: impl Into<String>, value: FieldValue) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.into(), value);
    }

    pub fn insert_text(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
        self.insert(section, key, FieldValue::Text(value.into()));
    }

    /// Look up a section by name, also trying its title-cased form since
    /// detected headings are stored title-cased.
    pub fn section(&self, name: &str) -> Option<&RawFields> {
        self.sections
            .get(name)
            .or_else(|| self.sections.get(&title_case(name)))
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut RawFields> {
        self.sections.get_mut(name)
    }

    /// First section present from an ordered list of candidates.
    pub fn first_section<'a>(&'a self, candidates: &[&str]) -> Option<&'a RawFields> {
        candidates.iter().find_map(|name| self.section(name))
    }

    pub fn remove_section(&mut self, name: &str) -> Option<RawFields> {
        self.sections.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawFields)> {
        self.sections.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Merge all sections into a single scalar `label -> value` view.
    ///
    /// Benefit groups contribute their headline amount under the group label
    /// and the remaining amount under `"<label> Remaining"`. Procedure
    /// attributes are not scalar and are left out.
    pub fn flatten(&self) -> IndexMap<String, String> {
        let mut flat = IndexMap::new();
        for fields in self.sections.values() {
            for (key, value) in fields {
                match value {
                    FieldValue::Text(text) => {
                        flat.insert(key.clone(), text.clone());
                    }
                    FieldValue::Benefit(entry) => {
                        if let Some(headline) = entry.headline() {
                            flat.insert(key.clone(), headline.to_string());
                        }
                        if let Some(remaining) = &entry.remaining {
                            flat.insert(format!("{} Remaining", key), remaining.clone());
                        }
                        for (detail, detail_value) in &entry.details {
                            flat.insert(format!("{} {}", key, detail), detail_value.clone());
                        }
                    }
                    FieldValue::Procedure(_) => {}
                }
            }
        }
        flat
    }
}

/// Title-case a heading: first letter of every word upper, the rest lower.
/// An apostrophe inside a word does not start a new word ("JASON'S" ->
/// "Jason's").
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = in_word && ch == '\'';
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("PATIENT DETAIL"), "Patient Detail");
        assert_eq!(title_case("Plan and Network"), "Plan And Network");
        assert_eq!(title_case("FREQUENCY & LIMITATIONS"), "Frequency & Limitations");
        assert_eq!(title_case("JASON'S DELI"), "Jason's Deli");
    }

    #[test]
    fn test_section_lookup_title_cases_candidates() {
        let mut raw = RawSections::new();
        raw.insert_text("Plan And Network", "Plan Type", "DENTAL PPO");
        assert!(raw.section("Plan and Network").is_some());
        let found = raw.first_section(&["Plan Details", "Plan and Network"]).unwrap();
        assert_eq!(found["Plan Type"].as_text(), Some("DENTAL PPO"));
    }

    #[test]
    fn test_last_write_wins_keeps_position() {
        let mut raw = RawSections::new();
        raw.insert_text("General", "Name", "First");
        raw.insert_text("General", "Gender", "Female");
        raw.insert_text("General", "Name", "Second");
        let fields = raw.section("General").unwrap();
        let keys: Vec<&String> = fields.keys().collect();
        assert_eq!(keys, vec!["Name", "Gender"]);
        assert_eq!(fields["Name"].as_text(), Some("Second"));
    }

    #[test]
    fn test_flatten_benefits_and_skip_procedures() {
        let mut raw = RawSections::new();
        raw.insert_text("Patient Detail", "Name", "Jazmin Angel");
        raw.insert(
            BENEFITS_SECTION,
            "Family Calendar Year Maximum",
            FieldValue::Benefit(BenefitEntry {
                remaining: Some("$1,200.00".to_string()),
                total: Some("$1,500.00".to_string()),
                ..Default::default()
            }),
        );
        let mut attrs = IndexMap::new();
        attrs.insert("History".to_string(), "01/02/2024".to_string());
        raw.insert(
            PROCEDURE_CODES_SECTION,
            "D1110 - Prophylaxis Adult",
            FieldValue::Procedure(attrs),
        );

        let flat = raw.flatten();
        assert_eq!(flat["Name"], "Jazmin Angel");
        assert_eq!(flat["Family Calendar Year Maximum"], "$1,500.00");
        assert_eq!(flat["Family Calendar Year Maximum Remaining"], "$1,200.00");
        assert!(!flat.contains_key("D1110 - Prophylaxis Adult"));
    }

    #[test]
    fn test_benefit_entry_serializes_with_labels() {
        let entry = BenefitEntry {
            remaining: Some("$50.00".to_string()),
            total: None,
            text: None,
            details: IndexMap::new(),
        };
        let json = serde_json::to_value(FieldValue::Benefit(entry)).unwrap();
        assert_eq!(json, serde_json::json!({"Remaining": "$50.00"}));
    }
}
