//! Section / key-value segmentation of positioned text blocks.
//!
//! An explicit state machine over the block stream. Section headings move the
//! machine between states; every other block is interpreted by the current
//! state:
//!
//! | State              | Block handling                                        |
//! |--------------------|-------------------------------------------------------|
//! | `Idle`             | key/value pairs go to the top-level pseudo-section    |
//! | `InSection`        | key/value pairs go to the named section               |
//! | `InBenefits`       | benefit groups with Remaining / Total amounts         |
//! | `InProcedureCodes` | CDT procedure codes with indented attributes          |
//!
//! State carries over page boundaries, so a section may continue on the next
//! page.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::kv_rules::{extract_insurance_kv, normalize_whitespace};
use crate::layout::{PageText, PositionedBlock};
use crate::raw::{
    title_case, BenefitEntry, FieldValue, RawSections, BENEFITS_SECTION,
    PROCEDURE_CODES_SECTION, TOP_LEVEL_SECTION,
};

/// Substrings that mark a heading even when the block is not all caps.
const HEADING_MARKERS: &[&str] = &[
    "Patient Detail",
    "Plan and Network",
    "Plan Details",
    "Frequency & Limitations",
    "Benefits",
    "Procedure Code Search",
    "Predetermination of Benefits",
];

/// Blocks starting at least this far right of the page margin are indented.
const INDENT_POINTS: f32 = 12.0;

static PROCEDURE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(D\d{4})\b\s*(.*)$").unwrap_or_else(|e| panic!("{}", e)));
static TOTAL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^total\s*:\s*(\$[\d,]+(?:\.\d+)?)$").unwrap_or_else(|e| panic!("{}", e))
});
static REMAINING_LABEL_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^remaining\s*:?\s*(\$[\d,]+(?:\.\d+)?)$").unwrap_or_else(|e| panic!("{}", e))
});
static REMAINING_AMOUNT_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s*(\$[\d,]+(?:\.\d+)?)\s+remaining$")
        .unwrap_or_else(|e| panic!("{}", e))
});
static BARE_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[\d,]+(?:\.\d+)?$").unwrap_or_else(|e| panic!("{}", e)));
static COLON_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+?)\s*:\s*(.+)$").unwrap_or_else(|e| panic!("{}", e)));

/// Sub-heading inside the benefits section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenefitGroup {
    Deductible,
    Maximums,
}

impl BenefitGroup {
    fn from_heading(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "deductible" | "deductibles" => Some(Self::Deductible),
            "benefit maximums" | "maximums" => Some(Self::Maximums),
            _ => None,
        }
    }

    fn qualify(self, key: &str) -> String {
        let lower = key.to_lowercase();
        match self {
            Self::Deductible if !lower.contains("deductible") => format!("{} Deductible", key),
            Self::Maximums if !lower.contains("maximum") => format!("{} Maximum", key),
            _ => key.to_string(),
        }
    }
}

/// Cursor inside the benefits section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenefitsCursor {
    pub subsection: Option<BenefitGroup>,
    pub orthodontics: bool,
    /// Field currently collecting Remaining / Total amounts.
    pub field: Option<String>,
    /// Field name still being assembled across blocks.
    pub pending_key: String,
}

impl BenefitsCursor {
    fn qualify(&self, key: &str) -> String {
        let mut key = key.to_string();
        if let Some(group) = self.subsection {
            key = group.qualify(&key);
        }
        if self.orthodontics && !key.to_lowercase().contains("orthodont") {
            key = format!("Orthodontics {}", key);
        }
        key
    }
}

/// A procedure code whose description or attributes are still arriving.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingProcedure {
    pub code: String,
    pub description: String,
    pub attributes: IndexMap<String, String>,
}

impl PendingProcedure {
    fn key(&self) -> String {
        if self.description.is_empty() {
            self.code.clone()
        } else {
            format!("{} - {}", self.code, self.description)
        }
    }
}

/// Cursor inside a procedure code section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCursor {
    /// Section heading, used for pairs found before the first code.
    pub section: String,
    pub current: Option<PendingProcedure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    InSection(String),
    InBenefits(BenefitsCursor),
    InProcedureCodes(ProcedureCursor),
}

impl State {
    /// State entered when a heading with this (title-cased) name is seen.
    fn for_section(name: String) -> Self {
        if name.starts_with("Benefits") {
            State::InBenefits(BenefitsCursor::default())
        } else if name.contains("Procedure Code") {
            State::InProcedureCodes(ProcedureCursor {
                section: name,
                current: None,
            })
        } else {
            State::InSection(name)
        }
    }
}

/// One block as seen by the state machine.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    pub text: &'a str,
    pub indented: bool,
}

/// Is this block a section heading? Returns the normalized section name.
pub fn heading_name(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || PROCEDURE_CODE.is_match(text) {
        return None;
    }
    let all_caps = text.chars().any(char::is_alphabetic) && !text.chars().any(char::is_lowercase);
    if all_caps || HEADING_MARKERS.iter().any(|m| text.contains(m)) {
        Some(title_case(text))
    } else {
        None
    }
}

/// Accumulates raw sections from the block stream of a whole document.
#[derive(Debug)]
pub struct Segmenter {
    raw: RawSections,
    state: State,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            raw: RawSections::new(),
            state: State::Idle,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Feed one page worth of blocks, already in reading order.
    pub fn feed_page(&mut self, blocks: &[PositionedBlock]) {
        let margin = blocks.iter().map(|b| b.x).fold(f32::INFINITY, f32::min);
        for block in blocks {
            let indented = block.text.starts_with("  ") || block.x - margin >= INDENT_POINTS;
            let text = block.text.trim();
            if text.is_empty() {
                continue;
            }
            self.feed(Line { text, indented });
        }
    }

    /// Apply one transition.
    pub fn feed(&mut self, line: Line<'_>) {
        if let Some(name) = heading_name(line.text) {
            debug!("Detected section: {}", name);
            self.close_state();
            self.state = State::for_section(name);
            return;
        }

        let state = std::mem::replace(&mut self.state, State::Idle);
        self.state = match state {
            State::Idle => {
                self.record_pair(TOP_LEVEL_SECTION, line.text);
                State::Idle
            }
            State::InSection(name) => {
                self.record_pair(&name, line.text);
                State::InSection(name)
            }
            State::InBenefits(cursor) => State::InBenefits(self.benefits_step(cursor, line)),
            State::InProcedureCodes(cursor) => {
                State::InProcedureCodes(self.procedure_step(cursor, line))
            }
        };
    }

    /// Close any open state and return the accumulated sections.
    pub fn finish(mut self) -> RawSections {
        self.close_state();
        let benefits_empty = match self.raw.section_mut(BENEFITS_SECTION) {
            Some(benefits) => {
                benefits.retain(|_, v| !matches!(v, FieldValue::Benefit(b) if b.is_empty()));
                benefits.is_empty()
            }
            None => false,
        };
        if benefits_empty {
            self.raw.remove_section(BENEFITS_SECTION);
        }
        self.raw
    }

    fn close_state(&mut self) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::InBenefits(mut cursor) => self.flush_pending_key(&mut cursor),
            State::InProcedureCodes(mut cursor) => self.commit_procedure(&mut cursor),
            State::Idle | State::InSection(_) => {}
        }
    }

    fn record_pair(&mut self, section: &str, text: &str) {
        match extract_insurance_kv(text) {
            Some((key, value)) => {
                debug!("Extracted KV [{}]: {} = {}", section, key, value);
                self.raw.insert_text(section, key, value);
            }
            None => trace!("Discarding unmatched text: {}", text),
        }
    }

    // ------------------------------------------------------------------------
    // Benefits
    // ------------------------------------------------------------------------

    fn benefits_step(&mut self, mut cursor: BenefitsCursor, line: Line<'_>) -> BenefitsCursor {
        let text = line.text;

        if let Some(caps) = TOTAL_LINE.captures(text) {
            self.promote_pending_key(&mut cursor);
            match cursor.field.take() {
                Some(field) => self.benefit_entry(&field).total = Some(caps[1].to_string()),
                None => debug!("Total without an open benefit field: {}", text),
            }
            return cursor;
        }

        if let Some(amount) = remaining_amount(text) {
            let (label, amount) = amount;
            if !label.is_empty() {
                if !cursor.pending_key.is_empty() {
                    cursor.pending_key.push(' ');
                }
                cursor.pending_key.push_str(&label);
            }
            self.promote_pending_key(&mut cursor);
            match &cursor.field {
                Some(field) => self.benefit_entry(field).remaining = Some(amount),
                None => debug!("Remaining without an open benefit field: {}", text),
            }
            return cursor;
        }

        if BARE_AMOUNT.is_match(text) {
            return cursor;
        }

        if line.indented {
            self.promote_pending_key(&mut cursor);
            let Some(field) = cursor.field.clone() else {
                debug!("Indented benefits line without a field: {}", text);
                return cursor;
            };
            if let Some((key, value)) = extract_insurance_kv(text) {
                let entry = self.benefit_entry(&field);
                match key.as_str() {
                    "Remaining" => entry.remaining = Some(value),
                    "Total" => {
                        entry.total = Some(value);
                        cursor.field = None;
                    }
                    _ => {
                        entry.details.insert(key, value);
                    }
                }
            }
            return cursor;
        }

        // Field names wrap across blocks until a value line shows up.
        if !cursor.pending_key.is_empty() {
            cursor.pending_key.push(' ');
            cursor.pending_key.push_str(text);
            return cursor;
        }

        if let Some(group) = BenefitGroup::from_heading(text) {
            cursor.subsection = Some(group);
            cursor.orthodontics = false;
            cursor.field = None;
            return cursor;
        }

        if text.eq_ignore_ascii_case("orthodontics") || text.eq_ignore_ascii_case("orthodontia") {
            cursor.orthodontics = true;
            cursor.field = None;
            return cursor;
        }

        if let Some(caps) = COLON_PAIR.captures(text) {
            let key = cursor.qualify(&normalize_whitespace(&caps[1]));
            let value = normalize_whitespace(&caps[2]);
            self.replace_benefit_entry(&key).text = Some(value);
            cursor.field = Some(key);
            return cursor;
        }

        cursor.field = None;
        cursor.pending_key = text.to_string();
        cursor
    }

    /// Turn the assembled field name into the open field.
    fn promote_pending_key(&mut self, cursor: &mut BenefitsCursor) {
        if cursor.pending_key.is_empty() {
            return;
        }
        let key = cursor.qualify(&normalize_whitespace(&cursor.pending_key));
        cursor.pending_key.clear();
        self.replace_benefit_entry(&key);
        cursor.field = Some(key);
    }

    /// A field name never followed by amounts is kept as free text.
    fn flush_pending_key(&mut self, cursor: &mut BenefitsCursor) {
        if cursor.pending_key.is_empty() {
            return;
        }
        let buffered = normalize_whitespace(&cursor.pending_key);
        cursor.pending_key.clear();
        let (key, value) =
            extract_insurance_kv(&buffered).unwrap_or_else(|| (buffered.clone(), buffered));
        let key = cursor.qualify(&key);
        self.replace_benefit_entry(&key).text = Some(value);
        cursor.field = None;
    }

    fn benefit_entry(&mut self, key: &str) -> &mut BenefitEntry {
        self.ensure_benefit_entry(key, false)
    }

    fn replace_benefit_entry(&mut self, key: &str) -> &mut BenefitEntry {
        self.ensure_benefit_entry(key, true)
    }

    fn ensure_benefit_entry(&mut self, key: &str, reset: bool) -> &mut BenefitEntry {
        if reset || self.raw.section(BENEFITS_SECTION).and_then(|s| s.get(key)).is_none() {
            self.raw
                .insert(BENEFITS_SECTION, key, FieldValue::Benefit(BenefitEntry::default()));
        }
        let fields = self
            .raw
            .section_mut(BENEFITS_SECTION)
            .unwrap_or_else(|| unreachable!("benefits section inserted above"));
        let value = fields
            .get_mut(key)
            .unwrap_or_else(|| unreachable!("benefit entry inserted above"));
        if !matches!(value, FieldValue::Benefit(_)) {
            *value = FieldValue::Benefit(BenefitEntry::default());
        }
        match value {
            FieldValue::Benefit(entry) => entry,
            _ => unreachable!("benefit entry normalized above"),
        }
    }

    // ------------------------------------------------------------------------
    // Procedure codes
    // ------------------------------------------------------------------------

    fn procedure_step(&mut self, mut cursor: ProcedureCursor, line: Line<'_>) -> ProcedureCursor {
        let text = line.text;

        if let Some(caps) = PROCEDURE_CODE.captures(text) {
            self.commit_procedure(&mut cursor);
            cursor.current = Some(PendingProcedure {
                code: caps[1].to_string(),
                description: normalize_whitespace(&caps[2]),
                attributes: IndexMap::new(),
            });
            return cursor;
        }

        if cursor.current.is_none() {
            self.record_pair(&cursor.section, text);
            return cursor;
        }
        let Some(procedure) = cursor.current.as_mut() else {
            return cursor;
        };

        // Unindented text right after the code continues its description.
        if !line.indented && procedure.attributes.is_empty() && !COLON_PAIR.is_match(text) {
            if !procedure.description.is_empty() {
                procedure.description.push(' ');
            }
            procedure.description.push_str(&normalize_whitespace(text));
            return cursor;
        }

        match procedure_attribute(text) {
            Some((key, value)) => {
                debug!("Procedure {}: {} = {}", procedure.code, key, value);
                procedure.attributes.insert(key, value);
            }
            None => trace!("Discarding procedure text: {}", text),
        }
        cursor
    }

    fn commit_procedure(&mut self, cursor: &mut ProcedureCursor) {
        if let Some(procedure) = cursor.current.take() {
            let key = procedure.key();
            self.raw.insert(
                PROCEDURE_CODES_SECTION,
                key,
                FieldValue::Procedure(procedure.attributes),
            );
        }
    }
}

/// Parse one attribute line under a procedure code, rewriting the labels
/// that the report splits awkwardly.
pub fn procedure_attribute(text: &str) -> Option<(String, String)> {
    let text = normalize_whitespace(text);
    if let Some(rest) = text.strip_prefix("History ") {
        if rest.starts_with("Not") {
            return Some(("History".to_string(), rest.to_string()));
        }
    }
    if text.starts_with("Alternate benefit may") {
        return Some(("Note".to_string(), text));
    }
    if let Some(rest) = text.strip_prefix("Member") {
        let rest = rest.trim_start();
        let rest = rest.strip_prefix("Responsibility").unwrap_or(rest);
        let rest = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        if !rest.is_empty() {
            return Some(("Member Responsibility".to_string(), rest.to_string()));
        }
    }
    extract_insurance_kv(&text)
}

/// Recognize "$50.00 remaining" (optionally prefixed by a label) and
/// "Remaining: $50.00". Returns (label, amount).
fn remaining_amount(text: &str) -> Option<(String, String)> {
    if let Some(caps) = REMAINING_LABEL_FIRST.captures(text) {
        return Some((String::new(), caps[1].to_string()));
    }
    REMAINING_AMOUNT_FIRST
        .captures(text)
        .map(|caps| (normalize_whitespace(&caps[1]), caps[2].to_string()))
}

/// Segment all pages of a document.
pub fn segment_pages(pages: &[PageText]) -> RawSections {
    let mut segmenter = Segmenter::new();
    for page in pages {
        segmenter.feed_page(&page.blocks);
    }
    segmenter.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(lines: &[&str]) -> Vec<PositionedBlock> {
        lines
            .iter()
            .enumerate()
            .map(|(i, text)| PositionedBlock::new(*text, 72.0, 100.0 + i as f32 * 14.0))
            .collect()
    }

    fn segment(lines: &[&str]) -> RawSections {
        let mut segmenter = Segmenter::new();
        segmenter.feed_page(&blocks(lines));
        segmenter.finish()
    }

    fn benefit<'a>(raw: &'a RawSections, key: &str) -> &'a BenefitEntry {
        raw.section(BENEFITS_SECTION).unwrap()[key].as_benefit().unwrap()
    }

    #[test]
    fn test_heading_detection() {
        assert_eq!(heading_name("PATIENT DETAIL").as_deref(), Some("Patient Detail"));
        assert_eq!(
            heading_name("Plan and Network").as_deref(),
            Some("Plan And Network")
        );
        assert!(heading_name("Name: Jazmin Angel").is_none());
        assert!(heading_name("$50.00").is_none());
        assert!(heading_name("D0120").is_none());
    }

    #[test]
    fn test_upper_case_block_starts_section_and_is_not_a_pair() {
        let raw = segment(&["Name: Someone", "PATIENT DETAIL", "Gender: Female"]);
        assert_eq!(raw.section(TOP_LEVEL_SECTION).unwrap()["Name"].as_text(), Some("Someone"));
        let section = raw.section("Patient Detail").unwrap();
        assert_eq!(section["Gender"].as_text(), Some("Female"));
        assert!(!section.contains_key("PATIENT DETAIL"));
        assert!(raw.iter().all(|(_, fields)| !fields.contains_key("PATIENT DETAIL")));
    }

    #[test]
    fn test_end_to_end_sections() {
        let raw = segment(&[
            "PATIENT DETAIL",
            "Name: Jazmin Angel",
            "PLAN AND NETWORK",
            "Plan Type: DENTAL PPO",
        ]);
        assert_eq!(
            raw.section("Patient Detail").unwrap()["Name"].as_text(),
            Some("Jazmin Angel")
        );
        assert_eq!(
            raw.section("Plan and Network").unwrap()["Plan Type"].as_text(),
            Some("DENTAL PPO")
        );
    }

    #[test]
    fn test_multi_line_key_reassembly() {
        let raw = segment(&[
            "Benefits",
            "Individual Calendar Year",
            "Deductible",
            "  Remaining: $50.00",
        ]);
        let entry = benefit(&raw, "Individual Calendar Year Deductible");
        assert_eq!(entry.remaining.as_deref(), Some("$50.00"));
    }

    #[test]
    fn test_wrapped_key_ending_on_amount_line() {
        let raw = segment(&[
            "Benefits",
            "Individual Calendar Year",
            "Deductible $50.00 remaining",
            "Total: $50.00",
        ]);
        let keys: Vec<_> = raw.section(BENEFITS_SECTION).unwrap().keys().collect();
        assert_eq!(keys, vec!["Individual Calendar Year Deductible"]);
        let entry = benefit(&raw, "Individual Calendar Year Deductible");
        assert_eq!(entry.remaining.as_deref(), Some("$50.00"));
        assert_eq!(entry.total.as_deref(), Some("$50.00"));
    }

    #[test]
    fn test_remaining_then_total_closes_field() {
        let raw = segment(&[
            "BENEFITS",
            "Family Calendar Year Maximum",
            "$1,500.00",
            "$1,200.00 remaining",
            "Total: $1,500.00",
            "Individual Calendar Year Maximum",
            "$2,200.00 remaining",
            "Total: $2,500.00",
        ]);
        let family = benefit(&raw, "Family Calendar Year Maximum");
        assert_eq!(family.remaining.as_deref(), Some("$1,200.00"));
        assert_eq!(family.total.as_deref(), Some("$1,500.00"));
        let individual = benefit(&raw, "Individual Calendar Year Maximum");
        assert_eq!(individual.remaining.as_deref(), Some("$2,200.00"));
        assert_eq!(individual.total.as_deref(), Some("$2,500.00"));
    }

    #[test]
    fn test_subsections_qualify_field_names() {
        let raw = segment(&[
            "Benefits",
            "Deductible",
            "Individual",
            "$50.00 remaining",
            "Total: $50.00",
            "Benefit Maximums",
            "Orthodontics",
            "Lifetime",
            "$1,500.00 remaining",
            "Total: $1,500.00",
        ]);
        let deductible = benefit(&raw, "Individual Deductible");
        assert_eq!(deductible.total.as_deref(), Some("$50.00"));
        let ortho = benefit(&raw, "Orthodontics Lifetime Maximum");
        assert_eq!(ortho.remaining.as_deref(), Some("$1,500.00"));
    }

    #[test]
    fn test_indented_children_by_position() {
        let mut segmenter = Segmenter::new();
        segmenter.feed_page(&[
            PositionedBlock::new("Benefits", 72.0, 10.0),
            PositionedBlock::new("Family Calendar Year Deductible", 72.0, 20.0),
            PositionedBlock::new("Remaining: $100.00", 96.0, 30.0),
            PositionedBlock::new("Applies To: Basic and Major", 96.0, 40.0),
            PositionedBlock::new("Total: $150.00", 96.0, 50.0),
        ]);
        let raw = segmenter.finish();
        let entry = benefit(&raw, "Family Calendar Year Deductible");
        assert_eq!(entry.remaining.as_deref(), Some("$100.00"));
        assert_eq!(entry.total.as_deref(), Some("$150.00"));
        assert_eq!(entry.details["Applies To"], "Basic and Major");
    }

    #[test]
    fn test_pending_key_flushed_at_section_end() {
        let raw = segment(&["Benefits", "Waiting Period", "Basic: 6 months", "PLAN DETAILS"]);
        let entry = benefit(&raw, "Waiting Period Basic");
        assert_eq!(entry.text.as_deref(), Some("6 months"));
    }

    #[test]
    fn test_empty_benefits_section_is_omitted() {
        let raw = segment(&["Benefits", "$50.00"]);
        assert!(raw.section(BENEFITS_SECTION).is_none());
    }

    #[test]
    fn test_procedure_codes() {
        let raw = segment(&[
            "Procedure Code Search",
            "D1110 Prophylaxis",
            "Adult",
            "  History: 01/15/2024",
            "  Member Responsibility 20%",
            "D0120 Periodic Oral Evaluation",
            "  History Not Found",
            "  Alternate benefit may apply.",
        ]);
        let codes = raw.section(PROCEDURE_CODES_SECTION).unwrap();
        let prophy = codes["D1110 - Prophylaxis Adult"].as_procedure().unwrap();
        assert_eq!(prophy["History"], "01/15/2024");
        assert_eq!(prophy["Member Responsibility"], "20%");
        let exam = codes["D0120 - Periodic Oral Evaluation"].as_procedure().unwrap();
        assert_eq!(exam["History"], "Not Found");
        assert_eq!(exam["Note"], "Alternate benefit may apply.");
    }

    #[test]
    fn test_procedure_attribute_rewrites() {
        assert_eq!(
            procedure_attribute("Member: $25.00"),
            Some(("Member Responsibility".to_string(), "$25.00".to_string()))
        );
        assert_eq!(
            procedure_attribute("History: No history"),
            Some(("History".to_string(), "No history".to_string()))
        );
    }

    #[test]
    fn test_state_carries_across_pages() {
        let mut segmenter = Segmenter::new();
        segmenter.feed_page(&blocks(&["PLAN DETAILS"]));
        assert_eq!(segmenter.state(), &State::InSection("Plan Details".to_string()));
        segmenter.feed_page(&blocks(&["Basic Restorative 20%"]));
        let raw = segmenter.finish();
        assert_eq!(
            raw.section("Plan Details").unwrap()["Basic Restorative"].as_text(),
            Some("20%")
        );
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let lines = [
            "PATIENT DETAIL",
            "Name: Jazmin Angel",
            "Benefits",
            "Individual Calendar Year Deductible",
            "$50.00 remaining",
            "Total: $50.00",
        ];
        assert_eq!(segment(&lines), segment(&lines));
    }
}
