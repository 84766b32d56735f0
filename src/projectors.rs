//! Domain projectors: best-effort summaries read from the segmented data.
//!
//! Every projector walks a fixed, ordered list of candidate section names and
//! reads only the first one present. Sections are never merged. Nothing here
//! can fail; missing data is an empty string.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::raw::{
    BenefitEntry, FieldValue, RawFields, RawSections, BENEFITS_SECTION, PROCEDURE_CODES_SECTION,
};

const PATIENT_SECTIONS: &[&str] = &[
    "Patient Detail",
    "Patient Details",
    "Patient Information",
    "Plan And Network",
];

const BENEFIT_SECTIONS: &[&str] = &[BENEFITS_SECTION, "Plan Details", "Benefit Maximums"];

const PLAN_SECTIONS: &[&str] = &["Plan and Network", "Plan Details", "Plan Information"];

const COINSURANCE_SECTIONS: &[&str] = &[
    "Plan Details",
    "Coinsurance - Patient's Coinsurance Percentage",
    "Total",
    "Coinsurance",
];

const FREQUENCY_SECTIONS: &[&str] = &["Frequency & Limitations"];

const PRE_AUTH_SECTIONS: &[&str] = &[
    "Predetermination of Benefits",
    "CHCP - Dental",
    "Frequency & Limitations",
    BENEFITS_SECTION,
    PROCEDURE_CODES_SECTION,
];

const HISTORY_SECTIONS: &[&str] = &["Code Procedure", "Procedure Code Search"];

pub const NO_PRE_AUTH: &str = "No pretreatment review or predetermination information found.";

static DOLLAR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[\d,.]+$").unwrap_or_else(|e| panic!("{}", e)));

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientInfo {
    pub name: String,
    pub patient_id: String,
    pub date_of_birth: String,
    pub gender: String,
    pub subscriber_name: String,
    pub subscriber_id: String,
    pub subscriber_dob: String,
    pub relationship: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanInfo {
    pub plan_name: String,
    pub insurance_provider: String,
    pub group_number: String,
    pub employer_name: String,
    pub effective_date: String,
    pub termination_date: String,
    pub plan_type: String,
    pub cob: String,
    pub plan_reset_date: String,
}

/// A validated pair of dollar amounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AmountPair {
    pub remaining: String,
    pub total: String,
}

impl AmountPair {
    fn is_empty(&self) -> bool {
        self.remaining.is_empty() && self.total.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub individual: AmountPair,
    pub family: AmountPair,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coinsurance {
    pub diagnostic: String,
    pub basic_restorative: String,
    pub major_restorative: String,
    pub orthodontics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequencies {
    pub oral_exam: String,
    pub full_mouth_x_rays: String,
    pub bitewing_x_rays: String,
    pub adult_cleaning: String,
    pub topical_fluoride: String,
    pub topical_sealant: String,
    pub crown: String,
    pub bridge_work: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Benefits {
    pub deductible: Coverage,
    pub maximum: Coverage,
    pub orthodontics: AmountPair,
    pub coinsurance: Coinsurance,
    pub frequencies: Frequencies,
    pub pre_auth: String,
}

/// All projector views of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedView {
    pub patient_info: PatientInfo,
    pub plan_info: PlanInfo,
    pub benefits: Benefits,
    pub last_procedures: IndexMap<String, String>,
}

pub fn project(raw: &RawSections) -> NormalizedView {
    NormalizedView {
        patient_info: patient_info(raw),
        plan_info: plan_info(raw),
        benefits: benefits(raw),
        last_procedures: procedure_history(raw),
    }
}

/// First non-empty text value among `keys`.
fn text(fields: &RawFields, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| fields.get(*k).and_then(FieldValue::as_text))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Like `text`, but also accepts a key that starts with the label and
/// swallowed part of the value ("Oral Exam Twice Per Calendar" -> "Year").
fn prefixed_text(fields: &RawFields, labels: &[&str]) -> String {
    let exact = text(fields, labels);
    if !exact.is_empty() {
        return exact;
    }
    for label in labels {
        let prefix = format!("{} ", label);
        for (key, value) in fields {
            if let (Some(rest), Some(value)) = (key.strip_prefix(&prefix), value.as_text()) {
                return format!("{} {}", rest, value).trim().to_string();
            }
        }
    }
    String::new()
}

fn dollar(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if DOLLAR_AMOUNT.is_match(v) => v.to_string(),
        _ => String::new(),
    }
}

pub fn patient_info(raw: &RawSections) -> PatientInfo {
    let Some(d) = raw.first_section(PATIENT_SECTIONS) else {
        return PatientInfo::default();
    };
    let dob = text(d, &["Date of Birth", "Subscriber Date of Birth"]);
    let info = PatientInfo {
        name: text(d, &["Name", "Patient Name"]),
        patient_id: text(d, &["Patient ID"]),
        date_of_birth: dob.clone(),
        gender: text(d, &["Gender"]),
        subscriber_name: text(d, &["Subscriber", "Name"]),
        subscriber_id: text(d, &["Patient ID"]),
        subscriber_dob: dob,
        relationship: text(d, &["Relationship"]),
        address: text(d, &["Address"]),
    };
    debug!("Patient data: {:?}", info);
    info
}

pub fn plan_info(raw: &RawSections) -> PlanInfo {
    let Some(d) = raw.first_section(PLAN_SECTIONS) else {
        return PlanInfo::default();
    };
    let cob = text(d, &["Other Insurance?", "Other Insurance"]);
    let info = PlanInfo {
        plan_name: text(d, &["Plan Type", "Plan"]),
        insurance_provider: text(d, &["Account Name", "Group Name"]),
        group_number: text(d, &["Account #", "Group Number"]),
        employer_name: text(d, &["Group Name", "Account Name"]),
        effective_date: text(d, &["Initial Coverage Date", "Coverage From"]),
        termination_date: text(d, &["Coverage To"]),
        plan_type: text(d, &["Plan Type"]),
        cob: if cob.is_empty() { "No".to_string() } else { cob },
        plan_reset_date: text(d, &["Plan Renews"]),
    };
    debug!("Plan data: {:?}", info);
    info
}

enum Slot {
    Deductible,
    Maximum,
    Orthodontics,
}

fn classify(key: &str) -> Option<(Slot, bool)> {
    let lower = key.to_lowercase();
    let family = lower.contains("family");
    if lower.contains("orthodont") {
        Some((Slot::Orthodontics, family))
    } else if lower.contains("deductible") {
        Some((Slot::Deductible, family))
    } else if lower.contains("maximum") {
        Some((Slot::Maximum, family))
    } else {
        None
    }
}

fn amounts(entry: &BenefitEntry) -> AmountPair {
    AmountPair {
        remaining: dollar(entry.remaining.as_deref()),
        total: dollar(entry.headline()),
    }
}

pub fn benefits(raw: &RawSections) -> Benefits {
    let mut benefits = Benefits::default();

    let mut assign = |key: &str, pair: AmountPair| {
        if pair.is_empty() {
            return;
        }
        let Some((slot, family)) = classify(key) else {
            return;
        };
        let target = match (slot, family) {
            (Slot::Orthodontics, _) => &mut benefits.orthodontics,
            (Slot::Deductible, true) => &mut benefits.deductible.family,
            (Slot::Deductible, false) => &mut benefits.deductible.individual,
            (Slot::Maximum, true) => &mut benefits.maximum.family,
            (Slot::Maximum, false) => &mut benefits.maximum.individual,
        };
        if target.is_empty() {
            *target = pair;
        }
    };

    if let Some(fields) = raw.first_section(BENEFIT_SECTIONS) {
        for (key, value) in fields {
            match value {
                FieldValue::Benefit(entry) => assign(key, amounts(entry)),
                // Flat "Family Maximum $1,500.00" style lines.
                FieldValue::Text(text) => assign(
                    key,
                    AmountPair {
                        remaining: String::new(),
                        total: dollar(Some(text.as_str())),
                    },
                ),
                FieldValue::Procedure(_) => {}
            }
        }
    }

    benefits.coinsurance = coinsurance(raw);
    benefits.frequencies = frequencies(raw);
    benefits.pre_auth = pre_auth(raw);
    debug!("Benefits data: {:?}", benefits);
    benefits
}

pub fn coinsurance(raw: &RawSections) -> Coinsurance {
    let Some(d) = raw.first_section(COINSURANCE_SECTIONS) else {
        return Coinsurance::default();
    };
    Coinsurance {
        diagnostic: text(
            d,
            &[
                "Diagnostic and Preventive",
                "Diagnostic and Preventive*",
                "Diagnostic & Preventive",
            ],
        ),
        basic_restorative: text(d, &["Basic Restorative", "Basic"]),
        major_restorative: text(d, &["Major Restorative", "Major"]),
        orthodontics: text(d, &["Orthodontics"]),
    }
}

pub fn frequencies(raw: &RawSections) -> Frequencies {
    let Some(d) = raw.first_section(FREQUENCY_SECTIONS) else {
        return Frequencies::default();
    };
    Frequencies {
        oral_exam: prefixed_text(d, &["Oral Exam"]),
        full_mouth_x_rays: prefixed_text(d, &["Full Mouth X-Rays", "Full Mouth X"]),
        bitewing_x_rays: prefixed_text(d, &["Bitewing X-Rays", "Bitewing X"]),
        adult_cleaning: prefixed_text(d, &["Adult Cleaning"]),
        topical_fluoride: prefixed_text(d, &["Topical Fluoride"]),
        topical_sealant: prefixed_text(d, &["Topical Sealant Application", "Topical Sealant"]),
        crown: prefixed_text(d, &["Crown"]),
        bridge_work: prefixed_text(d, &["Bridge Work"]),
    }
}

fn mentions_pre_auth(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("pretreatment review") || lower.contains("predetermination")
}

pub fn pre_auth(raw: &RawSections) -> String {
    for name in PRE_AUTH_SECTIONS {
        let Some(fields) = raw.section(name) else {
            continue;
        };
        for (key, value) in fields {
            let values: Vec<&str> = match value {
                FieldValue::Text(text) => vec![text.as_str()],
                FieldValue::Benefit(entry) => entry.text.as_deref().into_iter().collect(),
                FieldValue::Procedure(attrs) => attrs.values().map(String::as_str).collect(),
            };
            if mentions_pre_auth(key) {
                return values
                    .first()
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| key.clone());
            }
            if let Some(found) = values.into_iter().find(|v| mentions_pre_auth(v)) {
                return found.to_string();
            }
        }
    }
    debug!("Pre-auth: Not found");
    NO_PRE_AUTH.to_string()
}

fn is_outstanding(history: &str) -> bool {
    !history.is_empty() && !history.to_lowercase().contains("no history")
}

/// Procedures with a recorded history date, keyed by procedure.
pub fn procedure_history(raw: &RawSections) -> IndexMap<String, String> {
    let mut procedures = IndexMap::new();
    if let Some(fields) = raw.section(PROCEDURE_CODES_SECTION) {
        for (key, value) in fields {
            if let Some(history) = value.as_procedure().and_then(|a| a.get("History")) {
                if is_outstanding(history) {
                    procedures.insert(key.clone(), history.clone());
                }
            }
        }
    }
    for name in HISTORY_SECTIONS {
        if let Some(fields) = raw.section(name) {
            for (key, value) in fields {
                if let Some(history) = value.as_text() {
                    if key.contains("History") && is_outstanding(history) {
                        procedures.insert(key.clone(), history.to_string());
                    }
                }
            }
        }
    }
    debug!("Procedure dates: {:?}", procedures);
    procedures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawSections {
        let mut raw = RawSections::new();
        raw.insert_text("Patient Detail", "Name", "Jazmin Angel");
        raw.insert_text("Patient Detail", "Date of Birth", "01/02/1990");
        raw.insert_text("Patient Detail", "Gender", "Female");
        raw.insert_text("Plan And Network", "Plan Type", "DENTAL PPO");
        raw.insert_text("Plan And Network", "Account #", "3327706");
        raw.insert_text("Plan Details", "Diagnostic and Preventive", "0%");
        raw.insert_text("Plan Details", "Basic Restorative", "20%");
        raw.insert_text("Frequency & Limitations", "Oral Exam Twice Per Calendar", "Year");
        raw.insert_text("Frequency & Limitations", "Crown", "Once Per 5 Years");
        raw.insert(
            BENEFITS_SECTION,
            "Individual Calendar Year Deductible",
            FieldValue::Benefit(BenefitEntry {
                remaining: Some("$50.00".to_string()),
                total: Some("not a number".to_string()),
                ..Default::default()
            }),
        );
        raw.insert(
            BENEFITS_SECTION,
            "Family Calendar Year Maximum",
            FieldValue::Benefit(BenefitEntry {
                remaining: Some("$1,200.00".to_string()),
                total: Some("$1,500.00".to_string()),
                ..Default::default()
            }),
        );
        raw
    }

    #[test]
    fn test_patient_and_plan() {
        let view = project(&sample());
        assert_eq!(view.patient_info.name, "Jazmin Angel");
        assert_eq!(view.patient_info.subscriber_name, "Jazmin Angel");
        assert_eq!(view.patient_info.subscriber_dob, "01/02/1990");
        assert_eq!(view.plan_info.plan_type, "DENTAL PPO");
        assert_eq!(view.plan_info.plan_name, "DENTAL PPO");
        assert_eq!(view.plan_info.group_number, "3327706");
        assert_eq!(view.plan_info.cob, "No");
    }

    #[test]
    fn test_first_section_wins() {
        let mut raw = RawSections::new();
        raw.insert_text("Patient Detail", "Gender", "Female");
        raw.insert_text("Patient Information", "Name", "Elsewhere");
        assert_eq!(patient_info(&raw).name, "");
    }

    #[test]
    fn test_benefit_amounts_are_validated() {
        let benefits = benefits(&sample());
        assert_eq!(benefits.deductible.individual.remaining, "$50.00");
        assert_eq!(benefits.deductible.individual.total, "");
        assert_eq!(benefits.maximum.family.total, "$1,500.00");
        assert_eq!(benefits.maximum.family.remaining, "$1,200.00");
        assert_eq!(benefits.maximum.individual, AmountPair::default());
    }

    #[test]
    fn test_flat_amount_lines_in_plan_details() {
        let mut raw = RawSections::new();
        raw.insert_text("Plan Details", "Family Maximum", "$3,000.00");
        raw.insert_text("Plan Details", "Lifetime Orthodontics Maximum", "$1,500.00");
        let benefits = benefits(&raw);
        assert_eq!(benefits.maximum.family.total, "$3,000.00");
        assert_eq!(benefits.orthodontics.total, "$1,500.00");
    }

    #[test]
    fn test_benefit_amounts_come_from_one_section() {
        let mut raw = RawSections::new();
        raw.insert_text("Plan Details", "Family Maximum", "$3,000.00");
        raw.insert_text("Some Other Section", "Individual Deductible", "$75.00");
        let view = benefits(&raw);
        assert_eq!(view.maximum.family.total, "$3,000.00");
        assert_eq!(view.deductible.individual, AmountPair::default());

        raw.insert_text(BENEFITS_SECTION, "Individual Deductible", "$50.00");
        let view = benefits(&raw);
        assert_eq!(view.deductible.individual.total, "$50.00");
        assert_eq!(view.maximum.family, AmountPair::default());
    }

    #[test]
    fn test_coinsurance_and_frequencies() {
        let benefits = benefits(&sample());
        assert_eq!(benefits.coinsurance.diagnostic, "0%");
        assert_eq!(benefits.coinsurance.basic_restorative, "20%");
        assert_eq!(benefits.coinsurance.major_restorative, "");
        assert_eq!(benefits.frequencies.oral_exam, "Twice Per Calendar Year");
        assert_eq!(benefits.frequencies.crown, "Once Per 5 Years");
        assert_eq!(benefits.frequencies.bridge_work, "");
    }

    #[test]
    fn test_pre_auth() {
        assert_eq!(pre_auth(&sample()), NO_PRE_AUTH);

        let mut raw = RawSections::new();
        raw.insert_text(
            "Predetermination Of Benefits",
            "Pretreatment Review",
            "Pretreatment review is available on a voluntary basis.",
        );
        assert_eq!(
            pre_auth(&raw),
            "Pretreatment review is available on a voluntary basis."
        );
    }

    #[test]
    fn test_procedure_history() {
        let mut raw = RawSections::new();
        let mut seen = IndexMap::new();
        seen.insert("History".to_string(), "01/15/2024".to_string());
        let mut never = IndexMap::new();
        never.insert("History".to_string(), "No history".to_string());
        raw.insert(
            PROCEDURE_CODES_SECTION,
            "D1110 - Prophylaxis Adult",
            FieldValue::Procedure(seen),
        );
        raw.insert(
            PROCEDURE_CODES_SECTION,
            "D0120 - Periodic Oral Evaluation",
            FieldValue::Procedure(never),
        );
        let history = procedure_history(&raw);
        assert_eq!(history.len(), 1);
        assert_eq!(history["D1110 - Prophylaxis Adult"], "01/15/2024");
    }

    #[test]
    fn test_empty_input() {
        let view = project(&RawSections::new());
        assert_eq!(view.patient_info, PatientInfo::default());
        assert_eq!(view.benefits.pre_auth, NO_PRE_AUTH);
        assert!(view.last_procedures.is_empty());
    }
}
