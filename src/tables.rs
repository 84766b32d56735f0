//! Heuristic table detection over the text lines of one page.
//!
//! Three independent scanners run over the same lines:
//!
//! - a generic scanner for column tables split on wide gaps,
//! - a benefits scanner producing `{Field, Remaining, Total}` rows,
//! - a frequency scanner producing `{Procedure, Frequency}` rows.
//!
//! Tables are returned in the order they start on the page.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::kv_rules::normalize_whitespace;
use crate::raw::{Table, TableRow};

const GENERIC_KEYWORDS: &[&str] = &[
    "coinsurance",
    "frequency",
    "procedure",
    "code",
    "maximum",
    "deductible",
];

const CADENCE_KEYWORDS: &[&str] = &["No Limitations", "Exclude", "Per", "Once", "Twice"];

static COLUMN_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}|\t").unwrap_or_else(|e| panic!("{}", e)));
static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[\d,]+(?:\.\d+)?").unwrap_or_else(|e| panic!("{}", e)));
static FREQUENCY_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z -]+.*\b(Per|Once|Twice|Exclude|No Limitations)\b")
        .unwrap_or_else(|e| panic!("{}", e))
});
static CADENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Per|Once|Twice|Exclude|No Limitations)\b").unwrap_or_else(|e| panic!("{}", e))
});

/// A table together with the line index where it started.
struct Found {
    start: usize,
    rows: Table,
}

/// Detect all tables on one page.
pub fn extract_page_tables(lines: &[String]) -> Vec<Table> {
    let mut found = Vec::new();
    found.extend(scan_generic(lines));
    found.extend(scan_benefits(lines));
    found.extend(scan_frequencies(lines));
    // Stable: ties keep scanner order.
    found.sort_by_key(|t| t.start);
    let tables: Vec<Table> = found.into_iter().map(|t| t.rows).collect();
    if !tables.is_empty() {
        debug!("Detected {} table(s)", tables.len());
    }
    tables
}

fn split_columns(line: &str) -> Vec<String> {
    COLUMN_SPLIT
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Generic column tables
// ============================================================================

fn scan_generic(lines: &[String]) -> Vec<Found> {
    let mut out = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut current = Found {
        start: 0,
        rows: Vec::new(),
    };

    for (index, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if GENERIC_KEYWORDS.iter().any(|k| lower.contains(k)) {
            let cells = split_columns(line);
            if cells.len() >= 2 {
                if !current.rows.is_empty() {
                    out.push(std::mem::replace(
                        &mut current,
                        Found {
                            start: index,
                            rows: Vec::new(),
                        },
                    ));
                }
                current.start = index;
                headers = cells;
                continue;
            }
        }

        if headers.is_empty() {
            continue;
        }

        let cells = split_columns(line);
        if cells.len() >= headers.len() {
            let row: TableRow = headers.iter().cloned().zip(cells).collect();
            current.rows.push(row);
        } else {
            if !current.rows.is_empty() {
                out.push(std::mem::replace(
                    &mut current,
                    Found {
                        start: index,
                        rows: Vec::new(),
                    },
                ));
            }
            headers.clear();
        }
    }

    if !current.rows.is_empty() {
        out.push(current);
    }
    out
}

// ============================================================================
// Benefits
// ============================================================================

fn scan_benefits(lines: &[String]) -> Vec<Found> {
    let mut out = Vec::new();
    let mut current: Option<Found> = None;

    for (index, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if current.is_none() {
            if lower.contains("benefits") {
                current = Some(Found {
                    start: index,
                    rows: Vec::new(),
                });
            }
            continue;
        }

        if lower.contains("plan details") || lower.contains("frequency & limitations") {
            if let Some(table) = current.take() {
                if !table.rows.is_empty() {
                    out.push(table);
                }
            }
            continue;
        }

        if !line.contains('$') {
            continue;
        }
        if let (Some(table), Some(row)) = (current.as_mut(), benefit_row(line)) {
            table.rows.push(row);
        }
    }

    if let Some(table) = current {
        if !table.rows.is_empty() {
            out.push(table);
        }
    }
    out
}

fn benefit_row(line: &str) -> Option<TableRow> {
    let cells = split_columns(line);
    let (field, amounts) = if cells.len() > 1 {
        (cells[0].clone(), cells[1..].join(" "))
    } else {
        let dollar = line.find('$')?;
        (
            normalize_whitespace(&line[..dollar]),
            line[dollar..].to_string(),
        )
    };
    if field.is_empty() || field.starts_with('$') {
        return None;
    }
    let found: Vec<&str> = AMOUNT.find_iter(&amounts).map(|m| m.as_str()).collect();
    let mut row = IndexMap::new();
    row.insert("Field".to_string(), field);
    row.insert(
        "Remaining".to_string(),
        found.first().map(|s| s.to_string()).unwrap_or_default(),
    );
    row.insert(
        "Total".to_string(),
        found.get(1).map(|s| s.to_string()).unwrap_or_default(),
    );
    Some(row)
}

// ============================================================================
// Frequency & limitations
// ============================================================================

fn scan_frequencies(lines: &[String]) -> Vec<Found> {
    let mut out = Vec::new();
    let mut current: Option<Found> = None;

    for (index, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if current.is_none() {
            if lower.contains("frequency & limitations") {
                current = Some(Found {
                    start: index,
                    rows: Vec::new(),
                });
            }
            continue;
        }

        if lower.contains("total") || lower.contains("plan details") {
            if let Some(table) = current.take() {
                if !table.rows.is_empty() {
                    out.push(table);
                }
            }
            continue;
        }

        let text = line.trim();
        let Some(table) = current.as_mut() else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        if FREQUENCY_ROW.is_match(text) {
            let (procedure, frequency) = split_frequency(text);
            if procedure.is_empty() {
                append_frequency(&mut table.rows, &frequency);
            } else {
                let mut row = IndexMap::new();
                row.insert("Procedure".to_string(), procedure);
                row.insert("Frequency".to_string(), frequency);
                table.rows.push(row);
            }
        } else if !CADENCE.is_match(text) {
            append_frequency(&mut table.rows, text);
        }
    }

    if let Some(table) = current {
        if !table.rows.is_empty() {
            out.push(table);
        }
    }
    out
}

/// Split a frequency row into procedure and cadence text.
fn split_frequency(text: &str) -> (String, String) {
    let cells = split_columns(text);
    if cells.len() >= 2 {
        return (cells[0].clone(), cells[1..].join(" "));
    }
    let position = CADENCE_KEYWORDS
        .iter()
        .filter_map(|k| CADENCE.find_iter(text).find(|m| m.as_str() == *k))
        .map(|m| m.start())
        .min()
        .unwrap_or(0);
    (
        normalize_whitespace(&text[..position]),
        normalize_whitespace(&text[position..]),
    )
}

fn append_frequency(rows: &mut Table, text: &str) {
    if let Some(frequency) = rows.last_mut().and_then(|row| row.get_mut("Frequency")) {
        frequency.push(' ');
        frequency.push_str(&normalize_whitespace(text));
    }
}
