//! Generative fallback mapper.
//!
//! Asks a text generator to fill canonical fields from the raw data, then
//! recovers a JSON object from whatever text came back. Nothing in here
//! returns an error: any failure is logged and yields an empty mapping.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{FieldSchema, FieldSpec};
use crate::llm::{GenerationOptions, TextGenerator};
use crate::raw::Table;

/// Tables beyond this many are left out of the prompt.
const MAX_PROMPT_TABLES: usize = 3;

/// Cells at least this long are left out of the prompt.
const MAX_CELL_CHARS: usize = 50;

const INSTRUCTIONS: &str = "You are an assistant that extracts field values from dental insurance eligibility data.
Return a JSON object mapping the provided data to the specified fields. Only include fields with non-empty values. \
Structure coinsurance and frequencies as nested objects. Use exact values from the data without modification. \
'patientName' must be a person's name, not an ID. \
Maximum and deductible fields are dollar amounts such as '$1,500.00'; the matching Remaining fields are the remaining dollar amounts. \
Map 'benefitsCoordinationMethod' to 'No' if 'Other Insurance?: No' is present. \
Copy the full 'Pretreatment review' or 'Predetermination' sentence into 'preAuthRequired'. \
For 'insuranceType', use the simplified plan type (e.g. 'PPO' from 'DENTAL PPO').";

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?").unwrap_or_else(|e| panic!("{}", e)));
static COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*.*?\*/|(?m)(^|[ \t])//[^\n]*").unwrap_or_else(|e| panic!("{}", e))
});
static OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap_or_else(|e| panic!("{}", e)));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap_or_else(|e| panic!("{}", e)));
static NON_ASCII: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap_or_else(|e| panic!("{}", e)));

pub struct FallbackMapper {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl FallbackMapper {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self { generator, options }
    }

    /// Ask the generator for field values. Empty on any failure.
    pub async fn map(
        &self,
        schema: &FieldSchema,
        raw: &IndexMap<String, String>,
        tables: &[Table],
    ) -> Map<String, Value> {
        let prompt = build_prompt(schema, raw, tables);
        info!(
            "Sending prompt to LLM ({}, {} chars)",
            self.generator.name(),
            prompt.len()
        );

        match self.generator.complete(&prompt, &self.options).await {
            Ok(response) => {
                debug!("Raw LLM response: {}", truncate(&response, 200));
                let parsed = sanitize_and_parse(&response);
                debug!("LLM mapping result: {} fields", parsed.len());
                parsed
            }
            Err(e) => {
                error!("LLM mapping failed: {:#}", e);
                Map::new()
            }
        }
    }
}

/// Build the single instruction sent to the generator.
pub fn build_prompt(
    schema: &FieldSchema,
    raw: &IndexMap<String, String>,
    tables: &[Table],
) -> String {
    format!(
        "{}\n\nRaw Data:\n{}\n\nTables:\n{}\n\nMap to these fields:\n{}\n\nExample output shape:\n{}\n",
        INSTRUCTIONS,
        pretty(raw),
        pretty(&prune_tables(tables)),
        pretty(schema),
        pretty(&example_output(schema)),
    )
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// The first few tables, keeping only short non-empty cells.
pub fn prune_tables(tables: &[Table]) -> Vec<Table> {
    tables
        .iter()
        .take(MAX_PROMPT_TABLES)
        .map(|table| {
            table
                .iter()
                .map(|row| {
                    row.iter()
                        .filter(|(k, v)| {
                            !k.is_empty() && !v.is_empty() && v.chars().count() < MAX_CELL_CHARS
                        })
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<IndexMap<_, _>>()
                })
                .filter(|row| !row.is_empty())
                .collect::<Table>()
        })
        .filter(|table| !table.is_empty())
        .collect()
}

/// An output skeleton with placeholder values in schema order.
fn example_output(schema: &FieldSchema) -> Map<String, Value> {
    schema
        .iter()
        .map(|(name, spec)| {
            let value = match spec {
                FieldSpec::Aliases(_) => Value::String("...".to_string()),
                FieldSpec::Group(subs) => Value::Object(
                    subs.keys()
                        .map(|sub| (sub.clone(), Value::String("...".to_string())))
                        .collect(),
                ),
            };
            (name.clone(), value)
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

// ============================================================================
// Sanitize-then-parse
// ============================================================================

/// Recover a JSON object from free-form model output.
///
/// Strips code fences, comments, trailing commas and non-ASCII characters,
/// quotes bare keys and bare scalar values, then parses. Returns an empty map
/// when no object can be recovered.
pub fn sanitize_and_parse(text: &str) -> Map<String, Value> {
    let text = FENCE.replace_all(text, "");
    let text = COMMENT.replace_all(&text, "$1");
    let Some(object) = OBJECT.find(&text) else {
        warn!("No JSON-like content found in response: {}", truncate(&text, 100));
        return Map::new();
    };
    let text = TRAILING_COMMA.replace_all(object.as_str(), "$1");
    let text = NON_ASCII.replace_all(&text, "");

    let parsed = serde_json::from_str::<Value>(&text)
        .or_else(|_| serde_json::from_str::<Value>(&quote_bare_tokens(&text)));
    match parsed {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("Parsed LLM response is not an object");
            Map::new()
        }
        Err(e) => {
            warn!("JSON decode error: {} ({})", e, truncate(&text, 100));
            Map::new()
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Expect {
    Key,
    Value,
    Other,
}

/// Quote unquoted keys and unquoted scalar values. Quoted strings, numbers
/// and `true`/`false`/`null` are copied through.
fn quote_bare_tokens(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 32);
    let mut stack: Vec<char> = Vec::new();
    let mut expect = Expect::Other;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = string_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
                expect = Expect::Other;
                continue;
            }
            '{' | '[' => {
                stack.push(c);
                expect = if c == '{' { Expect::Key } else { Expect::Value };
                out.push(c);
            }
            '}' | ']' => {
                stack.pop();
                expect = Expect::Other;
                out.push(c);
            }
            ',' => {
                expect = if stack.last() == Some(&'{') {
                    Expect::Key
                } else {
                    Expect::Value
                };
                out.push(c);
            }
            ':' => {
                expect = Expect::Value;
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            _ if expect == Expect::Key => {
                let start = i;
                while i < chars.len() && !matches!(chars[i], ':' | ',' | '}' | '\n') {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                out.push_str(&quoted(key.trim()));
                expect = Expect::Other;
                continue;
            }
            _ => {
                let in_array = stack.last() == Some(&'[');
                let start = i;
                while i < chars.len() {
                    match chars[i] {
                        '}' | ']' | '\n' => break,
                        ',' if in_array => break,
                        // "$1,500.00" keeps its thousands separator.
                        ',' if !chars.get(i + 1).map_or(false, |n| n.is_ascii_digit()) => break,
                        _ => i += 1,
                    }
                }
                let token: String = chars[start..i].iter().collect();
                let token = token.trim();
                if is_json_literal(token) {
                    out.push_str(token);
                } else {
                    out.push_str(&quoted(token));
                }
                expect = Expect::Other;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Index just past the closing quote of the string starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn is_json_literal(token: &str) -> bool {
    matches!(token, "true" | "false" | "null")
        || serde_json::from_str::<serde_json::Number>(token).is_ok()
}

fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
