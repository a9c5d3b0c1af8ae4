//! Presentation of analysis results.
//!
//! Converts an [`AnalysisResult`] into labeled sections and Markdown. Both
//! the CLI and the desktop UI render through this module, so a result
//! variant can't be handled differently (or forgotten) by one of them.
//!
//! The model decides its own JSON schema, so field names are matched
//! loosely: case-insensitive, spaces and hyphens treated as underscores,
//! several aliases per field, and nested objects are searched too.

use crate::gemini::{AnalysisError, AnalysisResult};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const NOT_AVAILABLE: &str = "N/A";

const DISEASE_DETECTED: &[&str] = &["disease_detected", "has_disease", "diseased", "disease_present"];
const DISEASE_NAME: &[&str] = &["disease_name", "disease", "name_of_disease", "diagnosis"];
const SEVERITY: &[&str] = &["severity_level", "severity"];
const TREATMENT: &[&str] = &[
    "treatment_recommendations",
    "treatment",
    "treatments",
    "recommended_treatment",
];
const PREVENTION: &[&str] = &[
    "preventive_measures",
    "preventative_measures",
    "prevention",
    "prevention_measures",
];
const HEALTH: &[&str] = &[
    "health_assessment",
    "general_plant_health_assessment",
    "general_health_assessment",
    "plant_health_assessment",
    "overall_health",
    "plant_health",
];

/// A titled block of report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Renderable form of an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Sections(Vec<Section>),
    Text(String),
    Failure {
        message: String,
        details: Option<String>,
    },
}

impl Report {
    pub fn from_result(result: &AnalysisResult) -> Self {
        match result {
            AnalysisResult::Structured(fields) => Self::Sections(structured_sections(fields)),
            AnalysisResult::RawText(text) => Self::Text(text.clone()),
            AnalysisResult::Error(AnalysisError { message, details, .. }) => Self::Failure {
                message: message.clone(),
                details: details.clone(),
            },
        }
    }
}

/// Renders a result as a Markdown document.
pub fn to_markdown(result: &AnalysisResult) -> String {
    match Report::from_result(result) {
        Report::Sections(sections) => sections
            .iter()
            .map(|s| format!("## {}\n\n{}\n", s.title, s.body))
            .collect::<Vec<_>>()
            .join("\n"),
        Report::Text(text) => text,
        Report::Failure { message, details } => {
            let mut out = format!("**Error:** {}\n", message);
            if let Some(details) = details.filter(|d| !d.trim().is_empty()) {
                let fence = code_fence_for(&details);
                out.push_str(&format!("\n{fence}\n{}\n{fence}\n", details.trim_end()));
            }
            out
        }
    }
}

/// A backtick fence longer than any backtick run in `text`.
fn code_fence_for(text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// Builds the display sections for a structured result.
pub fn structured_sections(fields: &Map<String, Value>) -> Vec<Section> {
    let mut consumed: HashSet<String> = HashSet::new();
    let mut sections = Vec::new();

    let detected = find_field(fields, "", DISEASE_DETECTED, &mut consumed);
    let name = find_field(fields, "", DISEASE_NAME, &mut consumed);
    let severity = find_field(fields, "", SEVERITY, &mut consumed);
    let treatment = find_field(fields, "", TREATMENT, &mut consumed);
    let prevention = find_field(fields, "", PREVENTION, &mut consumed);
    let health = find_field(fields, "", HEALTH, &mut consumed);

    let detected_flag = detected.is_some_and(is_truthy);
    let has_disease_fields = [name, severity, treatment, prevention]
        .iter()
        .any(|field| field.is_some_and(|v| !v.is_null()));

    if detected_flag || has_disease_fields {
        sections.push(Section::new(
            "Disease Information",
            format!(
                "Disease: {}\n\nSeverity: {}",
                inline_value(name),
                inline_value(severity)
            ),
        ));
        sections.push(Section::new("Treatment Recommendations", block_value(treatment)));
        sections.push(Section::new("Preventive Measures", block_value(prevention)));
    } else if let Some(flag) = detected {
        sections.push(Section::new(
            "Disease Information",
            format!("Disease detected: {}", format_value(flag)),
        ));
    }

    sections.push(Section::new("Plant Health Assessment", block_value(health)));

    let extras: Vec<String> = fields
        .iter()
        .filter(|(key, value)| !fully_consumed(key, value, &consumed))
        .map(|(key, value)| {
            format!(
                "- **{}**: {}",
                humanize_key(key),
                format_value(value).replace('\n', "\n  ")
            )
        })
        .collect();
    if !extras.is_empty() {
        sections.push(Section::new("Additional Details", extras.join("\n")));
    }

    sections
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Looks up the first alias present, depth-first through nested objects.
///
/// The path of the matched key is recorded in `consumed`.
fn find_field<'a>(
    fields: &'a Map<String, Value>,
    prefix: &str,
    aliases: &[&str],
    consumed: &mut HashSet<String>,
) -> Option<&'a Value> {
    for alias in aliases {
        if let Some((key, value)) = fields.iter().find(|(k, _)| normalize_key(k) == *alias) {
            consumed.insert(child_path(prefix, key));
            return Some(value);
        }
    }

    fields.iter().find_map(|(key, value)| match value {
        Value::Object(nested) => find_field(nested, &child_path(prefix, key), aliases, consumed),
        _ => None,
    })
}

/// A field is consumed if it was matched itself, or if it is an object
/// whose every member was consumed.
fn fully_consumed(path: &str, value: &Value, consumed: &HashSet<String>) -> bool {
    if consumed.contains(path) {
        return true;
    }
    match value {
        Value::Object(nested) if !nested.is_empty() => nested
            .iter()
            .all(|(key, child)| fully_consumed(&child_path(path, key), child, consumed)),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "true"),
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn inline_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        Some(value) => format_value(value),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn block_value(value: Option<&Value>) -> String {
    value.map(format_value).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Formats a JSON value as readable text.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => NOT_AVAILABLE.to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => NOT_AVAILABLE.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.is_empty() => NOT_AVAILABLE.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", format_value(item).replace('\n', "\n  ")))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) if map.is_empty() => NOT_AVAILABLE.to_string(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::Array(_) | Value::Object(_) => format!(
                    "{}:\n{}",
                    humanize_key(key),
                    indent(&format_value(value))
                ),
                _ => format!("{}: {}", humanize_key(key), format_value(value)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `severity_level` -> `Severity level`
fn humanize_key(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
