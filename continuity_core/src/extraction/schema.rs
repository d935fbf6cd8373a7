//! Oracle output schema, best-effort repair and the keyword-based fallback.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn full_confidence() -> f32 {
    1.0
}

/// The JSON document an oracle is expected to return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleOutput {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relationships: Vec<RawRelationship>,
    #[serde(default)]
    pub timeline_events: Vec<RawTimelineEvent>,
    #[serde(default)]
    pub world_rules: Vec<RawRule>,
}

impl OracleOutput {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relationships.is_empty()
            && self.timeline_events.is_empty()
            && self.world_rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub source: String,
    pub target: String,
    #[serde(alias = "relation")]
    pub relationship: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTimelineEvent {
    pub event: String,
    #[serde(default)]
    pub time_reference: Value,
    #[serde(default, alias = "participants")]
    pub entities: Vec<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    pub rule_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

/// Which parsing stage produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Strict,
    Repaired,
    Heuristic,
}

/// Render a JSON scalar as plain text (strings without quotes).
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Parse oracle text exactly as returned.
pub fn parse_strict(raw: &str) -> Result<OracleOutput, serde_json::Error> {
    serde_json::from_str(raw.trim())
}

/// Parse after stripping code fences and prose around the outermost object and
/// removing trailing commas.
pub fn parse_repaired(raw: &str) -> Result<OracleOutput, serde_json::Error> {
    serde_json::from_str(&repair_json(raw))
}

/// Best-effort cleanup of almost-JSON produced by language models.
pub fn repair_json(raw: &str) -> String {
    let body = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw.trim(),
    };
    strip_trailing_commas(body)
}

fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Characters,
    Locations,
    Timeline,
    Rules,
}

fn section_header(line: &str) -> Option<Section> {
    if has_bullet(line) {
        return None;
    }
    let lower = line.to_lowercase();
    let words = lower.split_whitespace().count();
    let header_like = lower.starts_with('#') || lower.ends_with(':') || words <= 3;
    if !header_like {
        return None;
    }
    if lower.contains("character") {
        Some(Section::Characters)
    } else if lower.contains("location") {
        Some(Section::Locations)
    } else if lower.contains("timeline") || lower.contains("events") {
        Some(Section::Timeline)
    } else if lower.contains("rules") || lower.contains("systems") {
        Some(Section::Rules)
    } else {
        None
    }
}

fn has_bullet(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with(['-', '•']) || line.starts_with("* ") {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(['.', ')'])
}

/// Remove list markers such as `-`, `*`, `•`, `1.` and `2)`.
fn strip_bullet(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '•', ' ', '\t']);
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim();
        }
    }
    line.trim()
}

/// Split `Name: description` or `Name - description`.
fn split_name(item: &str) -> (String, Option<String>) {
    let split = item.split_once(':').or_else(|| item.split_once(" - "));
    match split {
        Some((name, rest)) if !name.trim().is_empty() => {
            let rest = rest.trim();
            (
                name.trim().trim_matches('*').trim().to_string(),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        _ => (item.trim_matches('*').trim().to_string(), None),
    }
}

/// Bucket free-text oracle output into sections by keyword headers.
///
/// Timeline items keep their listed order as ordinal time references.
pub fn parse_heuristic(raw: &str, confidence: f32) -> OracleOutput {
    let mut output = OracleOutput::default();
    let mut section = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('{') || line.starts_with('}') {
            continue;
        }
        if let Some(next) = section_header(line) {
            section = Some(next);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let item = strip_bullet(line);
        if item.is_empty() {
            continue;
        }

        match section {
            Some(Section::Characters) | Some(Section::Locations) => {
                let (name, description) = split_name(item);
                let kind = if section == Some(Section::Characters) {
                    "character"
                } else {
                    "location"
                };
                output.entities.push(RawEntity {
                    name,
                    kind: kind.to_string(),
                    description,
                    attributes: BTreeMap::new(),
                    confidence,
                });
            }
            Some(Section::Timeline) => {
                let position = output.timeline_events.len() as i64 + 1;
                output.timeline_events.push(RawTimelineEvent {
                    event: item.to_string(),
                    time_reference: Value::from(position),
                    entities: Vec::new(),
                    after: None,
                    confidence,
                });
            }
            Some(Section::Rules) => {
                let (rule_name, description) = split_name(item);
                output.world_rules.push(RawRule {
                    rule_name,
                    description: description.unwrap_or_default(),
                    confidence,
                });
            }
            None => {}
        }
    }

    output
}

/// Contradictions reported by a rule review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleReview {
    #[serde(default)]
    pub contradictions: Vec<RawRuleContradiction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRuleContradiction {
    #[serde(default)]
    pub rules: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub resolution_options: Vec<String>,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

/// Parse a rule review, trying the strict form first and then the repaired form.
pub fn parse_rule_review(raw: &str) -> Result<RuleReview, serde_json::Error> {
    serde_json::from_str(raw.trim()).or_else(|_| serde_json::from_str(&repair_json(raw)))
}
