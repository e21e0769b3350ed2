//! ArchSem document parser.
//!
//! ArchSem documents describe components and architectural patterns in
//! free text. Like CodeSem, the schema drifts between tool versions, so
//! extraction is recursive and conservative: named pattern lists are pulled
//! from a few known keys, and component summaries are assembled from
//! description-looking fields on component-like objects.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

/// Keys that may carry a pattern list.
const PATTERN_KEYS: &[&str] = &["patterns", "pattern", "arch_patterns", "architecture_patterns"];

/// Keys that may carry a component collection.
const COMPONENT_LIST_KEYS: &[&str] =
    &["components", "component", "subsystems", "modules", "architecture", "arch"];

/// Description fields assembled into a component summary, in order.
const SUMMARY_KEYS: &[&str] =
    &["description", "desc", "summary", "semantics", "responsibility", "role", "intent"];

/// Patterns and component summaries extracted from an ArchSem document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchSemIndex {
    /// Named architectural patterns, deduplicated, document order.
    pub patterns: Vec<String>,
    /// Component name to assembled summary text.
    pub component_to_summary: BTreeMap<String, String>,
    /// Where the document was read from.
    pub source_path: String,
}

impl ArchSemIndex {
    /// The summary of `component`, if extracted.
    #[must_use]
    pub fn summary_of(&self, component: &str) -> Option<&str> {
        self.component_to_summary.get(component).map(String::as_str)
    }

    /// The leading `k` patterns.
    #[must_use]
    pub fn top_patterns(&self, k: usize) -> Vec<String> {
        self.patterns.iter().take(k).cloned().collect()
    }
}

fn as_text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        _ => None,
    }
}

fn extract_patterns(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            for key in PATTERN_KEYS {
                if let Some(Value::Array(items)) = obj.get(*key) {
                    for it in items {
                        match it {
                            Value::String(s) if !s.trim().is_empty() => {
                                out.push(s.trim().to_string());
                            }
                            Value::Object(o) => {
                                let name = as_text(o.get("name"))
                                    .or_else(|| as_text(o.get("pattern")))
                                    .or_else(|| as_text(o.get("type")));
                                if let Some(n) = name {
                                    out.push(n);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            for v in obj.values() {
                extract_patterns(v, out);
            }
        }
        Value::Array(items) => {
            for it in items {
                extract_patterns(it, out);
            }
        }
        _ => {}
    }
}

fn component_name(obj: &Map<String, Value>) -> Option<String> {
    as_text(obj.get("name")).or_else(|| as_text(obj.get("component"))).or_else(|| as_text(obj.get("id")))
}

/// Assembles a summary for a component-like object: explicit description
/// fields first, then any long-enough string field as a fallback.
fn build_summary(obj: &Map<String, Value>) -> Option<String> {
    component_name(obj)?;
    let mut parts: Vec<String> = Vec::new();
    for key in SUMMARY_KEYS {
        if let Some(t) = as_text(obj.get(*key)) {
            parts.push(t);
        }
    }
    if parts.is_empty() {
        for (k, v) in obj {
            if ["name", "component", "id"].contains(&k.to_lowercase().as_str()) {
                continue;
            }
            if let Some(t) = as_text(Some(v)) {
                if t.len() >= 15 {
                    parts.push(t);
                    break;
                }
            }
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(" "))
}

fn merge_summary(out: &mut BTreeMap<String, String>, name: String, summary: String) {
    match out.get(&name) {
        Some(existing) if existing.len() >= summary.len() => {}
        _ => {
            out.insert(name, summary);
        }
    }
}

fn extract_summaries(value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(obj) => {
            for key in COMPONENT_LIST_KEYS {
                if let Some(Value::Array(items)) = obj.get(*key) {
                    for it in items {
                        if let Value::Object(o) = it {
                            if let (Some(name), Some(s)) = (component_name(o), build_summary(o)) {
                                merge_summary(out, name, s);
                            }
                        }
                    }
                }
            }
            if let (Some(name), Some(s)) = (component_name(obj), build_summary(obj)) {
                merge_summary(out, name, s);
            }
            for v in obj.values() {
                extract_summaries(v, out);
            }
        }
        Value::Array(items) => {
            for it in items {
                extract_summaries(it, out);
            }
        }
        _ => {}
    }
}

/// Parses an ArchSem document from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not JSON.
pub fn parse_arch_sem(path: &Path) -> Result<ArchSemIndex, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read ArchSem {}: {e}", path.display()))?;
    let data: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse ArchSem {}: {e}", path.display()))?;
    Ok(parse_arch_sem_value(&data, &path.display().to_string()))
}

/// Parses an ArchSem document from an already-loaded JSON value.
#[must_use]
pub fn parse_arch_sem_value(data: &Value, source: &str) -> ArchSemIndex {
    let mut raw_patterns = Vec::new();
    extract_patterns(data, &mut raw_patterns);

    // Deduplicate preserving first-seen order.
    let mut seen = std::collections::BTreeSet::new();
    let patterns: Vec<String> =
        raw_patterns.into_iter().filter(|p| seen.insert(p.clone())).collect();

    let mut component_to_summary = BTreeMap::new();
    extract_summaries(data, &mut component_to_summary);

    ArchSemIndex { patterns, component_to_summary, source_path: source.to_string() }
}
