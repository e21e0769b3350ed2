//! CodeSem document parser.
//!
//! CodeSem documents map files to free-text descriptions, but the schema
//! varies by tool version. Parsing is heuristic: a fast path handles the
//! common `{"summary": [{"file": ..., "Functionality": ...}]}` shape, and a
//! recursive scan over the whole document catches everything else by pairing
//! path-looking strings with description-looking strings in the same object.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::config::DiffConfig;
use crate::inputs::named_clusters::normalize_path;

/// File extensions accepted as "looks like a source file path".
const PATH_EXTENSIONS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cxx", ".h", ".hpp", ".hh", ".hxx", ".m", ".mm", ".py", ".js", ".ts",
    ".java", ".kt", ".go", ".rs", ".cs", ".swift", ".md", ".txt", ".json", ".yml", ".yaml",
];

/// Keys that may carry a file path.
const PATH_KEYS: &[&str] =
    &["file", "path", "filepath", "file_path", "filename", "name", "fullpath", "relative_path"];

/// Keys that may carry a description, in preference order.
const DESC_KEYS: &[&str] = &[
    "description", "desc", "summary", "semantics", "semantic", "meaning", "function", "purpose",
    "responsibility", "comment", "explain", "explanation", "content",
];

/// File→description index built from a CodeSem document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSemIndex {
    /// Normalized file path to its description.
    pub file_to_desc: BTreeMap<String, String>,
    /// Raw (file, description) pairs found, before dedup.
    pub total_pairs_found: usize,
    /// Where the document was read from.
    pub source_path: String,
}

impl CodeSemIndex {
    /// The description of `file`, if indexed.
    #[must_use]
    pub fn description_of(&self, file: &str) -> Option<&str> {
        self.file_to_desc.get(file).map(String::as_str)
    }
}

fn looks_like_file_path(s: &str) -> bool {
    let s = s.trim();
    if s.len() < 3 || s.len() > 300 {
        return false;
    }
    let lower = s.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return false;
    }
    PATH_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Picks the most description-like string field out of an object.
fn choose_description(obj: &Map<String, Value>) -> Option<String> {
    // The libxml2-era schema spells it "Functionality".
    for key in ["Functionality", "functionality"] {
        if let Some(Value::String(v)) = obj.get(key) {
            let t = v.trim();
            if t.len() >= 5 {
                return Some(t.to_string());
            }
        }
    }
    for key in DESC_KEYS {
        if let Some(Value::String(v)) = obj.get(*key) {
            let t = v.trim();
            if t.len() >= 5 {
                return Some(t.to_string());
            }
        }
    }
    // Last resort: any long-enough string field that is not itself a path key.
    for (k, v) in obj {
        if let Value::String(v) = v {
            if PATH_KEYS.contains(&k.to_lowercase().as_str()) {
                continue;
            }
            let t = v.trim();
            if t.len() >= 10 {
                return Some(t.to_string());
            }
        }
    }
    None
}

/// Recursively extracts (path, description) pairs.
fn extract_pairs(value: &Value, cfg: &DiffConfig, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(obj) => {
            let path_val = PATH_KEYS.iter().find_map(|k| match obj.get(*k) {
                Some(Value::String(s)) if looks_like_file_path(s) => Some(s.clone()),
                _ => None,
            });
            if let Some(p) = path_val {
                if let Some(desc) = choose_description(obj) {
                    out.push((normalize_path(&p, cfg), desc));
                }
            }
            for v in obj.values() {
                extract_pairs(v, cfg, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                extract_pairs(item, cfg, out);
            }
        }
        _ => {}
    }
}

/// Parses a CodeSem document from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not JSON.
pub fn parse_code_sem(path: &Path, cfg: &DiffConfig) -> Result<CodeSemIndex, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read CodeSem {}: {e}", path.display()))?;
    let data: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse CodeSem {}: {e}", path.display()))?;
    Ok(parse_code_sem_value(&data, cfg, &path.display().to_string()))
}

/// Parses a CodeSem document from an already-loaded JSON value.
#[must_use]
pub fn parse_code_sem_value(data: &Value, cfg: &DiffConfig, source: &str) -> CodeSemIndex {
    let mut pairs: Vec<(String, String)> = Vec::new();

    // Fast path: {"summary": [{file, Functionality}, ...]}.
    if let Some(summary) = data.get("summary").and_then(Value::as_array) {
        for it in summary {
            if let Value::Object(obj) = it {
                if let Some(Value::String(fp)) = obj.get("file") {
                    if looks_like_file_path(fp) {
                        if let Some(desc) = choose_description(obj) {
                            pairs.push((normalize_path(fp, cfg), desc));
                        }
                    }
                }
            }
        }
    } else {
        extract_pairs(data, cfg, &mut pairs);
    }

    let total_pairs_found = pairs.len();
    let mut file_to_desc: BTreeMap<String, String> = BTreeMap::new();
    for (fp, desc) in pairs {
        // A file may be extracted more than once; the longer description
        // carries more information.
        match file_to_desc.get(&fp) {
            Some(existing) if existing.len() >= desc.len() => {}
            _ => {
                file_to_desc.insert(fp, desc);
            }
        }
    }

    CodeSemIndex { file_to_desc, total_pairs_found, source_path: source.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(data: &Value) -> CodeSemIndex {
        parse_code_sem_value(data, &DiffConfig::default(), "test")
    }

    #[test]
    fn fast_path_reads_summary_list() {
        let idx = parse(&json!({
            "summary": [
                {"file": "src/parser.c", "Functionality": "Parses the document tree."},
                {"file": "src/io.c", "Functionality": "Buffered I/O helpers."}
            ]
        }));
        assert_eq!(idx.total_pairs_found, 2);
        assert_eq!(idx.description_of("src/parser.c"), Some("Parses the document tree."));
    }

    #[test]
    fn recursive_scan_finds_nested_pairs() {
        let idx = parse(&json!({
            "sections": [{"entries": [
                {"path": "lib/core.c", "description": "Core runtime support routines."}
            ]}]
        }));
        assert_eq!(idx.description_of("lib/core.c"), Some("Core runtime support routines."));
    }

    #[test]
    fn rejects_urls_and_non_path_strings() {
        let idx = parse(&json!({
            "summary": [
                {"file": "https://example.com/a.c", "Functionality": "Not a local file at all."},
                {"file": "x", "Functionality": "Too short to be a path."}
            ]
        }));
        assert!(idx.file_to_desc.is_empty());
    }

    #[test]
    fn keeps_longer_description_on_duplicate() {
        let idx = parse(&json!({"items": [
            {"file": "a.c", "description": "Short one."},
            {"file": "a.c", "description": "A noticeably longer description wins."}
        ]}));
        assert_eq!(idx.description_of("a.c"), Some("A noticeably longer description wins."));
    }

    #[test]
    fn normalizes_backslash_paths() {
        let idx = parse(&json!({"summary": [
            {"file": "src\\win\\poll.c", "Functionality": "Windows poll backend."}
        ]}));
        assert!(idx.description_of("src/win/poll.c").is_some());
    }
}
