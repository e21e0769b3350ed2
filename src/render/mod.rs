//! Markdown report rendering.
//!
//! Two renderers over the same IR document: a deterministic template
//! renderer, and an LLM renderer that asks a chat model to write the report
//! under strict citation rules. Both force every factual bullet to cite a
//! `[CHG-XXXX]` id so claims stay traceable to events.

pub mod llm;

use std::fmt::Write as _;

use crate::ir::{ChangeDetail, ChangeEvent, ChangeType, DiffIr, SemanticContext};

/// Events below this confidence get an explicit low-confidence marker.
const LOW_CONFIDENCE: f64 = 0.75;

/// Report section a change event is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Files,
    Modules,
    Components,
    Quality,
}

fn section_of(kind: ChangeType) -> Section {
    match kind {
        ChangeType::FileAdded | ChangeType::FileRemoved | ChangeType::FileReassigned => {
            Section::Files
        }
        ChangeType::ModuleMovedBetweenComponents => Section::Components,
        ChangeType::QualityWarning => Section::Quality,
        _ => Section::Modules,
    }
}

fn in_section<'a>(ir: &'a DiffIr, section: Section) -> Vec<&'a ChangeEvent> {
    ir.changes.iter().filter(|e| section_of(e.kind) == section).collect()
}

/// Renders the deterministic Markdown report from an IR document.
#[must_use]
pub fn render_markdown_template(ir: &DiffIr) -> String {
    let mut out = String::new();
    let version_a = &ir.meta.version_a;
    let version_b = &ir.meta.version_b;

    let quality_events = in_section(ir, Section::Quality);
    let stable_id = quality_events
        .iter()
        .find(|e| matches!(&e.detail, ChangeDetail::QualityWarning { flag } if flag == "stable_file_universe"))
        .or_else(|| quality_events.first())
        .map(|e| e.id.clone());
    let first_id = ir.changes.first().map_or_else(|| "CHG-0000".to_string(), |e| e.id.clone());
    let quality_cite = stable_id.clone().unwrap_or_else(|| first_id.clone());

    let _ = writeln!(out, "# Architecture Change Report: {version_a} \u{2192} {version_b}");
    out.push('\n');
    out.push_str("## Overview\n");

    let files = &ir.entities.files;
    let _ = writeln!(
        out,
        "- File universe: {} \u{2192} {} (added={}, removed={}). [{quality_cite}]",
        files.count_a,
        files.count_b,
        files.added.len(),
        files.removed.len(),
    );
    if !ir.changes.is_empty() {
        let _ = writeln!(out, "- Total detected change events: {}. [{first_id}]", ir.changes.len());
    }

    let caution_flags: Vec<&str> = [
        "module_count_delta_large",
        "component_mapping_incomplete",
        "namedcluster_has_duplicate_module_names",
    ]
    .into_iter()
    .filter(|k| ir.quality.flags.get(*k).copied().unwrap_or(false))
    .collect();
    if !caution_flags.is_empty() {
        let cite = quality_events.first().map_or(first_id.as_str(), |e| e.id.as_str());
        let _ = writeln!(out, "- Reliability caution due to flags: {caution_flags:?}. [{cite}]");
    }

    out.push('\n');
    out.push_str("## Detected Changes\n");
    emit_section(&mut out, "Files", &in_section(ir, Section::Files), &first_id, !ir.changes.is_empty());
    emit_section(&mut out, "Modules", &in_section(ir, Section::Modules), &first_id, !ir.changes.is_empty());
    emit_section(&mut out, "Components", &in_section(ir, Section::Components), &first_id, !ir.changes.is_empty());
    emit_section(&mut out, "Quality", &quality_events, &first_id, !ir.changes.is_empty());

    out.push_str("## Reliability notes\n");
    if ir.quality.notes.is_empty() {
        let _ = writeln!(out, "- No additional reliability notes. [{quality_cite}]");
    } else {
        for note in &ir.quality.notes {
            let _ = writeln!(out, "- {note} [{quality_cite}]");
        }
    }

    out.push('\n');
    out.push_str("## Appendix: Change Index\n");
    for ev in &ir.changes {
        let _ = writeln!(out, "- {}: {}", ev.id, ev.summary);
    }

    out
}

fn emit_section(
    out: &mut String,
    title: &str,
    events: &[&ChangeEvent],
    first_id: &str,
    have_any_changes: bool,
) {
    let _ = writeln!(out, "### {title}");
    if events.is_empty() {
        if have_any_changes {
            let _ = writeln!(out, "- No events in this category. [{first_id}]");
        } else {
            out.push_str("- No events in this category.\n");
        }
        out.push('\n');
        return;
    }

    for ev in events {
        let low = if ev.confidence < LOW_CONFIDENCE { " (Low confidence)" } else { "" };
        let _ = writeln!(out, "- {}{low}. [{}]", ev.summary.trim_end_matches('.'), ev.id);

        if let ChangeDetail::ModuleChanged { examples, semantics, .. } = &ev.detail {
            if !examples.added_files_top.is_empty() {
                let _ = writeln!(out, "  - Added files (top): {}", backticked(&examples.added_files_top));
            }
            if !examples.removed_files_top.is_empty() {
                let _ =
                    writeln!(out, "  - Removed files (top): {}", backticked(&examples.removed_files_top));
            }
            emit_semantics(out, semantics);
        }
    }
    out.push('\n');
}

fn backticked(items: &[String]) -> String {
    items.iter().map(|x| format!("`{x}`")).collect::<Vec<_>>().join(", ")
}

fn emit_semantics(out: &mut String, semantics: &SemanticContext) {
    let arch = &semantics.arch;
    let mut arch_lines: Vec<String> = Vec::new();
    match (&arch.from_component, &arch.to_component) {
        (Some(f), Some(t)) if f != t => arch_lines.push(format!("Component: `{f}` \u{2192} `{t}`")),
        (Some(f), _) => arch_lines.push(format!("Component: `{f}`")),
        (None, Some(t)) => arch_lines.push(format!("Component: `{t}`")),
        (None, None) => {}
    }
    if let Some(s) = arch.from_component_summary.as_deref().map(str::trim).filter(|s| !s.is_empty())
    {
        arch_lines.push(format!("From component semantics: {s}"));
    }
    if let Some(s) = arch.to_component_summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        arch_lines.push(format!("To component semantics: {s}"));
    }
    if !arch.patterns_a_top.is_empty() {
        arch_lines.push(format!("Arch patterns (source, top): {}", backticked(&arch.patterns_a_top)));
    }
    if !arch.patterns_b_top.is_empty() {
        arch_lines.push(format!("Arch patterns (target, top): {}", backticked(&arch.patterns_b_top)));
    }
    if !arch_lines.is_empty() {
        out.push_str("  **Architecture context**\n");
        for line in arch_lines {
            let _ = writeln!(out, "  - {line}");
        }
    }

    let code = &semantics.code;
    if !code.added_files.is_empty() || !code.removed_files.is_empty() {
        out.push_str("  **Code semantics (evidence from CodeSem)**\n");
        if !code.added_files.is_empty() {
            out.push_str("  - Added/introduced:\n");
            for entry in &code.added_files {
                let _ = writeln!(out, "    - `{}`: {}", entry.path, entry.desc);
            }
        }
        if !code.removed_files.is_empty() {
            out.push_str("  - Removed/retired:\n");
            for entry in &code.removed_files {
                let _ = writeln!(out, "    - `{}`: {}", entry.path, entry.desc);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        AlignmentMeta, ChangeDetail, ChangeEvent, EntitySection, EventIdAllocator, EvidenceItem,
        InputPaths, ModuleDiffMeta, QualitySection, RunMeta, SemanticsMeta,
    };

    fn ir_with_changes(changes: Vec<ChangeEvent>) -> DiffIr {
        DiffIr {
            meta: RunMeta {
                repo: "libuv".into(),
                version_a: "v1.49.0".into(),
                version_b: "v1.50.0".into(),
                generated_at: "2026-01-01T00:00:00+00:00".into(),
                run_id: "test".into(),
                inputs: InputPaths::default(),
                a2a: AlignmentMeta {
                    engine: "hungarian".into(),
                    global_similarity: 0.9,
                    min_edge_weight: 0.0,
                },
                module_diff: ModuleDiffMeta {
                    min_file_delta: 1,
                    top_k_files: 8,
                    min_jaccard_to_accept: 0.0,
                },
                semantics: SemanticsMeta::default(),
                denoise: None,
            },
            quality: QualitySection::default(),
            entities: EntitySection::default(),
            changes,
        }
    }

    #[test]
    fn every_change_bullet_cites_its_id() {
        let mut ids = EventIdAllocator::new();
        let ev = ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleAdded,
            0.95,
            "Module added: net#1 (name=net, files=3).".into(),
            ChangeDetail::ModuleLifecycle {
                module_uid: "net#1".into(),
                module_name: "net".into(),
                file_count: 3,
                architecture_significance: None,
            },
            vec![EvidenceItem::new("NamedClusters", "module:net#1".into(), "")],
        );
        let md = render_markdown_template(&ir_with_changes(vec![ev]));
        assert!(md.starts_with("# Architecture Change Report: v1.49.0 \u{2192} v1.50.0"));
        assert!(md.contains("[CHG-0001]"));
        assert!(md.contains("## Appendix: Change Index"));
        assert!(md.contains("- CHG-0001: Module added: net#1 (name=net, files=3)."));
    }

    #[test]
    fn low_confidence_events_are_marked() {
        let mut ids = EventIdAllocator::new();
        let ev = ChangeEvent::new(
            ids.next_id(),
            ChangeType::ModuleMerge,
            0.4,
            "Multiple modules appear merged into core#1 based on file-set overlap/coverage.".into(),
            ChangeDetail::ModuleMerge {
                from_module_uids: vec!["a#1".into(), "b#1".into()],
                to_module_uid: "core#1".into(),
                coverage: 0.85,
                overlaps: vec![],
            },
            vec![],
        );
        let md = render_markdown_template(&ir_with_changes(vec![ev]));
        assert!(md.contains("(Low confidence)"));
    }

    #[test]
    fn empty_sections_still_render_with_citation() {
        let md = render_markdown_template(&ir_with_changes(vec![]));
        assert!(md.contains("### Files\n- No events in this category."));
        assert!(md.contains("- No additional reliability notes."));
    }

    #[test]
    fn quality_events_land_in_quality_section() {
        let mut ids = EventIdAllocator::new();
        let ev = ChangeEvent::new(
            ids.next_id(),
            ChangeType::QualityWarning,
            1.0,
            "File universe unchanged; file-level diffs are reliable.".into(),
            ChangeDetail::QualityWarning { flag: "stable_file_universe".into() },
            vec![],
        );
        let md = render_markdown_template(&ir_with_changes(vec![ev]));
        let quality_at = md.find("### Quality").expect("quality section");
        let bullet_at = md.find("File universe unchanged").expect("bullet");
        assert!(bullet_at > quality_at);
    }
}
