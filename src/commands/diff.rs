//! Handler for the `diff` subcommand: the full pipeline for one version pair.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use uuid::Uuid;

use crate::align::{align_modules_by_jaccard, Alignment};
use crate::cli::{DiffArgs, DiffMode, MdMode};
use crate::config::DiffConfig;
use crate::denoise::denoise_changes;
use crate::events::{build_module_level_events, file_events_from_diff, infer_overlap_events, SemanticInputs};
use crate::inputs::{
    parse_arch_sem, parse_cluster_component, parse_code_sem, parse_named_clusters,
    resolve_inputs_from_dirs, ArchSemIndex, CodeSemIndex,
};
use crate::ir::{
    now_iso_local, AlignmentMeta, ChangeEvent, ComponentEntities, DiffIr, EntitySection,
    EventIdAllocator, FileEntities, InputPaths, ModuleDiffMeta, ModuleEntities, QualitySection,
    RunMeta, SemanticsMeta,
};
use crate::quality::build_quality_report;
use crate::render::{llm::render_markdown_llm, render_markdown_template};
use crate::significance::attach_significance;
use crate::snapshot::{diff_file_universe, Snapshot};

/// Runs the diff pipeline and writes `diff_ir-raw.json`,
/// `diff_ir-denoised.json`, and optionally `diff_summary.md` to the output
/// directory.
///
/// # Errors
///
/// Returns an error if inputs cannot be located or parsed, or if any output
/// cannot be written.
pub fn run(args: &DiffArgs) -> Result<(), String> {
    let cfg = match &args.config {
        Some(path) => DiffConfig::load(path)?,
        None => DiffConfig::default(),
    };

    let out_dir = args.out.clone().unwrap_or_else(|| {
        PathBuf::from("out").join(format!("{}_{}-{}", args.repo, args.label_a, args.label_b))
    });
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| format!("Failed to create output directory {}: {e}", out_dir.display()))?;

    let resolved = resolve_inputs_from_dirs(&args.dir_a, &args.dir_b)?;
    println!("=== Inputs ===");
    println!("A NamedClusters: {}", resolved.version_a.named_clusters.display());
    println!("A ClusterComponent: {}", resolved.version_a.cluster_component.display());
    println!("B NamedClusters: {}", resolved.version_b.named_clusters.display());
    println!("B ClusterComponent: {}", resolved.version_b.cluster_component.display());

    let named_a = parse_named_clusters(&resolved.version_a.named_clusters, &cfg)?;
    let named_b = parse_named_clusters(&resolved.version_b.named_clusters, &cfg)?;
    let comp_a =
        parse_cluster_component(&resolved.version_a.cluster_component, &named_a.name_to_uids, &cfg)?;
    let comp_b =
        parse_cluster_component(&resolved.version_b.cluster_component, &named_b.name_to_uids, &cfg)?;

    let code_a = optional_code_sem(resolved.version_a.code_sem.as_deref(), &cfg)?;
    let code_b = optional_code_sem(resolved.version_b.code_sem.as_deref(), &cfg)?;
    let arch_a = optional_arch_sem(resolved.version_a.arch_sem.as_deref())?;
    let arch_b = optional_arch_sem(resolved.version_b.arch_sem.as_deref())?;

    let snap_a = Snapshot::build(&args.label_a, named_a, comp_a);
    let snap_b = Snapshot::build(&args.label_b, named_b, comp_b);

    let alignment = align_modules_by_jaccard(
        &module_files(&snap_a),
        &module_files(&snap_b),
        cfg.min_edge_weight,
        cfg.engine,
    );
    println!("\n=== A2A Mapping Summary ===");
    println!("engine: {}", alignment.meta.engine);
    println!("global_similarity: {}", alignment.global_similarity);
    println!(
        "mapped: {} removed(A-only): {} added(B-only): {}",
        alignment.mapping.len(),
        alignment.removed.len(),
        alignment.added.len()
    );

    let mut ids = EventIdAllocator::new();
    let diff = diff_file_universe(&snap_a, &snap_b);

    let mut events: Vec<ChangeEvent> = match args.mode {
        DiffMode::Module => {
            let sems = SemanticInputs {
                code_a: code_a.as_ref(),
                code_b: code_b.as_ref(),
                arch_a: arch_a.as_ref(),
                arch_b: arch_b.as_ref(),
            };
            build_module_level_events(&snap_a, &snap_b, &alignment, &cfg, &sems, &mut ids)
        }
        DiffMode::Legacy => {
            let mut events = file_events_from_diff(&diff, &mut ids);
            events.extend(infer_overlap_events(&snap_a, &snap_b, &cfg, &mut ids));
            events
        }
    };

    let report = build_quality_report(
        &snap_a,
        &snap_b,
        diff.added.len(),
        diff.removed.len(),
        &cfg,
        &mut ids,
    );
    events.extend(report.warning_events.clone());

    attach_significance(&mut events, snap_a.files.len().max(snap_b.files.len()), &cfg.significance);

    let ir = assemble_ir(args, &cfg, &resolved_paths(&resolved), &snap_a, &snap_b, &alignment, &diff,
        &report.flags, &report.notes, code_a.as_ref(), code_b.as_ref(), arch_a.as_ref(),
        arch_b.as_ref(), events);

    let raw_path = out_dir.join("diff_ir-raw.json");
    ir.write_to(&raw_path)?;
    println!("\nWrote RAW IR: {}", raw_path.display());
    println!("RAW total changes: {}", ir.changes.len());

    let (filtered, stats) =
        denoise_changes(&ir.changes, Some(&snap_a.named), Some(&snap_b.named), &cfg.denoise);
    let mut denoised = ir.clone();
    denoised.changes = filtered;
    denoised.meta.denoise = Some(stats.clone());

    let denoised_path = out_dir.join("diff_ir-denoised.json");
    denoised.write_to(&denoised_path)?;
    println!("Wrote DENOISED IR: {}", denoised_path.display());
    println!("DENOISED total changes: {} (dropped={})", denoised.changes.len(), stats.dropped);

    match args.md_mode {
        MdMode::None => {}
        MdMode::Template | MdMode::Llm => {
            let md = if args.md_mode == MdMode::Template {
                render_markdown_template(&denoised)
            } else {
                render_markdown_llm(&denoised, &args.model)?
            };
            let md_path = out_dir.join("diff_summary.md");
            std::fs::write(&md_path, md)
                .map_err(|e| format!("Failed to write summary {}: {e}", md_path.display()))?;
            println!("Wrote Markdown summary: {}", md_path.display());
        }
    }

    Ok(())
}

fn optional_code_sem(
    path: Option<&std::path::Path>,
    cfg: &DiffConfig,
) -> Result<Option<CodeSemIndex>, String> {
    path.filter(|p| p.exists()).map(|p| parse_code_sem(p, cfg)).transpose()
}

fn optional_arch_sem(path: Option<&std::path::Path>) -> Result<Option<ArchSemIndex>, String> {
    path.filter(|p| p.exists()).map(parse_arch_sem).transpose()
}

fn module_files(snap: &Snapshot) -> BTreeMap<String, BTreeSet<String>> {
    snap.modules().iter().map(|m| (m.uid.clone(), m.files.clone())).collect()
}

fn resolved_paths(resolved: &crate::inputs::ResolvedInputs) -> InputPaths {
    InputPaths {
        named_clusters_a: resolved.version_a.named_clusters.display().to_string(),
        named_clusters_b: resolved.version_b.named_clusters.display().to_string(),
        cluster_component_a: resolved.version_a.cluster_component.display().to_string(),
        cluster_component_b: resolved.version_b.cluster_component.display().to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_ir(
    args: &DiffArgs,
    cfg: &DiffConfig,
    inputs: &InputPaths,
    snap_a: &Snapshot,
    snap_b: &Snapshot,
    alignment: &Alignment,
    diff: &crate::snapshot::FileUniverseDiff,
    flags: &BTreeMap<String, bool>,
    notes: &[String],
    code_a: Option<&CodeSemIndex>,
    code_b: Option<&CodeSemIndex>,
    arch_a: Option<&ArchSemIndex>,
    arch_b: Option<&ArchSemIndex>,
    changes: Vec<ChangeEvent>,
) -> DiffIr {
    DiffIr {
        meta: RunMeta {
            repo: args.repo.clone(),
            version_a: args.label_a.clone(),
            version_b: args.label_b.clone(),
            generated_at: now_iso_local(),
            run_id: Uuid::new_v4().to_string(),
            inputs: inputs.clone(),
            a2a: AlignmentMeta {
                engine: alignment.meta.engine.clone(),
                global_similarity: alignment.global_similarity,
                min_edge_weight: cfg.min_edge_weight,
            },
            module_diff: ModuleDiffMeta {
                min_file_delta: cfg.min_file_delta,
                top_k_files: cfg.top_k_files,
                min_jaccard_to_accept: cfg.min_jaccard_to_accept,
            },
            semantics: SemanticsMeta {
                codesem_a_loaded: code_a.is_some(),
                codesem_b_loaded: code_b.is_some(),
                archsem_a_loaded: arch_a.is_some(),
                archsem_b_loaded: arch_b.is_some(),
                codesem_a_size: code_a.map_or(0, |c| c.file_to_desc.len()),
                codesem_b_size: code_b.map_or(0, |c| c.file_to_desc.len()),
                archsem_a_components: arch_a.map_or(0, |a| a.component_to_summary.len()),
                archsem_b_components: arch_b.map_or(0, |a| a.component_to_summary.len()),
            },
            denoise: None,
        },
        quality: QualitySection { flags: flags.clone(), notes: notes.to_vec() },
        entities: EntitySection {
            files: FileEntities {
                count_a: snap_a.files.len(),
                count_b: snap_b.files.len(),
                added: diff.added.clone(),
                removed: diff.removed.clone(),
                reassigned_count: diff.reassigned.len(),
            },
            modules: ModuleEntities {
                count_a: snap_a.modules().len(),
                count_b: snap_b.modules().len(),
                mapped: alignment.mapping.len(),
                removed: alignment.removed.len(),
                added: alignment.added.len(),
            },
            components: ComponentEntities {
                count_a: snap_a.comp.component_to_module_uids.len(),
                count_b: snap_b.comp.component_to_module_uids.len(),
                unresolved_a: snap_a.comp.unresolved.len(),
                unresolved_b: snap_b.comp.unresolved.len(),
            },
        },
        changes,
    }
}
