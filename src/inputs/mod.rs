//! Input discovery and parsing for SemArc JSON documents.
//!
//! A diff run consumes two directories, one per version. Each directory
//! holds the reverse-engineering tool's output for that version: a
//! NamedClusters and a ClusterComponent document (required), plus optional
//! ArchSem and CodeSem documents.

pub mod arch_sem;
pub mod cluster_component;
pub mod code_sem;
pub mod named_clusters;

use std::path::{Path, PathBuf};

pub use arch_sem::{parse_arch_sem, ArchSemIndex};
pub use cluster_component::{parse_cluster_component, ComponentMapping, UnresolvedClusterRef};
pub use code_sem::{parse_code_sem, CodeSemIndex};
pub use named_clusters::{parse_named_clusters, Module, NamedClustersIndex};

/// Filename suffix of a NamedClusters document.
const NAMED_CLUSTERS_SUFFIX: &str = "_NamedClusters.json";
/// Filename suffix of a ClusterComponent document.
const CLUSTER_COMPONENT_SUFFIX: &str = "_ClusterComponent.json";
/// Filename suffix of an ArchSem document.
const ARCH_SEM_SUFFIX: &str = "_ArchSem.json";
/// Filename suffix of a CodeSem document.
const CODE_SEM_SUFFIX: &str = "_CodeSem.json";

/// Resolved input files for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInputs {
    /// The NamedClusters document (required).
    pub named_clusters: PathBuf,
    /// The ClusterComponent document (required).
    pub cluster_component: PathBuf,
    /// The ArchSem document, when present.
    pub arch_sem: Option<PathBuf>,
    /// The CodeSem document, when present.
    pub code_sem: Option<PathBuf>,
}

/// Resolved input files for a version pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    /// Root directory of version A.
    pub version_a_root: PathBuf,
    /// Root directory of version B.
    pub version_b_root: PathBuf,
    /// Files found for version A.
    pub version_a: VersionInputs,
    /// Files found for version B.
    pub version_b: VersionInputs,
}

/// Locates the SemArc JSON documents under two version directories.
///
/// When several files match a suffix the shortest path wins, which prefers
/// the tool's direct output directory over nested copies.
///
/// # Errors
///
/// Returns an error if either directory is missing or if a required document
/// (NamedClusters or ClusterComponent) cannot be found on either side.
pub fn resolve_inputs_from_dirs(dir_a: &Path, dir_b: &Path) -> Result<ResolvedInputs, String> {
    if !dir_a.is_dir() {
        return Err(format!("Version A directory not found: {}", dir_a.display()));
    }
    if !dir_b.is_dir() {
        return Err(format!("Version B directory not found: {}", dir_b.display()));
    }

    let version_a = find_version_inputs(dir_a)?;
    let version_b = find_version_inputs(dir_b)?;

    Ok(ResolvedInputs {
        version_a_root: dir_a.to_path_buf(),
        version_b_root: dir_b.to_path_buf(),
        version_a,
        version_b,
    })
}

/// Finds the per-version documents under one root.
fn find_version_inputs(root: &Path) -> Result<VersionInputs, String> {
    let mut json_files = Vec::new();
    collect_json_files(root, &mut json_files)?;
    // Shortest path first, then lexical, so repeated runs pick the same file.
    json_files.sort_by(|a, b| {
        let la = a.as_os_str().len();
        let lb = b.as_os_str().len();
        la.cmp(&lb).then_with(|| a.cmp(b))
    });

    let pick = |suffix: &str| -> Option<PathBuf> {
        json_files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy().ends_with(suffix)))
            .cloned()
    };

    let named_clusters = pick(NAMED_CLUSTERS_SUFFIX).ok_or_else(|| {
        format!("No *{NAMED_CLUSTERS_SUFFIX} found under {}", root.display())
    })?;
    let cluster_component = pick(CLUSTER_COMPONENT_SUFFIX).ok_or_else(|| {
        format!("No *{CLUSTER_COMPONENT_SUFFIX} found under {}", root.display())
    })?;

    Ok(VersionInputs {
        named_clusters,
        cluster_component,
        arch_sem: pick(ARCH_SEM_SUFFIX),
        code_sem: pick(CODE_SEM_SUFFIX),
    })
}

/// Recursively collects `.json` files under `root`.
fn collect_json_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
    let entries = std::fs::read_dir(root)
        .map_err(|e| format!("Failed to list directory {}: {e}", root.display()))?;
    for entry in entries {
        let entry = entry.map_err(|e| format!("Failed to read entry in {}: {e}", root.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("archdiff-inputs-{tag}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn resolves_required_and_optional_documents() {
        let a = scratch_dir("a");
        let b = scratch_dir("b");
        for dir in [&a, &b] {
            std::fs::write(dir.join("demo_NamedClusters.json"), "{}").expect("write");
            std::fs::write(dir.join("demo_ClusterComponent.json"), "{}").expect("write");
        }
        std::fs::write(b.join("demo_CodeSem.json"), "{}").expect("write");

        let resolved = resolve_inputs_from_dirs(&a, &b).expect("resolve");
        assert!(resolved.version_a.arch_sem.is_none());
        assert!(resolved.version_a.code_sem.is_none());
        assert!(resolved.version_b.code_sem.is_some());

        std::fs::remove_dir_all(&a).ok();
        std::fs::remove_dir_all(&b).ok();
    }

    #[test]
    fn missing_required_document_is_fatal() {
        let a = scratch_dir("missing-a");
        let b = scratch_dir("missing-b");
        std::fs::write(a.join("demo_NamedClusters.json"), "{}").expect("write");
        std::fs::write(a.join("demo_ClusterComponent.json"), "{}").expect("write");
        std::fs::write(b.join("demo_NamedClusters.json"), "{}").expect("write");

        let err = resolve_inputs_from_dirs(&a, &b).expect_err("must fail");
        assert!(err.contains("_ClusterComponent.json"));

        std::fs::remove_dir_all(&a).ok();
        std::fs::remove_dir_all(&b).ok();
    }

    #[test]
    fn shorter_path_wins_over_nested_copy() {
        let a = scratch_dir("nested-a");
        let b = scratch_dir("nested-b");
        let nested = a.join("archive/old");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(a.join("x_NamedClusters.json"), "{}").expect("write");
        std::fs::write(nested.join("x_NamedClusters.json"), "{}").expect("write");
        std::fs::write(a.join("x_ClusterComponent.json"), "{}").expect("write");
        std::fs::write(b.join("x_NamedClusters.json"), "{}").expect("write");
        std::fs::write(b.join("x_ClusterComponent.json"), "{}").expect("write");

        let resolved = resolve_inputs_from_dirs(&a, &b).expect("resolve");
        assert_eq!(resolved.version_a.named_clusters, a.join("x_NamedClusters.json"));

        std::fs::remove_dir_all(&a).ok();
        std::fs::remove_dir_all(&b).ok();
    }

    #[test]
    fn missing_directory_is_fatal() {
        let a = scratch_dir("only-a");
        let err = resolve_inputs_from_dirs(&a, Path::new("/nonexistent/archdiff-b"))
            .expect_err("must fail");
        assert!(err.contains("Version B directory not found"));
        std::fs::remove_dir_all(&a).ok();
    }
}
