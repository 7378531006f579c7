//! Directory expansion of transfer requests.
//!
//! Each directory source is replaced by the recursive enumeration of its
//! regular files; the matching target is rewritten so the path below the
//! source root is preserved below the target root. Regular-file sources
//! pass through unchanged.

use tracing::debug;

use cargo_api::{Dataset, ErrorCode};
use cargo_storage::{backend_for, StorageError};

/// Rewrites one expanded file path onto the target root.
///
/// The suffix keeps its leading separator by backing the cut point up one
/// byte when the source root carries a trailing `/`, so both `/src` and
/// `/src/` yield `<target>/<relative>`.
fn target_for(file: &str, source_root: &str, target_root: &str) -> String {
    let mut cut = source_root.len();
    if source_root.ends_with('/') {
        cut -= 1;
    }
    let suffix = &file[cut..];
    format!("{}{}", target_root.trim_end_matches('/'), suffix)
}

/// Expands every (source, target) pair. The returned vectors replace the
/// originals and are equal in length.
pub fn expand_requests(
    sources: &[Dataset],
    targets: &[Dataset],
) -> Result<(Vec<Dataset>, Vec<Dataset>), StorageError> {
    let mut out_sources = Vec::with_capacity(sources.len());
    let mut out_targets = Vec::with_capacity(targets.len());

    for (source, target) in sources.iter().zip(targets) {
        let backend = backend_for(source.kind());
        let md = backend.stat(source.path())?;

        if md.is_dir {
            let files = backend.readdir(source.path())?;
            debug!(
                source = source.path(),
                nfiles = files.len(),
                "expanded directory source"
            );
            for file in files {
                let rewritten = target_for(&file, source.path(), target.path());
                out_sources.push(source.with_path(file));
                out_targets.push(target.with_path(rewritten));
            }
        } else {
            out_sources.push(source.clone());
            out_targets.push(target.clone());
        }
    }

    debug_assert_eq!(out_sources.len(), out_targets.len());
    Ok((out_sources, out_targets))
}

/// Maps an expansion failure onto the wire error space.
pub fn expansion_error(err: &StorageError) -> ErrorCode {
    ErrorCode::from(err)
}
