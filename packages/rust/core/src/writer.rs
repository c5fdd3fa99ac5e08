//! Page output: writes an [`Assembly`] under the output root and checks
//! written pages against the schema table.
//!
//! All files of a page are first staged as dot-prefixed temp siblings. Only
//! when every file is staged are they renamed into place, models first and
//! the page document last, so a visible page file implies its models exist.
//! A failed rename removes every file this run had already placed.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use cmsextract_shared::schema::schema_for;
use cmsextract_shared::slug::{model_dir, page_path};
use cmsextract_shared::{CmsExtractError, PageDocument, Result};

use crate::assembler::Assembly;

/// Files placed by a successful write.
#[derive(Debug, Clone)]
pub struct WrittenPage {
    pub page_path: PathBuf,
    pub model_paths: Vec<PathBuf>,
    /// Model files from an earlier run that this page no longer references.
    pub removed_stale: usize,
}

struct Staged {
    temp: PathBuf,
    target: PathBuf,
}

/// Write the page and its models under `root`.
pub fn write_page(root: &Path, assembly: &Assembly) -> Result<WrittenPage> {
    let pages_dir = root.join("pages");
    let models_dir = root.join(model_dir(&assembly.slug));
    for dir in [&pages_dir, &models_dir] {
        std::fs::create_dir_all(dir).map_err(|e| CmsExtractError::write(dir, e))?;
    }

    let mut staged = Vec::with_capacity(assembly.models.len() + 1);
    if let Err(e) = stage_all(root, assembly, &mut staged) {
        discard(&staged);
        return Err(e);
    }

    // Page is staged last, so it is renamed last.
    for (i, file) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(&file.temp, &file.target) {
            warn!(path = %file.target.display(), error = %e, "rename failed, rolling back page");
            discard(&staged[i..]);
            unplace(&staged[..i]);
            let page = root.join(page_path(&assembly.slug));
            if page.exists() {
                let _ = std::fs::remove_file(&page);
            }
            return Err(CmsExtractError::write(&file.target, e));
        }
    }

    let mut model_paths: Vec<PathBuf> = staged.into_iter().map(|s| s.target).collect();
    let page_path = model_paths.pop().unwrap_or_default();
    let removed_stale = remove_stale(&models_dir, &model_paths);

    info!(
        slug = %assembly.slug,
        models = model_paths.len(),
        removed_stale,
        "page written"
    );

    Ok(WrittenPage {
        page_path,
        model_paths,
        removed_stale,
    })
}

fn stage_all(root: &Path, assembly: &Assembly, staged: &mut Vec<Staged>) -> Result<()> {
    for model in &assembly.models {
        staged.push(stage(&root.join(&model.path), &model.fields)?);
    }
    staged.push(stage(&root.join(page_path(&assembly.slug)), &assembly.page)?);
    Ok(())
}

/// Serialize `data` to a temp sibling of `target`.
fn stage<T: serde::Serialize>(target: &Path, data: &T) -> Result<Staged> {
    let mut json = serde_json::to_string_pretty(data).map_err(|e| {
        CmsExtractError::validation(format!("JSON serialization failed: {e}"))
    })?;
    json.push('\n');

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{name}.tmp"));
    std::fs::write(&temp, json).map_err(|e| CmsExtractError::write(&temp, e))?;
    debug!(path = %target.display(), "staged JSON file");

    Ok(Staged {
        temp,
        target: target.to_path_buf(),
    })
}

fn discard(staged: &[Staged]) {
    for file in staged {
        let _ = std::fs::remove_file(&file.temp);
    }
}

/// Remove files this run already renamed into place.
fn unplace(placed: &[Staged]) {
    for file in placed {
        if let Err(e) = std::fs::remove_file(&file.target) {
            warn!(path = %file.target.display(), error = %e, "failed to roll back placed file");
        }
    }
}

/// Remove `*.json` files in `dir` that are not in `keep`.
fn remove_stale(dir: &Path, keep: &[PathBuf]) -> usize {
    let keep: HashSet<&Path> = keep.iter().map(PathBuf::as_path).collect();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !is_json || hidden || keep.contains(path.as_path()) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale model file"),
        }
    }
    removed
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Load a written page document.
pub fn read_page(root: &Path, slug: &str) -> Result<PageDocument> {
    let path = root.join(page_path(slug));
    let content = std::fs::read_to_string(&path).map_err(|e| {
        CmsExtractError::validation(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        CmsExtractError::validation(format!("invalid page document {}: {e}", path.display()))
    })
}

/// Check that every model a page references exists, is a JSON object, and
/// carries exactly the field set of its declared type.
pub fn verify_page(root: &Path, slug: &str) -> Result<PageDocument> {
    let page = read_page(root, slug)?;

    for model in &page.models {
        let path = root.join(&model.path);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CmsExtractError::validation(format!("missing model file {}: {e}", model.path))
        })?;
        let value: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| {
                CmsExtractError::validation(format!("invalid model file {}: {e}", model.path))
            })?;

        let actual: BTreeSet<&str> = value.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = schema_for(model.model_type).field_names().collect();
        if actual != expected {
            return Err(CmsExtractError::validation(format!(
                "{} does not match the {} schema",
                model.path, model.model_type
            )));
        }
    }

    debug!(%slug, models = page.models.len(), "page verified");
    Ok(page)
}
