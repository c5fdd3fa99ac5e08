//! ZIP packaging of an already written page.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use zip::write::SimpleFileOptions;

use cmsextract_shared::{CmsExtractError, Result};

use crate::writer::verify_page;

/// What went into an archive.
#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub path: PathBuf,
    /// Entry names in archive order: the page first, then its models.
    pub entries: Vec<String>,
    pub bytes: u64,
    /// Hex SHA-256 of the archive file.
    pub sha256: String,
}

fn archive_error(e: impl std::fmt::Display) -> CmsExtractError {
    CmsExtractError::Archive(e.to_string())
}

/// Package `pages/<slug>.json` as `<slug>.json` and each referenced model as
/// `<slug>/<file>` into a ZIP at `dest`.
///
/// The page is verified first; a page with a broken model reference is not
/// packaged.
#[instrument(skip_all, fields(%slug))]
pub fn bundle_page(root: &Path, slug: &str, dest: &Path) -> Result<BundleSummary> {
    let page = verify_page(root, slug)?;

    let mut files = vec![(format!("{slug}.json"), root.join("pages").join(format!("{slug}.json")))];
    for model in &page.models {
        let name = Path::new(&model.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CmsExtractError::validation(format!("bad model path: {}", model.path)))?;
        files.push((format!("{slug}/{name}"), root.join(&model.path)));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CmsExtractError::write(parent, e))?;
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{slug}.zip"));
    let temp = dest.with_file_name(format!(".{file_name}.tmp"));

    if let Err(e) = write_archive(&temp, &files) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }
    std::fs::rename(&temp, dest).map_err(|e| CmsExtractError::write(dest, e))?;

    let data = std::fs::read(dest).map_err(|e| CmsExtractError::write(dest, e))?;
    let sha256 = format!("{:x}", Sha256::digest(&data));
    let entries: Vec<String> = files.into_iter().map(|(name, _)| name).collect();

    info!(path = %dest.display(), entries = entries.len(), bytes = data.len(), "bundle written");

    Ok(BundleSummary {
        path: dest.to_path_buf(),
        entries,
        bytes: data.len() as u64,
        sha256,
    })
}

fn write_archive(path: &Path, files: &[(String, PathBuf)]) -> Result<()> {
    let out = std::fs::File::create(path).map_err(|e| CmsExtractError::write(path, e))?;
    let mut zip = zip::ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, source) in files {
        let content = std::fs::read(source).map_err(|e| CmsExtractError::write(source, e))?;
        zip.start_file(name.as_str(), options).map_err(archive_error)?;
        zip.write_all(&content).map_err(archive_error)?;
    }

    zip.finish().map_err(archive_error)?;
    Ok(())
}
