use crate::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};

/// Files in `dir` whose extension matches `extension` (case-insensitive),
/// sorted by file name.
pub fn list_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|source| PipelineError::ImageDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(PipelineError::NoImagesFound(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}
