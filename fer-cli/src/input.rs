//! Input collection.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};
use walkdir::WalkDir;

/// Collect candidate image files from a file or directory tree.
///
/// Every regular file is a candidate; decoding decides what is an image.
/// Directories are walked sorted by file name so the order is deterministic.
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {err}", path.display());
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        } else {
            debug!("Skipping non-file entry {}", entry.path().display());
        }
    }
    Ok(files)
}
