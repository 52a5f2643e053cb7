use crate::error::AppResult;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Dependency and build output directories that never contain a project the
/// user would pick.
const SKIPPED_DIRS: &[&str] = &["node_modules", "bin", "obj"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.') || SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Find all `.csproj` files under the workspace root, skipping hidden and
/// dependency directories. Paths come back relative to the root, sorted.
/// Pure read: recomputed on every call, and an empty result is not an error.
pub fn find_csproj_files(root: &Path) -> AppResult<Vec<String>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file()
                    && entry.path().extension().and_then(|ext| ext.to_str()) == Some("csproj")
                {
                    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                    files.push(relative.to_string_lossy().into_owned());
                }
            }
            Err(e) => {
                tracing::warn!("Error walking workspace: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}
