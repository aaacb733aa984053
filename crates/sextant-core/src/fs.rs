use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recursively collect every file under `root`, sorted.
///
/// Missing directories are treated as empty.
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    collect_files_with_suffix(root, "")
}

/// Recursively collect files under `root` whose name ends with `suffix`.
///
/// Missing directories are treated as empty. Results are sorted so callers
/// that seed from an enumeration do so in a deterministic order.
pub fn collect_files_with_suffix(root: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // Raced with a delete; treat as empty.
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };

        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && file_name_ends_with(&path, suffix) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn file_name_ends_with(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix))
}
