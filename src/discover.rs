//! Turning command-line paths into the list of files to process
//!
//! Folders expand to the files inside them with a matching extension. Plain
//! file paths pass through untouched, even when they do not exist, so the
//! batch can report them.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand `inputs` into an ordered, duplicate-free file list
pub fn collect_inputs(
    inputs: &[PathBuf],
    extensions: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for file in folder_files(input, extensions, recursive)? {
                if seen.insert(file.clone()) {
                    files.push(file);
                }
            }
        } else if seen.insert(input.clone()) {
            files.push(input.clone());
        }
    }

    Ok(files)
}

/// Files directly inside `folder` (or below it when `recursive`) whose
/// extension is one of `extensions`, compared case-insensitively
pub fn folder_files(folder: &Path, extensions: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry =
            entry.with_context(|| format!("Failed to read folder: {}", folder.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    tracing::debug!(folder = %folder.display(), files = files.len(), "folder scanned");
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn txt() -> Vec<String> {
        vec!["txt".to_string()]
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_folder_expands_to_matching_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b.txt"));
        touch(&root.join("a.TXT"));
        touch(&root.join("c.md"));
        touch(&root.join("sub").join("d.txt"));

        let files = collect_inputs(&[root.to_path_buf()], &txt(), false).unwrap();
        assert_eq!(files, vec![root.join("a.TXT"), root.join("b.txt")]);
    }

    #[test]
    fn test_recursive_includes_sub_folders() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("sub").join("d.txt"));

        let files = collect_inputs(&[root.to_path_buf()], &txt(), true).unwrap();
        assert_eq!(files, vec![root.join("a.txt"), root.join("sub").join("d.txt")]);
    }

    #[test]
    fn test_explicit_files_pass_through_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("z.md"));
        let missing = root.join("missing.txt");

        let inputs = vec![root.join("z.md"), missing.clone()];
        let files = collect_inputs(&inputs, &txt(), false).unwrap();
        assert_eq!(files, vec![root.join("z.md"), missing]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("b.txt"));

        let inputs = vec![root.join("b.txt"), root.to_path_buf()];
        let files = collect_inputs(&inputs, &txt(), false).unwrap();
        assert_eq!(files, vec![root.join("b.txt"), root.join("a.txt")]);
    }
}
