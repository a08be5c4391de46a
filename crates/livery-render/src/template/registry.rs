//! Template discovery on disk.
//!
//! Templates are found by walking a directory recursively. A file is a
//! template when its extension matches one of the configured extensions,
//! where the extension is everything from the first `.` of the file name:
//! `users/show.html.tmpl` has extension `.html.tmpl`, so it is picked up by
//! `.html.tmpl` but not by `.tmpl`.
//!
//! # Template Names
//!
//! A template's name is its path relative to the root, with the matched
//! extension removed and separators normalized to `/`:
//!
//! | File | Name |
//! |------|------|
//! | `templates/home.tmpl` | `home` |
//! | `templates/users/show.tmpl` | `users/show` |
//! | `templates\admin\index.tmpl` (Windows) | `admin/index` |

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CompileError;

/// A template file discovered during directory walking.
///
/// The content is not read until the set is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    /// Resolution name without extension (e.g. `"users/show"`).
    pub name: String,
    /// The extension that matched (e.g. `".tmpl"`).
    pub extension: String,
    /// Path to the file on disk.
    pub path: PathBuf,
}

/// Returns the extension of a file name: everything from its first `.`.
///
/// Returns `None` when the name has no dot or starts with one (hidden files).
pub fn file_extension(file_name: &str) -> Option<&str> {
    match file_name.find('.') {
        Some(0) | None => None,
        Some(idx) => Some(&file_name[idx..]),
    }
}

/// Derives a template name from a path relative to the template root.
///
/// Returns `None` if the file's extension is not one of `extensions`.
pub fn template_name(relative: &Path, extensions: &[String]) -> Option<(String, String)> {
    let file_name = relative.file_name()?.to_str()?;
    let ext = file_extension(file_name)?;
    let extension = extensions.iter().find(|candidate| candidate.as_str() == ext)?;

    let mut segments: Vec<&str> = Vec::new();
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }
    }
    segments.push(&file_name[..file_name.len() - ext.len()]);

    Some((segments.join("/"), extension.clone()))
}

/// Walks `root` and collects every template file.
///
/// A missing root yields no files. Entries are visited in file name order,
/// so the result is deterministic.
pub fn walk_template_dir(
    root: impl AsRef<Path>,
    extensions: &[String],
) -> Result<Vec<TemplateFile>, CompileError> {
    let root = root.as_ref();
    if !root.exists() {
        tracing::debug!(root = %root.display(), "template directory does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| CompileError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if let Some((name, extension)) = template_name(relative, extensions) {
            files.push(TemplateFile {
                name,
                extension,
                path: entry.path().to_path_buf(),
            });
        }
    }

    Ok(files)
}
