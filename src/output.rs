//! Writing replaced content back out.
//!
//! Replacements never overwrite the input: `notes.txt` is written to
//! `notes.vore.txt` next to it (`Makefile` to `Makefile.vore`).

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::VoreError;
use crate::pattern::MatchResult;

/// Copy `original`, substituting each match's replacement for its span.
///
/// `matches` must be sorted by offset and must not overlap, which is what a
/// scan produces. Matches without a replacement are left as they are.
pub fn splice(original: &[u8], matches: &[MatchResult]) -> Vec<u8> {
    let mut out = Vec::with_capacity(original.len());
    let mut copied = 0usize;
    for m in matches {
        let Some(replacement) = &m.replacement else {
            continue;
        };
        let start = (m.file_offset as usize).clamp(copied, original.len());
        let end = ((m.file_offset + m.length) as usize).clamp(start, original.len());
        out.extend_from_slice(&original[copied..start]);
        out.extend_from_slice(replacement.as_bytes());
        copied = end;
    }
    out.extend_from_slice(&original[copied..]);
    out
}

/// `dir/name.ext` becomes `dir/name.vore.ext`; `dir/name` becomes
/// `dir/name.vore`.
pub fn sibling_path(path: &Path) -> PathBuf {
    let mut name = OsString::new();
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            name.push(stem);
            name.push(".vore.");
            name.push(ext);
        }
        (Some(stem), None) => {
            name.push(stem);
            name.push(".vore");
        }
        _ => name.push("out.vore"),
    }
    path.with_file_name(name)
}

/// Write `contents` to the sibling of `path` and return where it went.
///
/// The data goes to a temporary file in the same directory first, which is
/// then renamed over the target.
pub fn write_sibling(path: &Path, contents: &[u8]) -> Result<PathBuf, VoreError> {
    let target = sibling_path(path);
    let write_err = |source| VoreError::Write {
        path: target.clone(),
        source,
    };
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    temp.write_all(contents).map_err(write_err)?;
    temp.persist(&target).map_err(|e| write_err(e.error))?;
    debug!("wrote {} bytes to {}", contents.len(), target.display());
    Ok(target)
}
