//! Maps request paths to canonical filesystem locations confined to the
//! document root. This is the security boundary against directory
//! traversal; every request goes through it.

use std::fmt;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The path does not canonicalize to an existing file.
    NotFound,
    /// The canonical path lies outside the document root.
    Outside,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::NotFound => f.write_str("no such file under the document root"),
            ResolveError::Outside => f.write_str("path escapes the document root"),
        }
    }
}

/// Resolves `request_path` against `root`, which must already be canonical.
///
/// The combined path is canonicalized (resolving `.`, `..`, and symlinks)
/// and the result must stay under `root`; `Path::starts_with` compares
/// whole components, so a root of `/srv/www` never matches
/// `/srv/www-other`. A resolved directory falls through to its
/// `index.html`, which gets the same containment check because the index
/// itself may be a symlink.
pub fn resolve(root: &Path, request_path: &str) -> Result<PathBuf, ResolveError> {
    let candidate = root.join(request_path.trim_start_matches('/'));
    let confined = resolve_confined(root, &candidate)?;
    if confined.is_dir() {
        resolve_confined(root, &confined.join(INDEX_FILE))
    } else {
        Ok(confined)
    }
}

fn resolve_confined(root: &Path, candidate: &Path) -> Result<PathBuf, ResolveError> {
    let canonical = candidate.canonicalize().map_err(|_| ResolveError::NotFound)?;
    if !canonical.starts_with(root) {
        return Err(ResolveError::Outside);
    }
    Ok(canonical)
}
