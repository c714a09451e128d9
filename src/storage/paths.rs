use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Name of the primary data file inside the data root.
pub const DYES_FILE: &str = "dyes.json";
/// Name of the locale directory inside the data root.
pub const LOCALES_DIR: &str = "locales";

/// Fatal startup failures around the data root. The process must refuse to
/// serve if any of these occur.
#[derive(Debug, Error)]
pub enum DataRootError {
    #[error("data root {0} cannot be resolved: {1}")]
    Unresolvable(PathBuf, std::io::Error),

    #[error("data root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("data root {0} is not writable: {1}")]
    NotWritable(PathBuf, std::io::Error),

    #[error("required data file {0} is not readable: {1}")]
    FileUnreadable(PathBuf, std::io::Error),

    #[error("locale directory {0} is missing or not a directory")]
    LocalesMissing(PathBuf),
}

/// Startup check: resolve the data root and confirm the layout this service
/// depends on is present and accessible. Returns the canonicalized root.
pub fn validate_root(root: &Path) -> Result<PathBuf, DataRootError> {
    let resolved = root
        .canonicalize()
        .map_err(|e| DataRootError::Unresolvable(root.to_path_buf(), e))?;

    if !resolved.is_dir() {
        return Err(DataRootError::NotADirectory(resolved));
    }

    // Readability of the primary data file
    let dyes = resolved.join(DYES_FILE);
    let mut probe = [0u8; 1];
    fs::File::open(&dyes)
        .and_then(|mut f| f.read(&mut probe).map(|_| ()))
        .map_err(|e| DataRootError::FileUnreadable(dyes.clone(), e))?;

    // The locale directory must exist
    let locales = resolved.join(LOCALES_DIR);
    if !locales.is_dir() {
        return Err(DataRootError::LocalesMissing(locales));
    }

    // Writability: create and remove a probe file
    let marker = resolved.join(".write-probe");
    fs::write(&marker, b"probe")
        .and_then(|_| fs::remove_file(&marker))
        .map_err(|e| DataRootError::NotWritable(resolved.clone(), e))?;

    Ok(resolved)
}

/// Containment check: true iff `candidate`, after lexical resolution of `.`
/// and `..` segments, equals `root` or sits strictly below it.
///
/// Comparison is component-wise (`Path::starts_with`), so a sibling whose
/// name merely extends the root's final component never matches. `root` is
/// expected to already be canonical (see `validate_root`).
pub fn contains(candidate: &Path, root: &Path) -> bool {
    let normalized = normalize(candidate);
    normalized.starts_with(root)
}

/// Lexically normalize a path: drop `.` segments and resolve `..` against
/// preceding components. `..` at the top of an absolute path stays at the
/// root, which can never re-enter the boundary.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
