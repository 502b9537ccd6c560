//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::core::errors::{Result, SlistError};

/// Make `path` absolute relative to the current directory and resolve `.`/`..`
/// syntactically.
///
/// Symlinks are deliberately left alone: a capture root given as a link must
/// keep its own name in recorded pathnames.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(SlistError::InvalidArgument {
            details: "empty path".to_string(),
        });
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = env::current_dir().map_err(|e| SlistError::io(".", e))?;
        cwd.join(path)
    };
    Ok(normalize_syntactic(&absolute))
}

/// Drop `.` components and fold `..` into the preceding normal component.
/// `..` at the root stays at the root.
pub fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(..)) => {}
                _ => components.push(component),
            },
        }
    }
    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.into_iter().collect()
}
