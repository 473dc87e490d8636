//! Lexical path helpers

use std::path::{Component, Path, PathBuf};

/// Whether `value` contains characters that can never appear in a path
pub fn has_invalid_path_chars(value: &str) -> bool {
    if cfg!(windows) {
        value.chars().any(|c| c < ' ' || matches!(c, '<' | '>' | '|' | '"'))
    } else {
        value.contains('\0')
    }
}

/// Rooted in the sense of "does not depend on the working directory"
pub fn is_rooted(value: &str) -> bool {
    Path::new(value).has_root()
}

/// Make `path` absolute and collapse `.` and `..` without touching the disk.
///
/// Returns `None` for paths that are not absolute or contain characters that
/// cannot be represented.
pub fn full_path(path: &Path) -> Option<PathBuf> {
    let text = path.to_str()?;
    if text.is_empty() || has_invalid_path_chars(text) || !path.has_root() {
        return None;
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping at the root is a no-op
                if normalized.parent().is_some() {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    Some(normalized)
}
