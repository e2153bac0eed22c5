use std::path::{Component, Path, PathBuf};

use tracing::warn;

/// Normalize a path by resolving `.` and `..` components lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Key under which a destination path is locked for writing.
///
/// Two spellings of the same file must map to the same key, so the path is
/// made absolute and canonicalized. A destination that does not exist yet
/// cannot be canonicalized itself; its parent is canonicalized instead and
/// the file name re-attached. When even that fails the lexically normalized
/// absolute path is used.
pub fn lock_key(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(error) => {
                warn!(path = %path.display(), %error, "Failed to resolve working directory for lock key");
                path.to_path_buf()
            }
        }
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical.to_string_lossy().into_owned();
    }

    let normalized = normalize_path(&absolute);
    if let (Some(parent), Some(name)) = (normalized.parent(), normalized.file_name())
        && let Ok(parent) = std::fs::canonicalize(parent)
    {
        return parent.join(name).to_string_lossy().into_owned();
    }

    normalized.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_resolves_dot_segments() {
        let path = Path::new("/projects/./game/../game/save.sb3");
        assert_eq!(normalize_path(path), PathBuf::from("/projects/game/save.sb3"));
    }

    #[test]
    fn lock_key_matches_for_existing_and_missing_spellings() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        let direct = nested.join("project.sb3");
        let dotted = dir.path().join("nested/../nested/./project.sb3");
        assert_eq!(lock_key(&direct), lock_key(&dotted));

        std::fs::write(&direct, b"x").unwrap();
        assert_eq!(lock_key(&direct), lock_key(&dotted));
    }
}
