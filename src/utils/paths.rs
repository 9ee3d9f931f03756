//! Path normalization

use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` (alone or followed by a separator) to `home`.
///
/// Returns `None` when `value` does not start with the home marker in that
/// form, e.g. `~user/data` or `data/~`.
pub fn expand_home(value: &str, home: &Path) -> Option<PathBuf> {
    let rest = value.strip_prefix('~')?;
    if rest.is_empty() {
        return Some(home.to_path_buf());
    }
    let rest = rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\'))?;
    Some(home.join(rest))
}

/// Make `path` absolute against `base` and normalize it lexically.
///
/// `.` components are dropped and `..` pops the previous component. Symlinks
/// are not resolved and the path does not need to exist.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() { path.to_path_buf() } else { base.join(path) };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` stays at the root.
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_bare_and_prefixed_home() {
        let home = Path::new("/home/user");
        assert_eq!(expand_home("~", home), Some(PathBuf::from("/home/user")));
        assert_eq!(expand_home("~/change.me", home), Some(PathBuf::from("/home/user/change.me")));
        assert_eq!(expand_home("~other/x", home), None);
        assert_eq!(expand_home("plain", home), None);
    }

    #[test]
    fn absolutize_joins_relative_paths() {
        assert_eq!(
            absolutize(Path::new("/home/user"), Path::new("change.me")),
            PathBuf::from("/home/user/change.me")
        );
    }

    #[test]
    fn absolutize_keeps_absolute_paths() {
        assert_eq!(absolutize(Path::new("/base"), Path::new("/etc/x.conf")), PathBuf::from("/etc/x.conf"));
    }

    #[test]
    fn absolutize_normalizes_dots() {
        assert_eq!(
            absolutize(Path::new("/srv/app/conf"), Path::new("./../data/./x/../y.csv")),
            PathBuf::from("/srv/app/data/y.csv")
        );
        assert_eq!(absolutize(Path::new("/"), Path::new("../../x")), PathBuf::from("/x"));
    }
}
