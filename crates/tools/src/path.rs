//! Path policy: keeps file actions inside allowed roots and away from
//! forbidden locations (e.g., ~/.ssh, /etc/shadow).

use loopwright_config::ToolsSettings;
use std::path::{Path, PathBuf};

/// Error returned when a path is rejected.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    Forbidden { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    Traversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    Unresolvable { path: String, reason: String },
}

/// Where file actions may read and write.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    /// Empty = every root allowed
    pub allowed_roots: Vec<String>,
    pub forbidden_paths: Vec<String>,
}

impl PathPolicy {
    /// No restrictions at all.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ToolsSettings) -> Self {
        Self {
            allowed_roots: settings.allowed_roots.clone(),
            forbidden_paths: settings.forbidden_paths.clone(),
        }
    }

    /// Resolve `path` and check it against the policy.
    ///
    /// `..` components are rejected outright. Existing paths are
    /// canonicalized so symlinks cannot escape a root; a path that does not
    /// exist yet is resolved through its nearest existing parent.
    pub fn check(&self, path: &str) -> Result<PathBuf, PathError> {
        let raw = Path::new(path);

        let normalized = path.replace('\\', "/");
        if normalized.split('/').any(|part| part == "..") {
            return Err(PathError::Traversal { path: path.into() });
        }

        let resolved = resolve(raw).map_err(|e| PathError::Unresolvable {
            path: path.into(),
            reason: e.to_string(),
        })?;
        let resolved_str = comparable(&resolved.to_string_lossy());

        for pattern in &self.forbidden_paths {
            if is_under(&resolved_str, &comparable(&expand_tilde(pattern))) {
                return Err(PathError::Forbidden {
                    path: path.into(),
                    pattern: pattern.clone(),
                });
            }
        }

        if !self.allowed_roots.is_empty() {
            let allowed = self.allowed_roots.iter().any(|root| {
                let root = Path::new(&expand_tilde(root))
                    .canonicalize()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| expand_tilde(root));
                is_under(&resolved_str, &comparable(&root))
            });
            if !allowed {
                return Err(PathError::OutsideAllowedRoots { path: path.into() });
            }
        }

        Ok(resolved)
    }
}

fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return path.canonicalize();
    }
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if let Some(name) = current.file_name() {
                    missing.push(name.to_os_string());
                }
                if parent.exists() {
                    let mut base = parent.canonicalize()?;
                    for part in missing.iter().rev() {
                        base.push(part);
                    }
                    return Ok(base);
                }
                current = parent;
            }
            _ => return Ok(std::env::current_dir()?.join(path)),
        }
    }
}

/// Normalize separators and strip the Windows verbatim prefix.
fn comparable(path: &str) -> String {
    let s = path.replace('\\', "/");
    let s = s.strip_prefix("//?/").unwrap_or(&s);
    s.trim_end_matches('/').to_lowercase()
}

/// Component-aware prefix check: `/etc` covers `/etc/passwd` but not `/etcetera`.
fn is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_plain_paths() {
        assert!(PathPolicy::unrestricted().check("/any/path/file.txt").is_ok());
    }

    #[test]
    fn traversal_blocked() {
        let err = PathPolicy::unrestricted().check("../../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::Traversal { .. }));
        assert!(PathPolicy::unrestricted().check("/home/user/../../etc/passwd").is_err());
    }

    #[test]
    fn forbidden_prefix_blocked() {
        let policy = PathPolicy {
            allowed_roots: vec![],
            forbidden_paths: vec!["/etc".into()],
        };
        match policy.check("/etc/passwd").unwrap_err() {
            PathError::Forbidden { pattern, .. } => assert_eq!(pattern, "/etc"),
            other => panic!("Expected Forbidden, got: {other}"),
        }
    }

    #[test]
    fn forbidden_prefix_respects_component_boundaries() {
        assert!(is_under("/etc/passwd", "/etc"));
        assert!(is_under("/etc", "/etc"));
        assert!(!is_under("/etcetera/file", "/etc"));
    }

    #[test]
    fn allowed_roots_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let policy = PathPolicy {
            allowed_roots: vec![root.clone()],
            forbidden_paths: vec![],
        };

        let inside = format!("{root}/notes/today.md");
        assert!(policy.check(&inside).is_ok());

        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("secret.txt");
        let err = policy.check(&outside.to_string_lossy()).unwrap_err();
        assert!(matches!(err, PathError::OutsideAllowedRoots { .. }));
    }

    #[test]
    fn missing_file_resolves_through_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c.txt");
        let resolved = PathPolicy::unrestricted()
            .check(&target.to_string_lossy())
            .unwrap();
        assert!(resolved.ends_with("a/b/c.txt"));
    }
}
