use sdk::errors::EngineError;
use std::path::{Component, Path, PathBuf};

/// Sensitive path components no role may read or write.
const DENIED_COMPONENTS: &[&str] = &[
    ".ssh",
    ".env",
    ".gnupg",
    ".aws",
    ".kube",
    ".git-credentials",
    "id_rsa",
    "id_ed25519",
    "id_dsa",
    "credentials",
    "private_key",
    ".npmrc",
    ".pypirc",
];

/// WorkspaceGuard confines the file capabilities to one directory tree.
///
/// Paths handed in by a model are resolved relative to the workspace and
/// checked against a deny list twice: once as written and once after
/// canonicalization, so a symlink cannot smuggle a sensitive target past
/// the first check.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    workspace: PathBuf,
    deny_list: Vec<String>,
}

impl WorkspaceGuard {
    /// Creates a guard rooted at `workspace`, which must exist.
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, EngineError> {
        let workspace = workspace.as_ref();
        // Canonicalize so prefix checks survive symlinked roots (/var -> /private/var)
        let workspace = workspace.canonicalize().map_err(|e| {
            EngineError::PathCanonicalization(workspace.to_path_buf(), e.to_string())
        })?;

        Ok(Self {
            workspace,
            deny_list: DENIED_COMPONENTS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Resolves an existing path for reading or listing.
    ///
    /// # Errors
    ///
    /// `PathDenied` for deny-listed components, `PathCanonicalization` when
    /// the path does not exist, `PathOutsideWorkspace` when it escapes.
    pub fn resolve_existing(&self, path: &str) -> Result<PathBuf, EngineError> {
        let joined = self.join(path);
        self.check_denied(&joined)?;

        let canonical = joined
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(joined.clone(), e.to_string()))?;

        self.check_denied(&canonical)?;
        self.check_inside(canonical)
    }

    /// Resolves a path that may not exist yet, for writing.
    ///
    /// The nearest existing ancestor is canonicalized and must lie inside
    /// the workspace; `..` in the remaining suffix is refused.
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, EngineError> {
        let joined = self.join(path);
        self.check_denied(&joined)?;

        if joined.exists() {
            return self.resolve_existing(path);
        }

        let mut existing = joined.as_path();
        let mut suffix = Vec::new();
        while !existing.exists() {
            let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                return Err(EngineError::PathOutsideWorkspace(joined.clone()));
            };
            suffix.push(name.to_os_string());
            existing = parent;
        }
        if joined
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(EngineError::PathOutsideWorkspace(joined.clone()));
        }

        let mut resolved = existing
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(existing.to_path_buf(), e.to_string()))?;
        for name in suffix.into_iter().rev() {
            resolved.push(name);
        }

        self.check_denied(&resolved)?;
        self.check_inside(resolved)
    }

    /// Refuses a path with any deny-listed component.
    pub fn check_denied(&self, path: &Path) -> Result<(), EngineError> {
        let denied = path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| self.deny_list.iter().any(|d| d == name))
        });
        if denied {
            return Err(EngineError::PathDenied(path.to_path_buf()));
        }
        Ok(())
    }

    fn join(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        }
    }

    fn check_inside(&self, canonical: PathBuf) -> Result<PathBuf, EngineError> {
        if canonical.starts_with(&self.workspace) {
            Ok(canonical)
        } else {
            Err(EngineError::PathOutsideWorkspace(canonical))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn guard() -> (TempDir, WorkspaceGuard) {
        let temp = TempDir::new().unwrap();
        let guard = WorkspaceGuard::new(temp.path()).unwrap();
        (temp, guard)
    }

    #[test]
    fn test_missing_workspace_is_an_error() {
        let result = WorkspaceGuard::new("/definitely/not/a/real/workspace");
        assert!(matches!(result, Err(EngineError::PathCanonicalization(_, _))));
    }

    #[test]
    fn test_resolve_existing_relative() {
        let (temp, guard) = guard();
        fs::write(temp.path().join("notes.md"), "hi").unwrap();

        let resolved = guard.resolve_existing("notes.md").unwrap();
        assert_eq!(resolved, temp.path().join("notes.md").canonicalize().unwrap());
    }

    #[test]
    fn test_denied_component() {
        let (_temp, guard) = guard();
        let result = guard.resolve_for_write("project/.env");
        assert!(matches!(result, Err(EngineError::PathDenied(_))));
    }

    #[test]
    fn test_traversal_outside_workspace() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("ws");
        fs::create_dir(&workspace).unwrap();
        fs::write(temp.path().join("secret.txt"), "s").unwrap();
        let guard = WorkspaceGuard::new(&workspace).unwrap();

        assert!(matches!(
            guard.resolve_existing("../secret.txt"),
            Err(EngineError::PathOutsideWorkspace(_))
        ));
        assert!(matches!(
            guard.resolve_for_write("new/../../escape.txt"),
            Err(EngineError::PathOutsideWorkspace(_))
        ));
    }

    #[test]
    fn test_absolute_path_outside_workspace() {
        let (_temp, guard) = guard();
        let other = TempDir::new().unwrap();
        fs::write(other.path().join("x.txt"), "x").unwrap();
        let path = other.path().join("x.txt");

        assert!(matches!(
            guard.resolve_existing(path.to_str().unwrap()),
            Err(EngineError::PathOutsideWorkspace(_))
        ));
    }

    #[test]
    fn test_resolve_for_write_new_nested_file() {
        let (temp, guard) = guard();
        let resolved = guard.resolve_for_write("docs/guide/intro.md").unwrap();
        assert!(resolved.starts_with(temp.path().canonicalize().unwrap()));
        assert!(resolved.ends_with("docs/guide/intro.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_denied_target() {
        let (temp, guard) = guard();
        let ssh = temp.path().join(".ssh");
        fs::create_dir(&ssh).unwrap();
        std::os::unix::fs::symlink(&ssh, temp.path().join("innocent")).unwrap();

        assert!(matches!(
            guard.resolve_existing("innocent"),
            Err(EngineError::PathDenied(_))
        ));
    }
}
