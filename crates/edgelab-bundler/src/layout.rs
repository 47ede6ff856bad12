//! On-disk layout of a session's generated files.
//!
//! Every generated path embeds the session id so concurrent sessions in the
//! same project never clobber each other.

use std::io;
use std::path::{Path, PathBuf};

/// Paths owned by one dev session inside the work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    work_dir: PathBuf,
    session_id: String,
}

impl SessionLayout {
    pub fn new(work_dir: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            session_id: session_id.into(),
        }
    }

    /// Directory holding build outputs.
    pub fn dist_dir(&self) -> PathBuf {
        self.work_dir.join("dist")
    }

    /// Generated wrapper module that imports the user entry.
    pub fn entry_wrapper(&self) -> PathBuf {
        self.work_dir.join(format!("devEntry-{}.js", self.session_id))
    }

    /// Final artifact the runtime loads.
    pub fn artifact(&self) -> PathBuf {
        self.dist_dir().join(format!("bundle-{}.js", self.session_id))
    }

    /// Scratch output written before the artifact is swapped into place.
    pub fn staging_artifact(&self) -> PathBuf {
        self.dist_dir().join(format!("bundle-{}.js.partial", self.session_id))
    }

    /// Sandbox runtime configuration for the bridged runtime.
    pub fn runtime_config(&self) -> PathBuf {
        self.work_dir.join(format!("runtime-{}.toml", self.session_id))
    }

    pub fn generated_files(&self) -> Vec<PathBuf> {
        vec![
            self.entry_wrapper(),
            self.artifact(),
            self.staging_artifact(),
            self.runtime_config(),
        ]
    }

    /// Whether `path` is a build file of any session sharing `work_dir`.
    ///
    /// Covers the `dist/` directory, entry wrappers, runtime configs, and the
    /// staging files writes go through.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgelab_bundler::SessionLayout;
    /// use std::path::Path;
    ///
    /// let work_dir = Path::new("/p/.dev");
    /// assert!(SessionLayout::is_generated(work_dir, Path::new("/p/.dev/devEntry-7.js")));
    /// assert!(!SessionLayout::is_generated(work_dir, Path::new("/p/.dev/notes.md")));
    /// ```
    pub fn is_generated(work_dir: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(work_dir) else {
            return false;
        };
        let mut components = relative.components();
        let Some(first) = components.next() else {
            return true;
        };
        if first.as_os_str() == "dist" {
            return true;
        }
        if components.next().is_some() {
            return false;
        }

        let name = first.as_os_str().to_string_lossy();
        name.starts_with("devEntry-")
            || (name.starts_with("runtime-") && name.ends_with(".toml"))
            || name.ends_with(".tmp")
            || name.ends_with(".partial")
    }

    /// Delete every generated file, ignoring ones that were never written.
    ///
    /// Returns how many files were removed.
    pub fn remove_generated(&self) -> io::Result<usize> {
        let mut removed = 0;
        for path in self.generated_files() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_embed_session_id() {
        let layout = SessionLayout::new("/p/.dev", "1718000000000");
        assert_eq!(
            layout.entry_wrapper(),
            PathBuf::from("/p/.dev/devEntry-1718000000000.js")
        );
        assert_eq!(
            layout.artifact(),
            PathBuf::from("/p/.dev/dist/bundle-1718000000000.js")
        );
        assert_eq!(
            layout.runtime_config(),
            PathBuf::from("/p/.dev/runtime-1718000000000.toml")
        );
    }

    #[test]
    fn test_generated_paths_are_recognized() {
        let work_dir = Path::new("/p/.dev");
        let layout = SessionLayout::new(work_dir, "5");
        for path in layout.generated_files() {
            assert!(SessionLayout::is_generated(work_dir, &path), "{}", path.display());
        }
        assert!(SessionLayout::is_generated(work_dir, work_dir));
        assert!(SessionLayout::is_generated(work_dir, Path::new("/p/.dev/dist")));
        assert!(SessionLayout::is_generated(work_dir, Path::new("/p/.dev/kv-store.json.tmp")));

        assert!(!SessionLayout::is_generated(work_dir, Path::new("/p/.dev/overrides.js")));
        assert!(!SessionLayout::is_generated(work_dir, Path::new("/p/.dev/sub/devEntry-1.js")));
        assert!(!SessionLayout::is_generated(work_dir, Path::new("/p/src/devEntry-1.js")));
    }

    #[test]
    fn test_distinct_sessions_do_not_share_paths() {
        let a = SessionLayout::new(".dev", "1");
        let b = SessionLayout::new(".dev", "2");
        for (left, right) in a.generated_files().iter().zip(b.generated_files().iter()) {
            assert_ne!(left, right);
        }
    }

    #[test]
    fn test_remove_generated_skips_missing_files() {
        let temp = TempDir::new().unwrap();
        let layout = SessionLayout::new(temp.path(), "7");
        std::fs::create_dir_all(layout.dist_dir()).unwrap();
        std::fs::write(layout.entry_wrapper(), "x").unwrap();
        std::fs::write(layout.artifact(), "y").unwrap();

        assert_eq!(layout.remove_generated().unwrap(), 2);
        assert!(!layout.artifact().exists());
        assert_eq!(layout.remove_generated().unwrap(), 0);
    }
}
