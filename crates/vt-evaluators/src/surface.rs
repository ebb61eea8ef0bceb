//! Execution surface: the per-task file the verifier runs against.
//!
//! A test procedure is appended only for the duration of one verifier run.
//! [`AppendedTest`] puts the original contents back, asynchronously through
//! [`AppendedTest::restore`] or synchronously on drop if that never ran.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Surface I/O failures.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One task's candidate file.
#[derive(Debug, Clone)]
pub struct ExecutionSurface {
    path: PathBuf,
}

impl ExecutionSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents.
    pub async fn read(&self) -> Result<String, SurfaceError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| self.io_error("read", source))
    }

    /// Replace the contents, creating parent directories as needed.
    pub async fn write(&self, contents: &str) -> Result<(), SurfaceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error("create directory for", source))?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|source| self.io_error("write", source))
    }

    /// Append `test` after the current contents until the guard restores them.
    pub async fn append_test(&self, test: &str) -> Result<AppendedTest, SurfaceError> {
        let original = self.read().await?;
        let combined = format!("{}\n{}", original, test);
        let guard = AppendedTest {
            path: self.path.clone(),
            original,
            combined,
            restored: false,
        };
        tokio::fs::write(&self.path, &guard.combined)
            .await
            .map_err(|source| self.io_error("write", source))?;
        Ok(guard)
    }

    fn io_error(&self, action: &'static str, source: std::io::Error) -> SurfaceError {
        SurfaceError::Io {
            action,
            path: self.path.clone(),
            source,
        }
    }
}

/// Guard over a surface with a test procedure appended.
#[derive(Debug)]
pub struct AppendedTest {
    path: PathBuf,
    original: String,
    combined: String,
    restored: bool,
}

impl AppendedTest {
    /// Text currently on disk, which verifier line numbers refer to.
    pub fn combined(&self) -> &str {
        &self.combined
    }

    /// Contents before the test was appended.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Write the original contents back.
    ///
    /// On failure the drop fallback still gets one more try.
    pub async fn restore(mut self) -> Result<(), SurfaceError> {
        match tokio::fs::write(&self.path, &self.original).await {
            Ok(()) => {
                self.restored = true;
                Ok(())
            }
            Err(source) => Err(SurfaceError::Io {
                action: "restore",
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for AppendedTest {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = std::fs::write(&self.path, &self.original) {
            warn!(path = %self.path.display(), error = %e, "failed to restore execution surface");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_then_restore() {
        let dir = tempfile::tempdir().unwrap();
        let surface = ExecutionSurface::new(dir.path().join("task.dfy"));
        surface.write("method Main() {}").await.unwrap();

        let guard = surface.append_test("method {:test} check() {}").await.unwrap();
        assert_eq!(
            surface.read().await.unwrap(),
            "method Main() {}\nmethod {:test} check() {}"
        );
        assert_eq!(guard.combined(), surface.read().await.unwrap());

        guard.restore().await.unwrap();
        assert_eq!(surface.read().await.unwrap(), "method Main() {}");
    }

    #[tokio::test]
    async fn test_drop_restores_when_not_restored_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let surface = ExecutionSurface::new(dir.path().join("task.dfy"));
        surface.write("original").await.unwrap();

        {
            let _guard = surface.append_test("appended").await.unwrap();
        }
        assert_eq!(surface.read().await.unwrap(), "original");
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let surface = ExecutionSurface::new(dir.path().join("nested/deeper/task.dfy"));
        surface.write("x").await.unwrap();
        assert_eq!(surface.read().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let surface = ExecutionSurface::new(dir.path().join("absent.dfy"));
        let err = surface.append_test("t").await.unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
