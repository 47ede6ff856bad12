//! Session build pipeline.
//!
//! One build runs these steps:
//! 1. Write the generated wrapper for the session into the work directory
//! 2. Bundle it to a staging file
//! 3. Rewrite reserved globals (host-globals flavor only)
//! 4. Rename the staging file over the session artifact
//!
//! The artifact is only replaced once every step succeeded, so a failed
//! rebuild leaves the last good bundle in place for the running runtime.

use crate::bundler::{BundleRequest, Bundler, Format, HOST_MODULES, Platform};
use crate::entry::{EntryFlavor, EntryTemplate, USER_ENTRY_SPECIFIER};
use crate::error::{BundleError, Result};
use crate::layout::SessionLayout;
use crate::rewrite::{RenameTable, rewrite_source};
use path_clean::PathClean;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Session-independent inputs to every build.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub project_root: PathBuf,
    pub work_dir: PathBuf,
    pub flavor: EntryFlavor,
    pub mock_origin: String,
    /// Port the in-process wrapper listens on.
    pub runtime_port: u16,
    /// Extra externals on top of [`HOST_MODULES`].
    pub external: Vec<String>,
    pub renames: RenameTable,
}

pub struct BuildPipeline {
    bundler: Arc<dyn Bundler>,
    options: PipelineOptions,
}

impl BuildPipeline {
    pub fn new(bundler: Arc<dyn Bundler>, options: PipelineOptions) -> Self {
        Self { bundler, options }
    }

    pub fn layout(&self, session_id: &str) -> SessionLayout {
        SessionLayout::new(&self.options.work_dir, session_id)
    }

    /// Build `entry` for `session_id` and return the artifact path.
    pub async fn build(&self, session_id: &str, entry: &Path, minify: bool) -> Result<PathBuf> {
        let entry = if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.options.project_root.join(entry)
        }
        .clean();
        if !entry.is_file() {
            return Err(BundleError::EntryNotFound(entry));
        }

        let layout = self.layout(session_id);
        let dist = layout.dist_dir();
        tokio::fs::create_dir_all(&dist)
            .await
            .map_err(|e| BundleError::io(&dist, e))?;

        let wrapper = layout.entry_wrapper();
        let source = EntryTemplate::new(&self.options.mock_origin, self.options.runtime_port)
            .render(self.options.flavor);
        tokio::fs::write(&wrapper, source)
            .await
            .map_err(|e| BundleError::io(&wrapper, e))?;

        let staging = layout.staging_artifact();
        let result = self.bundle_to(&wrapper, &entry, &staging, minify).await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        let artifact = layout.artifact();
        tokio::fs::rename(&staging, &artifact)
            .await
            .map_err(|e| BundleError::io(&artifact, e))?;

        tracing::debug!(session = session_id, artifact = %artifact.display(), "build complete");
        Ok(artifact)
    }

    async fn bundle_to(
        &self,
        wrapper: &Path,
        entry: &Path,
        staging: &Path,
        minify: bool,
    ) -> Result<()> {
        let platform = match self.options.flavor {
            EntryFlavor::HostGlobals => Platform::Neutral,
            EntryFlavor::Sandbox => Platform::Browser,
        };

        let mut external: Vec<String> = HOST_MODULES.iter().map(|m| m.to_string()).collect();
        external.extend(self.options.external.iter().cloned());

        let request = BundleRequest {
            entry_points: vec![wrapper.to_path_buf()],
            outfile: staging.to_path_buf(),
            format: Format::Esm,
            platform,
            external,
            minify,
            alias: vec![(USER_ENTRY_SPECIFIER.to_string(), entry.to_path_buf())],
            cwd: self.options.project_root.clone(),
        };
        self.bundler.bundle(&request).await?;

        if self.options.flavor == EntryFlavor::HostGlobals {
            let code = tokio::fs::read_to_string(staging)
                .await
                .map_err(|e| BundleError::io(staging, e))?;
            let output = rewrite_source(staging, &code, &self.options.renames, minify)?;
            if output.renamed > 0 {
                tracing::debug!(renamed = output.renamed, "rewrote reserved globals");
                tokio::fs::write(staging, output.code)
                    .await
                    .map_err(|e| BundleError::io(staging, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a fixed bundle instead of invoking a real bundler.
    struct FakeBundler {
        output: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Bundler for FakeBundler {
        async fn bundle(&self, request: &BundleRequest) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.entry_points[0].exists(), "wrapper must be written first");
            assert_eq!(request.alias[0].0, USER_ENTRY_SPECIFIER);
            assert!(request.alias[0].1.is_absolute());
            match self.output {
                Some(code) => {
                    std::fs::write(&request.outfile, code).unwrap();
                    Ok(())
                }
                None => {
                    std::fs::write(&request.outfile, "partial").unwrap();
                    Err(BundleError::BundlerFailed {
                        status: "exit status: 1".to_string(),
                        stderr: "Could not resolve \"missing\"".to_string(),
                    })
                }
            }
        }
    }

    fn pipeline(temp: &TempDir, flavor: EntryFlavor, output: Option<&'static str>) -> BuildPipeline {
        std::fs::write(temp.path().join("index.js"), "export default {};").unwrap();
        BuildPipeline::new(
            Arc::new(FakeBundler {
                output,
                calls: AtomicUsize::new(0),
            }),
            PipelineOptions {
                project_root: temp.path().to_path_buf(),
                work_dir: temp.path().join(".dev"),
                flavor,
                mock_origin: "http://127.0.0.1:4000".to_string(),
                runtime_port: 18080,
                external: Vec::new(),
                renames: RenameTable::default(),
            },
        )
    }

    #[tokio::test]
    async fn test_host_build_rewrites_cache() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, EntryFlavor::HostGlobals, Some("cache.get(1);\n"));

        let artifact = pipeline.build("42", Path::new("index.js"), false).await.unwrap();

        assert_eq!(artifact, temp.path().join(".dev/dist/bundle-42.js"));
        let code = std::fs::read_to_string(&artifact).unwrap();
        assert!(code.contains("mockCache.get(1)"));
        assert!(!pipeline.layout("42").staging_artifact().exists());
        assert!(pipeline.layout("42").entry_wrapper().exists());
    }

    #[tokio::test]
    async fn test_sandbox_build_keeps_cache() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, EntryFlavor::Sandbox, Some("cache.get(1);\n"));

        let artifact = pipeline.build("1", Path::new("index.js"), false).await.unwrap();
        assert_eq!(std::fs::read_to_string(artifact).unwrap(), "cache.get(1);\n");
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_artifact() {
        let temp = TempDir::new().unwrap();
        let good = pipeline(&temp, EntryFlavor::Sandbox, Some("ok();\n"));
        let artifact = good.build("9", Path::new("index.js"), false).await.unwrap();

        let bad = pipeline(&temp, EntryFlavor::Sandbox, None);
        let err = bad.build("9", Path::new("index.js"), false).await.unwrap_err();

        assert!(matches!(err, BundleError::BundlerFailed { .. }));
        assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "ok();\n");
        assert!(!bad.layout("9").staging_artifact().exists());
    }

    #[tokio::test]
    async fn test_missing_entry_is_reported() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp, EntryFlavor::Sandbox, Some(""));

        let err = pipeline.build("1", Path::new("nope.js"), false).await.unwrap_err();
        assert!(matches!(err, BundleError::EntryNotFound(_)));
    }
}
