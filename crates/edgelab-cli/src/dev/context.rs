//! Per-session values handed to every dev component.

use crate::dev::registry::SessionId;
use edgelab_bundler::SessionLayout;
use reqwest::Url;
use std::path::PathBuf;

/// Everything one dev session knows about itself.
///
/// Built once at startup and passed by reference to the pipeline, driver,
/// supervisor and bridge constructors.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub project_root: PathBuf,
    pub work_dir: PathBuf,
    pub entry: PathBuf,
    /// Developer-facing port
    pub port: u16,
    /// Port the runtime serves HTTP on
    pub runtime_port: u16,
    /// Sandbox proxy port (bridged flavor only)
    pub bridge_port: Option<u16>,
    pub local_upstream: Option<Url>,
    pub minify: bool,
    pub inspect_port: Option<u16>,
    /// Origin of the mock control server
    pub mock_origin: String,
    pub layout: SessionLayout,
}

impl SessionContext {
    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Origin the bridge uses as its proxy, if any.
    pub fn bridge_origin(&self) -> Option<String> {
        self.bridge_port.map(|port| format!("http://127.0.0.1:{}", port))
    }

    /// `devtools://` URL for the inspector, when one was requested.
    pub fn devtools_url(&self) -> Option<String> {
        self.inspect_port.map(|port| {
            format!(
                "devtools://devtools/bundled/js_app.html?experiments=true&v8only=true&ws=127.0.0.1:{}",
                port
            )
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::Path;

    /// Minimal context rooted at `root` for component tests.
    pub fn context(root: &Path, runtime_port: u16, bridge_port: Option<u16>) -> SessionContext {
        let id = SessionId::next();
        let work_dir = root.join(".dev");
        SessionContext {
            id,
            project_root: root.to_path_buf(),
            work_dir: work_dir.clone(),
            entry: root.join("src/index.js"),
            port: runtime_port,
            runtime_port,
            bridge_port,
            local_upstream: None,
            minify: false,
            inspect_port: None,
            mock_origin: "http://127.0.0.1:1".to_string(),
            layout: SessionLayout::new(work_dir, id.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::context;
    use std::path::Path;

    #[test]
    fn test_urls() {
        let mut ctx = context(Path::new("/project"), 18080, Some(18090));
        assert_eq!(ctx.server_url(), "http://127.0.0.1:18080");
        assert_eq!(ctx.bridge_origin().as_deref(), Some("http://127.0.0.1:18090"));
        assert!(ctx.devtools_url().is_none());

        ctx.inspect_port = Some(9229);
        assert!(ctx.devtools_url().unwrap().ends_with("ws=127.0.0.1:9229"));
    }
}
