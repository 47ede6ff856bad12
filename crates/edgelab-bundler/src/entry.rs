//! Synthetic entry module generation.
//!
//! The bundler never sees the user's entry directly. It bundles a generated
//! wrapper that imports [`USER_ENTRY_SPECIFIER`] (aliased to the real entry at
//! bundle time), installs the mock KV (and, for the host-globals flavor, mock
//! cache) clients, and adapts the user's default export to whatever the
//! runtime expects.

const MOCK_CLIENTS: &str = include_str!("../assets/mock-clients.js");
const HOST_TEMPLATE: &str = include_str!("../assets/entry-host.js");
const SANDBOX_TEMPLATE: &str = include_str!("../assets/entry-sandbox.js");

/// Placeholder import the wrapper uses for the user's entry module.
pub const USER_ENTRY_SPECIFIER: &str = "edgelab-user-entry";

/// Path the in-process wrapper answers for readiness probes.
pub const READY_PATH: &str = "/__edgelab/ready";

/// Which runtime the wrapper is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFlavor {
    /// Script host that exposes platform globals in-process. The wrapper
    /// starts its own listener and supplies a mock for the `cache` global.
    HostGlobals,
    /// Sandbox binary that provides `cache` natively and expects a default export.
    Sandbox,
}

/// Inputs baked into a generated wrapper.
#[derive(Debug, Clone)]
pub struct EntryTemplate {
    pub mock_origin: String,
    pub port: u16,
}

impl EntryTemplate {
    pub fn new(mock_origin: impl Into<String>, port: u16) -> Self {
        Self {
            mock_origin: mock_origin.into(),
            port,
        }
    }

    /// Render the wrapper source for `flavor`.
    pub fn render(&self, flavor: EntryFlavor) -> String {
        let template = match flavor {
            EntryFlavor::HostGlobals => HOST_TEMPLATE,
            EntryFlavor::Sandbox => SANDBOX_TEMPLATE,
        };

        let clients = MOCK_CLIENTS.replace(
            "\"__EDGELAB_MOCK_ORIGIN__\"",
            &js_string(&self.mock_origin),
        );

        template
            .replace("\"__EDGELAB_USER_ENTRY__\"", &js_string(USER_ENTRY_SPECIFIER))
            .replace("__EDGELAB_MOCK_CLIENTS__", &clients)
            .replace("__EDGELAB_PORT__", &self.port.to_string())
            .replace("\"__EDGELAB_READY_PATH__\"", &js_string(READY_PATH))
    }
}

fn js_string(value: &str) -> String {
    // serde_json string escaping is valid JavaScript string syntax
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> EntryTemplate {
        EntryTemplate::new("http://127.0.0.1:4821", 18080)
    }

    #[test]
    fn test_host_wrapper_imports_entry_and_installs_cache() {
        let source = template().render(EntryFlavor::HostGlobals);

        assert!(source.contains(r#"import worker from "edgelab-user-entry";"#));
        assert!(source.contains("globalThis.mockCache = new EdgelabMockCache();"));
        assert!(source.contains("globalThis.EdgeKV = EdgelabMockKV;"));
        assert!(source.contains("const EDGELAB_PORT = 18080;"));
        assert!(source.contains(r#""http://127.0.0.1:4821""#));
        assert!(source.contains(READY_PATH));
        assert!(source.contains("sandbox returned null"));
        assert!(!source.contains("__EDGELAB_"));
    }

    #[test]
    fn test_sandbox_wrapper_reexports_default() {
        let source = template().render(EntryFlavor::Sandbox);

        assert!(source.contains("export default worker;"));
        assert!(source.contains("globalThis.EdgeKV"));
        assert!(!source.contains("globalThis.mockCache"));
        assert!(!source.contains("Deno.serve"));
        assert!(!source.contains("__EDGELAB_"));
    }

    #[test]
    fn test_mock_origin_is_escaped() {
        let source = EntryTemplate::new(r#"http://x/"q""#, 1).render(EntryFlavor::Sandbox);
        assert!(source.contains(r#""http://x/\"q\"""#));
    }
}
