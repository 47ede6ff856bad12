//! Persisted registry of dev sessions for one project.
//!
//! The registry file (`.dev/sessions.json`) maps session ids to the session
//! that owns them. Rows are never cleaned up by the process that wrote them
//! if it dies; instead every invocation first calls
//! [`SessionRegistry::reconcile`], which probes each recorded port and reaps
//! sessions whose port is free, deleting their generated files.

use chrono::{DateTime, Utc};
use edgelab_bundler::SessionLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CliError, Result};

/// Registry file name inside the work directory.
pub const REGISTRY_FILE: &str = "sessions.json";

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Time-based session id: milliseconds since the Unix epoch, bumped so ids
/// handed out by one process are strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut last = LAST_ID.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match LAST_ID.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => return SessionId(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(SessionId)
    }
}

/// One row of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevSession {
    pub id: SessionId,
    pub entry: PathBuf,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_upstream: Option<String>,
    #[serde(default)]
    pub minify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspect_port: Option<u16>,
    pub started_at: DateTime<Utc>,
}

/// Parameters for [`SessionRegistry::allocate`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub entry: PathBuf,
    pub port: u16,
    pub local_upstream: Option<String>,
    pub minify: bool,
    pub inspect_port: Option<u16>,
}

/// Decides whether a recorded session is still alive.
pub trait PortProbe {
    fn is_in_use(&self, port: u16) -> bool;
}

/// Probes by trying to bind the port on loopback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortProbe;

impl PortProbe for TcpPortProbe {
    fn is_in_use(&self, port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).is_err()
    }
}

pub struct SessionRegistry<P: PortProbe = TcpPortProbe> {
    path: PathBuf,
    work_dir: PathBuf,
    sessions: BTreeMap<SessionId, DevSession>,
    probe: P,
}

impl SessionRegistry<TcpPortProbe> {
    /// Load the registry in `work_dir`, treating a missing or corrupt file as empty.
    pub fn open(work_dir: &Path) -> Self {
        Self::with_probe(work_dir, TcpPortProbe)
    }
}

impl<P: PortProbe> SessionRegistry<P> {
    pub fn with_probe(work_dir: &Path, probe: P) -> Self {
        let path = work_dir.join(REGISTRY_FILE);
        let sessions = load_sessions(&path);
        Self {
            path,
            work_dir: work_dir.to_path_buf(),
            sessions,
            probe,
        }
    }

    /// Reap sessions whose port is free. Returns the reaped rows.
    ///
    /// Sessions whose port is still occupied are left untouched.
    pub fn reconcile(&mut self) -> Vec<DevSession> {
        let dead: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| !self.probe.is_in_use(s.port))
            .map(|s| s.id)
            .collect();

        let mut reaped = Vec::with_capacity(dead.len());
        for id in dead {
            let Some(session) = self.sessions.remove(&id) else {
                continue;
            };

            let layout = SessionLayout::new(&self.work_dir, id.to_string());
            match layout.remove_generated() {
                Ok(removed) => {
                    tracing::debug!(session = %id, port = session.port, removed, "reaped stale session")
                }
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "failed to remove stale session files")
                }
            }
            reaped.push(session);
        }
        reaped
    }

    /// Record a new session and return its id.
    ///
    /// Only updates memory; call [`SessionRegistry::save`] to persist the row.
    ///
    /// # Arguments
    ///
    /// * `session` - Entry, port, and flags to record alongside the new id
    pub fn allocate(&mut self, session: NewSession) -> SessionId {
        let mut id = SessionId::next();
        while self.sessions.contains_key(&id) {
            id = SessionId::next();
        }

        self.sessions.insert(
            id,
            DevSession {
                id,
                entry: session.entry,
                port: session.port,
                local_upstream: session.local_upstream,
                minify: session.minify,
                inspect_port: session.inspect_port,
                started_at: Utc::now(),
            },
        );
        id
    }

    /// Drop this process's own row on shutdown.
    ///
    /// The file is re-read first so rows other sessions wrote since [`open`]
    /// survive; only `id` is removed before the file is rewritten.
    ///
    /// [`open`]: SessionRegistry::open
    pub fn release(&mut self, id: SessionId) -> Result<Option<DevSession>> {
        self.sessions = load_sessions(&self.path);
        let removed = self.sessions.remove(&id);
        self.save()?;
        Ok(removed)
    }

    pub fn get(&self, id: SessionId) -> Option<&DevSession> {
        self.sessions.get(&id)
    }

    /// Sessions ordered by id (oldest first).
    pub fn sessions(&self) -> Vec<&DevSession> {
        self.sessions.values().collect()
    }

    /// Whether the session's port is currently occupied.
    pub fn is_live(&self, session: &DevSession) -> bool {
        self.probe.is_in_use(session.port)
    }

    /// Rewrite the registry file with the current rows.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;

        let json = serde_json::to_string_pretty(&self.sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path).map_err(CliError::from)
    }
}

fn load_sessions(path: &Path) -> BTreeMap<SessionId, DevSession> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read session registry, starting empty");
            return BTreeMap::new();
        }
    };

    if content.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str(&content) {
        Ok(sessions) => sessions,
        Err(e) => {
            crate::ui::warning(&format!(
                "Session registry {} is corrupt ({}); starting with an empty registry",
                path.display(),
                e
            ));
            BTreeMap::new()
        }
    }
}
