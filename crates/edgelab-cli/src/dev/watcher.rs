//! File system watcher for development mode.
//!
//! Watches the whole project, which includes the session work directory.
//! [`RebuildScheduler`] turns the raw events into debounced rebuilds. Files
//! sessions generate themselves never count as edits, and the first
//! work-directory event after a build is swallowed through the
//! [`HousekeepingFlag`].

use crate::dev::registry::REGISTRY_FILE;
use crate::error::{CliError, Result};
use edgelab_bundler::SessionLayout;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A relevant file system change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A project source file changed
    Source(PathBuf),
    /// Something under the session work directory changed
    WorkDir(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Source(p) | WatchEvent::WorkDir(p) => p,
        }
    }
}

/// Recursive watcher over the project root.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`. Events under `work_dir` are reported as
    /// [`WatchEvent::WorkDir`] even though the directory is a dotfile.
    ///
    /// # Errors
    ///
    /// Returns error if the watcher cannot be created or `root` doesn't exist
    pub fn new(
        root: PathBuf,
        work_dir: PathBuf,
        ignore_patterns: Vec<String>,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(100);
        let root_clone = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(error = %e, "watch error");
                    return;
                }
            };

            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }

            for path in &event.paths {
                if let Some(change) = classify(path, &root_clone, &work_dir, &ignore_patterns) {
                    // Receiver gone means the session is shutting down
                    if tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Decide what a changed path means, or `None` to ignore it.
///
/// # Arguments
///
/// * `path` - Absolute path reported by the watcher
/// * `root` - Project root
/// * `work_dir` - Session work directory, exempt from the dotfile rule
/// * `ignore_patterns` - Directory prefixes or `*.ext` suffixes to drop
///
/// # Examples
///
/// ```
/// use edgelab_cli::dev::{WatchEvent, watcher::classify};
/// use std::path::{Path, PathBuf};
///
/// let root = Path::new("/project");
/// let work_dir = Path::new("/project/.dev");
/// let ignore = ["node_modules".to_string()];
///
/// assert_eq!(
///     classify(Path::new("/project/src/app.js"), root, work_dir, &ignore),
///     Some(WatchEvent::Source(PathBuf::from("/project/src/app.js")))
/// );
/// assert_eq!(classify(Path::new("/project/node_modules/a.js"), root, work_dir, &ignore), None);
/// assert_eq!(classify(Path::new("/project/.env"), root, work_dir, &ignore), None);
/// ```
pub fn classify(
    path: &Path,
    root: &Path,
    work_dir: &Path,
    ignore_patterns: &[String],
) -> Option<WatchEvent> {
    if path.starts_with(work_dir) {
        return Some(WatchEvent::WorkDir(path.to_path_buf()));
    }

    if should_ignore(path, root, ignore_patterns) {
        None
    } else {
        Some(WatchEvent::Source(path.to_path_buf()))
    }
}

/// Check if a path should be ignored: outside `root`, matching a pattern,
/// or inside a dotfile directory.
fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let rel_path = match path.strip_prefix(root) {
        Ok(p) => p,
        Err(_) => return true,
    };

    let path_str = rel_path.to_string_lossy();

    for pattern in ignore_patterns {
        if let Some(ext) = pattern.strip_prefix('*') {
            if path_str.ends_with(ext) {
                return true;
            }
        } else if path_str.starts_with(pattern.as_str())
            || path_str.contains(&format!("/{}", pattern))
        {
            return true;
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

/// One-shot flag armed by the build pipeline before it writes into the work
/// directory. The next work-directory event consumes it.
#[derive(Debug, Clone, Default)]
pub struct HousekeepingFlag(Arc<AtomicBool>);

impl HousekeepingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Trailing-edge debouncer: fires once `window` after the last touch.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record an event, pushing the deadline out.
    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Resolve when the window has elapsed since the last touch.
    ///
    /// Never resolves while idle, so it can sit in a `select!` arm. The
    /// caller clears the debouncer once it fired.
    pub async fn ready(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

/// What a [`WatchEvent`] did to the rebuild schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A rebuild is now pending
    Rebuild,
    /// Consumed by the armed housekeeping flag
    Swallowed,
    /// A file some session writes itself
    Generated,
}

/// Routes watcher events into one debounced rebuild at a time.
#[derive(Debug)]
pub struct RebuildScheduler {
    work_dir: PathBuf,
    owned: Vec<PathBuf>,
    housekeeping: HousekeepingFlag,
    debouncer: Debouncer,
}

impl RebuildScheduler {
    /// # Arguments
    ///
    /// * `work_dir` - Session work directory
    /// * `housekeeping` - Flag the build pipeline arms before writing
    /// * `window` - Trailing debounce window
    pub fn new(work_dir: PathBuf, housekeeping: HousekeepingFlag, window: Duration) -> Self {
        Self {
            work_dir,
            owned: Vec::new(),
            housekeeping,
            debouncer: Debouncer::new(window),
        }
    }

    /// Treat writes to `path` (and its temp files) as generated, wherever it lives.
    pub fn with_owned(mut self, path: PathBuf) -> Self {
        self.owned.push(path);
        self
    }

    pub fn observe(&mut self, event: &WatchEvent) -> Route {
        if self.is_owned(event.path()) {
            return Route::Generated;
        }

        if let WatchEvent::WorkDir(path) = event {
            if self.housekeeping.take() {
                return Route::Swallowed;
            }
            if SessionLayout::is_generated(&self.work_dir, path)
                || path == &self.work_dir.join(REGISTRY_FILE)
            {
                return Route::Generated;
            }
        }

        self.debouncer.touch();
        Route::Rebuild
    }

    /// Resolve once a scheduled rebuild is due, then reset.
    ///
    /// Pending forever while nothing is scheduled. Cancel-safe.
    pub async fn due(&mut self) {
        self.debouncer.ready().await;
        self.debouncer.clear();
    }

    fn is_owned(&self, path: &Path) -> bool {
        self.owned.iter().any(|owned| {
            let (Some(name), Some(owned_name)) = (path.file_name(), owned.file_name()) else {
                return false;
            };
            path.parent() == owned.parent()
                && name.to_string_lossy().starts_with(owned_name.to_string_lossy().as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (PathBuf, PathBuf) {
        (PathBuf::from("/project"), PathBuf::from("/project/.dev"))
    }

    #[test]
    fn test_should_ignore_node_modules() {
        let root = PathBuf::from("/project");
        let patterns = vec!["node_modules".to_string()];

        let path = PathBuf::from("/project/node_modules/package/index.js");
        assert!(should_ignore(&path, &root, &patterns));

        let path = PathBuf::from("/project/src/index.js");
        assert!(!should_ignore(&path, &root, &patterns));
    }

    #[test]
    fn test_should_ignore_extension() {
        let root = PathBuf::from("/project");
        let patterns = vec!["*.log".to_string()];

        assert!(should_ignore(Path::new("/project/debug.log"), &root, &patterns));
        assert!(!should_ignore(Path::new("/project/src/index.js"), &root, &patterns));
    }

    #[test]
    fn test_should_ignore_hidden_files() {
        let root = PathBuf::from("/project");

        assert!(should_ignore(Path::new("/project/.git/config"), &root, &[]));
        assert!(should_ignore(Path::new("/project/.env"), &root, &[]));
        assert!(should_ignore(Path::new("/project/src/.hidden/file.js"), &root, &[]));
    }

    #[test]
    fn test_should_ignore_outside_root() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(Path::new("/other/file.js"), &root, &[]));
    }

    #[test]
    fn test_work_dir_is_exempt_from_dotfile_rule() {
        let (root, work_dir) = project();

        let event = classify(
            Path::new("/project/.dev/dist/bundle-1.js"),
            &root,
            &work_dir,
            &[],
        );
        assert_eq!(
            event,
            Some(WatchEvent::WorkDir(PathBuf::from("/project/.dev/dist/bundle-1.js")))
        );

        assert_eq!(classify(Path::new("/project/.git/HEAD"), &root, &work_dir, &[]), None);
        assert_eq!(
            classify(Path::new("/project/src/index.js"), &root, &work_dir, &[]),
            Some(WatchEvent::Source(PathBuf::from("/project/src/index.js")))
        );
    }

    #[test]
    fn test_housekeeping_flag_is_one_shot() {
        let flag = HousekeepingFlag::new();
        assert!(!flag.take());

        flag.arm();
        let shared = flag.clone();
        assert!(shared.take());
        assert!(!flag.take());
    }

    #[tokio::test]
    async fn test_burst_fires_once() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let mut fired = 0;

        for _ in 0..5 {
            debouncer.touch();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let quiet = tokio::time::sleep(Duration::from_millis(400));
        tokio::pin!(quiet);
        loop {
            tokio::select! {
                _ = debouncer.ready() => {
                    fired += 1;
                    debouncer.clear();
                }
                _ = &mut quiet => break,
            }
        }

        assert_eq!(fired, 1);
    }

    #[tokio::test]
    async fn test_idle_debouncer_never_fires() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let result = tokio::time::timeout(Duration::from_millis(100), debouncer.ready()).await;
        assert!(result.is_err());
    }

    fn scheduler(window: Duration) -> (RebuildScheduler, HousekeepingFlag) {
        let flag = HousekeepingFlag::new();
        let scheduler = RebuildScheduler::new(PathBuf::from("/project/.dev"), flag.clone(), window)
            .with_owned(PathBuf::from("/project/.dev/kv-store.json"));
        (scheduler, flag)
    }

    #[tokio::test]
    async fn test_armed_flag_swallows_one_work_dir_event() {
        let (mut scheduler, flag) = scheduler(Duration::from_millis(20));
        let custom = WatchEvent::WorkDir(PathBuf::from("/project/.dev/notes.txt"));

        flag.arm();
        assert_eq!(scheduler.observe(&custom), Route::Swallowed);
        let idle = tokio::time::timeout(Duration::from_millis(100), scheduler.due()).await;
        assert!(idle.is_err());

        // The flag is spent: the next custom change rebuilds
        assert_eq!(scheduler.observe(&custom), Route::Rebuild);
        let due = tokio::time::timeout(Duration::from_millis(500), scheduler.due()).await;
        assert!(due.is_ok());
    }

    #[tokio::test]
    async fn test_generated_files_never_schedule() {
        let (mut scheduler, _flag) = scheduler(Duration::from_millis(20));

        for path in [
            "/project/.dev/dist/bundle-7.js",
            "/project/.dev/devEntry-7.js",
            "/project/.dev/runtime-7.toml",
            "/project/.dev/sessions.json",
            "/project/.dev/kv-store.json",
            "/project/.dev/kv-store.json.tmp",
        ] {
            let event = WatchEvent::WorkDir(PathBuf::from(path));
            assert_eq!(scheduler.observe(&event), Route::Generated, "{}", path);
        }

        let idle = tokio::time::timeout(Duration::from_millis(100), scheduler.due()).await;
        assert!(idle.is_err());
    }

    #[test]
    fn test_owned_file_outside_work_dir() {
        let flag = HousekeepingFlag::new();
        let mut scheduler =
            RebuildScheduler::new(PathBuf::from("/project/.dev"), flag, Duration::from_millis(10))
                .with_owned(PathBuf::from("/project/data/kv.json"));

        let store = WatchEvent::Source(PathBuf::from("/project/data/kv.json"));
        assert_eq!(scheduler.observe(&store), Route::Generated);

        let sibling = WatchEvent::Source(PathBuf::from("/project/data/seed.json"));
        assert_eq!(scheduler.observe(&sibling), Route::Rebuild);
    }

    #[tokio::test]
    async fn test_watcher_reports_only_relevant_changes() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules")).unwrap();

        let (_watcher, mut rx) = FileWatcher::new(
            root.clone(),
            root.join(".dev"),
            vec!["node_modules".to_string(), "*.log".to_string()],
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(root.join(".env"), "SECRET=1").unwrap();
        std::fs::write(root.join("node_modules/x.js"), "x").unwrap();
        std::fs::write(root.join("debug.log"), "log").unwrap();
        std::fs::write(root.join("src/app.js"), "export default {};").unwrap();

        let mut seen = Vec::new();
        let deadline = tokio::time::sleep(Duration::from_millis(1000));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                Some(event) = rx.recv() => seen.push(event),
                _ = &mut deadline => break,
            }
        }

        assert!(seen.contains(&WatchEvent::Source(root.join("src/app.js"))));
        for ignored in [root.join(".env"), root.join("node_modules/x.js"), root.join("debug.log")] {
            assert!(
                seen.iter().all(|e| e.path() != ignored),
                "unexpected event for {}: {:?}",
                ignored.display(),
                seen
            );
        }
    }

    #[tokio::test]
    async fn test_touch_extends_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(150));
        debouncer.touch();
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.touch();

        // Only 100ms since the last touch: not ready yet
        let early = tokio::time::timeout(Duration::from_millis(100), debouncer.ready()).await;
        assert!(early.is_err());

        let late = tokio::time::timeout(Duration::from_millis(200), debouncer.ready()).await;
        assert!(late.is_ok());
    }
}
