//! Dev session command implementation.
//!
//! Orchestrates the whole session lifecycle:
//! - Registry reconcile and session allocation
//! - Mock services, initial build, runtime start
//! - Request bridge (bridged runtime only)
//! - Rebuild+restart on file changes, console shortcuts
//! - Graceful shutdown on Ctrl+C

use crate::cli::{DevArgs, parse_local_upstream};
use crate::config::EdgelabConfig;
use crate::dev::{
    Bridge, ConsoleAction, DevConfig, FileWatcher, HousekeepingFlag, NewSession, RebuildScheduler,
    RefreshCommand, RuntimeKind, SessionContext, SessionId, SessionRegistry, Supervisor,
    SupervisorOptions, console, driver_for, resolve_project_root,
};
use crate::dev::registry::REGISTRY_FILE;
use crate::error::{CliError, Result, ResultExt};
use std::future::Future;
use crate::ui::{self, Spinner};
use edgelab_bundler::{BuildPipeline, EsbuildBundler, PipelineOptions, RenameTable, SessionLayout};
use edgelab_mock::{MockCache, MockKv, MockServer, MockServices};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Execute the dev command.
///
/// # Process Flow
///
/// 1. Load and validate configuration
/// 2. Reconcile the session registry and allocate this session
/// 3. Start mock services, build, and start the runtime
/// 4. Main event loop: file changes, console keys, Ctrl+C
/// 5. Stop the runtime and drop this session's registry row
///
/// # Errors
///
/// Returns errors for invalid configuration, build failures, runtime spawn
/// failures, and readiness timeouts.
pub async fn execute(args: DevArgs) -> Result<()> {
    let project_root = resolve_project_root(args.cwd.as_deref())?;

    let config = EdgelabConfig::load(&args, &project_root)?;
    config.validate()?;

    let dev = DevConfig::resolve(config, &project_root)?;
    std::fs::create_dir_all(&dev.work_dir).with_path(&dev.work_dir)?;

    let mut registry = SessionRegistry::open(&dev.work_dir);
    let reaped = registry.reconcile();
    if !reaped.is_empty() {
        ui::info(&format!("Cleaned up {} stale session(s)", reaped.len()));
    }

    let session_id = registry.allocate(NewSession {
        entry: dev.entry.clone(),
        port: dev.addr.port(),
        local_upstream: dev.base.dev.local_upstream.clone(),
        minify: dev.base.dev.minify,
        inspect_port: dev.base.dev.inspect_port,
    });
    registry.save()?;
    tracing::debug!(session = %session_id, "session allocated");

    let result = run_session(&dev, session_id).await;

    if let Err(e) = registry.release(session_id) {
        ui::warning(&format!("Failed to update session registry: {}", e));
    }
    if let Err(e) = SessionLayout::new(&dev.work_dir, session_id.to_string()).remove_generated() {
        tracing::debug!(error = %e, "failed to remove session files");
    }

    result
}

async fn run_session(dev: &DevConfig, session_id: SessionId) -> Result<()> {
    let settings = &dev.base;

    let local_upstream = settings
        .dev
        .local_upstream
        .as_deref()
        .map(parse_local_upstream)
        .transpose()
        .map_err(CliError::InvalidArgument)?;

    let kv = match dev.runtime {
        RuntimeKind::InProcess => MockKv::seeded(&dev.project_root.join(&settings.kv.seed_file))?,
        RuntimeKind::Bridged => MockKv::persistent(dev.project_root.join(&settings.kv.store_file)),
    };
    let services = MockServices::new(MockCache::with_quota(settings.cache.quota_bytes), kv);
    let cache = Arc::clone(&services.cache);
    let mock = MockServer::bind(services, 0).await?;

    let (runtime_port, bridge_port) = match dev.runtime {
        RuntimeKind::InProcess => (dev.addr.port(), None),
        RuntimeKind::Bridged => (
            DevConfig::pick_free_port()?,
            Some(DevConfig::pick_free_port()?),
        ),
    };

    let ctx = SessionContext {
        id: session_id,
        project_root: dev.project_root.clone(),
        work_dir: dev.work_dir.clone(),
        entry: dev.entry.clone(),
        port: dev.addr.port(),
        runtime_port,
        bridge_port,
        local_upstream,
        minify: settings.dev.minify,
        inspect_port: settings.dev.inspect_port,
        mock_origin: mock.origin(),
        layout: SessionLayout::new(&dev.work_dir, session_id.to_string()),
    };

    ui::info(&format!("Entry point: {}", display_entry(&ctx)));
    ui::info(&format!("Runtime: {}", dev.runtime.as_str()));

    let pipeline = BuildPipeline::new(
        Arc::new(EsbuildBundler::new(&settings.bundler.command)),
        PipelineOptions {
            project_root: ctx.project_root.clone(),
            work_dir: ctx.work_dir.clone(),
            flavor: dev.runtime.entry_flavor(),
            mock_origin: ctx.mock_origin.clone(),
            runtime_port,
            external: settings.bundler.external.clone(),
            renames: RenameTable::default(),
        },
    );

    let housekeeping = HousekeepingFlag::new();
    let artifact = build(&pipeline, &ctx, &housekeeping).await?;

    let driver = driver_for(dev.runtime, &settings.runtime);
    let mut supervisor = Supervisor::new(
        ctx.clone(),
        driver,
        SupervisorOptions::from(&settings.dev),
    )?;

    let spinner = Spinner::new(&format!("Starting {} runtime...", dev.runtime.as_str()));
    if let Err(e) = supervisor.start(&artifact).await {
        spinner.fail("Runtime failed to start");
        mock.shutdown();
        return Err(e);
    }
    spinner.finish("Runtime ready");
    tracing::debug!(pid = ?supervisor.pid(), "runtime started");

    let mut bridge_task = match dev.runtime {
        RuntimeKind::Bridged => {
            let listener = TcpListener::bind(dev.addr).await?;
            let bridge = Bridge::new(&ctx)?;
            Some(tokio::spawn(bridge.serve(listener)))
        }
        RuntimeKind::InProcess => None,
    };

    let (watcher, mut changes) = FileWatcher::new(
        ctx.project_root.clone(),
        ctx.work_dir.clone(),
        dev.watch_ignore.clone(),
    )?;
    tracing::debug!(root = %watcher.root().display(), "watching for changes");

    let refresh = settings
        .dev
        .refresh_command
        .as_deref()
        .and_then(|raw| match RefreshCommand::parse(raw) {
            Ok(command) => Some(command),
            Err(e) => {
                ui::warning(&format!("{}\nThe refresh command will be skipped", e));
                None
            }
        });

    let mut scheduler =
        RebuildScheduler::new(ctx.work_dir.clone(), housekeeping.clone(), dev.debounce())
            .with_owned(dev.project_root.join(&settings.kv.store_file))
            .with_owned(ctx.work_dir.join(REGISTRY_FILE));
    let mut keys = console::spawn_key_reader();

    ui::success(&format!("Serving at {}", ctx.server_url()));
    if keys.is_some() {
        ui::info(console::help_line());
    } else {
        ui::info("Press Ctrl+C to stop");
    }

    loop {
        tokio::select! {
            Some(event) = changes.recv() => {
                let route = scheduler.observe(&event);
                tracing::trace!(path = %event.path().display(), ?route, "file change");
            }

            _ = scheduler.due() => {
                let cycle = rebuild_cycle(
                    &pipeline,
                    &ctx,
                    &mut supervisor,
                    &housekeeping,
                    refresh.as_ref(),
                );
                if interrupted(cycle, signal::ctrl_c()).await {
                    ui::info("Shutting down...");
                    break;
                }
                tracing::debug!(
                    pid = ?supervisor.pid(),
                    used_bytes = cache.used_bytes(),
                    quota_bytes = cache.quota_bytes(),
                    entries = cache.len(),
                    "rebuild cycle finished"
                );
            }

            action = next_action(&mut keys) => match action {
                Some(ConsoleAction::OpenBrowser) => console::open_browser(&ctx.server_url()),
                Some(ConsoleAction::OpenDevtools) => console::show_devtools(ctx.devtools_url().as_deref()),
                Some(ConsoleAction::Clear) => console::clear_screen(),
                Some(ConsoleAction::Exit) => {
                    ui::info("Shutting down...");
                    break;
                }
                None => keys = None,
            },

            _ = signal::ctrl_c() => {
                ui::info("Shutting down...");
                break;
            }

            result = wait_bridge(&mut bridge_task) => {
                supervisor.stop().await;
                mock.shutdown();
                return match result {
                    Ok(Ok(())) => Err(CliError::Server("request bridge stopped unexpectedly".to_string())),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(CliError::Server(format!("request bridge task failed: {}", e))),
                };
            }
        }
    }

    supervisor.stop().await;
    if let Some(task) = bridge_task {
        task.abort();
    }
    drop(watcher);
    mock.shutdown();

    ui::success("Dev session stopped");
    Ok(())
}

/// Build the session artifact under a spinner.
async fn build(
    pipeline: &BuildPipeline,
    ctx: &SessionContext,
    housekeeping: &HousekeepingFlag,
) -> Result<PathBuf> {
    housekeeping.arm();
    let spinner = Spinner::new("Bundling...");
    let started = Instant::now();

    match pipeline
        .build(&ctx.id.to_string(), &ctx.entry, ctx.minify)
        .await
    {
        Ok(artifact) => {
            spinner.finish(&format!(
                "Bundled in {}",
                ui::format_duration(started.elapsed())
            ));
            Ok(artifact)
        }
        Err(e) => {
            spinner.fail("Bundling failed");
            Err(e.into())
        }
    }
}

/// One rebuild+restart cycle. Failures are reported and the session continues.
async fn rebuild_cycle(
    pipeline: &BuildPipeline,
    ctx: &SessionContext,
    supervisor: &mut Supervisor,
    housekeeping: &HousekeepingFlag,
    refresh: Option<&RefreshCommand>,
) {
    ui::info("Change detected, rebuilding...");

    if let Some(command) = refresh {
        if let Err(e) = command.run(&ctx.project_root).await {
            ui::warning(&format!("{}; continuing with rebuild", e));
        }
    }

    let artifact = match build(pipeline, ctx, housekeeping).await {
        Ok(artifact) => artifact,
        Err(e) => {
            ui::error(&e.to_string());
            ui::warning("Keeping the previous build running");
            return;
        }
    };

    match supervisor.restart(&artifact).await {
        Ok(()) => ui::success("Runtime restarted"),
        Err(e) => ui::error(&format!("Runtime failed to restart: {}", e)),
    }
}

/// Drive `cycle` to completion unless `shutdown` resolves first.
///
/// Returns `true` when the cycle was abandoned.
async fn interrupted<C, S>(cycle: C, shutdown: S) -> bool
where
    C: Future<Output = ()>,
    S: Future,
{
    tokio::select! {
        _ = cycle => false,
        _ = shutdown => true,
    }
}

async fn next_action(keys: &mut Option<mpsc::Receiver<ConsoleAction>>) -> Option<ConsoleAction> {
    match keys {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_bridge(
    task: &mut Option<JoinHandle<Result<()>>>,
) -> std::result::Result<Result<()>, tokio::task::JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn display_entry(ctx: &SessionContext) -> String {
    ctx.entry
        .strip_prefix(&ctx.project_root)
        .unwrap_or(&ctx.entry)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::context::test_support::context;
    use async_trait::async_trait;
    use edgelab_bundler::{BundleRequest, Bundler, EntryFlavor};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Counts builds and writes a trivial bundle.
    #[derive(Default)]
    struct CountingBundler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Bundler for CountingBundler {
        async fn bundle(&self, request: &BundleRequest) -> edgelab_bundler::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&request.outfile, "export default {};").unwrap();
            Ok(())
        }
    }

    #[test]
    fn test_display_entry_is_project_relative() {
        let ctx = context(Path::new("/project"), 18080, None);
        assert_eq!(display_entry(&ctx), Path::new("src/index.js").display().to_string());
    }

    #[tokio::test]
    async fn test_next_action_without_console_stays_pending() {
        let mut keys = None;
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            next_action(&mut keys),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_next_action_reports_closed_console() {
        let (tx, rx) = mpsc::channel(1);
        let mut keys = Some(rx);
        tx.send(ConsoleAction::Clear).await.unwrap();
        drop(tx);

        assert_eq!(next_action(&mut keys).await, Some(ConsoleAction::Clear));
        assert_eq!(next_action(&mut keys).await, None);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_rebuild_cycle() {
        let stalled = std::future::pending::<()>();
        assert!(interrupted(stalled, std::future::ready(())).await);

        let finished = std::future::ready(());
        assert!(!interrupted(finished, std::future::pending::<()>()).await);
    }

    #[tokio::test]
    async fn test_burst_of_edits_rebuilds_once() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".dev")).unwrap();
        std::fs::write(root.join("src/index.js"), "export default {};").unwrap();

        let ctx = context(&root, 18080, None);
        let bundler = Arc::new(CountingBundler::default());
        let pipeline = BuildPipeline::new(
            bundler.clone(),
            PipelineOptions {
                project_root: root.clone(),
                work_dir: ctx.work_dir.clone(),
                flavor: EntryFlavor::Sandbox,
                mock_origin: ctx.mock_origin.clone(),
                runtime_port: 18080,
                external: Vec::new(),
                renames: RenameTable::default(),
            },
        );

        let housekeeping = HousekeepingFlag::new();
        let mut scheduler = RebuildScheduler::new(
            ctx.work_dir.clone(),
            housekeeping.clone(),
            Duration::from_millis(300),
        );
        let (_watcher, mut changes) =
            FileWatcher::new(root.clone(), ctx.work_dir.clone(), Vec::new()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        for i in 0..5 {
            std::fs::write(root.join(format!("src/part{}.js", i)), "export {};").unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        let quiet = tokio::time::sleep(Duration::from_secs(2));
        tokio::pin!(quiet);
        loop {
            tokio::select! {
                Some(event) = changes.recv() => {
                    scheduler.observe(&event);
                }
                _ = scheduler.due() => {
                    build(&pipeline, &ctx, &housekeeping).await.unwrap();
                }
                _ = &mut quiet => break,
            }
        }

        // The build's own writes into .dev must not schedule another one
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 1);
        assert!(ctx.layout.artifact().exists());
    }
}
