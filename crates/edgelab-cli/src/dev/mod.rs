//! Dev session orchestration.
//!
//! - [`registry`]: persisted sessions, reconciled on every startup
//! - [`driver`] and [`supervisor`]: the runtime child and its state machine
//! - [`proxy`]: request bridge in front of the bridged runtime
//! - [`watcher`] and [`refresh`]: file changes to rebuild+restart cycles
//! - [`console`]: single-key shortcuts

pub mod config;
pub mod console;
pub mod context;
pub mod driver;
pub mod proxy;
pub mod refresh;
pub mod registry;
pub mod supervisor;
pub mod watcher;

pub use config::{DevConfig, WORK_DIR_NAME, resolve_project_root};
pub use console::ConsoleAction;
pub use context::SessionContext;
pub use driver::{BridgedDriver, InProcessDriver, RuntimeDriver, RuntimeKind, driver_for};
pub use proxy::Bridge;
pub use refresh::RefreshCommand;
pub use registry::{DevSession, NewSession, SessionId, SessionRegistry, TcpPortProbe};
pub use supervisor::{OutputLine, OutputStream, RuntimeState, Supervisor, SupervisorOptions};
pub use watcher::{Debouncer, FileWatcher, HousekeepingFlag, RebuildScheduler, Route, WatchEvent};
