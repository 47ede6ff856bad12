//! `edgelab sessions`: list the sessions recorded for a project.

use crate::cli::SessionsArgs;
use crate::dev::{DevSession, SessionRegistry, WORK_DIR_NAME, resolve_project_root};
use crate::error::Result;
use crate::ui;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRow<'a> {
    #[serde(flatten)]
    session: &'a DevSession,
    live: bool,
}

/// Execute the sessions command.
///
/// Rows whose port is free are shown as stale; they are reaped by the next
/// `edgelab dev`, not here.
pub async fn execute(args: SessionsArgs) -> Result<()> {
    let project_root = resolve_project_root(args.cwd.as_deref())?;
    let registry = SessionRegistry::open(&project_root.join(WORK_DIR_NAME));

    let rows: Vec<SessionRow<'_>> = registry
        .sessions()
        .into_iter()
        .map(|session| SessionRow {
            session,
            live: registry.is_live(session),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        ui::info("No dev sessions recorded for this project");
        return Ok(());
    }

    for row in &rows {
        let status = if row.live {
            "live".green().to_string()
        } else {
            "stale".dimmed().to_string()
        };
        let entry = row
            .session
            .entry
            .strip_prefix(&project_root)
            .unwrap_or(&row.session.entry);

        println!(
            "{}  {}  port {}  {}  started {}",
            row.session.id,
            status,
            row.session.port,
            entry.display(),
            row.session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
