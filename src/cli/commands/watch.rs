use crate::cli::commands::session::Session;
use crate::config::Config;
use crate::errors::AppResult;
use crate::models::session_view::{SessionView, SyncStatus};
use crate::ui::messages::{info, status_line, warning};
use std::io::{self, Write};

/// Redraw the status line on every tick and every state change until Ctrl-C.
pub async fn handle(cfg: &Config) -> AppResult<()> {
    let session = Session::open(cfg, None).await?;
    let manager = &session.manager;
    let mut views = manager.watch();
    let mut ticks = manager.timer().subscribe();

    info("Watching attendance state, press Ctrl-C to stop.");
    redraw(&manager.view())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = manager.view();
                if let SyncStatus::Lost { reason } = &view.sync {
                    println!();
                    warning(format!("Sync lost: {reason}"));
                }
                redraw(&view)?;
            }
            changed = ticks.changed() => {
                if changed.is_err() {
                    break;
                }
                redraw(&manager.view())?;
            }
        }
    }

    println!();
    session.close();
    Ok(())
}

fn redraw(view: &SessionView) -> AppResult<()> {
    let mut out = io::stdout();
    write!(out, "\r\x1b[2K{}", status_line(view))?;
    out.flush()?;
    Ok(())
}
