use crate::cli::commands::session::Session;
use crate::config::Config;
use crate::errors::AppResult;
use crate::ui::messages::{status_line, warning};
use crate::utils::format_local;

pub async fn handle(cfg: &Config) -> AppResult<()> {
    let session = Session::open(cfg, None).await?;
    let view = session.manager.view();

    println!("{}", status_line(&view));
    if let Some(since) = &view.active_since {
        println!("   since {}", format_local(since));
    }
    if view.open_sessions > 1 {
        warning(format!(
            "{} sessions are open; showing the latest check-in.",
            view.open_sessions
        ));
    }

    session.close();
    Ok(())
}
