use crate::cli::commands::session::Session;
use crate::cli::parser::{Commands, PositionArgs};
use crate::config::Config;
use crate::core::CommandOutcome;
use crate::errors::AppResult;
use crate::models::record::RecordId;
use crate::ui::messages::{status_line, success, warning};
use crate::utils::{format_local, short_id};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    In,
    Out,
    Toggle,
}

/// Handle `in`, `out` and `toggle`.
pub async fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let (action, position): (Action, &PositionArgs) = match cmd {
        Commands::In { position } => (Action::In, position),
        Commands::Out { position } => (Action::Out, position),
        Commands::Toggle { position } => (Action::Toggle, position),
        _ => return Ok(()),
    };

    let session = Session::open(cfg, Some(position)).await?;
    let result = run(&session, action).await;
    session.close();
    result
}

async fn run(session: &Session, action: Action) -> AppResult<()> {
    let manager = &session.manager;
    let checking_in = match action {
        Action::In => true,
        Action::Out => false,
        Action::Toggle => !manager.view().is_active,
    };

    let outcome = match action {
        Action::In => manager.check_in().await?,
        Action::Out => manager.check_out().await?,
        Action::Toggle => manager.toggle().await?,
    };

    let id = match outcome {
        CommandOutcome::Submitted(id) => id,
        CommandOutcome::Discarded => {
            warning("Session closed before the write completed.");
            return Ok(());
        }
    };

    // the view only changes once the stream shows the write
    let view = if checking_in {
        manager
            .wait_for(session.confirm_timeout, |v| {
                v.active_record_id.as_ref() == Some(&id)
            })
            .await?
    } else {
        manager
            .wait_for(session.confirm_timeout, |v| {
                v.is_live() && v.active_record_id.as_ref() != Some(&id)
            })
            .await?
    };

    report(session, &id, checking_in).await?;
    println!("{}", status_line(&view));
    Ok(())
}

async fn report(session: &Session, id: &RecordId, checked_in: bool) -> AppResult<()> {
    let Some(record) = session.record(id).await? else {
        return Ok(());
    };

    if checked_in {
        success(format!(
            "Checked in at {} in {} [{}]",
            format_local(&record.checked_in_at),
            record.check_in_location,
            short_id(id.as_str())
        ));
    } else if let Some(out) = &record.checked_out_at {
        success(format!(
            "Checked out at {} in {} after {} [{}]",
            format_local(out),
            record.check_out_location.as_deref().unwrap_or("-"),
            record.duration(),
            short_id(id.as_str())
        ));
    }
    Ok(())
}
