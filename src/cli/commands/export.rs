use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use crate::export::ExportLogic;
use crate::models::record::UserId;
use crate::utils::path::absolutize;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Export {
        format,
        file,
        force,
    } = cmd
    {
        let mut pool = DbPool::new(&cfg.database)?;
        init_db(&pool.conn)?;
        let user = UserId::new(cfg.user_id.clone());
        let target = absolutize(file);
        ExportLogic::export(
            &mut pool,
            &user,
            *format,
            &target.to_string_lossy(),
            *force,
        )?;
    }
    Ok(())
}
