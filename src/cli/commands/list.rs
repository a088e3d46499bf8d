use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::duration::PLACEHOLDER;
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::db::queries::load_records;
use crate::errors::AppResult;
use crate::models::record::UserId;
use crate::utils::colors::{colorize_in_out, colorize_optional};
use crate::utils::formatting::bold;
use crate::utils::table::{Column, Table};
use crate::utils::{format_local, short_id};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::List { limit } = cmd {
        let pool = DbPool::new(&cfg.database)?;
        init_db(&pool.conn)?;
        let user = UserId::new(cfg.user_id.clone());
        let mut records = load_records(&pool.conn, &user)?;

        if let Some(n) = limit {
            records.truncate(*n);
        }

        if records.is_empty() {
            println!("No attendance records for {user}.");
            return Ok(());
        }

        let mut table = Table::new(vec![
            Column::new("ID"),
            Column::new("CHECK-IN"),
            Column::new("WHERE"),
            Column::new("CHECK-OUT"),
            Column::new("WHERE"),
            Column::new("DURATION"),
        ]);

        for rec in &records {
            let out = rec
                .checked_out_at
                .as_ref()
                .map(format_local)
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            table.add_row(vec![
                short_id(rec.id.as_str()).to_string(),
                colorize_in_out(&format_local(&rec.checked_in_at), true),
                rec.check_in_location.clone(),
                colorize_in_out(&out, false),
                colorize_optional(rec.check_out_location.as_deref().unwrap_or(PLACEHOLDER)),
                colorize_optional(&rec.duration()),
            ]);
        }

        println!("{}\n", bold(&format!("Attendance of {user}")));
        print!("{}", table.render());
    }
    Ok(())
}
