use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db;
use crate::db::queries::{count_attendance, load_attendance, load_event};
use crate::errors::{AppError, AppResult};
use crate::ui::messages::info;
use crate::utils::date::{parse_date, parse_optional_date};
use crate::utils::table::{Column, Table};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Attendance {
        event,
        date,
        json,
        count,
    } = cmd
    else {
        return Ok(());
    };

    let pool = db::open(cfg)?;
    let ev = load_event(&pool.conn, *event)?.ok_or(AppError::EventNotFound(*event))?;

    if *count {
        let day = parse_optional_date(date.as_ref())?;
        let n = count_attendance(&pool.conn, ev.id, day)?;
        println!("👥 {} on {}: {}", ev.name, day, n);
        return Ok(());
    }

    let day = match date {
        Some(d) => Some(parse_date(d).ok_or_else(|| AppError::InvalidDate(d.clone()))?),
        None => None,
    };
    let records = load_attendance(&pool.conn, ev.id, day)?;

    if *json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        info(format!("No attendance recorded for '{}'.", ev.name));
        return Ok(());
    }

    let mut table = Table::new(vec![
        Column::new("ID", 3),
        Column::new("Date", 10),
        Column::new("Participant", 16),
        Column::new("Distance", 8),
        Column::new("Recorded at", 19),
    ]);
    for r in &records {
        table.add_row(vec![
            r.id.to_string(),
            r.session_date.to_string(),
            r.identity.label(),
            format!("{:.1} m", r.distance_m),
            r.created_at.clone(),
        ]);
    }

    println!("📋 Attendance for '{}':\n", ev.name);
    print!("{}", table.render());
    println!("\n{} record(s)", records.len());
    Ok(())
}
