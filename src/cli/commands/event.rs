use crate::cli::parser::{Commands, EventAction};
use crate::config::Config;
use crate::db;
use crate::db::log::audit_quiet;
use crate::db::queries::{insert_event, load_event, load_events, rotate_secret, set_active};
use crate::errors::{AppError, AppResult};
use crate::models::event::{Event, Schedule, TimeWindow, TrackingMode};
use crate::models::geo::Coordinates;
use crate::ui::messages::{info, success, warning};
use crate::utils::colors::colorize_active;
use crate::utils::date::parse_date;
use crate::utils::table::{Column, Table};
use crate::utils::time::parse_required_time;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Event { action } = cmd else {
        return Ok(());
    };

    let pool = db::open(cfg)?;

    match action {
        EventAction::Add {
            name,
            lat,
            lng,
            radius,
            start,
            end,
            mode,
            on,
            weekly,
        } => {
            // 1) parse inputs
            let anchor = Coordinates::new(*lat, *lng)?;
            let window = TimeWindow::new(parse_required_time(start)?, parse_required_time(end)?)?;
            let tracking_mode = TrackingMode::from_code(mode)
                .ok_or_else(|| AppError::InvalidTrackingMode(mode.clone()))?;
            let schedule = match (on, weekly) {
                (Some(d), _) => {
                    Schedule::Once(parse_date(d).ok_or_else(|| AppError::InvalidDate(d.clone()))?)
                }
                (None, Some(days)) => Schedule::weekly_from_list(days)?,
                (None, None) => Schedule::Daily,
            };
            let radius_m = radius.unwrap_or(cfg.default_radius_m);

            // 2) build + persist
            let event = Event::new(name, anchor, radius_m, window, tracking_mode, schedule)?;
            let id = insert_event(&pool.conn, &event)?;

            audit_quiet(
                &pool.conn,
                "event_add",
                &id.to_string(),
                &format!("Created event '{}' ({})", event.name, tracking_mode.to_db_str()),
            );
            success(format!("Event #{} '{}' created.", id, event.name));
        }

        EventAction::List => {
            let events = load_events(&pool.conn)?;
            if events.is_empty() {
                info("No events defined yet.");
                return Ok(());
            }

            let mut table = Table::new(vec![
                Column::new("ID", 3),
                Column::new("Name", 12),
                Column::new("Window", 17),
                Column::new("Radius", 7),
                Column::new("Mode", 13),
                Column::new("Schedule", 10),
                Column::new("Status", 8),
            ]);
            for ev in &events {
                table.add_row(vec![
                    ev.id.to_string(),
                    ev.name.clone(),
                    format!("{}-{}", ev.window.start(), ev.window.end()),
                    format!("{:.0} m", ev.radius_m),
                    ev.tracking_mode.to_db_str().to_string(),
                    ev.schedule.describe(),
                    colorize_active(ev.active),
                ]);
            }
            print!("{}", table.render());
        }

        EventAction::Show { id } => {
            let ev = load_event(&pool.conn, *id)?.ok_or(AppError::EventNotFound(*id))?;
            println!("📌 Event #{}: {}", ev.id, ev.name);
            println!("   Anchor   : {} (radius {:.1} m)", ev.anchor, ev.radius_m);
            println!("   Window   : {} - {}", ev.window.start(), ev.window.end());
            println!("   Schedule : {}", ev.schedule.describe());
            println!("   Mode     : {}", ev.tracking_mode.to_db_str());
            println!("   Status   : {}", colorize_active(ev.active));
            println!("   Created  : {}", ev.created_at);
        }

        EventAction::Rotate { id } => {
            rotate_secret(&pool.conn, *id)?;
            audit_quiet(
                &pool.conn,
                "event_rotate",
                &id.to_string(),
                "Secret rotated, previously issued tokens are void",
            );
            success(format!("Secret of event #{} rotated.", id));
        }

        EventAction::Activate { id } => {
            set_active(&pool.conn, *id, true)?;
            audit_quiet(&pool.conn, "event_activate", &id.to_string(), "Event activated");
            success(format!("Event #{} is now active.", id));
        }

        EventAction::Deactivate { id } => {
            set_active(&pool.conn, *id, false)?;
            audit_quiet(
                &pool.conn,
                "event_deactivate",
                &id.to_string(),
                "Event deactivated",
            );
            warning(format!("Event #{} no longer accepts check-ins.", id));
        }
    }

    Ok(())
}
