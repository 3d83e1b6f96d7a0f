use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::host::HostDisplay;
use crate::core::token::TokenIssuer;
use crate::db;
use crate::db::log::audit_quiet;
use crate::db::pool::DbPool;
use crate::db::queries::{count_attendance, load_event};
use crate::errors::{AppError, AppResult};
use crate::models::event::Event;
use crate::ui::messages::{header, info, warning};
use crate::utils::time::format_millis;
use chrono::Local;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Host { event, once } = cmd else {
        return Ok(());
    };

    let pool = db::open(cfg)?;
    let ev = load_event(&pool.conn, *event)?.ok_or(AppError::EventNotFound(*event))?;

    if !ev.active {
        warning(format!(
            "Event #{} is inactive: displayed tokens will be rejected.",
            ev.id
        ));
    }

    if *once {
        let now = Local::now();
        let issued = TokenIssuer::issue(&ev, &now);
        let count = count_attendance(&pool.conn, ev.id, now.date_naive())?;
        // raw line, meant to be piped or scanned
        println!("{}", issued.token);
        println!("👥 Checked in today: {}", count);
        return Ok(());
    }

    audit_quiet(
        &pool.conn,
        "host",
        &ev.id.to_string(),
        &format!("Host display started for '{}'", ev.name),
    );

    // the polling loop owns its own connection
    let store = DbPool::new(&cfg.database)?;
    let initial = count_attendance(&pool.conn, ev.id, Local::now().date_naive())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_display(ev, store, initial, cfg))?;

    info("Host display stopped.");
    Ok(())
}

async fn run_display(ev: Event, store: DbPool, initial: u64, cfg: &Config) -> AppResult<()> {
    header(format!("{} (event #{})", ev.name, ev.id));
    info(format!(
        "New code every {} ms, valid for {} ms. Press Ctrl-C to stop.",
        cfg.display_refresh_ms, cfg.token_validity_ms
    ));

    let mut display = HostDisplay::with_polling(
        ev,
        store,
        initial,
        cfg.display_refresh(),
        cfg.count_refresh(),
    );

    println!("👥 Checked in today: {}", *display.count.borrow());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            changed = display.token.changed() => {
                if changed.is_err() {
                    break;
                }
                let issued = display.token.borrow_and_update().clone();
                println!(
                    "🔑 {}  (issued {})",
                    issued.token,
                    format_millis(issued.issued_at_ms, &Local::now())
                );
            }
            changed = display.count.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *display.count.borrow_and_update();
                println!("👥 Checked in today: {}", count);
            }
        }
    }

    display.shutdown();
    Ok(())
}
