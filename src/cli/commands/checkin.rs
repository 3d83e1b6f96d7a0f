use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::checkin::token_from_deep_link;
use crate::core::position::PositionReading;
use crate::core::validator::TokenPolicy;
use crate::core::verify::{CheckInRequest, VerificationService};
use crate::db;
use crate::db::log::audit_quiet;
use crate::errors::AppResult;
use crate::models::attendance::ParticipantIdentity;
use crate::models::geo::Coordinates;
use crate::ui::messages::success;
use crate::utils::colors::colorize_distance;
use chrono::Local;

/// Device id used when nothing else identifies the participant.
fn default_device_id() -> String {
    std::env::var("RCHECKIN_DEVICE_ID")
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "cli".to_string())
}

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Checkin {
        token,
        lat,
        lng,
        accuracy,
        user,
        name,
        email,
        device,
    } = cmd
    else {
        return Ok(());
    };

    // 1) token: raw or deep link
    let raw = if token.contains("://") {
        token_from_deep_link(token)?
    } else {
        token.clone()
    };

    // 2) identity
    let identity = match (user, name, device) {
        (Some(id), _, _) => ParticipantIdentity::User { user_id: *id },
        (None, Some(n), _) => ParticipantIdentity::Guest {
            name: n.clone(),
            email: email.clone(),
        },
        (None, None, Some(d)) => ParticipantIdentity::Device {
            device_id: d.clone(),
        },
        (None, None, None) => ParticipantIdentity::Device {
            device_id: default_device_id(),
        },
    };

    // 3) position, observed now
    let now = Local::now();
    let position = PositionReading {
        coords: Coordinates::new(*lat, *lng)?,
        accuracy_m: *accuracy,
        observed_at_ms: now.timestamp_millis(),
    };

    let pool = db::open(cfg)?;
    let service = VerificationService::new(&pool, TokenPolicy::from(cfg));
    let label = identity.label();

    match service.verify_and_commit(
        CheckInRequest {
            token: raw,
            identity,
            position,
        },
        &now,
    ) {
        Ok(receipt) => {
            audit_quiet(
                &pool.conn,
                "checkin",
                &receipt.record.event_id.to_string(),
                &format!(
                    "{} checked in at {:.1} m",
                    receipt.record.identity.label(),
                    receipt.proximity.distance_m
                ),
            );
            success(format!(
                "Checked in to '{}' ({} from the anchor, record #{}).",
                receipt.event_name,
                colorize_distance(receipt.proximity.distance_m, receipt.proximity.within),
                receipt.record.id
            ));
            Ok(())
        }
        Err(e) => {
            // main prints the error, including the rejection code
            if let Some(reason) = e.failure() {
                audit_quiet(&pool.conn, "checkin_rejected", reason.as_code(), &label);
            }
            Err(e)
        }
    }
}
