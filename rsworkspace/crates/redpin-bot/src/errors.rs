//! Discord-specific error handling for the bot.
//!
//! Converts serenity errors into [`PinError`]s and provides `log_failure`,
//! which logs at a level matching how serious the failure is.

use redpin_types::{DiscordErrorCode, PinError};
use serenity::http::HttpError;
use tracing::{debug, error, warn};

/// Classify a serenity `Error` raised while performing `context`.
pub fn classify(context: &str, err: &serenity::Error) -> PinError {
    match err {
        serenity::Error::Http(http_err) => classify_http(context, http_err),
        _ => {
            debug!("Non-HTTP serenity error while {}: {}", context, err);
            PinError::transient(context, err.to_string())
        }
    }
}

/// Log a pipeline failure.
///
/// - Permission and unreachable-recipient failures → `warn!`
/// - Missing resources → `debug!`
/// - Everything else → `error!`
pub fn log_failure(err: &PinError) {
    match err {
        PinError::PermissionDenied { .. } | PinError::RecipientUnreachable { .. } => {
            warn!("{}", err);
        }
        PinError::NotFound { .. } | PinError::Ineligible(_) => debug!("{}", err),
        PinError::NoChannelConfigured | PinError::TransientDeliveryFailure { .. } => {
            error!("{}", err);
        }
    }
}

fn classify_http(context: &str, http_err: &HttpError) -> PinError {
    match http_err {
        HttpError::UnsuccessfulRequest(resp) => {
            let status = resp.status_code.as_u16();

            if status == 429 {
                warn!("Rate limited while {}", context);
                return PinError::from_discord(
                    context,
                    &DiscordErrorCode::RateLimited,
                    &resp.error.message,
                );
            }

            let raw_code = resp.error.code as u32;
            let code = DiscordErrorCode::from_raw(raw_code);
            debug!(
                "Discord error while {} (HTTP {} / code {}): {}",
                context, status, raw_code, resp.error.message
            );
            PinError::from_discord(context, &code, &resp.error.message)
        }

        // Request-level failures (not Discord API errors)
        _ => {
            debug!("Network-level HTTP error while {}: {}", context, http_err);
            PinError::transient(context, http_err.to_string())
        }
    }
}
