//! Structured logging configuration.
//!
//! The library logs through the `log` facade; the subscriber installed here
//! captures those records alongside the console's own `tracing` events.

use tourney_slots::UserId;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the RUST_LOG env var.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    // Diagnostics go to stderr so `--json` output stays parseable
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Log an operator action with structured data
///
/// # Arguments
///
/// * `action` - Console command (confirm, reject, delete)
/// * `operator_id` - Acting operator
/// * `reservation_id` - Target reservation
/// * `outcome` - `ok` or the error shown to the operator
///
/// # Example
///
/// ```ignore
/// log_operator_action("confirm", 1, 42, "ok");
/// ```
pub fn log_operator_action(action: &str, operator_id: UserId, reservation_id: i64, outcome: &str) {
    if outcome == "ok" {
        tracing::info!(
            action = action,
            operator_id = operator_id,
            reservation_id = reservation_id,
            "OPERATOR: {} succeeded",
            action
        );
    } else {
        tracing::warn!(
            action = action,
            operator_id = operator_id,
            reservation_id = reservation_id,
            outcome = outcome,
            "OPERATOR: {} failed",
            action
        );
    }
}
