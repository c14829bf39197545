//! Salonbook — appointment availability and lifecycle engine for a
//! single-chair salon.
//!
//! The crate is organized around four collaborating pieces: pure slot
//! computation (`availability`), the booking state machine (`booking`
//! with `permissions`), list views and dashboard counts (`query`), and
//! the cached service catalog (`catalog`). `state::SalonState` wires
//! them to one SQLite store and is what a transport layer mounts.

pub mod availability;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod db;
pub mod events;
pub mod identity;
pub mod models;
pub mod permissions;
pub mod query;
pub mod state;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a host binary. `RUST_LOG` wins when set.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}
