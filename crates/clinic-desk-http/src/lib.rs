//! REST transport and configuration for clinic-desk.
//!
//! Connects the core stores to the clinic records service:
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let config = clinic_desk_http::Config::load()?;
//! let state = clinic_desk_http::connect(&config)?;
//! state.ensure_loaded().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod transport;

use std::sync::Arc;

use clinic_desk_core::state::ClinicState;
use clinic_desk_core::store::TransportResult;

pub use config::{default_log_filter, Config, ConfigError};
pub use transport::HttpTransport;

/// Build the clinic state over the configured service.
pub fn connect(config: &Config) -> TransportResult<ClinicState> {
    let transport = HttpTransport::from_config(config)?;
    tracing::debug!(base_url = %transport.base_url(), "Connecting to records service");
    Ok(ClinicState::with_collections(Arc::new(transport), &config.collections))
}
