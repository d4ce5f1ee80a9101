use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use typograf_core::{TypografClient, UreqTransport, SERVICE_URL};

use crate::AppState;

/// Command line and environment configuration of `typografd`.
#[derive(Debug, Clone, Parser)]
#[command(name = "typografd", about = "JSON front end for the typograph web service")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// SOAP endpoint of the typograph service.
    #[arg(long = "upstream-url", env = "TYPOGRAF_URL", default_value = SERVICE_URL)]
    pub upstream_url: String,

    /// Give up on the typograph service after this many milliseconds.
    #[arg(long = "timeout-ms", env = "TYPOGRAF_TIMEOUT_MS", default_value_t = 500)]
    pub timeout_ms: u64,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Application state talking to the configured upstream over HTTP.
    pub fn state(&self) -> AppState {
        AppState::new(
            TypografClient::new(&self.upstream_url),
            Arc::new(UreqTransport::with_timeout(self.timeout())),
        )
    }
}
