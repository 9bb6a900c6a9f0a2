use std::time::Duration;

use clap::Args;

/// 25 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "TASKFY_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "TASKFY_PORT", default_value = "3720")]
    pub port: u16,

    /// Base URL clients reach this server at. Locally signed file URLs
    /// point here. Defaults to http://127.0.0.1:{port}.
    #[arg(long, env = "TASKFY_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Largest accepted request body (bytes)
    #[arg(long, env = "TASKFY_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Lifetime of signed file URLs (seconds)
    #[arg(long, env = "TASKFY_URL_EXPIRY_SECS", default_value = "3600")]
    pub url_expiry_secs: u64,
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.port))
    }

    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_secs)
    }
}
