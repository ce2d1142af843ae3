// Configuration module entry point
// Loads the server configuration and holds the per-process state built from it

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, FilesConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

use crate::handler::content::ServeOptions;

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// The file may be absent; every key has a default and `SERVER_*`
    /// environment variables override both.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SERVER").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("files.root", ".")?
            .set_default("files.url_prefix", "/files")?
            .set_default("files.upload_path", "/upload")?
            .set_default("files.sniff_len", 512)?
            .set_default("files.chunk_size", 64 * 1024)?
            .set_default("files.channel_capacity", 8)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.shutdown_timeout", 10)?
            .set_default("http.server_name", "rust_fileserver")?
            .set_default("http.max_body_size", 104_857_600)? // 100MB
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Route prefixes are compared without a trailing slash
    fn normalize(&mut self) {
        for prefix in [&mut self.files.url_prefix, &mut self.files.upload_path] {
            let trimmed = prefix.trim_end_matches('/');
            *prefix = if trimmed.starts_with('/') {
                trimmed.to_string()
            } else {
                format!("/{trimmed}")
            };
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            sniff_len: self.files.sniff_len.max(1),
            chunk_size: self.files.chunk_size.max(1),
            channel_capacity: self.files.channel_capacity.max(1),
        }
    }
}
