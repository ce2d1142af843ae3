// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Listener and runtime configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// File tree, routes and content serving
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// Directory served and uploaded into
    pub root: String,
    /// Route prefix for browsing and downloads, without trailing slash
    pub url_prefix: String,
    /// Route prefix for uploads
    pub upload_path: String,
    /// Bytes inspected when sniffing a content type
    pub sniff_len: usize,
    /// Read size for streamed bodies
    pub chunk_size: usize,
    /// Chunks buffered ahead of a multipart response
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration, all durations in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// 0 disables keep-alive
    pub keep_alive_timeout: u64,
    /// Time allowed for a request head to arrive
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
    /// Grace period for open connections after a shutdown signal
    pub shutdown_timeout: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Value of the `Server` response header
    pub server_name: String,
    /// Upload body limit in bytes
    pub max_body_size: u64,
}
