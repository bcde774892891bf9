// Configuration module entry point
// Loads the server configuration and builds the runtime state from it

mod state;
mod types;

use std::net::{IpAddr, SocketAddr};

pub use state::AppState;
pub use types::{
    Config, LoggingConfig, PerformanceConfig, ServerConfig, SiteConfig, UploadConfig,
};

/// Prefix of environment overrides, e.g. `UPSERVE_SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "UPSERVE";

impl Config {
    /// Load configuration from the given file path (extension optional)
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .build()?;

        settings.try_deserialize()
    }

    /// Listen address; IPv6 hosts may be written with or without brackets
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let host = self.server.host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        host.parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, self.server.port))
            .map_err(|e| format!("Invalid address '{}': {e}", self.server.host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::load_from(tmp.path().join("absent").to_str().unwrap()).unwrap();

        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.workers, None);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.performance.keep_alive_timeout, 75);
        assert_eq!(cfg.performance.read_timeout, 30);
        assert_eq!(cfg.performance.max_connections, None);
        assert!(cfg.site.index_file.is_none());
        assert!(cfg.site.uploads.is_empty());
        assert_eq!(cfg.socket_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_load_site_from_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 3000
workers = 2

[logging]
level = "debug"
access_log = false

[performance]
max_connections = 64

[site]
index_file = "index.html"
files = ["favicon.ico", "robots.txt"]
dirs = ["public"]

[[site.uploads]]
path = "/upload"
form_key = "file"
storage_dir = "uploads"
"#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.socket_addr().unwrap(), "127.0.0.1:3000".parse().unwrap());
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.logging.level, "debug");
        assert!(!cfg.logging.access_log);
        assert_eq!(cfg.performance.max_connections, Some(64));
        assert_eq!(cfg.performance.write_timeout, 30);
        assert_eq!(cfg.site.index_file.as_deref(), Some("index.html"));
        assert_eq!(cfg.site.files, ["favicon.ico", "robots.txt"]);
        assert_eq!(cfg.site.dirs, ["public"]);
        assert_eq!(
            cfg.site.uploads,
            [UploadConfig {
                path: "/upload".to_string(),
                form_key: "file".to_string(),
                storage_dir: "uploads".to_string(),
            }]
        );
    }

    #[test]
    fn test_ipv6_host() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::load_from(tmp.path().join("absent").to_str().unwrap()).unwrap();

        cfg.server.host = "::".to_string();
        assert_eq!(cfg.socket_addr().unwrap(), "[::]:8080".parse().unwrap());

        cfg.server.host = "[::1]".to_string();
        cfg.server.port = 9000;
        assert_eq!(cfg.socket_addr().unwrap(), "[::1]:9000".parse().unwrap());
    }

    #[test]
    fn test_invalid_host_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[server]\nhost = \"not a host\"\n").unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert!(cfg.socket_addr().unwrap_err().starts_with("Invalid address"));
    }
}
