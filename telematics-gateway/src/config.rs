//! Runtime configuration, loaded from environment variables with defaults —
//! the same `std::env::var(...).unwrap_or_else(...)` style the teacher uses
//! throughout its own startup code, rather than introducing a config-file
//! format the teacher never reaches for in this binary.

#[derive(Debug, Clone)]
pub struct Config {
    pub tcp_host: String,
    pub tcp_port: u16,
    pub http_port: u16,
    pub response_timeout_s: u64,
    pub read_timeout_s: u64,
    pub dout1_io_id: u16,
    pub timeout_zero_s: i64,
    pub activation_duration_s: i64,
    pub db_path: String,
    /// Directory to additionally write logs into via a non-blocking file
    /// appender, on top of the stdout layer. `None` means stdout only — the
    /// teacher's Rust backend never writes general logs to a file, so this
    /// is honored only when an operator actually sets it.
    pub log_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            tcp_host: env_or("TCP_HOST", "0.0.0.0"),
            tcp_port: env_parsed("TCP_PORT", 12345),
            http_port: env_parsed("HTTP_PORT", 8080),
            response_timeout_s: env_parsed("RESPONSE_TIMEOUT_S", 5),
            read_timeout_s: env_parsed("READ_TIMEOUT_S", 30),
            dout1_io_id: env_parsed("DOUT1_IO_ID", 179),
            timeout_zero_s: env_parsed("TIMEOUT_ZERO_S", 12 * 3600),
            activation_duration_s: env_parsed("ACTIVATION_DURATION_S", 4000),
            db_path: env_or("DB_PATH", "gateway.db"),
            log_path: std::env::var("LOG_PATH").ok(),
        }
    }

    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.tcp_host, self.tcp_port)
    }

    pub fn http_addr(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // SAFETY: test-only process-local env mutation, not shared across
        // threads in this crate's test binary.
        for key in [
            "TCP_HOST",
            "TCP_PORT",
            "HTTP_PORT",
            "RESPONSE_TIMEOUT_S",
            "READ_TIMEOUT_S",
            "DOUT1_IO_ID",
            "TIMEOUT_ZERO_S",
            "ACTIVATION_DURATION_S",
            "DB_PATH",
            "LOG_PATH",
        ] {
            std::env::remove_var(key);
        }
        let config = Config::from_env();
        assert_eq!(config.tcp_port, 12345);
        assert_eq!(config.response_timeout_s, 5);
        assert_eq!(config.read_timeout_s, 30);
        assert_eq!(config.dout1_io_id, 179);
        assert_eq!(config.timeout_zero_s, 43200);
        assert_eq!(config.activation_duration_s, 4000);
        assert_eq!(config.log_path, None);
    }
}
