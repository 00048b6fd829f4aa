//! Env-driven configuration for the relay.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binaries. Defaults point at the public Perchance and UploadThing
//! endpoints so only `UPLOADTHING_TOKEN` is needed in practice.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PERCHANCE_URL: &str = "https://image-generation.perchance.org";
pub const DEFAULT_UPLOADTHING_API_URL: &str = "https://api.uploadthing.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub uploadthing_token: String,
    pub perchance_url: String,
    pub uploadthing_api_url: String,
    pub http_timeout: Duration,
    pub staging_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            uploadthing_token: String::new(),
            perchance_url: DEFAULT_PERCHANCE_URL.to_string(),
            uploadthing_api_url: DEFAULT_UPLOADTHING_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            staging_dir: env::temp_dir(),
        }
    }
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `new` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid PORT '{}', falling back to {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => defaults.port,
        };
        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        "Invalid HTTP_TIMEOUT_SECS '{}', falling back to {}",
                        raw,
                        DEFAULT_HTTP_TIMEOUT_SECS
                    );
                    defaults.http_timeout
                }
            },
            None => defaults.http_timeout,
        };

        Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            uploadthing_token: lookup("UPLOADTHING_TOKEN")
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
            perchance_url: lookup("PERCHANCE_URL").unwrap_or(defaults.perchance_url),
            uploadthing_api_url: lookup("UPLOADTHING_API_URL")
                .unwrap_or(defaults.uploadthing_api_url),
            http_timeout,
            staging_dir: lookup("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
        }
    }

    pub fn uploadthing_configured(&self) -> bool {
        !self.uploadthing_token.is_empty()
    }

    pub fn print_env_vars(&self) {
        tracing::info!("HOST: {}", self.host);
        tracing::info!("PORT: {}", self.port);
        tracing::info!(
            "UPLOADTHING_TOKEN: {}",
            if self.uploadthing_configured() { "<set>" } else { "<unset>" }
        );
        tracing::info!("PERCHANCE_URL: {}", self.perchance_url);
        tracing::info!("UPLOADTHING_API_URL: {}", self.uploadthing_api_url);
        tracing::info!("HTTP_TIMEOUT_SECS: {}", self.http_timeout.as_secs());
        tracing::info!("STAGING_DIR: {}", self.staging_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.perchance_url, DEFAULT_PERCHANCE_URL);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
        assert!(!cfg.uploadthing_configured());
    }

    #[test]
    fn invalid_port_falls_back() {
        let cfg = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn explicit_values_win() {
        let cfg = config_from(&[
            ("PORT", "8080"),
            ("UPLOADTHING_TOKEN", " abc "),
            ("HTTP_TIMEOUT_SECS", "12"),
            ("STAGING_DIR", "/var/tmp/relay"),
        ]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.uploadthing_token, "abc");
        assert!(cfg.uploadthing_configured());
        assert_eq!(cfg.http_timeout, Duration::from_secs(12));
        assert_eq!(cfg.staging_dir, PathBuf::from("/var/tmp/relay"));
    }

    #[test]
    fn blank_token_counts_as_unconfigured() {
        let cfg = config_from(&[("UPLOADTHING_TOKEN", "   ")]);
        assert!(!cfg.uploadthing_configured());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = config_from(&[("HTTP_TIMEOUT_SECS", "0")]);
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
    }
}
