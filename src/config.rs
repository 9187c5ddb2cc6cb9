use crate::error::ConfigError;
use crate::session::SESSION_DURATION;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Startup configuration of the web server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Interface to bind, all interfaces by default
    pub host: String,

    /// Port to listen on (`PORT`, default 5000)
    pub port: u16,

    /// Lifetime of an idle session (`SESSION_TTL_SECS`)
    pub session_ttl: Duration,

    /// Largest accepted upload in bytes (`MAX_UPLOAD_MB`)
    pub max_upload_bytes: usize,

    /// Directory served under `/static` (`STATIC_DIR`)
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            session_ttl: SESSION_DURATION,
            max_upload_bytes: 16 * 1024 * 1024,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup, falling back to
    /// defaults for unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SESSION_TTL_SECS")? {
            config.session_ttl = Duration::from_secs(secs);
        }
        if let Some(mb) = parse_var::<usize, _>(&lookup, "MAX_UPLOAD_MB")? {
            config.max_upload_bytes = mb * 1024 * 1024;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_bind_all_interfaces_on_5000() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.session_ttl, SESSION_DURATION);
    }

    #[test]
    fn port_is_read_from_environment() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for PORT: 'http'");
    }

    #[test]
    fn upload_limit_is_in_megabytes() {
        let config = ServerConfig::from_lookup(lookup(&[("MAX_UPLOAD_MB", "2")])).unwrap();
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }
}
