use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SUMMARY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    /// Feed API endpoint. Derived per request when unset.
    pub feed_api_base: Option<String>,
    pub internal_auth_token: Option<String>,
    /// Prefix for proxied image URLs; empty means same site.
    pub proxy_origin: String,
    pub upstream_timeout: Duration,
    pub cloudflare_account_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub mistral_api_key: Option<String>,
    pub summary_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            feed_api_base: None,
            internal_auth_token: None,
            proxy_origin: String::new(),
            upstream_timeout: Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS),
            cloudflare_account_id: None,
            cloudflare_api_token: None,
            mistral_api_key: None,
            summary_timeout: Duration::from_millis(DEFAULT_SUMMARY_TIMEOUT_MS),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn millis(name: &str, value: Option<String>, default: u64) -> Duration {
    let ms = match non_empty(value) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{}={:?} is not a number of milliseconds, using {}", name, raw, default);
            default
        }),
    };
    Duration::from_millis(ms)
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source, for tests.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();

        let addr = match non_empty(get("COOLAPK1S_ADDR")) {
            None => defaults.addr,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("COOLAPK1S_ADDR={:?} is not a socket address, using {}", raw, DEFAULT_ADDR);
                defaults.addr
            }),
        };

        Self {
            addr,
            feed_api_base: non_empty(get("FEED_API_BASE")),
            internal_auth_token: non_empty(get("INTERNAL_AUTH_TOKEN")),
            proxy_origin: non_empty(get("PROXY_ORIGIN"))
                .map(|o| o.trim_end_matches('/').to_owned())
                .unwrap_or_default(),
            upstream_timeout: millis(
                "UPSTREAM_TIMEOUT_MS",
                get("UPSTREAM_TIMEOUT_MS"),
                DEFAULT_UPSTREAM_TIMEOUT_MS,
            ),
            cloudflare_account_id: non_empty(get("CLOUDFLARE_ACCOUNT_ID")),
            cloudflare_api_token: non_empty(get("CLOUDFLARE_API_TOKEN")),
            mistral_api_key: non_empty(get("MISTRAL_API_KEY")),
            summary_timeout: millis(
                "SUMMARY_TIMEOUT_MS",
                get("SUMMARY_TIMEOUT_MS"),
                DEFAULT_SUMMARY_TIMEOUT_MS,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(cfg.summary_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.proxy_origin, "");
        assert!(cfg.feed_api_base.is_none());
        assert!(cfg.mistral_api_key.is_none());
    }

    #[test]
    fn reads_values_and_ignores_garbage() {
        let cfg = config(&[
            ("COOLAPK1S_ADDR", "0.0.0.0:8080"),
            ("PROXY_ORIGIN", "https://img.example.com/"),
            ("SUMMARY_TIMEOUT_MS", "soon"),
            ("UPSTREAM_TIMEOUT_MS", "2500"),
            ("MISTRAL_API_KEY", "  "),
            ("INTERNAL_AUTH_TOKEN", "t0k"),
        ]);
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.proxy_origin, "https://img.example.com");
        assert_eq!(cfg.summary_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.upstream_timeout, Duration::from_millis(2500));
        assert!(cfg.mistral_api_key.is_none());
        assert_eq!(cfg.internal_auth_token.as_deref(), Some("t0k"));
    }
}
