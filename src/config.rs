use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};

/// Runtime configuration read from the environment (after `.env` is loaded).
///
/// | Env Var                   | Default                 |
/// |---------------------------|-------------------------|
/// | `DATABASE_URL`            | required                |
/// | `SESSION_KEY`             | required, base64        |
/// | `BIND_ADDR`               | `0.0.0.0:$PORT`         |
/// | `PORT`                    | `3000`                  |
/// | `DB_MAX_CONNECTIONS`      | `10`                    |
/// | `OPENAI_API_KEY`          | unset (AI disabled)     |
/// | `OPENAI_MODEL`            | `gpt-4o-mini`           |
/// | `SUBMIT_RATE_LIMIT`       | `20`                    |
/// | `SUBMIT_RATE_WINDOW_SECS` | `60`                    |
/// | `ADMIN_EMAIL`             | unset                   |
/// | `ADMIN_PASSWORD`          | unset                   |
/// | `PRODUCTION`              | unset (cookies not `Secure`) |
/// | `TRUST_PROXY`             | `false` (ignore `X-Forwarded-For`) |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_key: Vec<u8>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub submit_rate_limit: usize,
    pub submit_rate_window_secs: u64,
    pub bootstrap_admin: Option<(String, String)>,
    pub secure_cookies: bool,
    pub trust_proxy: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL missing"))?;

        let session_key_b64 = get("SESSION_KEY").ok_or_else(|| anyhow!("SESSION_KEY missing"))?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .context("SESSION_KEY must be base64")?;
        if session_key.len() < 32 {
            return Err(anyhow!("SESSION_KEY must decode to at least 32 bytes"));
        }

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let db_max_connections = parse_or(&get, "DB_MAX_CONNECTIONS", 10)?;
        let submit_rate_limit = parse_or(&get, "SUBMIT_RATE_LIMIT", 20)?;
        let submit_rate_window_secs = parse_or(&get, "SUBMIT_RATE_WINDOW_SECS", 60)?;

        let openai_api_key = get("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let openai_model = get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let bootstrap_admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };
        let secure_cookies = get("PRODUCTION").is_some();
        let trust_proxy = parse_or(&get, "TRUST_PROXY", false)?;

        Ok(Self {
            database_url,
            session_key,
            bind_addr,
            db_max_connections,
            openai_api_key,
            openai_model,
            submit_rate_limit,
            submit_rate_window_secs,
            bootstrap_admin,
            secure_cookies,
            trust_proxy,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    #[test]
    fn test_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("SESSION_KEY", KEY)]))
                .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.submit_rate_limit, 20);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert!(config.openai_api_key.is_none());
        assert!(config.bootstrap_admin.is_none());
        assert!(!config.secure_cookies);
        assert!(!config.trust_proxy);
        assert_eq!(config.session_key.len(), 32);
    }

    #[test]
    fn test_port_and_admin_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_KEY", KEY),
            ("PORT", "8080"),
            ("ADMIN_EMAIL", "rh@empresa.com.br"),
            ("ADMIN_PASSWORD", "segredo"),
            ("TRUST_PROXY", "true"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.trust_proxy);
        assert_eq!(
            config.bootstrap_admin,
            Some(("rh@empresa.com.br".to_string(), "segredo".to_string()))
        );
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(AppConfig::from_lookup(lookup(&[("SESSION_KEY", KEY)])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_KEY", "not base64!"),
        ]))
        .is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_KEY", KEY),
            ("SUBMIT_RATE_LIMIT", "many"),
        ]))
        .is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_KEY", KEY),
            ("TRUST_PROXY", "yes"),
        ]))
        .is_err());
    }
}
