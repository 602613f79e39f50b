use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value fails to parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value fails to parse.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// The parsing/validation logic is decoupled from the actual environment so it
/// can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected boolean, got \"{other}\""),
            }),
        }
    };

    let env = parse_environment(&or_default("NEARBY_ENV", "development"));
    let bind_addr = parse_addr("NEARBY_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("NEARBY_LOG_LEVEL", "info");
    let chrome_path = lookup("NEARBY_CHROME_PATH").ok().map(PathBuf::from);

    let nav_timeout_ms = parse_u64("NEARBY_NAV_TIMEOUT_MS", "20000")?;
    let wait_timeout_ms = parse_u64("NEARBY_WAIT_TIMEOUT_MS", "12000")?;
    let shortlink_timeout_secs = parse_u64("NEARBY_SHORTLINK_TIMEOUT_SECS", "10")?;
    let scrape_deadline_secs = parse_u64("NEARBY_SCRAPE_DEADLINE_SECS", "300")?;
    let headless = parse_bool("NEARBY_HEADLESS", "false")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        chrome_path,
        nav_timeout_ms,
        wait_timeout_ms,
        shortlink_timeout_secs,
        scrape_deadline_secs,
        headless,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let map = HashMap::new();
        let config = build_app_config(lookup_from(&map)).expect("defaults must load");
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.chrome_path.is_none());
        assert_eq!(config.nav_timeout_ms, 20_000);
        assert_eq!(config.wait_timeout_ms, 12_000);
        assert_eq!(config.shortlink_timeout_secs, 10);
        assert_eq!(config.scrape_deadline_secs, 300);
        assert!(!config.headless);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let map = HashMap::from([
            ("NEARBY_ENV", "production"),
            ("NEARBY_BIND_ADDR", "127.0.0.1:8080"),
            ("NEARBY_CHROME_PATH", "/usr/bin/chromium"),
            ("NEARBY_HEADLESS", "true"),
            ("NEARBY_SCRAPE_DEADLINE_SECS", "60"),
        ]);
        let config = build_app_config(lookup_from(&map)).expect("valid config");
        assert_eq!(config.env, Environment::Production);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(
            config.chrome_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/chromium"))
        );
        assert!(config.headless);
        assert_eq!(config.scrape_deadline_secs, 60);
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let map = HashMap::from([("NEARBY_BIND_ADDR", "not-an-addr")]);
        let err = build_app_config(lookup_from(&map)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar { ref var, .. } if var == "NEARBY_BIND_ADDR"
        ));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let map = HashMap::from([("NEARBY_HEADLESS", "maybe")]);
        let err = build_app_config(lookup_from(&map)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar { ref var, .. } if var == "NEARBY_HEADLESS"
        ));
    }

    #[test]
    fn unknown_environment_falls_back_to_development() {
        assert_eq!(parse_environment("staging"), Environment::Development);
        assert_eq!(parse_environment("production"), Environment::Production);
        assert_eq!(parse_environment("test"), Environment::Test);
    }
}
