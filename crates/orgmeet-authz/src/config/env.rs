//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::features::{Module, Stage};

/// Environment variable names
mod vars {
    pub const ORGMEET_STAGE: &str = "ORGMEET_STAGE";
    pub const ORGMEET_DISABLED_MODULES: &str = "ORGMEET_DISABLED_MODULES";
    pub const ORGMEET_SEED_PATH: &str = "ORGMEET_SEED_PATH";
    pub const ORGMEET_HTTP_HOST: &str = "ORGMEET_HTTP_HOST";
    pub const ORGMEET_HTTP_PORT: &str = "ORGMEET_HTTP_PORT";
    pub const ORGMEET_BEARER_TOKEN: &str = "ORGMEET_BEARER_TOKEN";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const ORGMEET_JSON_LOGS: &str = "ORGMEET_JSON_LOGS";
}

/// Load configuration from environment variables
///
/// Unparseable values are configuration errors rather than silently ignored:
/// a typo in the stage must not quietly enable every module.
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(stage_str) = env::var(vars::ORGMEET_STAGE) {
        let stage = stage_str.trim().parse::<u8>().map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {e}", vars::ORGMEET_STAGE))
        })?;
        builder = builder.stage(Stage::try_from(stage)?);
    }

    if let Ok(list) = env::var(vars::ORGMEET_DISABLED_MODULES) {
        let modules = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Module>)
            .collect::<Result<Vec<_>>>()?;
        builder = builder.disabled_modules(modules);
    }

    if let Ok(path) = env::var(vars::ORGMEET_SEED_PATH) {
        builder = builder.seed_path(Some(PathBuf::from(path)));
    }

    if let Ok(host_str) = env::var(vars::ORGMEET_HTTP_HOST) {
        let host = host_str.parse::<IpAddr>().map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {e}", vars::ORGMEET_HTTP_HOST))
        })?;
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::ORGMEET_HTTP_PORT) {
        let port = port_str.parse::<u16>().map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {e}", vars::ORGMEET_HTTP_PORT))
        })?;
        builder = builder.http_port(port);
    }

    if let Ok(token) = env::var(vars::ORGMEET_BEARER_TOKEN) {
        builder = builder.bearer_token(Some(token));
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::ORGMEET_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        vars::ORGMEET_STAGE,
        vars::ORGMEET_DISABLED_MODULES,
        vars::ORGMEET_SEED_PATH,
        vars::ORGMEET_HTTP_HOST,
        vars::ORGMEET_HTTP_PORT,
        vars::ORGMEET_BEARER_TOKEN,
        vars::RUST_LOG,
        vars::ORGMEET_JSON_LOGS,
    ];

    /// Run `f` with exactly `vars` set among the service's variables
    pub(crate) fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let old_values: Vec<_> = ALL_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in ALL_VARS {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::remove_var(key) };
        }
        for (key, value) in vars {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::set_var(key, value) };
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_no_vars_keeps_defaults() {
        with_env_vars(&[], || {
            let config = load_from_env(ConfigBuilder::new())
                .unwrap()
                .build()
                .unwrap();
            assert_eq!(config.stage, Stage::LAST);
            assert!(config.seed_path.is_none());
        });
    }

    #[test]
    fn test_load_stage_and_modules() {
        with_env_vars(
            &[
                ("ORGMEET_STAGE", "5"),
                ("ORGMEET_DISABLED_MODULES", "voting, minutes"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .unwrap();
                assert!(config.features.is_enabled(Module::Notifications));
                assert!(!config.features.is_enabled(Module::Voting));
                assert!(!config.features.is_enabled(Module::Minutes));
            },
        );
    }

    #[test]
    fn test_invalid_stage() {
        with_env_vars(&[("ORGMEET_STAGE", "six")], || {
            assert!(load_from_env(ConfigBuilder::new()).is_err());
        });
        with_env_vars(&[("ORGMEET_STAGE", "0")], || {
            assert!(load_from_env(ConfigBuilder::new()).is_err());
        });
    }

    #[test]
    fn test_unknown_module() {
        with_env_vars(&[("ORGMEET_DISABLED_MODULES", "chat")], || {
            assert!(load_from_env(ConfigBuilder::new()).is_err());
        });
    }

    #[test]
    fn test_load_transport() {
        with_env_vars(
            &[
                ("ORGMEET_HTTP_HOST", "0.0.0.0"),
                ("ORGMEET_HTTP_PORT", "9200"),
                ("ORGMEET_BEARER_TOKEN", "token-1"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .unwrap();
                assert_eq!(config.transport.http_host.to_string(), "0.0.0.0");
                assert_eq!(config.transport.http_port, 9200);
                assert_eq!(config.transport.bearer_token.as_deref(), Some("token-1"));
            },
        );
    }

    #[test]
    fn test_invalid_port() {
        with_env_vars(&[("ORGMEET_HTTP_PORT", "99999")], || {
            assert!(load_from_env(ConfigBuilder::new()).is_err());
        });
    }

    #[test]
    fn test_load_logging_and_seed() {
        with_env_vars(
            &[
                ("RUST_LOG", "orgmeet_authz=trace"),
                ("ORGMEET_JSON_LOGS", "yes"),
                ("ORGMEET_SEED_PATH", "/tmp/seed.json"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .unwrap();
                assert_eq!(config.telemetry.log_level, "orgmeet_authz=trace");
                assert!(config.telemetry.json_logs);
                assert_eq!(
                    config.seed_path.unwrap().to_str(),
                    Some("/tmp/seed.json")
                );
            },
        );
    }
}
