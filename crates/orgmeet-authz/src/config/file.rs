//! TOML configuration file loading

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::authz::RuleOverride;
use crate::features::{Module, Stage};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./orgmeet-authz.toml",
    "~/.config/orgmeet-authz/config.toml",
    "/etc/orgmeet-authz/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(deployment) = config.deployment {
        if let Some(stage) = deployment.stage {
            builder = builder.stage(Stage::try_from(stage)?);
        }

        if let Some(modules) = deployment.disabled_modules {
            let modules = modules
                .iter()
                .map(|m| m.parse::<Module>())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.disabled_modules(modules);
        }
    }

    if let Some(policy) = config.policy {
        builder = builder.policy_rules(policy.rules);
    }

    if let Some(store) = config.store
        && let Some(seed) = store.seed_path
    {
        builder = builder.seed_path(Some(seed));
    }

    if let Some(transport) = config.transport {
        if let Some(host_str) = transport.http_host {
            let host = host_str.parse::<IpAddr>().map_err(|e| {
                crate::Error::Config(format!("Invalid http_host '{host_str}': {e}"))
            })?;
            builder = builder.http_host(host);
        }

        if let Some(port) = transport.http_port {
            builder = builder.http_port(port);
        }

        if let Some(secs) = transport.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        if let Some(token) = transport.bearer_token {
            builder = builder.bearer_token(Some(token));
        }
    }

    if let Some(obs) = config.observability {
        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }

        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    deployment: Option<DeploymentConfig>,
    policy: Option<PolicyConfig>,
    store: Option<StoreConfig>,
    transport: Option<TransportFileConfig>,
    observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeploymentConfig {
    stage: Option<u8>,
    disabled_modules: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyConfig {
    #[serde(default)]
    rules: Vec<RuleOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreConfig {
    seed_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransportFileConfig {
    http_host: Option<String>,
    http_port: Option<u16>,
    request_timeout_secs: Option<u64>,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservabilityConfig {
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}
