//! Configuration builder

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::authz::{PolicySet, RuleOverride};
use crate::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_LOG_LEVEL, DEFAULT_SERVICE_NAME, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::features::{FeatureSet, Module, Stage};

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub stage: Stage,
    pub features: Arc<FeatureSet>,
    pub policy: Arc<PolicySet>,
    pub seed_path: Option<PathBuf>,
    pub transport: TransportConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    #[must_use]
    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub http_host: IpAddr,
    pub http_port: u16,
    pub request_timeout: Duration,
    /// Shared secret for `Authorization: Bearer`; `None` disables the check
    pub bearer_token: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            http_host: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_HTTP_PORT,
            request_timeout: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
            bearer_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    stage: Stage,
    disabled_modules: Vec<Module>,
    policy_rules: Vec<RuleOverride>,
    seed_path: Option<PathBuf>,
    transport: TransportConfig,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: Stage::LAST,
            disabled_modules: Vec::new(),
            policy_rules: Vec::new(),
            seed_path: None,
            transport: TransportConfig {
                http_host: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                http_port: DEFAULT_HTTP_PORT,
                request_timeout: Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS),
                bearer_token: None,
            },
            telemetry: TelemetryConfig {
                service_name: String::new(),
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    /// Deployment stage (default: all modules)
    #[must_use]
    pub const fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Replace the explicit module disable list
    #[must_use]
    pub fn disabled_modules(mut self, modules: Vec<Module>) -> Self {
        self.disabled_modules = modules;
        self
    }

    #[must_use]
    pub fn disable_module(mut self, module: Module) -> Self {
        if !self.disabled_modules.contains(&module) {
            self.disabled_modules.push(module);
        }
        self
    }

    /// Append a policy rule override; later overrides win
    #[must_use]
    pub fn policy_rule(mut self, rule: RuleOverride) -> Self {
        self.policy_rules.push(rule);
        self
    }

    #[must_use]
    pub fn policy_rules(mut self, rules: Vec<RuleOverride>) -> Self {
        self.policy_rules.extend(rules);
        self
    }

    #[must_use]
    pub fn seed_path(mut self, path: Option<PathBuf>) -> Self {
        self.seed_path = path;
        self
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.transport.http_host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.transport.http_port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: Option<String>) -> Self {
        self.transport.bearer_token = token;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        if self.disabled_modules.contains(&Module::Organizations) {
            return Err(Error::Config(
                "the organizations module cannot be disabled".into(),
            ));
        }
        if self
            .transport
            .bearer_token
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err(Error::Config("bearer token must not be empty".into()));
        }
        if self.transport.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".into()));
        }

        let features = FeatureSet::with_disabled(self.stage, &self.disabled_modules);
        let policy = PolicySet::with_overrides(&self.policy_rules)?;

        let service_name = if self.telemetry.service_name.is_empty() {
            DEFAULT_SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            DEFAULT_LOG_LEVEL.to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            stage: self.stage,
            features: Arc::new(features),
            policy: Arc::new(policy),
            seed_path: self.seed_path,
            transport: self.transport,
            telemetry: TelemetryConfig {
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
