//! Configuration loading, validation, and management for Kickoff.
//!
//! Loads configuration from `~/.kickoff/config.toml` (or the file named by
//! `KICKOFF_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use kickoff_core::permission::Requirement;
use kickoff_core::role::Role;
use kickoff_core::scope::ChatScope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.kickoff/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Execution backend and retry policy
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Permission resolution, role cache and succession
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Owner selection
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Capability discovery
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Answer consistency validation
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Membership data provider: remote service or in-memory roster
    #[serde(default)]
    pub membership: MembershipConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Base URL of the execution backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Wall-clock budget for a single backend attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts on transport failure (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_initial_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    4_000
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl std::fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("backend_url", &self.backend_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_initial_ms", &self.backoff_initial_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_role_cache_ttl")]
    pub role_cache_ttl_secs: u64,

    #[serde(default = "default_provider_attempts")]
    pub provider_max_attempts: u32,

    #[serde(default = "default_provider_backoff_ms")]
    pub provider_backoff_ms: u64,

    /// How often the succession sweeper checks for teams without an administrator
    #[serde(default = "default_succession_interval")]
    pub succession_interval_secs: u64,

    /// Per-capability overrides of the default requirements
    #[serde(default)]
    pub rules: Vec<PermissionRuleConfig>,
}

fn default_role_cache_ttl() -> u64 {
    60
}
fn default_provider_attempts() -> u32 {
    3
}
fn default_provider_backoff_ms() -> u64 {
    200
}
fn default_succession_interval() -> u64 {
    300
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            role_cache_ttl_secs: default_role_cache_ttl(),
            provider_max_attempts: default_provider_attempts(),
            provider_backoff_ms: default_provider_backoff_ms(),
            succession_interval_secs: default_succession_interval(),
            rules: vec![],
        }
    }
}

/// A permission override for one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRuleConfig {
    pub capability: String,

    /// Any-of, evaluated under precedence. Empty with no scopes = public.
    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub chat_scopes: Vec<String>,
}

impl PermissionRuleConfig {
    pub fn requirement(&self) -> Result<Requirement, ConfigError> {
        let roles = self
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ValidationError(format!("{}: {e}", self.capability)))?;
        if roles.contains(&Role::Guest) {
            return Err(ConfigError::ValidationError(format!(
                "{}: 'guest' cannot be required; leave roles and chat_scopes empty for a public capability",
                self.capability
            )));
        }
        let chat_scopes = parse_scopes(&self.chat_scopes)
            .map_err(|e| ConfigError::ValidationError(format!("{}: {e}", self.capability)))?;
        Ok(Requirement { roles, chat_scopes })
    }
}

fn parse_scopes(raw: &[String]) -> Result<Vec<ChatScope>, String> {
    raw.iter().map(|s| s.parse::<ChatScope>()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Owner that receives unmatched intents
    #[serde(default = "default_fallback_owner")]
    pub fallback_owner: String,

    /// Extra route rules, evaluated alongside the built-in table
    #[serde(default)]
    pub rules: Vec<RouteRuleConfig>,
}

fn default_fallback_owner() -> String {
    "message_processor".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_owner: default_fallback_owner(),
            rules: vec![],
        }
    }
}

/// A route rule: (intent, chat scope) → owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    pub intent: String,

    /// Bind the rule to one chat scope; omitted = any scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_scope: Option<String>,

    pub owner: String,

    /// Capability whose permission gates the request before dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

impl RouteRuleConfig {
    pub fn scope(&self) -> Result<Option<ChatScope>, ConfigError> {
        self.chat_scope
            .as_deref()
            .map(str::parse::<ChatScope>)
            .transpose()
            .map_err(|e| ConfigError::ValidationError(format!("route '{}': {e}", self.intent)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Load the built-in team capability catalog
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Directory of `*.toml` capability manifests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<String>,

    #[serde(default = "default_max_per_owner")]
    pub max_capabilities_per_owner: usize,
}

fn default_max_per_owner() -> usize {
    16
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            manifest_dir: None,
            max_capabilities_per_owner: default_max_per_owner(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Require every listed entity to appear in a ledger result
    #[serde(default)]
    pub strict_entity_matching: bool,

    /// Text substituted for answers that fail validation or execution
    #[serde(default = "default_degraded_message")]
    pub degraded_message: String,

    /// Extra vocabulary: category → plural nouns that label a listing
    #[serde(default)]
    pub categories: HashMap<String, Vec<String>>,
}

fn default_degraded_message() -> String {
    "Sorry, I couldn't complete that request reliably right now. Please try again in a moment."
        .into()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_entity_matching: false,
            degraded_message: default_degraded_message(),
            categories: HashMap::new(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// Base URL of the membership service; takes the place of a roster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,

    /// Bearer token for the membership service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// TOML roster seeding the in-memory membership provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_path: Option<String>,
}

impl std::fmt::Debug for MembershipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipConfig")
            .field("provider_url", &self.provider_url)
            .field("api_key", &redact(&self.api_key))
            .field("roster_path", &self.roster_path)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `KICKOFF_CONFIG` or the default path.
    ///
    /// Environment overrides (highest priority):
    /// - `KICKOFF_BACKEND_URL`
    /// - `KICKOFF_BACKEND_API_KEY`
    /// - `KICKOFF_FALLBACK_OWNER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("KICKOFF_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;

        if let Ok(url) = std::env::var("KICKOFF_BACKEND_URL") {
            config.dispatch.backend_url = Some(url);
        }
        if config.dispatch.api_key.is_none() {
            config.dispatch.api_key = std::env::var("KICKOFF_BACKEND_API_KEY").ok();
        }
        if let Ok(url) = std::env::var("KICKOFF_MEMBERSHIP_URL") {
            config.membership.provider_url = Some(url);
        }
        if config.membership.api_key.is_none() {
            config.membership.api_key = std::env::var("KICKOFF_MEMBERSHIP_API_KEY").ok();
        }
        if let Ok(owner) = std::env::var("KICKOFF_FALLBACK_OWNER") {
            config.routing.fallback_owner = owner;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kickoff")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.timeout_secs must be > 0".into(),
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_attempts must be >= 1".into(),
            ));
        }
        if self.dispatch.backoff_initial_ms > self.dispatch.backoff_max_ms {
            return Err(ConfigError::ValidationError(
                "dispatch.backoff_initial_ms must not exceed backoff_max_ms".into(),
            ));
        }
        if self.permissions.provider_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "permissions.provider_max_attempts must be >= 1".into(),
            ));
        }
        if self.routing.fallback_owner.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "routing.fallback_owner must not be empty".into(),
            ));
        }
        if self.registry.max_capabilities_per_owner == 0 {
            return Err(ConfigError::ValidationError(
                "registry.max_capabilities_per_owner must be > 0".into(),
            ));
        }
        if self.membership.provider_url.is_some() && self.membership.roster_path.is_some() {
            return Err(ConfigError::ValidationError(
                "membership.provider_url and membership.roster_path are mutually exclusive".into(),
            ));
        }
        for rule in &self.permissions.rules {
            rule.requirement()?;
        }
        for rule in &self.routing.rules {
            rule.scope()?;
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.routing.fallback_owner, "message_processor");
        assert_eq!(config.dispatch.max_attempts, 2);
        assert!(config.registry.builtin);
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, 42618);
        assert_eq!(parsed.permissions.role_cache_ttl_secs, 60);
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.dispatch.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut config = AppConfig::default();
        config.dispatch.backoff_initial_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.dispatch.timeout_secs, 30);
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.dispatch.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn rules_parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[dispatch]
backend_url = "http://localhost:9000"
timeout_secs = 10

[[permissions.rules]]
capability = "list-all-entities"
roles = ["coach"]

[[permissions.rules]]
capability = "get-available-commands"

[[routing.rules]]
intent = "list_payments"
chat_scope = "leadership"
owner = "finance_manager"
capability = "list-payments"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.dispatch.timeout_secs, 10);

        let req = config.permissions.rules[0].requirement().unwrap();
        assert_eq!(req.roles, vec![Role::Coordinator]);
        assert!(config.permissions.rules[1].requirement().unwrap().is_public());

        let scope = config.routing.rules[0].scope().unwrap();
        assert_eq!(scope, Some(ChatScope::Restricted));
    }

    #[test]
    fn unknown_role_in_rule_rejected() {
        let mut config = AppConfig::default();
        config.permissions.rules.push(PermissionRuleConfig {
            capability: "x".into(),
            roles: vec!["wizard".into()],
            chat_scopes: vec![],
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("wizard"));
    }

    #[test]
    fn membership_sources_are_exclusive() {
        let mut config = AppConfig::default();
        config.membership.provider_url = Some("http://members.local".into());
        config.membership.api_key = Some("m-secret".into());
        assert!(config.validate().is_ok());
        assert!(!format!("{config:?}").contains("m-secret"));

        config.membership.roster_path = Some("roster.toml".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn guest_role_in_rule_rejected() {
        let rule = PermissionRuleConfig {
            capability: "list-matches".into(),
            roles: vec!["visitor".into()],
            chat_scopes: vec!["open".into()],
        };
        let err = rule.requirement().unwrap_err();
        assert!(err.to_string().contains("guest"));
    }
}
