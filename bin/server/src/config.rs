//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional TOML file (path in
//! `PROCUREFLIX_CONFIG`) overlaid with `PROCUREFLIX__*` environment
//! variables, e.g. `PROCUREFLIX__APPROVALS__MAX_ATTEMPTS=5`.

use procureflix_access::{Actor, Role};
use procureflix_ai::LlmBackendConfig;
use procureflix_approvals::ApprovalConfig;
use procureflix_core::UserId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "PROCUREFLIX_CONFIG";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Retry and notification settings for the approval service.
    #[serde(default)]
    pub approvals: ApprovalConfig,

    /// Users known to the in-memory actor directory.
    #[serde(default)]
    pub actors: Vec<ActorSeed>,

    /// LLM backend for advisory assessments; none disables them.
    #[serde(default)]
    pub llm: Option<LlmBackendConfig>,
}

/// A directory entry declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActorSeed {
    /// Fixed id, so clients can address the user; generated when absent.
    #[serde(default)]
    pub id: Option<UserId>,
    /// Role used for permission checks.
    pub role: Role,
    /// Display name.
    pub display_name: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

impl ActorSeed {
    /// Builds the actor this seed describes.
    #[must_use]
    pub fn to_actor(&self) -> Actor {
        let actor = Actor::with_id(self.id.unwrap_or_default(), self.role, &self.display_name);
        match &self.email {
            Some(email) => actor.with_email(email),
            None => actor,
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from the file named by `PROCUREFLIX_CONFIG`, if
    /// any, and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    /// Loads configuration from an optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(
                config::Environment::with_prefix("PROCUREFLIX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
