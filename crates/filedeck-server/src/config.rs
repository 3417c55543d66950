//! Server configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable, if userless, server.
//!
//! ```toml
//! port = 8080
//! root = "/srv/filedeck"
//!
//! [cache]
//! kind = "disk"
//! dir = "/var/cache/filedeck"
//!
//! [[users]]
//! username = "alice"
//! scope = "alice"
//! permissions = { create = true, rename = true, modify = true, delete = true }
//! rules = [{ allow = false, regex = "\\.key$" }]
//! ```

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use filedeck_kernel::{Permissions, Rule, Sorting, VirtualConfig};

use crate::constants::{DEFAULT_AUTH_HEADER, DEFAULT_BIND_ADDRESS, DEFAULT_HTTP_PORT, DEFAULT_ROOT};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rule for user {user} needs exactly one of `path` or `regex`")]
    InvalidRule { user: String },

    #[error("bad rule regex for user {user}: {source}")]
    Regex {
        user: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate user {0}")]
    DuplicateUser(String),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Data root; user scopes are directories beneath it.
    pub root: PathBuf,
    /// Sniff file headers to detect content types.
    pub type_detection_by_header: bool,
    /// Request header naming the authenticated user.
    pub auth_header: String,
    #[serde(rename = "virtual")]
    pub virtual_ns: VirtualConfig,
    pub cache: CacheConfig,
    pub hooks: HooksConfig,
    pub users: Vec<UserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_HTTP_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            type_detection_by_header: false,
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            virtual_ns: VirtualConfig::default(),
            cache: CacheConfig::default(),
            hooks: HooksConfig::default(),
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Where preview artifacts are cached.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    Memory,
    Disk { dir: PathBuf },
}

/// Shell command hooks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub enabled: bool,
    /// Trigger name (`before_upload`, `after_delete`, ...) to shell lines.
    pub commands: HashMap<String, Vec<String>>,
}

/// One user of the static user table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Directory under the data root; defaults to the username.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub hide_dotfiles: bool,
    #[serde(default)]
    pub sorting: Sorting,
}

impl UserConfig {
    /// Scope directory relative to the data root.
    pub fn scope_dir(&self) -> &str {
        self.scope
            .as_deref()
            .unwrap_or(&self.username)
            .trim_start_matches('/')
    }

    pub fn compile_rules(&self) -> Result<Vec<Rule>, ConfigError> {
        self.rules
            .iter()
            .map(|rule| rule.compile(&self.username))
            .collect()
    }
}

/// Access rule as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub allow: bool,
    pub path: Option<String>,
    pub regex: Option<String>,
}

impl RuleConfig {
    fn compile(&self, user: &str) -> Result<Rule, ConfigError> {
        match (&self.path, &self.regex) {
            (Some(path), None) => Ok(Rule::prefix(path.clone(), self.allow)),
            (None, Some(pattern)) => {
                let re = Regex::new(pattern).map_err(|source| ConfigError::Regex {
                    user: user.to_string(),
                    source,
                })?;
                Ok(Rule::regex(re, self.allow))
            }
            _ => Err(ConfigError::InvalidRule {
                user: user.to_string(),
            }),
        }
    }
}
