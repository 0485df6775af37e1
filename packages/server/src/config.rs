//! Server configuration.
//!
//! Loaded from JSON; every field has a default, so a config file only needs
//! the fields it changes.
//!
//! ```json
//! {
//!   "application_uri": "urn:plant:line-1",
//!   "application_name": "Line 1",
//!   "login": { "enable_anonymous": false, "enable_username_password": true,
//!              "users": [ { "username": "op", "password": "secret" } ] },
//!   "scheduler": { "worker_threads": 4, "max_wait_ms": 50, "min_repeated_interval_ms": 5 },
//!   "namespaces": [ "urn:plant:devices" ]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uaserver_scheduler::SchedulerConfig;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// Which logins the server accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub enable_anonymous: bool,
    pub enable_username_password: bool,
    pub users: Vec<UserCredentials>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enable_anonymous: true,
            enable_username_password: false,
            users: Vec::new(),
        }
    }
}

impl LoginConfig {
    /// Whether a session with these credentials (`None` for anonymous) may
    /// log in.
    pub fn accepts(&self, credentials: Option<(&str, &str)>) -> bool {
        match credentials {
            None => self.enable_anonymous,
            Some((username, password)) => {
                self.enable_username_password
                    && self
                        .users
                        .iter()
                        .any(|u| u.username == username && u.password == password)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Worker pool size; 0 runs every job on the loop thread.
    pub worker_threads: usize,
    /// Upper bound on one network poll, in milliseconds.
    pub max_wait_ms: u64,
    pub min_repeated_interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_wait_ms: 50,
            min_repeated_interval_ms: 5,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        SchedulerConfig {
            min_interval: Duration::from_millis(settings.min_repeated_interval_ms),
            max_wait: Duration::from_millis(settings.max_wait_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Names namespace 1.
    pub application_uri: String,
    pub application_name: String,
    pub login: LoginConfig,
    pub scheduler: SchedulerSettings,
    /// Extra namespaces registered when the server is created.
    pub namespaces: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:uaserver:application".to_string(),
            application_name: "uaserver".to_string(),
            login: LoginConfig::default(),
            scheduler: SchedulerSettings::default(),
            namespaces: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_uri.is_empty() {
            return Err(ConfigError::Invalid(
                "application_uri must not be empty".to_string(),
            ));
        }
        if self.scheduler.min_repeated_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "min_repeated_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.login.enable_username_password && self.login.users.is_empty() {
            return Err(ConfigError::Invalid(
                "username/password login is enabled but no users are configured".to_string(),
            ));
        }
        if let Some(uri) = self
            .namespaces
            .iter()
            .find(|uri| uri.is_empty() || **uri == self.application_uri)
        {
            return Err(ConfigError::Invalid(format!(
                "namespace {:?} is empty or shadows the application namespace",
                uri
            )));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::from(&self.scheduler)
    }
}
