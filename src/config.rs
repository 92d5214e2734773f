/// Connection configuration
/// Credentials for the external database the engine would fetch base
/// relations from. The engine never opens a connection itself; this is the
/// interface a connection-owning caller consumes.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host address
    pub host: String,

    /// Port
    pub port: u16,

    /// Database name
    pub database: String,

    /// User name
    pub user: String,

    /// Password
    pub password: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl ConnectionConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::config_with_path(e.to_string(), path.display().to_string())
        })?;
        serde_json::from_str(&text).map_err(|e| {
            EngineError::config_with_path(e.to_string(), path.display().to_string())
        })
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| {
            EngineError::config_with_path(e.to_string(), path.display().to_string())
        })
    }

    /// Overlay fields from MFQ_HOST, MFQ_PORT, MFQ_DATABASE, MFQ_USER,
    /// MFQ_PASSWORD when set
    pub fn overridden_from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("MFQ_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("MFQ_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(database) = std::env::var("MFQ_DATABASE") {
            self.database = database;
        }
        if let Ok(user) = std::env::var("MFQ_USER") {
            self.user = user;
        }
        if let Ok(password) = std::env::var("MFQ_PASSWORD") {
            self.password = password;
        }
        self
    }
}
