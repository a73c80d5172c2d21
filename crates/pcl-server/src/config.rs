use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pcl_crypto::{SignatureScheme, SigningSecret};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Environment variable that overrides the configured signing secret.
pub const SECRET_ENV: &str = "PCL_SIGNING_SECRET";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// SQLite file holding both chains; `None` keeps them in memory.
    pub database_path: Option<PathBuf>,
    /// Upper bound on waiting for a locked database.
    pub busy_timeout_ms: u64,
    pub signing: SigningConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_path: None,
            busy_timeout_ms: 5_000,
            signing: SigningConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub scheme: SignatureScheme,
    /// 64 hex characters. Prefer the environment over committing this.
    pub secret_hex: Option<String>,
}

impl ServerConfig {
    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?.apply_env())
    }

    /// Parse TOML; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Take the secret from [`SECRET_ENV`] when it is set.
    pub fn apply_env(self) -> Self {
        self.with_secret_override(std::env::var(SECRET_ENV).ok())
    }

    pub fn with_secret_override(mut self, secret_hex: Option<String>) -> Self {
        if let Some(secret) = secret_hex.filter(|s| !s.trim().is_empty()) {
            self.signing.secret_hex = Some(secret);
        }
        self
    }

    /// The configured secret. Signing without one is refused.
    pub fn secret(&self) -> ServerResult<SigningSecret> {
        let hex = self.signing.secret_hex.as_deref().ok_or_else(|| {
            ServerError::Config(format!(
                "no signing secret configured; set {SECRET_ENV} or signing.secret_hex"
            ))
        })?;
        SigningSecret::from_hex(hex).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
