use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
    pub sweep: SweepSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for session tokens. Required; there is no built-in value.
    pub session_secret: Option<String>,
    pub session_ttl_days: i64,
    /// Lifetime of a forgot-password code
    pub otp_ttl_secs: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    /// Defaults to `documents.sqlite` or `documents.redb` by backend
    pub documents_db: Option<String>,
    pub history_db: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub session_interval_secs: u64,
    pub membership_interval_secs: u64,
    pub membership_warning_interval_secs: u64,
    pub membership_warning_days: i64,
    pub appointment_reminder_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub enabled: bool,
    /// HTTP endpoint that accepts `{from, to, subject, text}` JSON
    pub relay_url: Option<String>,
    pub from: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_days: 30,
            otp_ttl_secs: 5 * 60,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            backend: StorageBackend::Sqlite,
            documents_db: None,
            history_db: "history.sqlite".to_string(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            session_interval_secs: 60 * 60,
            membership_interval_secs: 60 * 60,
            membership_warning_interval_secs: 24 * 60 * 60,
            membership_warning_days: 7,
            appointment_reminder_interval_secs: 24 * 60 * 60,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: None,
            from: "Medicare".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("MEDICARE_PORT")
            && let Ok(port_num) = port.parse()
        {
            config.server.port = port_num;
        }

        if let Ok(host) = std::env::var("MEDICARE_HOST") {
            config.server.host = host;
        }

        if let Ok(data_dir) = std::env::var("MEDICARE_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secret) = std::env::var("MEDICARE_SESSION_SECRET")
            && !secret.is_empty()
        {
            config.auth.session_secret = Some(secret);
        }

        if let Ok(backend) = std::env::var("MEDICARE_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_lowercase().as_str() {
                "sqlite" => StorageBackend::Sqlite,
                "redb" => StorageBackend::Redb,
                other => return Err(format!("Unknown storage backend: {}", other).into()),
            };
        }

        if let Ok(relay_url) = std::env::var("MEDICARE_MAIL_RELAY_URL") {
            config.mail.relay_url = Some(relay_url);
            config.mail.enabled = true;
        }

        Ok(config)
    }

    /// The configured session secret, or an error naming how to provide one.
    pub fn session_secret(&self) -> Result<&str, String> {
        match self.auth.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(
                "auth.session_secret is not set (config.yaml or MEDICARE_SESSION_SECRET)"
                    .to_string(),
            ),
        }
    }

    /// Get the full path to the documents database
    pub fn documents_db_path(&self) -> PathBuf {
        let file = match (&self.storage.documents_db, self.storage.backend) {
            (Some(file), _) => file.as_str(),
            (None, StorageBackend::Sqlite) => "documents.sqlite",
            (None, StorageBackend::Redb) => "documents.redb",
        };
        self.storage.data_dir.join(file)
    }

    /// Get the full path to the history database
    pub fn history_db_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.history_db)
    }
}
