use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockerConfig {
    pub store: StoreConfig,
    pub policy: PolicyConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    pub db_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PolicyConfig {
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    /// Wrong security answers allowed before a reset attempt is blocked.
    /// Unset means unlimited retries.
    #[serde(default)]
    pub max_answer_attempts: Option<u32>,
}

fn default_min_password_length() -> usize {
    crate::account::policy::DEFAULT_MIN_LENGTH
}

fn default_history_depth() -> usize {
    crate::account::policy::DEFAULT_HISTORY_DEPTH
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Attempt count after which a stuck deletion is logged at warn level.
    /// Entries are never dropped regardless.
    #[serde(default)]
    pub warn_after_attempts: Option<u32>,
}

fn default_retry_interval_secs() -> u64 {
    10
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_password_length: default_min_password_length(),
            history_depth: default_history_depth(),
            max_answer_attempts: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: default_retry_interval_secs(),
            warn_after_attempts: None,
        }
    }
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                db_path: "./data/locker".to_string(),
                log_level: "info".to_string(),
            },
            policy: PolicyConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl LockerConfig {
    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => {
                        println!("Config loaded from {}", path);
                        c
                    }
                    Err(e) => {
                        eprintln!("Error parsing config: {}. Using Defaults.", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    eprintln!("Error reading config: {}. Using Defaults.", e);
                    Self::default()
                }
            }
        } else {
            println!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                let _ = std::fs::write(path, s);
            }
            config
        }
    }
}
