//! Account and device-state type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::SecretHash;

/// Account identifier - uuid string, or email for records that predate ids
pub type AccountKey = String;

/// Main account record, one per registered user
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Account {
    // Identity
    pub id: AccountKey,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub sport: Option<String>,
    pub username: Option<String>,
    pub is_coach: bool,

    // Authentication
    pub password: SecretHash,

    // Recovery
    pub security_question: Option<String>,
    pub security_answer: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Stable lookup key: id when present, email for legacy records.
    pub fn key(&self) -> &str {
        if self.id.is_empty() {
            &self.email
        } else {
            &self.id
        }
    }

    /// Match against a key by id first, falling back to email.
    pub fn matches_key(&self, key: &str) -> bool {
        (!self.id.is_empty() && self.id == key) || self.email == key
    }

    /// A reset can only run if both halves of the security question exist.
    pub fn has_security_question(&self) -> bool {
        self.security_question.as_deref().is_some_and(|q| !q.trim().is_empty())
            && self.security_answer.as_deref().is_some_and(|a| !a.trim().is_empty())
    }
}

/// Per-device preferences, independent of the accounts table
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preferences {
    pub notifications_enabled: bool,
    pub dark_mode: bool,
    pub language: String,
    pub metric_units: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            dark_mode: false,
            language: "en".to_string(),
            metric_units: true,
        }
    }
}

/// Per-device coaching stats, independent of the accounts table
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub sessions_completed: u64,
    pub athletes_coached: u64,
    pub hours_logged: u64,
    pub last_active: Option<DateTime<Utc>>,
}

/// Durable record of a remote account deletion that has not been confirmed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeletionQueueEntry {
    pub account_key: AccountKey,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl DeletionQueueEntry {
    pub fn new(account_key: impl Into<AccountKey>) -> Self {
        Self {
            account_key: account_key.into(),
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }
}
