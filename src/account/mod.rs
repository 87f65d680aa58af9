//! Local identity and credential subsystem
//!
//! This module implements the device-local account model:
//! - Persistent credential store over a key-value backend
//! - Password policy with bounded reuse history
//! - Security-question gated reset flow with optional device auth
//! - Multi-account switching with a single active session
//! - Deletion with an online/offline branch and a durable retry queue

pub mod auth;
pub mod deletion;
pub mod policy;
pub mod reset;
pub mod store;
pub mod switcher;
pub mod types;

pub use auth::{AuthFailure, SecretHash};
pub use deletion::{DeletionCoordinator, DeletionOutcome};
pub use policy::PasswordRejection;
pub use reset::{DeviceAuthKind, DeviceAuthenticator, ResetFlow, ResetState};
pub use store::{CommitKind, CredentialStore};
pub use switcher::{AccountSwitcher, NewAccount};
pub use types::{Account, AccountKey, DeletionQueueEntry, Preferences, Stats};
