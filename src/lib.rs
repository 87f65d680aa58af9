pub mod account;
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod storage;
pub mod sync;

pub use account::{AccountSwitcher, CredentialStore, DeletionCoordinator, ResetFlow};
pub use error::LockerError;
