//! Diagnostic CLI over a locker database
//!
//! Inspects and mutates a device store from the command line. The CLI has
//! no connection to the remote account service, so deletions always take
//! the offline path: purge locally, queue the remote half for the app's
//! sync task to drain.

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::account::{
    AccountSwitcher, CredentialStore, DeletionCoordinator, NewAccount,
};
use crate::config::LockerConfig;
use crate::error::LockerError;
use crate::remote::{Connectivity, FixedConnectivity, RecordingRemote, RemoteAccountService};
use crate::storage::KeyValueBackend;
use crate::sync::SyncRetryQueue;

#[derive(Parser)]
#[command(name = "locker")]
#[command(about = "Local identity and credential store CLI", long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "locker.toml")]
    pub config: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the currently active account
    Show,
    /// List all cached accounts
    List,
    /// Make a cached account the active session
    Switch {
        #[arg(long)]
        key: String,
    },
    /// Register a new account and make it active
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        sport: Option<String>,
        #[arg(long)]
        coach: bool,
    },
    /// Clear the active session, keeping cached accounts
    Logout,
    /// Purge every stored credential key
    LogoutAll,
    /// Delete an account locally and queue the remote deletion
    Delete {
        #[arg(long)]
        key: String,
    },
    /// Show pending remote deletions
    Queue,
}

pub async fn run(
    command: Commands,
    config: &LockerConfig,
    backend: Arc<dyn KeyValueBackend>,
) -> Result<(), LockerError> {
    let store = Arc::new(CredentialStore::with_policy(backend.clone(), &config.policy));
    // Finish anything a previous run left half-written.
    store.recover_pending_commit().await?;

    let switcher = AccountSwitcher::new(store.clone());
    let remote = Arc::new(RecordingRemote::new()) as Arc<dyn RemoteAccountService>;
    let queue = Arc::new(SyncRetryQueue::new(backend, remote.clone(), &config.sync));

    match command {
        Commands::Show => match store.load_current_account().await {
            Ok(account) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&account)
                        .map_err(|e| LockerError::Storage(e.to_string()))?
                );
            }
            Err(LockerError::AccountNotFound(_)) => println!("No active account."),
            Err(e) => return Err(e),
        },
        Commands::List => {
            let accounts = switcher.accounts().await?;
            if accounts.is_empty() {
                println!("No cached accounts.");
            }
            for a in accounts {
                println!("Key: {}\tName: {}\tEmail: {}", a.key(), a.name, a.email);
            }
        }
        Commands::Switch { key } => {
            let account = switcher.switch_to(&key).await?;
            println!("Active account is now '{}'.", account.name);
        }
        Commands::Register {
            name,
            email,
            password,
            sport,
            coach,
        } => {
            let account = switcher
                .register(NewAccount {
                    name,
                    email,
                    password,
                    phone: None,
                    sport,
                    username: None,
                    is_coach: coach,
                    security_question: None,
                    security_answer: None,
                })
                .await?;
            println!("Registered '{}' with key {}.", account.name, account.key());
        }
        Commands::Logout => {
            switcher.logout().await?;
            println!("Logged out.");
        }
        Commands::LogoutAll => {
            switcher.logout_all().await?;
            println!("All local credentials removed.");
        }
        Commands::Delete { key } => {
            let connectivity = Arc::new(FixedConnectivity::offline()) as Arc<dyn Connectivity>;
            let coordinator =
                DeletionCoordinator::new(store.clone(), queue.clone(), connectivity, remote);
            coordinator.delete_account(&key).await?;
            println!("Deleted locally; remote deletion queued for sync.");
        }
        Commands::Queue => {
            let entries = queue.entries().await?;
            if entries.is_empty() {
                println!("No pending deletions.");
            }
            for e in entries {
                println!(
                    "Account: {}\tQueued: {}\tAttempts: {}",
                    e.account_key, e.enqueued_at, e.attempts
                );
            }
        }
    }
    Ok(())
}
