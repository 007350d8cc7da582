pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod accounts;
pub mod auth;
pub mod tokens;
pub mod access;
pub mod views;
pub mod patients;
pub mod seed;

use accounts::AccountService;
use config::Config;
use error::RegistryError;
use std::sync::Arc;
use store::{AccountStore, MemoryStore, PatientStore};
use views::Views;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub patients: Arc<dyn PatientStore>,
    pub accounts: AccountService,
    pub views: Views,
}

impl AppState {
    pub fn new(
        config: Config,
        patients: Arc<dyn PatientStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Result<Arc<Self>, RegistryError> {
        Ok(Arc::new(Self {
            config,
            patients,
            accounts: AccountService::new(accounts),
            views: Views::new()?,
        }))
    }

    /// State backed by a fresh in-process store.
    pub fn in_memory(config: Config) -> Result<Arc<Self>, RegistryError> {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }
}
