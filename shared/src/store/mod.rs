//! Record store: the single point of truth for patients, accounts and roles.
//!
//! Two backends implement the same traits. `dynamo` is used when deployed,
//! `memory` for local runs and tests.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Account, Page, PageRequest, Patient, Role};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Insert or update. Returns the patient with its assigned id.
    async fn save(&self, patient: Patient) -> Result<Patient>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Patient>>;

    /// Returns whether a record was removed. Absent ids are not an error.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    async fn find_all(&self, page: PageRequest) -> Result<Page<Patient>>;

    /// Case-insensitive substring match on the name; "" matches everything.
    async fn find_by_name_contains(&self, keyword: &str, page: PageRequest) -> Result<Page<Patient>>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>>;

    /// Insert only. Fails with `DuplicateUsername` if the username is taken,
    /// even when a concurrent writer got there between check and insert.
    async fn create_account(&self, account: Account) -> Result<Account>;

    async fn save_account(&self, account: Account) -> Result<Account>;

    async fn find_role(&self, role: &str) -> Result<Option<Role>>;

    async fn save_role(&self, role: Role) -> Result<Role>;
}

/// Shared keyword predicate so both backends filter identically.
pub(crate) fn name_matches(name: &str, keyword: &str) -> bool {
    keyword.is_empty() || name.to_lowercase().contains(&keyword.to_lowercase())
}
