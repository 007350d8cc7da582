//! Startup data. Safe to run on every cold start.

use crate::accounts::AccountService;
use crate::error::{RegistryError, Result};
use crate::patients::save_patient;
use crate::store::PatientStore;
use crate::types::{PageRequest, Patient};

pub const DEFAULT_PASSWORD: &str = "1234";

const ROLES: &[&str] = &["USER", "ADMIN"];

/// (username, roles)
const ACCOUNTS: &[(&str, &[&str])] = &[
    ("user1", &["USER"]),
    ("user2", &["USER"]),
    ("admin", &["USER", "ADMIN"]),
];

/// Create the default roles and accounts when absent. Grants are re-applied on
/// every run, so an existing admin missing ADMIN is repaired.
pub async fn seed_accounts(accounts: &AccountService) -> Result<()> {
    for role in ROLES {
        if accounts.load_role(role).await?.is_none() {
            accounts.add_new_role(Some(*role)).await?;
        }
    }

    for (username, roles) in ACCOUNTS {
        if accounts.load_user_by_username(username).await?.is_none() {
            let email = format!("{}@gmail.com", username);
            match accounts
                .add_new_user(Some(*username), Some(DEFAULT_PASSWORD), Some(&email), Some(DEFAULT_PASSWORD))
                .await
            {
                Ok(_) => {}
                // another cold start seeded it first
                Err(RegistryError::DuplicateUsername(_)) => {
                    tracing::info!("Account {} created concurrently, keeping it", username)
                }
                Err(e) => return Err(e),
            }
        }
        for role in roles.iter() {
            accounts.add_role_to_user(username, role).await?;
        }
    }

    tracing::info!("Account seeding complete");
    Ok(())
}

/// Demo patients, inserted only into an empty registry.
pub async fn seed_patients(store: &dyn PatientStore) -> Result<()> {
    if store.find_all(PageRequest::new(0, 1, 1)).await?.total_elements > 0 {
        tracing::info!("Patients already present, skipping demo data");
        return Ok(());
    }

    let demo = [("Hassan", false, 132), ("Rachid", true, 110), ("Loubna", false, 123)];
    for (name, sick, score) in demo {
        save_patient(
            store,
            Patient {
                id: None,
                name: name.to_string(),
                birth_date: Some(chrono::Utc::now().date_naive()),
                sick,
                score,
            },
        )
        .await?;
    }

    tracing::info!("Seeded {} demo patients", demo.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountStore, MemoryStore};
    use crate::types::{Account, Role};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seeding_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(store.clone());

        seed_accounts(&accounts).await.unwrap();
        let first = accounts.load_user_by_username("user1").await.unwrap().unwrap();
        seed_accounts(&accounts).await.unwrap();
        let second = accounts.load_user_by_username("user1").await.unwrap().unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert!(accounts.load_user_by_email("user2@gmail.com").await.unwrap().is_some());
        assert!(crate::auth::verify_password(DEFAULT_PASSWORD, &second.password));
    }

    #[tokio::test]
    async fn test_admin_holds_user_and_admin() {
        let accounts = AccountService::new(Arc::new(MemoryStore::new()));
        seed_accounts(&accounts).await.unwrap();

        let admin = accounts.load_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.roles.contains(&Role::new("USER")));
        assert!(admin.roles.contains(&Role::new("ADMIN")));

        let user = accounts.load_user_by_username("user2").await.unwrap().unwrap();
        assert_eq!(user.roles.len(), 1);
    }

    #[tokio::test]
    async fn test_reseeding_repairs_admin_grant() {
        let accounts = AccountService::new(Arc::new(MemoryStore::new()));
        seed_accounts(&accounts).await.unwrap();
        accounts.remove_role_from_user("admin", "ADMIN").await.unwrap();

        seed_accounts(&accounts).await.unwrap();
        let admin = accounts.load_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.roles.contains(&Role::new("ADMIN")));
    }

    #[tokio::test]
    async fn test_concurrent_seed_keeps_first_accounts() {
        let store = Arc::new(MemoryStore::new());
        let other_cold_start = AccountService::new(store.clone());
        seed_accounts(&other_cold_start).await.unwrap();
        let before = other_cold_start.load_user_by_username("admin").await.unwrap().unwrap();

        // This run's existence check raced the other one and saw nothing.
        let accounts = AccountService::new(Arc::new(MissFirstLookup {
            inner: store.clone(),
            seen: Default::default(),
        }));
        seed_accounts(&accounts).await.unwrap();

        let after = accounts.load_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.password, before.password);
        assert!(after.roles.contains(&Role::new("ADMIN")));
    }

    /// Reports each username as absent the first time it is looked up.
    struct MissFirstLookup {
        inner: Arc<MemoryStore>,
        seen: tokio::sync::Mutex<std::collections::HashSet<String>>,
    }

    #[async_trait::async_trait]
    impl AccountStore for MissFirstLookup {
        async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
            if self.seen.lock().await.insert(username.to_string()) {
                return Ok(None);
            }
            self.inner.find_by_username(username).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
            self.inner.find_by_email(email).await
        }
        async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>> {
            self.inner.find_by_user_id(user_id).await
        }
        async fn create_account(&self, account: Account) -> Result<Account> {
            self.inner.create_account(account).await
        }
        async fn save_account(&self, account: Account) -> Result<Account> {
            self.inner.save_account(account).await
        }
        async fn find_role(&self, role: &str) -> Result<Option<Role>> {
            self.inner.find_role(role).await
        }
        async fn save_role(&self, role: Role) -> Result<Role> {
            self.inner.save_role(role).await
        }
    }

    #[tokio::test]
    async fn test_demo_patients_only_into_empty_store() {
        let store = MemoryStore::new();
        seed_patients(&store).await.unwrap();
        seed_patients(&store).await.unwrap();

        let page = store.find_all(PageRequest::new(0, 10, 4)).await.unwrap();
        assert_eq!(page.total_elements, 3);
        assert!(page.content.iter().any(|p| p.name == "Rachid" && p.sick));
    }
}
