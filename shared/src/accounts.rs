use std::sync::Arc;

use crate::auth::hash_password;
use crate::error::{RegistryError, Result};
use crate::store::AccountStore;
use crate::types::{Account, Role};

/// Manages accounts, roles and the account → role association.
///
/// Uniqueness of usernames, emails and role names is checked here. New
/// accounts are inserted with a conditional write, so a racing insert of the
/// same username still fails with `DuplicateUsername`.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

fn present<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RegistryError::InvalidInput(field)),
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Create an account with no roles. The password is hashed before storage.
    pub async fn add_new_user(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        email: Option<&str>,
        confirm_password: Option<&str>,
    ) -> Result<Account> {
        let username = present(username, "Username")?;
        let password = present(password, "Password")?;
        let email = present(email, "Email")?;

        if self.store.find_by_username(username).await?.is_some() {
            return Err(RegistryError::DuplicateUsername(username.to_string()));
        }

        if confirm_password != Some(password) {
            return Err(RegistryError::PasswordMismatch);
        }

        if self.store.find_by_email(email).await?.is_some() {
            return Err(RegistryError::DuplicateEmail(email.to_string()));
        }

        let account = Account {
            user_id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: hash_password(password)?,
            email: email.to_string(),
            roles: Default::default(),
        };

        let account = self.store.create_account(account).await?;
        tracing::info!("Account created: {} ({})", account.username, account.user_id);
        Ok(account)
    }

    pub async fn add_new_role(&self, role: Option<&str>) -> Result<Role> {
        let role = present(role, "Role")?;

        if self.store.find_role(role).await?.is_some() {
            return Err(RegistryError::DuplicateRole(role.to_string()));
        }

        let role = self.store.save_role(Role::new(role)).await?;
        tracing::info!("Role created: {}", role.role);
        Ok(role)
    }

    pub async fn add_role_to_user(&self, username: &str, role: &str) -> Result<()> {
        let (mut account, role) = self.account_and_role(username, role).await?;
        if account.roles.insert(role) {
            self.store.save_account(account).await?;
        }
        Ok(())
    }

    pub async fn remove_role_from_user(&self, username: &str, role: &str) -> Result<()> {
        let (mut account, role) = self.account_and_role(username, role).await?;
        if account.roles.remove(&role) {
            self.store.save_account(account).await?;
        }
        Ok(())
    }

    pub async fn load_user_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.store.find_by_username(username).await
    }

    pub async fn load_user_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.store.find_by_email(email).await
    }

    pub async fn load_user_by_id(&self, user_id: &str) -> Result<Option<Account>> {
        self.store.find_by_user_id(user_id).await
    }

    pub async fn load_role(&self, role: &str) -> Result<Option<Role>> {
        self.store.find_role(role).await
    }

    async fn account_and_role(&self, username: &str, role: &str) -> Result<(Account, Role)> {
        let account = self
            .store
            .find_by_username(username)
            .await?
            .ok_or_else(|| RegistryError::UserNotFound(username.to_string()))?;
        let role = self
            .store
            .find_role(role)
            .await?
            .ok_or_else(|| RegistryError::RoleNotFound(role.to_string()))?;
        Ok((account, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_new_user_hashes_password() {
        let accounts = service();
        let account = accounts
            .add_new_user(Some("user1"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap();

        assert_ne!(account.password, "1234");
        assert!(crate::auth::verify_password("1234", &account.password));
        assert!(uuid::Uuid::parse_str(&account.user_id).is_ok());
        assert!(account.roles.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected_once_stored() {
        let accounts = service();
        accounts
            .add_new_user(Some("user1"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap();

        let err = accounts
            .add_new_user(Some("user1"), Some("1234"), Some("other@gmail.com"), Some("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUsername(ref u) if u == "user1"));
        assert!(err.is_conflict());
        assert!(accounts.load_user_by_email("other@gmail.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_mismatch() {
        let accounts = service();
        accounts
            .add_new_user(Some("user1"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap();

        let err = accounts
            .add_new_user(Some("user2"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateEmail(_)));

        let err = accounts
            .add_new_user(Some("user2"), Some("1234"), Some("user2@gmail.com"), Some("4321"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::PasswordMismatch));
    }

    #[tokio::test]
    async fn test_absent_fields_are_invalid_input() {
        let accounts = service();
        let err = accounts
            .add_new_user(None, Some("1234"), Some("x@gmail.com"), Some("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput("Username")));

        let err = accounts
            .add_new_user(Some("user3"), None, Some("x@gmail.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput("Password")));

        let err = accounts.add_new_role(Some("  ")).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput("Role")));
    }

    #[tokio::test]
    async fn test_roles_are_unique_and_assignable() {
        let accounts = service();
        accounts.add_new_role(Some("USER")).await.unwrap();
        let err = accounts.add_new_role(Some("USER")).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRole(_)));

        accounts
            .add_new_user(Some("user1"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap();
        accounts.add_role_to_user("user1", "USER").await.unwrap();
        accounts.add_role_to_user("user1", "USER").await.unwrap();

        let account = accounts.load_user_by_username("user1").await.unwrap().unwrap();
        assert_eq!(account.roles.len(), 1);

        accounts.remove_role_from_user("user1", "USER").await.unwrap();
        let account = accounts.load_user_by_username("user1").await.unwrap().unwrap();
        assert!(account.roles.is_empty());
    }

    #[tokio::test]
    async fn test_association_requires_both_sides() {
        let accounts = service();
        accounts.add_new_role(Some("ADMIN")).await.unwrap();

        let err = accounts.add_role_to_user("ghost", "ADMIN").await.unwrap_err();
        assert!(matches!(err, RegistryError::UserNotFound(_)));

        accounts
            .add_new_user(Some("user1"), Some("1234"), Some("user1@gmail.com"), Some("1234"))
            .await
            .unwrap();
        let err = accounts.remove_role_from_user("user1", "AUDITOR").await.unwrap_err();
        assert!(matches!(err, RegistryError::RoleNotFound(_)));
        assert!(err.is_not_found());
    }

    /// Lookups that never see existing accounts, as when another writer
    /// inserts between the existence check and the insert.
    struct StaleLookups(MemoryStore);

    #[async_trait::async_trait]
    impl AccountStore for StaleLookups {
        async fn find_by_username(&self, _username: &str) -> Result<Option<Account>> {
            Ok(None)
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<Account>> {
            Ok(None)
        }
        async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>> {
            self.0.find_by_user_id(user_id).await
        }
        async fn create_account(&self, account: Account) -> Result<Account> {
            self.0.create_account(account).await
        }
        async fn save_account(&self, account: Account) -> Result<Account> {
            self.0.save_account(account).await
        }
        async fn find_role(&self, role: &str) -> Result<Option<Role>> {
            self.0.find_role(role).await
        }
        async fn save_role(&self, role: Role) -> Result<Role> {
            self.0.save_role(role).await
        }
    }

    #[tokio::test]
    async fn test_racing_insert_does_not_replace_account() {
        let store = Arc::new(StaleLookups(MemoryStore::new()));
        let accounts = AccountService::new(store.clone());

        let first = accounts
            .add_new_user(Some("admin"), Some("1234"), Some("admin@gmail.com"), Some("1234"))
            .await
            .unwrap();
        let err = accounts
            .add_new_user(Some("admin"), Some("1234"), Some("admin@gmail.com"), Some("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUsername(_)));

        let stored = store.0.find_by_username("admin").await.unwrap().unwrap();
        assert_eq!(stored.user_id, first.user_id);
        assert_eq!(stored.password, first.password);
    }

    #[tokio::test]
    async fn test_lookups_report_absence() {
        let accounts = service();
        assert!(accounts.load_user_by_username("nobody").await.unwrap().is_none());
        assert!(accounts.load_role("ADMIN").await.unwrap().is_none());

        let account = accounts
            .add_new_user(Some("user2"), Some("1234"), Some("user2@gmail.com"), Some("1234"))
            .await
            .unwrap();
        let by_id = accounts.load_user_by_id(&account.user_id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "user2");
    }
}
