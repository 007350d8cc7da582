use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex as TokioMutex;

use super::{name_matches, AccountStore, PatientStore};
use crate::error::{RegistryError, Result};
use crate::types::{Account, Page, PageRequest, Patient, Role};

/// In-process store used for local development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    patients: TokioMutex<BTreeMap<i64, Patient>>,
    next_patient_id: TokioMutex<i64>,
    accounts: TokioMutex<HashMap<String, Account>>, // keyed by username
    roles: TokioMutex<HashMap<String, Role>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn save(&self, mut patient: Patient) -> Result<Patient> {
        let mut patients = self.patients.lock().await;

        let id = match patient.id {
            Some(id) if patients.contains_key(&id) => id,
            _ => {
                let mut next = self.next_patient_id.lock().await;
                *next += 1;
                *next
            }
        };

        patient.id = Some(id);
        patients.insert(id, patient.clone());
        Ok(patient)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Patient>> {
        Ok(self.patients.lock().await.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        Ok(self.patients.lock().await.remove(&id).is_some())
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<Patient>> {
        self.find_by_name_contains("", page).await
    }

    async fn find_by_name_contains(&self, keyword: &str, page: PageRequest) -> Result<Page<Patient>> {
        let patients = self.patients.lock().await;
        let matches: Vec<Patient> = patients
            .values()
            .filter(|p| name_matches(&p.name, keyword))
            .cloned()
            .collect();
        Ok(Page::from_matches(matches, page))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.accounts.lock().await.get(username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.values().find(|a| a.user_id == user_id).cloned())
    }

    async fn create_account(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&account.username) {
            return Err(RegistryError::DuplicateUsername(account.username));
        }
        accounts.insert(account.username.clone(), account.clone());
        Ok(account)
    }

    async fn save_account(&self, account: Account) -> Result<Account> {
        self.accounts
            .lock()
            .await
            .insert(account.username.clone(), account.clone());
        Ok(account)
    }

    async fn find_role(&self, role: &str) -> Result<Option<Role>> {
        Ok(self.roles.lock().await.get(role).cloned())
    }

    async fn save_role(&self, role: Role) -> Result<Role> {
        self.roles.lock().await.insert(role.role.clone(), role.clone());
        Ok(role)
    }
}
