use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::NaiveDate;
use std::collections::HashMap;

use super::{name_matches, AccountStore, PatientStore};
use crate::error::{storage, RegistryError, Result};
use crate::types::{Account, Page, PageRequest, Patient, Role};

type Item = HashMap<String, AttributeValue>;

const PATIENT_COUNTER: &str = "COUNTER#patient";

/// Single-table DynamoDB store. Every record uses `PK = SK = <TYPE>#<key>`
/// and carries an `entity_type` attribute so scans can filter by kind.
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn get(&self, pk: String) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(storage)?;

        Ok(result.item().cloned())
    }

    async fn put(&self, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(storage)?;
        Ok(())
    }

    /// Scan every page of the table for items matching `filter`.
    async fn scan(&self, filter: &str, values: &[(&str, AttributeValue)]) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_exclusive_start_key(start_key.take());
            for (name, value) in values {
                request = request.expression_attribute_values(*name, value.clone());
            }

            let response = request.send().await.map_err(storage)?;
            items.extend(response.items().iter().cloned());

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Atomically bump the patient id sequence.
    async fn next_patient_id(&self) -> Result<i64> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(PATIENT_COUNTER.to_string()))
            .key("SK", AttributeValue::S(PATIENT_COUNTER.to_string()))
            .update_expression("ADD #seq :one")
            .expression_attribute_names("#seq", "seq")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(storage)?;

        result
            .attributes()
            .and_then(|attrs| attrs.get("seq"))
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| RegistryError::Storage("patient id counter returned no value".to_string()))
    }

    async fn scan_patients(&self, keyword: &str) -> Result<Vec<Patient>> {
        let items = if keyword.is_empty() {
            self.scan(
                "entity_type = :type",
                &[(":type", AttributeValue::S("patient".to_string()))],
            )
            .await?
        } else {
            self.scan(
                "entity_type = :type AND contains(name_lower, :kw)",
                &[
                    (":type", AttributeValue::S("patient".to_string())),
                    (":kw", AttributeValue::S(keyword.to_lowercase())),
                ],
            )
            .await?
        };

        let mut patients: Vec<Patient> = items
            .iter()
            .filter_map(patient_from_item)
            .filter(|p| name_matches(&p.name, keyword))
            .collect();
        patients.sort_by_key(|p| p.id);
        Ok(patients)
    }

    async fn scan_account(&self, attribute: &str, value: &str) -> Result<Option<Account>> {
        let filter = format!("entity_type = :type AND {} = :value", attribute);
        let items = self
            .scan(
                &filter,
                &[
                    (":type", AttributeValue::S("account".to_string())),
                    (":value", AttributeValue::S(value.to_string())),
                ],
            )
            .await?;
        Ok(items.iter().find_map(account_from_item))
    }
}

fn patient_key(id: i64) -> String {
    format!("PATIENT#{}", id)
}

fn patient_item(patient: &Patient, id: i64) -> Item {
    let pk = patient_key(id);
    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S("patient".to_string()));
    item.insert("patient_id".to_string(), AttributeValue::N(id.to_string()));
    item.insert("name".to_string(), AttributeValue::S(patient.name.clone()));
    item.insert("name_lower".to_string(), AttributeValue::S(patient.name.to_lowercase()));
    item.insert("sick".to_string(), AttributeValue::Bool(patient.sick));
    item.insert("score".to_string(), AttributeValue::N(patient.score.to_string()));
    if let Some(birth_date) = patient.birth_date {
        item.insert(
            "birth_date".to_string(),
            AttributeValue::S(birth_date.format("%Y-%m-%d").to_string()),
        );
    }
    item
}

fn patient_from_item(item: &Item) -> Option<Patient> {
    let id = item
        .get("patient_id")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())?;

    Some(Patient {
        id: Some(id),
        name: item.get("name").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        birth_date: item
            .get("birth_date")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        sick: item.get("sick").and_then(|v| v.as_bool().ok()).copied().unwrap_or(false),
        score: item
            .get("score")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0),
    })
}

fn account_item(account: &Account) -> Item {
    let pk = format!("USER#{}", account.username);
    let roles = account
        .roles
        .iter()
        .map(|r| AttributeValue::S(r.role.clone()))
        .collect();

    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("entity_type".to_string(), AttributeValue::S("account".to_string()));
    item.insert("user_id".to_string(), AttributeValue::S(account.user_id.clone()));
    item.insert("username".to_string(), AttributeValue::S(account.username.clone()));
    item.insert("password".to_string(), AttributeValue::S(account.password.clone()));
    item.insert("email".to_string(), AttributeValue::S(account.email.clone()));
    item.insert("roles".to_string(), AttributeValue::L(roles));
    item
}

fn account_from_item(item: &Item) -> Option<Account> {
    let text = |name: &str| item.get(name).and_then(|v| v.as_s().ok()).map(|s| s.to_string());

    let roles = item
        .get("roles")
        .and_then(|v| v.as_l().ok())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_s().ok())
                .map(|s| Role::new(s.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Some(Account {
        user_id: text("user_id")?,
        username: text("username")?,
        password: text("password")?,
        email: text("email").unwrap_or_default(),
        roles,
    })
}

#[async_trait]
impl PatientStore for DynamoStore {
    async fn save(&self, mut patient: Patient) -> Result<Patient> {
        let id = match patient.id {
            Some(id) if self.get(patient_key(id)).await?.is_some() => id,
            _ => self.next_patient_id().await?,
        };

        self.put(patient_item(&patient, id)).await?;
        patient.id = Some(id);
        tracing::info!("Patient saved: {}", id);
        Ok(patient)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Patient>> {
        Ok(self.get(patient_key(id)).await?.as_ref().and_then(patient_from_item))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let pk = patient_key(id);
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(storage)?;

        Ok(result.attributes().is_some_and(|attrs| !attrs.is_empty()))
    }

    async fn find_all(&self, page: PageRequest) -> Result<Page<Patient>> {
        Ok(Page::from_matches(self.scan_patients("").await?, page))
    }

    async fn find_by_name_contains(&self, keyword: &str, page: PageRequest) -> Result<Page<Patient>> {
        Ok(Page::from_matches(self.scan_patients(keyword).await?, page))
    }
}

#[async_trait]
impl AccountStore for DynamoStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        Ok(self
            .get(format!("USER#{}", username))
            .await?
            .as_ref()
            .and_then(account_from_item))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.scan_account("email", email).await
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Account>> {
        self.scan_account("user_id", user_id).await
    }

    async fn create_account(&self, account: Account) -> Result<Account> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(account_item(&account)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                err if err.is_conditional_check_failed_exception() => {
                    RegistryError::DuplicateUsername(account.username.clone())
                }
                err => storage(err),
            })?;
        Ok(account)
    }

    async fn save_account(&self, account: Account) -> Result<Account> {
        self.put(account_item(&account)).await?;
        Ok(account)
    }

    async fn find_role(&self, role: &str) -> Result<Option<Role>> {
        Ok(self
            .get(format!("ROLE#{}", role))
            .await?
            .and_then(|item| item.get("role").and_then(|v| v.as_s().ok()).map(|s| Role::new(s.as_str()))))
    }

    async fn save_role(&self, role: Role) -> Result<Role> {
        let pk = format!("ROLE#{}", role.role);
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
        item.insert("SK".to_string(), AttributeValue::S(pk));
        item.insert("entity_type".to_string(), AttributeValue::S("role".to_string()));
        item.insert("role".to_string(), AttributeValue::S(role.role.clone()));
        self.put(item).await?;
        Ok(role)
    }
}
