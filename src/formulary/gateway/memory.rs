use super::{AuthGateway, DrugPage, Gateway, ListQuery, StatusChange};
use crate::error::{FormularyError, Result};
use crate::model::{DrugDraft, DrugRecord, StatusMode};
use crate::session::{Identity, Session};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// In-process copy of the `drugs` table with the hosted store's query semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugTable {
    rows: Vec<DrugRecord>,
}

fn unique_violation(code: &str) -> FormularyError {
    FormularyError::Gateway {
        status: 409,
        message: format!(
            "duplicate key value violates unique constraint \"drugs_drug_code_key\" ({})",
            code
        ),
    }
}

impl DrugTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[DrugRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn select(&self, query: &ListQuery) -> DrugPage {
        let mut matching: Vec<&DrugRecord> = self
            .rows
            .iter()
            .filter(|r| match query.status {
                StatusMode::Active => r.is_active,
                StatusMode::Decommissioned => !r.is_active && r.remarks.is_some(),
            })
            .filter(|r| match query.category.as_option() {
                Some(category) => r.category == category,
                None => true,
            })
            .filter(|r| match &query.search {
                Some(pattern) => {
                    pattern.matches(&r.trade_name)
                        || pattern.matches(&r.generic_name)
                        || pattern.matches(&r.drug_code)
                        || r.remarks.as_deref().is_some_and(|rm| pattern.matches(rm))
                }
                None => true,
            })
            .collect();

        match query.status {
            StatusMode::Active => matching.sort_by(|a, b| a.drug_code.cmp(&b.drug_code)),
            // DESC puts NULL first, as Postgres does by default.
            StatusMode::Decommissioned => {
                matching.sort_by(|a, b| match (a.decommissioned_at, b.decommissioned_at) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(x), Some(y)) => y.cmp(&x),
                })
            }
        }

        let total_count = matching.len();
        let records = matching
            .into_iter()
            .skip(query.range.from)
            .take(query.range.to + 1 - query.range.from)
            .cloned()
            .collect();

        DrugPage {
            records,
            total_count,
        }
    }

    pub fn get(&self, id: Uuid) -> Result<DrugRecord> {
        self.rows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(FormularyError::DrugNotFound(id))
    }

    pub fn insert(&mut self, draft: &DrugDraft) -> Result<DrugRecord> {
        if self.rows.iter().any(|r| r.drug_code == draft.drug_code) {
            return Err(unique_violation(&draft.drug_code));
        }
        let record = DrugRecord {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            drug_code: draft.drug_code.clone(),
            trade_name: draft.trade_name.clone(),
            generic_name: draft.generic_name.clone(),
            category: draft.category.clone(),
            is_active: true,
            remarks: None,
            decommissioned_at: None,
        };
        self.rows.push(record.clone());
        Ok(record)
    }

    pub fn update(&mut self, id: Uuid, draft: &DrugDraft) -> Result<()> {
        if self
            .rows
            .iter()
            .any(|r| r.id != id && r.drug_code == draft.drug_code)
        {
            return Err(unique_violation(&draft.drug_code));
        }
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FormularyError::DrugNotFound(id))?;
        row.drug_code = draft.drug_code.clone();
        row.trade_name = draft.trade_name.clone();
        row.generic_name = draft.generic_name.clone();
        row.category = draft.category.clone();
        Ok(())
    }

    /// Rows whose code already exists are updated in place; lifecycle columns are kept.
    pub fn upsert(&mut self, drafts: &[DrugDraft]) -> Result<()> {
        for draft in drafts {
            match self.rows.iter().position(|r| r.drug_code == draft.drug_code) {
                Some(pos) => {
                    let id = self.rows[pos].id;
                    self.update(id, draft)?;
                }
                None => {
                    self.insert(draft)?;
                }
            }
        }
        Ok(())
    }

    pub fn update_status(&mut self, id: Uuid, change: &StatusChange) -> Result<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FormularyError::DrugNotFound(id))?;
        row.is_active = change.is_active;
        row.remarks = change.remarks.clone();
        row.decommissioned_at = change.decommissioned_at;
        Ok(())
    }

    pub fn categories(&self, status: StatusMode) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .rows
            .iter()
            .filter(|r| match status {
                StatusMode::Active => r.is_active,
                StatusMode::Decommissioned => !r.is_active,
            })
            .map(|r| r.category.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect();
        set.into_iter().map(String::from).collect()
    }
}

/// Gateway over a [`DrugTable`] held in memory.
///
/// `set_failure` makes every subsequent call fail, to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    table: DrugTable,
    failure: Option<String>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: DrugTable) -> Self {
        Self {
            table,
            failure: None,
        }
    }

    pub fn table(&self) -> &DrugTable {
        &self.table
    }

    pub fn set_failure(&mut self, message: Option<&str>) {
        self.failure = message.map(String::from);
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(FormularyError::Gateway {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Gateway for InMemoryGateway {
    fn select_drugs(&self, query: &ListQuery) -> Result<DrugPage> {
        self.check()?;
        Ok(self.table.select(query))
    }

    fn get_drug(&self, id: Uuid) -> Result<DrugRecord> {
        self.check()?;
        self.table.get(id)
    }

    fn insert_drug(&mut self, draft: &DrugDraft) -> Result<()> {
        self.check()?;
        self.table.insert(draft).map(|_| ())
    }

    fn update_drug(&mut self, id: Uuid, draft: &DrugDraft) -> Result<()> {
        self.check()?;
        self.table.update(id, draft)
    }

    fn upsert_drugs(&mut self, drafts: &[DrugDraft]) -> Result<()> {
        self.check()?;
        self.table.upsert(drafts)
    }

    fn update_status(&mut self, id: Uuid, change: &StatusChange) -> Result<()> {
        self.check()?;
        self.table.update_status(id, change)
    }

    fn unique_categories(&self, status: StatusMode) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.table.categories(status))
    }
}

struct Account {
    password: String,
    identity: Identity,
}

/// Identity service held in memory: accounts, profile roles, and the live session.
#[derive(Default)]
pub struct InMemoryAuth {
    accounts: HashMap<String, Account>,
    roles: HashMap<Uuid, String>,
    current: Option<Session>,
    pub fail_sign_out: bool,
    pub fail_role_lookup: bool,
}

impl InMemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its identity.
    pub fn add_user(&mut self, email: &str, password: &str, role: Option<&str>) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        if let Some(role) = role {
            self.roles.insert(identity.id, role.to_string());
        }
        self.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        identity
    }

    pub fn set_role(&mut self, user_id: Uuid, role: &str) {
        self.roles.insert(user_id, role.to_string());
    }

    fn issue(identity: &Identity) -> Session {
        Session {
            access_token: format!("token-{}", Uuid::new_v4()),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            user: identity.clone(),
        }
    }
}

impl AuthGateway for InMemoryAuth {
    fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.current.clone())
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        let account = self
            .accounts
            .get(email)
            .filter(|a| a.password == password)
            .ok_or_else(|| FormularyError::Auth("Invalid login credentials".to_string()))?;
        let session = Self::issue(&account.identity);
        self.current = Some(session.clone());
        Ok(session)
    }

    fn sign_out(&mut self, _session: &Session) -> Result<()> {
        if self.fail_sign_out {
            return Err(FormularyError::Gateway {
                status: 403,
                message: "Session not found".to_string(),
            });
        }
        self.current = None;
        Ok(())
    }

    fn fetch_role(&self, user_id: Uuid) -> Result<Option<String>> {
        if self.fail_role_lookup {
            return Err(FormularyError::Gateway {
                status: 500,
                message: "profiles lookup failed".to_string(),
            });
        }
        Ok(self.roles.get(&user_id).cloned())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use chrono::{DateTime, Utc};

    pub struct GatewayFixture {
        pub gateway: InMemoryGateway,
    }

    impl Default for GatewayFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GatewayFixture {
        pub fn new() -> Self {
            Self {
                gateway: InMemoryGateway::new(),
            }
        }

        /// `count` active drugs with codes `D001..`, all in `category`.
        pub fn with_drugs(mut self, count: usize, category: &str) -> Self {
            for i in 0..count {
                let draft = DrugDraft::new(
                    format!("D{:03}", i + 1),
                    format!("Trade {}", i + 1),
                    format!("Generic {}", i + 1),
                    category,
                );
                self.gateway.table.insert(&draft).unwrap();
            }
            self
        }

        pub fn with_active(mut self, code: &str, trade: &str, generic: &str, category: &str) -> Self {
            let draft = DrugDraft::new(code, trade, generic, category);
            self.gateway.table.insert(&draft).unwrap();
            self
        }

        pub fn with_decommissioned(
            mut self,
            code: &str,
            generic: &str,
            remarks: Option<&str>,
            at: DateTime<Utc>,
        ) -> Self {
            let draft = DrugDraft::new(code, format!("{} brand", generic), generic, "General");
            let record = self.gateway.table.insert(&draft).unwrap();
            let change = StatusChange {
                is_active: false,
                remarks: remarks.map(String::from),
                decommissioned_at: Some(at),
            };
            self.gateway.table.update_status(record.id, &change).unwrap();
            self
        }

        pub fn find(&self, code: &str) -> DrugRecord {
            self.gateway
                .table
                .rows()
                .iter()
                .find(|r| r.drug_code == code)
                .cloned()
                .unwrap()
        }
    }
}
