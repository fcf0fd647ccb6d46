use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::FormularyError;

/// Which population of the formulary a listing targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusMode {
    #[default]
    Active,
    Decommissioned,
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMode::Active => write!(f, "active"),
            StatusMode::Decommissioned => write!(f, "decommissioned"),
        }
    }
}

impl FromStr for StatusMode {
    type Err = FormularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StatusMode::Active),
            "decommissioned" => Ok(StatusMode::Decommissioned),
            other => Err(FormularyError::InvalidInput(format!(
                "Unknown status mode: {}",
                other
            ))),
        }
    }
}

/// Category restriction for a listing. `None` means every category.
///
/// The UI-facing wildcard `"all"` parses to the absent filter so nothing
/// downstream compares against the magic string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter(Option<String>);

impl CategoryFilter {
    pub const WILDCARD: &'static str = "all";

    pub fn any() -> Self {
        Self(None)
    }

    pub fn exact(category: impl Into<String>) -> Self {
        Self(Some(category.into()))
    }

    pub fn as_option(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_any(&self) -> bool {
        self.0.is_none()
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() || value == Self::WILDCARD {
            Self::any()
        } else {
            Self::exact(value)
        }
    }
}

impl From<Option<String>> for CategoryFilter {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => CategoryFilter::from(v.as_str()),
            None => Self::any(),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_deref().unwrap_or(Self::WILDCARD))
    }
}

/// A row of the `drugs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub id: Uuid,
    pub drug_code: String,
    pub trade_name: String,
    pub generic_name: String,
    pub category: String,
    pub is_active: bool,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub decommissioned_at: Option<DateTime<Utc>>,
}

impl DrugRecord {
    pub fn is_decommissioned(&self) -> bool {
        !self.is_active
    }
}

/// Payload for creating or editing a drug.
///
/// Lifecycle columns (`is_active`, `remarks`, `decommissioned_at`) are owned
/// by the status workflow and never travel with a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrugDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub drug_code: String,
    pub trade_name: String,
    pub generic_name: String,
    pub category: String,
}

impl DrugDraft {
    pub fn new(
        drug_code: impl Into<String>,
        trade_name: impl Into<String>,
        generic_name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            drug_code: drug_code.into(),
            trade_name: trade_name.into(),
            generic_name: generic_name.into(),
            category: category.into(),
        }
    }

    pub fn from_record(record: &DrugRecord) -> Self {
        Self {
            id: Some(record.id),
            drug_code: record.drug_code.clone(),
            trade_name: record.trade_name.clone(),
            generic_name: record.generic_name.clone(),
            category: record.category.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_category_is_absent_filter() {
        assert!(CategoryFilter::from("all").is_any());
        assert!(CategoryFilter::from("   ").is_any());
        assert!(CategoryFilter::from(None).is_any());
        assert_eq!(CategoryFilter::from("All").as_option(), Some("All"));
        assert_eq!(CategoryFilter::any().to_string(), "all");
    }

    #[test]
    fn status_mode_parses_case_insensitively() {
        assert_eq!(
            "Decommissioned".parse::<StatusMode>().unwrap(),
            StatusMode::Decommissioned
        );
        assert!("retired".parse::<StatusMode>().is_err());
    }

    #[test]
    fn draft_without_id_omits_it_on_the_wire() {
        let draft = DrugDraft::new("PARA500", "Tylenol", "Paracetamol", "Analgesic");
        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("is_active").is_none());
    }

    #[test]
    fn record_tolerates_missing_lifecycle_columns() {
        let json = serde_json::json!({
            "id": "6f1c1f46-7c0e-4d2a-9d35-0c9b6c1e6a11",
            "drug_code": "AMOX250",
            "trade_name": "Amoxil",
            "generic_name": "Amoxicillin",
            "category": "Antibiotic",
            "is_active": true
        });
        let record: DrugRecord = serde_json::from_value(json).unwrap();
        assert!(record.remarks.is_none());
        assert!(record.decommissioned_at.is_none());
        assert!(!record.is_decommissioned());
    }
}
