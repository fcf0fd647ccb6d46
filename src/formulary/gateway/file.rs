use super::memory::DrugTable;
use super::{DrugPage, Gateway, ListQuery, StatusChange};
use crate::error::{FormularyError, Result};
use crate::model::{DrugDraft, DrugRecord, StatusMode};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DATA_FILENAME: &str = "drugs.json";

/// Offline gateway: the whole table lives in `<root>/drugs.json`.
///
/// Every call re-reads the file, so edits made by another process are seen
/// on the next listing.
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILENAME)
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(FormularyError::Io)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<DrugTable> {
        let data_file = self.data_path();
        if !data_file.exists() {
            return Ok(DrugTable::new());
        }
        let content = fs::read_to_string(data_file).map_err(FormularyError::Io)?;
        let table: DrugTable =
            serde_json::from_str(&content).map_err(FormularyError::Serialization)?;
        Ok(table)
    }

    fn save(&self, table: &DrugTable) -> Result<()> {
        self.ensure_dir(&self.root)?;
        let content = serde_json::to_string_pretty(table).map_err(FormularyError::Serialization)?;
        // Write-then-rename so a crash never leaves a truncated table behind.
        let tmp = self.root.join(format!("{}.tmp", DATA_FILENAME));
        fs::write(&tmp, content).map_err(FormularyError::Io)?;
        fs::rename(&tmp, self.data_path()).map_err(FormularyError::Io)?;
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut DrugTable) -> Result<T>) -> Result<T> {
        let mut table = self.load()?;
        let out = f(&mut table)?;
        self.save(&table)?;
        Ok(out)
    }
}

impl Gateway for FileGateway {
    fn select_drugs(&self, query: &ListQuery) -> Result<DrugPage> {
        Ok(self.load()?.select(query))
    }

    fn get_drug(&self, id: Uuid) -> Result<DrugRecord> {
        self.load()?.get(id)
    }

    fn insert_drug(&mut self, draft: &DrugDraft) -> Result<()> {
        self.mutate(|t| t.insert(draft).map(|_| ()))
    }

    fn update_drug(&mut self, id: Uuid, draft: &DrugDraft) -> Result<()> {
        self.mutate(|t| t.update(id, draft))
    }

    fn upsert_drugs(&mut self, drafts: &[DrugDraft]) -> Result<()> {
        self.mutate(|t| t.upsert(drafts))
    }

    fn update_status(&mut self, id: Uuid, change: &StatusChange) -> Result<()> {
        self.mutate(|t| t.update_status(id, change))
    }

    fn unique_categories(&self, status: StatusMode) -> Result<Vec<String>> {
        Ok(self.load()?.categories(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RowRange;
    use crate::model::CategoryFilter;
    use chrono::Utc;

    fn active_query() -> ListQuery {
        ListQuery {
            status: StatusMode::Active,
            category: CategoryFilter::any(),
            search: None,
            range: RowRange::for_page(1, 20).unwrap(),
        }
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FileGateway::new(dir.path().join("nested"));
        let page = gateway.select_drugs(&active_query()).unwrap();
        assert_eq!(page.total_count, 0);
        assert!(!gateway.data_path().exists());
    }

    #[test]
    fn writes_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = FileGateway::new(dir.path());
        gateway
            .insert_drug(&DrugDraft::new("PARA500", "Tylenol", "Paracetamol", "Analgesic"))
            .unwrap();

        let reopened = FileGateway::new(dir.path());
        let page = reopened.select_drugs(&active_query()).unwrap();
        assert_eq!(page.total_count, 1);
        let id = page.records[0].id;

        let mut gateway = reopened;
        gateway
            .update_status(id, &StatusChange::decommission("Shortage", Utc::now()))
            .unwrap();
        let record = FileGateway::new(dir.path()).get_drug(id).unwrap();
        assert!(!record.is_active);
        assert_eq!(record.remarks.as_deref(), Some("Shortage"));
    }

    #[test]
    fn failed_write_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = FileGateway::new(dir.path());
        gateway
            .insert_drug(&DrugDraft::new("A1", "A", "A", "X"))
            .unwrap();
        let before = fs::read_to_string(gateway.data_path()).unwrap();

        assert!(gateway
            .insert_drug(&DrugDraft::new("A1", "B", "B", "Y"))
            .is_err());
        let after = fs::read_to_string(gateway.data_path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DATA_FILENAME), "{not json").unwrap();
        let gateway = FileGateway::new(dir.path());
        assert!(matches!(
            gateway.select_drugs(&active_query()),
            Err(FormularyError::Serialization(_))
        ));
    }
}
