use crate::error::{FormularyError, Result};
use crate::gateway::{ListQuery, RowRange, SearchPattern};
use crate::model::{CategoryFilter, StatusMode};

pub mod categories;
pub mod import;
pub mod list;
pub mod save;
pub mod status;

/// Inputs of a listing request, as the UI state holds them.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: usize,
    pub page_size: usize,
    pub status: StatusMode,
    pub category: CategoryFilter,
    pub search_term: String,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            status: StatusMode::Active,
            category: CategoryFilter::any(),
            search_term: String::new(),
        }
    }
}

impl ListParams {
    pub fn to_query(&self) -> Result<ListQuery> {
        if self.page < 1 {
            return Err(FormularyError::InvalidInput(format!(
                "Page must be 1 or greater, got {}",
                self.page
            )));
        }
        if self.page_size == 0 {
            return Err(FormularyError::InvalidInput(
                "Page size must be greater than zero".to_string(),
            ));
        }
        let range = RowRange::for_page(self.page, self.page_size).ok_or_else(|| {
            FormularyError::InvalidInput(format!(
                "Page {} of size {} is beyond any addressable row",
                self.page, self.page_size
            ))
        })?;
        Ok(ListQuery {
            status: self.status,
            category: self.category.clone(),
            search: SearchPattern::new(&self.search_term),
            range,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// What a mutation did, for the caller to report.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CmdResult {
    pub affected_codes: Vec<String>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected_codes(mut self, codes: Vec<String>) -> Self {
        self.affected_codes = codes;
        self
    }
}
