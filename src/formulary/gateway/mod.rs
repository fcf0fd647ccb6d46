//! # Gateway Layer
//!
//! The hosted backend is reached through the [`Gateway`] and [`AuthGateway`]
//! traits. Everything above this module works with typed queries and records;
//! nothing about URLs, headers, or JSON files leaks upward.
//!
//! ## Implementations
//!
//! - [`rest::RestGateway`] / [`rest::RestAuth`]: production backend, a
//!   PostgREST-style query API plus a password-grant auth endpoint.
//! - [`file::FileGateway`]: offline backend keeping the table in `drugs.json`.
//! - [`memory::InMemoryGateway`] / [`memory::InMemoryAuth`]: for testing the
//!   commands and state without I/O.
//!
//! The memory and file backends share [`memory::DrugTable`], which evaluates
//! a [`ListQuery`] with the same semantics the hosted store applies.
//!
//! ## Query Semantics
//!
//! - `Active`: `is_active = true`, ordered by `drug_code` ascending.
//! - `Decommissioned`: `is_active = false AND remarks IS NOT NULL`, ordered by
//!   `decommissioned_at` descending.
//! - Category: exact, case-sensitive equality.
//! - Search: case-insensitive `ILIKE '%term%'` OR-ed across `trade_name`,
//!   `generic_name`, `drug_code`, `remarks`.
//! - The row range is applied last; the count ignores it.

use crate::error::Result;
use crate::model::{CategoryFilter, DrugDraft, DrugRecord, StatusMode};
use crate::session::Session;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod file;
pub mod memory;
pub mod rest;

/// Columns the search pattern is matched against, in the order they are OR-ed.
pub const SEARCH_COLUMNS: [&str; 4] = ["trade_name", "generic_name", "drug_code", "remarks"];

/// Zero-based, inclusive row window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub from: usize,
    pub to: usize,
}

impl RowRange {
    /// Row window for a 1-based page.
    ///
    /// `None` when `page` is 0, `page_size` is 0, or the window's end does not fit in `usize`.
    pub fn for_page(page: usize, page_size: usize) -> Option<Self> {
        let from = page.checked_sub(1)?.checked_mul(page_size)?;
        let end = from.checked_add(page_size)?;
        Some(Self {
            from,
            to: end.checked_sub(1)?,
        })
    }
}

/// A trimmed, wildcard-wrapped `ILIKE` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPattern(String);

impl SearchPattern {
    /// Returns `None` when the term is empty after trimming.
    pub fn new(term: &str) -> Option<Self> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(format!("%{}%", trimmed)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive `ILIKE` match: `%` matches any run, `_` one character.
    pub fn matches(&self, text: &str) -> bool {
        let pattern: Vec<char> = self.0.to_lowercase().chars().collect();
        let text: Vec<char> = text.to_lowercase().chars().collect();
        like_match(&pattern, &text)
    }
}

fn like_match(pattern: &[char], text: &[char]) -> bool {
    // Iterative wildcard match with single-point backtracking on the last `%`.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

/// A fully resolved listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub status: StatusMode,
    pub category: CategoryFilter,
    pub search: Option<SearchPattern>,
    pub range: RowRange,
}

/// One page of records plus the count of every row matching the filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugPage {
    pub records: Vec<DrugRecord>,
    pub total_count: usize,
}

/// Column values written by a status transition.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatusChange {
    pub is_active: bool,
    pub remarks: Option<String>,
    pub decommissioned_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn decommission(remarks: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            is_active: false,
            remarks: Some(remarks.into()),
            decommissioned_at: Some(at),
        }
    }

    pub fn recommission() -> Self {
        Self {
            is_active: true,
            remarks: None,
            decommissioned_at: None,
        }
    }
}

/// Access to the `drugs` table and the category procedure.
pub trait Gateway {
    /// Run a filtered, ordered, ranged listing with an exact count.
    fn select_drugs(&self, query: &ListQuery) -> Result<DrugPage>;

    /// Fetch a single record by id.
    fn get_drug(&self, id: Uuid) -> Result<DrugRecord>;

    /// Insert a new record; it starts out active.
    fn insert_drug(&mut self, draft: &DrugDraft) -> Result<()>;

    /// Overwrite the descriptive columns of the record with `id`.
    fn update_drug(&mut self, id: Uuid, draft: &DrugDraft) -> Result<()>;

    /// Insert-or-update keyed on `drug_code`.
    fn upsert_drugs(&mut self, drafts: &[DrugDraft]) -> Result<()>;

    /// Write lifecycle columns on the record with `id`.
    fn update_status(&mut self, id: Uuid, change: &StatusChange) -> Result<()>;

    /// Distinct categories among records in the given population.
    fn unique_categories(&self, status: StatusMode) -> Result<Vec<String>>;
}

/// Access to the backend's identity service.
pub trait AuthGateway {
    /// The session the backend currently recognizes, if any.
    fn current_session(&self) -> Result<Option<Session>>;

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session>;

    fn sign_out(&mut self, session: &Session) -> Result<()>;

    /// The profile role of a user (`"admin"`, ...), `None` when no profile row exists.
    fn fetch_role(&self, user_id: Uuid) -> Result<Option<String>>;
}
