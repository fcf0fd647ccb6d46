//! # Listing State
//!
//! Filter and pagination state for one listing view, plus the last page loaded.
//!
//! Every fetch is stamped with a generation number. Only the response to the
//! newest fetch is applied; an older response that completes late is reported
//! as [`FetchOutcome::Stale`] and dropped. A caller that runs fetches
//! concurrently calls [`ListingState::begin_fetch`] and
//! [`ListingState::finish_fetch`] itself; [`ListingState::fetch`] does both.
//!
//! Filter changes reset the page to 1 before any fetch is issued, so a
//! narrower filter never asks for a page beyond its own range.

use crate::commands::{list, ListParams};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::Result;
use crate::gateway::{DrugPage, Gateway};
use crate::model::{CategoryFilter, DrugRecord, StatusMode};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub search_term: String,
    pub category: CategoryFilter,
}

/// Claim on the result slot, handed out by [`ListingState::begin_fetch`].
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    params: ListParams,
}

impl FetchTicket {
    pub fn params(&self) -> &ListParams {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded,
    /// A newer fetch was issued after this one; its result was discarded.
    Stale,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageChange {
    /// Target outside `1..=total_pages()`; nothing changed.
    Rejected,
    Fetched(FetchOutcome),
}

#[derive(Debug, Clone)]
pub struct ListingState {
    records: Vec<DrugRecord>,
    loading: bool,
    error: Option<String>,
    current_page: usize,
    page_size: usize,
    total_count: usize,
    filters: Filters,
    status: StatusMode,
    generation: u64,
}

impl Default for ListingState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListingState {
    /// A zero page size falls back to the default.
    pub fn new(page_size: usize) -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            error: None,
            current_page: 1,
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            total_count: 0,
            filters: Filters::default(),
            status: StatusMode::Active,
            generation: 0,
        }
    }

    pub fn records(&self) -> &[DrugRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed fetch; `None` after a successful one.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn status(&self) -> StatusMode {
        self.status
    }

    pub fn total_pages(&self) -> usize {
        self.total_count.div_ceil(self.page_size)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term != self.filters.search_term {
            self.filters.search_term = term;
            self.current_page = 1;
        }
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        if category != self.filters.category {
            self.filters.category = category;
            self.current_page = 1;
        }
    }

    /// Back to no search, any category, page 1. Does not fetch.
    pub fn reset_filters(&mut self) {
        self.filters = Filters::default();
        self.current_page = 1;
    }

    fn params(&self) -> ListParams {
        ListParams {
            page: self.current_page,
            page_size: self.page_size,
            status: self.status,
            category: self.filters.category.clone(),
            search_term: self.filters.search_term.clone(),
        }
    }

    /// Start a fetch of the current page in `status` mode.
    ///
    /// Switching between active and decommissioned keeps `current_page`; call
    /// [`ListingState::reset_filters`] first when the other listing may be shorter.
    pub fn begin_fetch(&mut self, status: StatusMode) -> FetchTicket {
        self.status = status;
        self.generation += 1;
        self.loading = true;
        self.error = None;
        FetchTicket {
            generation: self.generation,
            params: self.params(),
        }
    }

    pub fn finish_fetch(&mut self, ticket: FetchTicket, result: Result<DrugPage>) -> FetchOutcome {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale listing response"
            );
            return FetchOutcome::Stale;
        }

        self.loading = false;
        match result {
            Ok(page) => {
                self.records = page.records;
                self.total_count = page.total_count;
                FetchOutcome::Loaded
            }
            Err(e) => {
                let message = e.to_string();
                self.error = Some(message.clone());
                FetchOutcome::Failed(message)
            }
        }
    }

    pub fn fetch<G: Gateway>(&mut self, gateway: &G, status: StatusMode) -> FetchOutcome {
        let ticket = self.begin_fetch(status);
        let result = list::run(gateway, ticket.params());
        self.finish_fetch(ticket, result)
    }

    pub fn change_page<G: Gateway>(&mut self, gateway: &G, target: usize) -> PageChange {
        if target < 1 || target > self.total_pages() {
            return PageChange::Rejected;
        }
        self.current_page = target;
        PageChange::Fetched(self.fetch(gateway, self.status))
    }
}
