//! # API Facade
//!
//! `FormularyApi<G: Gateway>` is the single entry point a UI talks to. It owns
//! the gateway and the [`ListingState`] of the view it serves.
//!
//! Reads go through the listing state, so stale responses and filter resets
//! are handled in one place. Writes dispatch to `commands/*.rs` and come back
//! as an [`Outcome`]: a failed write is logged and reported, never raised.
//!
//! Writes do not refresh the listing. The caller decides when to call
//! [`FormularyApi::refresh`] again.
//!
//! ## Generic Over Gateway
//!
//! - Production: `FormularyApi<RestGateway>` or `FormularyApi<FileGateway>`
//! - Testing: `FormularyApi<InMemoryGateway>`

use crate::commands;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::model::{CategoryFilter, DrugDraft, DrugRecord, StatusMode};
use crate::state::{FetchOutcome, ListingState, PageChange};
use uuid::Uuid;

pub use crate::commands::{CmdMessage, CmdResult, ListParams, MessageLevel};

/// Result of a write, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { messages: Vec<CmdMessage> },
    Failure { message: String },
}

impl Outcome {
    fn from_result(operation: &str, result: Result<CmdResult>) -> Self {
        match result {
            Ok(result) => Outcome::Success {
                messages: result.messages,
            },
            Err(e) => {
                tracing::error!(operation, error = %e, "write failed");
                Outcome::Failure {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

pub struct FormularyApi<G: Gateway> {
    gateway: G,
    state: ListingState,
}

impl<G: Gateway> FormularyApi<G> {
    pub fn new(gateway: G, page_size: usize) -> Self {
        Self {
            gateway,
            state: ListingState::new(page_size),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    pub fn refresh(&mut self, status: StatusMode) -> FetchOutcome {
        self.state.fetch(&self.gateway, status)
    }

    pub fn change_page(&mut self, target: usize) -> PageChange {
        self.state.change_page(&self.gateway, target)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.state.set_search_term(term);
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.state.set_category(category);
    }

    pub fn reset_filters(&mut self) {
        self.state.reset_filters();
    }

    pub fn categories(&self) -> Vec<String> {
        commands::categories::run(&self.gateway)
    }

    pub fn get_drug(&self, id: Uuid) -> Result<DrugRecord> {
        self.gateway.get_drug(id)
    }

    pub fn save(&mut self, draft: &DrugDraft) -> Outcome {
        Outcome::from_result("save", commands::save::run(&mut self.gateway, draft))
    }

    pub fn import(&mut self, drafts: &[DrugDraft]) -> Outcome {
        Outcome::from_result("import", commands::save::import(&mut self.gateway, drafts))
    }

    pub fn decommission(&mut self, record: &DrugRecord, remarks: &str) -> Outcome {
        Outcome::from_result(
            "decommission",
            commands::status::decommission(&mut self.gateway, record, remarks),
        )
    }

    pub fn recommission(&mut self, record: &DrugRecord) -> Outcome {
        Outcome::from_result(
            "recommission",
            commands::status::recommission(&mut self.gateway, record),
        )
    }
}
