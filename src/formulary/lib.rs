//! # Formulary Architecture
//!
//! Formulary manages a hospital drug formulary kept in a hosted backend:
//! paginated and filtered listings, add/edit, bulk import, and the
//! decommission/recommission workflow. The library owns all behavior; the
//! `formulary` binary is one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs, print.rs)                           │
//! │  - Parses arguments, prints tables, owns stdout/exit codes  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs) + Session (session.rs)                        │
//! │  - Facade over commands and the listing state               │
//! │  - Writes return Outcome values, never errors               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Commands (commands/*.rs) + Listing state (state.rs)        │
//! │  - Validation, query building, pagination, stale guarding   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Gateway (gateway/)                                         │
//! │  - Gateway and AuthGateway traits                           │
//! │  - RestGateway (hosted), FileGateway, InMemoryGateway       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code never writes to stdout/stderr and never exits
//! the process. Diagnostics go through `tracing`; the binary decides where
//! they end up.
//!
//! ## Testing Strategy
//!
//! 1. **Commands**: unit tests against `InMemoryGateway` and its fixtures.
//! 2. **State / API**: pagination, filter resets, stale responses, dispatch.
//! 3. **Gateways**: `FileGateway` against a temp dir; `RestGateway` on the
//!    query pairs and headers it produces.
//! 4. **CLI**: `tests/` drives the binary on the file backend.
//!
//! ## Module Overview
//!
//! - [`api`]: the facade and [`api::Outcome`]
//! - [`commands`]: listing, save/import, status workflow, categories
//! - [`state`]: filter/pagination state with fetch generations
//! - [`session`]: signed-in user and admin role
//! - [`gateway`]: backend traits and implementations
//! - [`model`]: `DrugRecord`, `DrugDraft`, `StatusMode`, `CategoryFilter`
//! - [`config`]: `config.json` handling
//! - [`error`]: error types

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod session;
pub mod state;
