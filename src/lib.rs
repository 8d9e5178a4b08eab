//! # boardcore — dynamic-board CRM data engine
//!
//! Storage and domain layer for board-management CRM workspaces: boards with
//! user-defined typed columns, items holding a column-name → value map,
//! schema-level relationships realized by item links, a lead-conversion
//! workflow, and tenant administration — persisted in SQLite and served over
//! HTTP.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation and defaults
//! - **[`store`]** — SQLite store (boards, columns, items, relations, leads, tenancy)
//! - **[`columns`]** — Column-type dispatch: validation and normalization per type
//! - **[`error`]** — Domain error taxonomy
//! - **[`prefs`]** — Local preference store (view settings, notifications, board groups)
//! - **[`export`]** — CSV export of a board
//! - **[`api`]** — axum HTTP API over the store

pub mod api;
pub mod columns;
pub mod config;
pub mod error;
pub mod export;
pub mod prefs;
pub mod store;
