//! # taskdesk
//!
//! A personal task, note, and people tracker with a CLI (`td`) and an
//! authenticated JSON HTTP API.
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration: store backend, server bind, credentials |
//! | [`models`] | Entity types, patches, filters, ordering, stats, reminders |
//! | [`db`] | SQLite connection pool setup |
//! | [`migrate`] | SQLite schema creation |
//! | [`store`] | The storage port and its SQLite and JSON backends |
//! | [`detect`] | Heuristic task extraction from free text (Hebrew + English) |
//! | [`auth`] | API key and HTTP Basic credential checking |
//! | [`server`] | The axum HTTP façade |

pub mod auth;
pub mod config;
pub mod db;
pub mod detect;
pub mod migrate;
pub mod models;
pub mod server;
pub mod store;
