//! # TAXII Bridge
//!
//! Connector between TAXII threat-intelligence feeds and a STIX repository.
//!
//! The bridge polls configured TAXII feeds, keeps every retrieved content
//! block with its provenance, and hands STIX documents to the repository's
//! import handlers. Records are stored as versioned JSON documents and
//! upgraded to the current shape whenever they are read.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ TAXII feeds  │──▶│  Poll cycle │──▶│    SQLite    │
//! │ (transport)  │   │  windows    │   │ polls/blocks │
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │
//!                                             ▼
//!                    ┌─────────────┐   ┌──────────────┐
//!                    │ STIX import │◀──│ Content      │
//!                    │ pipeline    │   │ import       │
//!                    └─────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! taxii init                          # create database
//! taxii config import servers.json    # validate and store service config
//! taxii config show
//! taxii poll last "taxii.example.com:feed-a"
//! taxii content list --failed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`schema`] | Versioned record encoding and migration |
//! | [`models`] | Poll records, content blocks, import results |
//! | [`store`] | Record storage (in-memory and SQLite) |
//! | [`service`] | TAXII service configuration |
//! | [`sources`] | Repository source lookup |
//! | [`poll`] | Poll windows and the poll cycle |
//! | [`import`] | STIX file and text import |
//! | [`content`] | Import of stored content blocks |
//! | [`db`] | Database connection |
//! | [`migrate`] | Table creation |
//! | [`error`] | Error types |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod poll;
pub mod schema;
pub mod service;
pub mod sources;
pub mod store;
